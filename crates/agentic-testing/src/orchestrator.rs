//! Suite orchestration — runs tests one after another, retrying failed
//! attempts up to a fixed ceiling.
//!
//! End-to-end browser sessions are heavy and their logs are easier to read
//! in order, so tests never run concurrently.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::reporter::SuiteSummary;
use crate::test_case::{TestCase, TestStatus};

/// How failed attempts are retried. The delay is a fixed pause, not a
/// backoff curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Final record of one test across all its attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub name: String,
    pub status: TestStatus,
    pub attempts: u32,
    /// Detail of the last attempt.
    pub detail: String,
    pub duration_ms: u64,
}

impl TestOutcome {
    /// Passed, but only after at least one failed attempt.
    pub fn is_flaky(&self) -> bool {
        self.status == TestStatus::Passed && self.attempts > 1
    }
}

/// Outcomes of a suite run, in execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub outcomes: Vec<TestOutcome>,
    pub summary: SuiteSummary,
}

impl SuiteReport {
    pub fn from_outcomes(outcomes: Vec<TestOutcome>) -> Self {
        let summary = SuiteSummary::from_outcomes(&outcomes);
        Self { outcomes, summary }
    }

    /// True iff no test failed terminally. Skipped tests do not count
    /// against the suite.
    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }
}

pub struct SuiteOrchestrator {
    policy: RetryPolicy,
}

impl SuiteOrchestrator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run every test to a terminal status, in order.
    pub async fn run(&self, tests: &[Box<dyn TestCase>]) -> SuiteReport {
        info!(tests = tests.len(), max_attempts = self.policy.max_attempts, "Starting suite");

        let mut outcomes = Vec::with_capacity(tests.len());
        for test in tests {
            outcomes.push(self.run_test(test.as_ref()).await);
        }

        let report = SuiteReport::from_outcomes(outcomes);
        info!(
            total = report.summary.total,
            passed = report.summary.passed,
            failed = report.summary.failed,
            skipped = report.summary.skipped,
            "Suite finished"
        );
        report
    }

    /// Run one test, retrying failed attempts. A skip ends the test at once.
    pub async fn run_test(&self, test: &dyn TestCase) -> TestOutcome {
        let max_attempts = self.policy.max_attempts.max(1);
        let started = Instant::now();
        let name = test.name().to_string();

        let mut attempt = 0;
        let last = loop {
            attempt += 1;
            info!(test = %name, attempt, max_attempts, "Running test");
            let outcome = test.run_attempt(attempt).await;

            match outcome.status {
                TestStatus::Passed | TestStatus::Skipped => break outcome,
                TestStatus::Failed if attempt >= max_attempts => break outcome,
                TestStatus::Failed => {
                    warn!(
                        test = %name,
                        attempt,
                        detail = %outcome.detail,
                        delay_ms = self.policy.delay.as_millis() as u64,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
            }
        };

        let outcome = TestOutcome {
            name,
            status: last.status,
            attempts: attempt,
            detail: last.detail,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            test = %outcome.name,
            status = outcome.status.label(),
            attempts = outcome.attempts,
            "Test finished"
        );
        outcome
    }
}

impl Default for SuiteOrchestrator {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_case::AttemptOutcome;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Plays back fixed statuses; the last one repeats.
    struct FixedTest {
        name: String,
        statuses: Mutex<VecDeque<TestStatus>>,
        calls: Arc<AtomicU32>,
    }

    impl FixedTest {
        fn boxed(name: &str, statuses: &[TestStatus], calls: Arc<AtomicU32>) -> Box<dyn TestCase> {
            Box::new(Self {
                name: name.into(),
                statuses: Mutex::new(statuses.iter().copied().collect()),
                calls,
            })
        }
    }

    #[async_trait]
    impl TestCase for FixedTest {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run_attempt(&self, _attempt: u32) -> AttemptOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let status = {
                let mut q = self.statuses.lock().unwrap();
                if q.len() > 1 {
                    q.pop_front().unwrap()
                } else {
                    q[0]
                }
            };
            AttemptOutcome {
                status,
                detail: format!("{status:?}"),
            }
        }
    }

    fn orchestrator() -> SuiteOrchestrator {
        SuiteOrchestrator::new(RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        })
    }

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    #[tokio::test]
    async fn test_permanent_failure_retries_to_ceiling() {
        let calls = counter();
        let tests = vec![FixedTest::boxed("broken", &[TestStatus::Failed], calls.clone())];

        let report = orchestrator().run(&tests).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.outcomes[0].attempts, 3);
        assert_eq!(report.outcomes[0].status, TestStatus::Failed);
        assert_eq!(report.summary.failed_tests, vec!["broken"]);
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_skip_is_not_retried() {
        let calls = counter();
        let tests = vec![FixedTest::boxed("gated", &[TestStatus::Skipped], calls.clone())];

        let report = orchestrator().run(&tests).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.outcomes[0].status, TestStatus::Skipped);
        assert!(report.all_passed());
    }

    #[tokio::test]
    async fn test_pass_after_retry_is_flaky() {
        let calls = counter();
        let tests = vec![FixedTest::boxed(
            "wobbly",
            &[TestStatus::Failed, TestStatus::Passed],
            calls.clone(),
        )];

        let report = orchestrator().run(&tests).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.outcomes[0].status, TestStatus::Passed);
        assert!(report.outcomes[0].is_flaky());
        assert_eq!(report.summary.flaky_tests, vec!["wobbly"]);
        assert!(report.all_passed());
    }

    #[tokio::test]
    async fn test_exit_codes() {
        let ok = vec![
            FixedTest::boxed("a", &[TestStatus::Passed], counter()),
            FixedTest::boxed("b", &[TestStatus::Skipped], counter()),
            FixedTest::boxed("c", &[TestStatus::Passed], counter()),
        ];
        assert_eq!(orchestrator().run(&ok).await.exit_code(), 0);

        let bad = vec![
            FixedTest::boxed("a", &[TestStatus::Passed], counter()),
            FixedTest::boxed("b", &[TestStatus::Failed], counter()),
            FixedTest::boxed("c", &[TestStatus::Passed], counter()),
        ];
        let report = orchestrator().run(&bad).await;
        assert_eq!(report.exit_code(), 1);
        assert_eq!(
            report.outcomes.iter().map(|o| o.name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = counter();
        let orchestrator = SuiteOrchestrator::new(RetryPolicy {
            max_attempts: 0,
            delay: Duration::ZERO,
        });
        let outcome = orchestrator
            .run_test(FixedTest::boxed("once", &[TestStatus::Failed], calls.clone()).as_ref())
            .await;
        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
