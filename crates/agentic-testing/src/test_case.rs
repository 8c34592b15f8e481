//! Test cases — one scenario composed into a task, run through the agent,
//! and judged from the agent's answer.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use maple_e2e_core::secrets::{login_credentials, validate_login_credentials, SecretProvider};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::actions::{login_actions, ActionRegistry};
use crate::agent::{AgentOutcome, AgentRequest, AgentRunner};
use crate::artifacts::{AttemptRecord, TestArtifacts};
use crate::scenario::{Expectation, Scenario, TaskComposer};
use crate::verdict::try_parse_verdict;

const RAW_ANSWER_LOG_LIMIT: usize = 500;

/// Terminal status of a test attempt or of a whole test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    /// Could not run here, e.g. credentials absent. Not a failure.
    Skipped,
}

impl TestStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TestStatus::Passed => "PASS",
            TestStatus::Failed => "FAIL",
            TestStatus::Skipped => "SKIP",
        }
    }
}

/// Result of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    pub status: TestStatus,
    pub detail: String,
}

impl AttemptOutcome {
    pub fn passed(detail: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Passed,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Failed,
            detail: detail.into(),
        }
    }

    pub fn skipped(detail: impl Into<String>) -> Self {
        Self {
            status: TestStatus::Skipped,
            detail: detail.into(),
        }
    }
}

/// A named, independently runnable test. Attempts never panic or return
/// errors; every failure mode becomes an [`AttemptOutcome`].
#[async_trait]
pub trait TestCase: Send + Sync {
    fn name(&self) -> &str;

    async fn run_attempt(&self, attempt: u32) -> AttemptOutcome;
}

/// A scenario executed by an [`AgentRunner`].
pub struct AgentTestCase {
    scenario: Scenario,
    composer: TaskComposer,
    runner: Arc<dyn AgentRunner>,
    secrets: Arc<dyn SecretProvider>,
    logs_dir: PathBuf,
    default_max_steps: u32,
}

impl AgentTestCase {
    pub fn new(
        scenario: Scenario,
        runner: Arc<dyn AgentRunner>,
        secrets: Arc<dyn SecretProvider>,
    ) -> Self {
        Self {
            scenario,
            composer: TaskComposer::default(),
            runner,
            secrets,
            logs_dir: PathBuf::from("logs"),
            default_max_steps: 10,
        }
    }

    pub fn with_composer(mut self, composer: TaskComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn with_logs_dir(mut self, logs_dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = logs_dir.into();
        self
    }

    pub fn with_default_max_steps(mut self, max_steps: u32) -> Self {
        self.default_max_steps = max_steps;
        self
    }

    fn judge(&self, outcome: &AgentOutcome) -> AttemptOutcome {
        if !outcome.is_done() {
            return AttemptOutcome::failed("Task did not complete successfully");
        }
        let answer = outcome.final_result().unwrap_or_default();

        match &self.scenario.expectation {
            Expectation::JsonVerdict => match try_parse_verdict(answer) {
                Ok(verdict) if verdict.test_case_passed => {
                    AttemptOutcome::passed(verdict.explanation)
                }
                Ok(verdict) => AttemptOutcome::failed(verdict.explanation),
                Err(e) => {
                    let raw: String = answer.chars().take(RAW_ANSWER_LOG_LIMIT).collect();
                    warn!(
                        test = %self.scenario.name,
                        reason = %e,
                        raw_result = %raw,
                        "No verdict in agent answer"
                    );
                    AttemptOutcome::failed(format!("Could not parse JSON from result: {e}"))
                }
            },
            expectation @ Expectation::AnswerMentions { .. } => {
                if expectation.answer_matches(answer) {
                    AttemptOutcome::passed(format!(
                        "Found expected message: {}",
                        self.scenario.expected_outcome
                    ))
                } else {
                    AttemptOutcome::failed(format!(
                        "Did not find expected message: {}",
                        self.scenario.expected_outcome
                    ))
                }
            }
        }
    }

    async fn save_artifacts(
        &self,
        artifacts: &TestArtifacts,
        outcome: Option<&AgentOutcome>,
        record: AttemptRecord,
    ) {
        let conversation = outcome
            .map(|o| o.conversation.as_slice())
            .unwrap_or_default();
        if let Err(e) = artifacts.save(conversation, &record).await {
            warn!(
                test = %self.scenario.name,
                dir = %artifacts.dir().display(),
                error = %e,
                "Failed to save test artifacts"
            );
        }
    }
}

#[async_trait]
impl TestCase for AgentTestCase {
    fn name(&self) -> &str {
        &self.scenario.name
    }

    async fn run_attempt(&self, attempt: u32) -> AttemptOutcome {
        let name = &self.scenario.name;

        if self.scenario.requires_login {
            match validate_login_credentials(self.secrets.as_ref()) {
                Ok(()) => {}
                Err(e) if e.is_credential_gate() => {
                    warn!(test = %name, reason = %e, "Skipping credential-gated test");
                    return AttemptOutcome::skipped(e.to_string());
                }
                Err(e) => return AttemptOutcome::failed(e.to_string()),
            }
        }

        let artifacts = TestArtifacts::new(&self.logs_dir, name);
        let task = self.scenario.task(&self.composer);
        if let Err(e) = task.ensure_free_of(&login_credentials(self.secrets.as_ref())) {
            error!(test = %name, error = %e, "Refusing to send task");
            let record = AttemptRecord::from_error(name, attempt, &e);
            self.save_artifacts(&artifacts, None, record).await;
            return AttemptOutcome::failed(e.to_string());
        }

        let actions: Option<ActionRegistry> = self
            .scenario
            .requires_login
            .then(|| login_actions(self.secrets.clone()));
        let request = AgentRequest {
            task: task.as_str(),
            max_steps: self.scenario.max_steps.unwrap_or(self.default_max_steps),
            actions: actions.as_ref(),
        };

        info!(test = %name, attempt, max_steps = request.max_steps, "Running agent task");

        match self.runner.run(request).await {
            Ok(outcome) => {
                let record = AttemptRecord::from_outcome(name, attempt, &outcome);
                self.save_artifacts(&artifacts, Some(&outcome), record).await;
                self.judge(&outcome)
            }
            Err(e) => {
                error!(test = %name, attempt, error = %e, "Agent run failed");
                let record = AttemptRecord::from_error(name, attempt, &e);
                self.save_artifacts(&artifacts, None, record).await;
                AttemptOutcome::failed(e.to_string())
            }
        }
    }
}
