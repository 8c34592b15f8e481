//! Full suite runs against scripted agents: retries, skips, summary file
//! and exit code.

use std::sync::Arc;
use std::time::Duration;

use maple_agentic_testing::agent::{ScriptedAgentRunner, ScriptedTurn};
use maple_agentic_testing::reporter::write_summary;
use maple_agentic_testing::scenario::{
    invalid_credentials_scenario, invalid_email_format_scenario, model_selector_scenario, Scenario,
};
use maple_agentic_testing::{AgentTestCase, RetryPolicy, SuiteOrchestrator, TestCase, TestStatus};
use maple_e2e_core::secrets::{SecretProvider, TEST_EMAIL_VAR, TEST_PASSWORD_VAR};
use maple_e2e_core::StaticSecretProvider;

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        delay: Duration::ZERO,
    }
}

fn credentials() -> Arc<dyn SecretProvider> {
    Arc::new(
        StaticSecretProvider::new()
            .with(TEST_EMAIL_VAR, "qa@example.com")
            .with(TEST_PASSWORD_VAR, "hunter2-but-longer"),
    )
}

fn test_case(
    scenario: Scenario,
    runner: Arc<ScriptedAgentRunner>,
    secrets: Arc<dyn SecretProvider>,
    logs: &tempfile::TempDir,
) -> Box<dyn TestCase> {
    Box::new(AgentTestCase::new(scenario, runner, secrets).with_logs_dir(logs.path()))
}

#[tokio::test]
async fn test_suite_passes_with_flaky_retry() {
    let logs = tempfile::tempdir().unwrap();
    let secrets = credentials();

    let email_runner = Arc::new(ScriptedAgentRunner::new([ScriptedTurn::answer(
        "A red error under the field says: please enter a valid email address.",
    )]));
    let creds_runner = Arc::new(ScriptedAgentRunner::new([ScriptedTurn::answer(
        "The page shows 'Incorrect credentials'.",
    )]));
    let selector_runner = Arc::new(ScriptedAgentRunner::new([
        ScriptedTurn::incomplete(),
        ScriptedTurn::answer(r#"{"test_case_passed": true, "explanation": "Switched model"}"#)
            .invoking(["Input the email for Maple login", "Input the password for Maple login"]),
    ]));

    let tests = vec![
        test_case(invalid_email_format_scenario(), email_runner, secrets.clone(), &logs),
        test_case(invalid_credentials_scenario(), creds_runner, secrets.clone(), &logs),
        test_case(model_selector_scenario(), selector_runner.clone(), secrets, &logs),
    ];

    let report = SuiteOrchestrator::new(fast_policy()).run(&tests).await;

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.summary.passed, 3);
    assert_eq!(report.summary.flaky_tests, vec!["model_selector"]);
    assert_eq!(report.outcomes[2].attempts, 2);

    // Credentials reach the page through the secure actions, never the task.
    assert_eq!(selector_runner.typed(), "qa@example.comhunter2-but-longer");
    assert!(selector_runner
        .tasks()
        .iter()
        .all(|t| !t.contains("hunter2-but-longer")));

    let summary_path = logs.path().join("test_summary.txt");
    write_summary(&summary_path, &report.summary).await.unwrap();
    assert_eq!(
        std::fs::read_to_string(&summary_path).unwrap(),
        "Total tests: 3\nPassed: 3\nFailed: 0\n"
    );
}

#[tokio::test]
async fn test_suite_fails_and_skips_without_credentials() {
    let logs = tempfile::tempdir().unwrap();
    let no_secrets: Arc<dyn SecretProvider> = Arc::new(StaticSecretProvider::new());

    let email_runner = Arc::new(ScriptedAgentRunner::always(ScriptedTurn::answer(
        "I see the Maple AI home page.",
    )));
    let selector_runner = Arc::new(ScriptedAgentRunner::always(ScriptedTurn::answer(
        r#"{"test_case_passed": true}"#,
    )));

    let tests = vec![
        test_case(invalid_email_format_scenario(), email_runner.clone(), no_secrets.clone(), &logs),
        test_case(model_selector_scenario(), selector_runner.clone(), no_secrets, &logs),
    ];

    let report = SuiteOrchestrator::new(fast_policy()).run(&tests).await;

    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.outcomes[0].status, TestStatus::Failed);
    assert_eq!(report.outcomes[0].attempts, 3);
    assert_eq!(email_runner.runs(), 3);

    assert_eq!(report.outcomes[1].status, TestStatus::Skipped);
    assert_eq!(report.outcomes[1].attempts, 1);
    assert_eq!(selector_runner.runs(), 0);

    let summary_path = logs.path().join("out").join("test_summary.txt");
    write_summary(&summary_path, &report.summary).await.unwrap();
    assert_eq!(
        std::fs::read_to_string(&summary_path).unwrap(),
        "Total tests: 2\nPassed: 0\nFailed: 1\nFailed tests: invalid_email_format\n"
    );
}
