//! Test scenarios and task composition — the natural-language instructions
//! handed to the agent, with the built-in scenarios for the Maple app.

use std::fmt;

use maple_e2e_core::secrets::SecretValue;
use maple_e2e_core::{E2eError, E2eResult};
use serde::{Deserialize, Serialize};

use crate::actions::{INPUT_EMAIL_ACTION, INPUT_PASSWORD_ACTION};

pub const DEFAULT_APP_URL: &str = "http://localhost:5173";

/// A composed instruction string. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec(String);

impl TaskSpec {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fail if any credential value appears in the task text.
    pub fn ensure_free_of(&self, secrets: &[(&str, SecretValue)]) -> E2eResult<()> {
        for (name, value) in secrets {
            if !value.expose().is_empty() && self.0.contains(value.expose()) {
                return Err(E2eError::SecretLeak(name.to_string()));
            }
        }
        Ok(())
    }
}

impl fmt::Display for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds agent tasks against one deployment of the app.
#[derive(Debug, Clone)]
pub struct TaskComposer {
    app_url: String,
}

impl Default for TaskComposer {
    fn default() -> Self {
        Self::new(DEFAULT_APP_URL)
    }
}

impl TaskComposer {
    pub fn new(app_url: impl Into<String>) -> Self {
        Self {
            app_url: app_url.into(),
        }
    }

    /// Login steps shared by every authenticated scenario. The agent types
    /// credentials only through the two secure input actions.
    pub fn login_preamble(&self) -> String {
        format!(
            r#"
PREREQUISITE: Complete login process if not already on the main logged in chat dashboard
1. Go to {url} and wait for the page to load completely
1a. If you're on the marketing page and see a "Log in" button, then continue
1b. IMPORTANT: If you're inside the main app, with a chatbox available, then you're already logged in. Skip the log in steps and go straight to step 10.
2. Look for and click the "Log in" or "Sign in" button/link to access the login form
3. Find the email input field and click on it to focus it
4. Use the '{email}' action to enter the email securely
5. Find the password input field and click on it to focus it
6. Use the '{password}' action to enter the password securely
7. Click the login/sign in button to submit the form
8. Wait for successful login and navigation to the main dashboard
9. Verify you see the main chat interface with input field and model selector
"#,
            url = self.app_url,
            email = INPUT_EMAIL_ACTION,
            password = INPUT_PASSWORD_ACTION,
        )
    }

    /// Full task for a login-gated scenario: header, login preamble,
    /// scenario steps, failure-reporting rule, and the JSON output contract.
    pub fn compose(&self, steps: &str, test_name: &str, expected_outcome: &str) -> TaskSpec {
        TaskSpec(format!(
            r#"
TEST CASE: {test_name}
EXPECTED OUTCOME: {expected_outcome}

STEPS:
{preamble}

POST-LOGIN TESTING:
{steps}

IMPORTANT: If login fails at any point, immediately return with test_case_passed: false and explain the failure including that login failed.
If login succeeds but the test case fails, return test_case_passed: false with details about what went wrong in the test.

{contract}"#,
            preamble = self.login_preamble(),
            contract = OUTPUT_CONTRACT,
        ))
    }

    /// Task for a scenario that exercises the login form itself and so has no
    /// login preamble. `{app_url}` in the steps is replaced with the app URL.
    pub fn compose_unauthenticated(&self, steps: &str) -> TaskSpec {
        TaskSpec(steps.replace("{app_url}", &self.app_url))
    }
}

const OUTPUT_CONTRACT: &str = r#"When complete, you MUST provide your result in this EXACT JSON format (no other text before or after):
{
  "test_case_passed": true/false,
  "explanation": "Detailed explanation of what happened during the test",
  "final_page_url": "Current URL after all steps"
}

DO NOT include any text outside of the JSON object above!
"#;

/// How an agent answer is judged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expectation {
    /// The answer must carry a JSON verdict with `test_case_passed: true`.
    JsonVerdict,
    /// The lowercased answer must mention every `all_of` term and, when
    /// `any_of` is non-empty, at least one of those.
    AnswerMentions {
        all_of: Vec<String>,
        any_of: Vec<String>,
    },
}

impl Expectation {
    pub fn mentions(all_of: &[&str], any_of: &[&str]) -> Self {
        Expectation::AnswerMentions {
            all_of: all_of.iter().map(|s| s.to_string()).collect(),
            any_of: any_of.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Keyword check for [`Expectation::AnswerMentions`]; always false for
    /// [`Expectation::JsonVerdict`], which is judged by the verdict parser.
    pub fn answer_matches(&self, answer: &str) -> bool {
        match self {
            Expectation::JsonVerdict => false,
            Expectation::AnswerMentions { all_of, any_of } => {
                let answer = answer.to_lowercase();
                all_of.iter().all(|t| answer.contains(&t.to_lowercase()))
                    && (any_of.is_empty()
                        || any_of.iter().any(|t| answer.contains(&t.to_lowercase())))
            }
        }
    }
}

/// One end-to-end scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Identifier used for the log directory and the summary.
    pub name: String,
    pub title: String,
    pub expected_outcome: String,
    pub steps: String,
    /// Gated on test account credentials; adds the login preamble and the
    /// secure input actions.
    pub requires_login: bool,
    pub max_steps: Option<u32>,
    pub expectation: Expectation,
}

impl Scenario {
    pub fn task(&self, composer: &TaskComposer) -> TaskSpec {
        if self.requires_login {
            composer.compose(&self.steps, &self.title, &self.expected_outcome)
        } else {
            composer.compose_unauthenticated(&self.steps)
        }
    }
}

/// Model selector visibility and switching, after login.
pub fn model_selector_scenario() -> Scenario {
    Scenario {
        name: "model_selector".into(),
        title: "Model Selector Functionality".into(),
        expected_outcome: "The model selector should be visible in the chat interface and allow selecting different models via dropdown".into(),
        steps: r#"
10. Once logged in, wait for the page to fully load with the `wait_2_seconds` action
11. Look at the chat interface and verify you can see text that says "Model:" at the bottom of the chatbox component.
12. Click on the Model button dropdown.
13. Once the dropdown opens, you should see a list of available models
14. Click on a different model name in the dropdown (e.g., if "Llama 3.3 70B" is selected, click on "Gemma 3 27B" or vice versa). There should be at least 2 models available. Refresh if you have to. If it never shows up then fail the test case.
15. Verify the dropdown closes and the selected model name is now shown in the button

IMPORTANT: Your final response MUST be in the exact JSON format specified in the task instructions above!
"#
        .into(),
        requires_login: true,
        max_steps: Some(20),
        expectation: Expectation::JsonVerdict,
    }
}

/// Login with an email that lacks `@` must surface an email format error.
pub fn invalid_email_format_scenario() -> Scenario {
    Scenario {
        name: "invalid_email_format".into(),
        title: "Invalid Email Format".into(),
        expected_outcome: "An error message about the email format is shown".into(),
        steps: r#"
Go to {app_url} and wait 5 seconds for the page to fully load.
Look for ANY text or buttons on the page. If you see "Maple AI" or any navigation links, describe them.
If you can find a login button or link (it might say "Login", "Sign In", "Log in", or be in the navigation), click on it.
If you're on a login page, try to log in with:
- Email: notanemail
- Password: Test123!

Tell me what you see on the page and if you see any error messages.
"#
        .into(),
        requires_login: false,
        max_steps: None,
        expectation: Expectation::mentions(&["error", "email"], &[]),
    }
}

/// Well-formed email with a wrong password must surface a credentials error.
pub fn invalid_credentials_scenario() -> Scenario {
    Scenario {
        name: "invalid_credentials_valid_email".into(),
        title: "Invalid Credentials With Valid Email".into(),
        expected_outcome: "An invalid credentials error is shown, not an email format error".into(),
        steps: r#"
Go to {app_url} and wait for the page to load.
Find and click on the login button or link to go to the login page.
Once on the login page, try to log in with these credentials:
- Email: john.doe@example.com (this is a valid email format)
- Password: WrongPassword123!

Submit the form and tell me what error message appears.
I expect to see an error about invalid credentials or incorrect password,
NOT about email format since the email is properly formatted.
"#
        .into(),
        requires_login: false,
        max_steps: None,
        expectation: Expectation::mentions(&["credentials"], &["invalid", "incorrect"]),
    }
}

/// Every built-in scenario, in run order.
pub fn default_scenarios() -> Vec<Scenario> {
    vec![
        invalid_email_format_scenario(),
        invalid_credentials_scenario(),
        model_selector_scenario(),
    ]
}

pub fn find_scenario(name: &str) -> Option<Scenario> {
    default_scenarios().into_iter().find(|s| s.name == name)
}
