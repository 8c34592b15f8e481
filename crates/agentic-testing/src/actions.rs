//! Custom actions — named capabilities the agent can invoke by name,
//! including the secure credential inputs used by the login flow.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use maple_e2e_core::secrets::{SecretProvider, TEST_EMAIL_VAR, TEST_PASSWORD_VAR};
use maple_e2e_core::E2eResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::page::PageHandle;

pub const INPUT_EMAIL_ACTION: &str = "Input the email for Maple login";
pub const INPUT_PASSWORD_ACTION: &str = "Input the password for Maple login";
pub const WAIT_ACTION: &str = "wait_2_seconds";
pub const CLICK_MODEL_SELECTOR_ACTION: &str = "Click model selector button";

const MODEL_SELECTOR: &str = "[data-testid=\"model-selector-button\"]";

/// What an action reports back to the agent. `extracted_content` is visible
/// to the LLM and must never carry a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub extracted_content: String,
}

impl ActionResult {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            extracted_content: content.into(),
        }
    }

    pub fn fail(content: impl Into<String>) -> Self {
        Self {
            success: false,
            extracted_content: content.into(),
        }
    }
}

/// An action exposed to the agent under a fixed human-readable name.
#[async_trait]
pub trait CustomAction: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, page: &mut dyn PageHandle) -> ActionResult;
}

/// Types a secret into the focused input. The value comes from the injected
/// provider at invocation time and is never part of the task text.
pub struct SecureInputAction {
    name: String,
    secret_name: String,
    entered_message: String,
    provider: Arc<dyn SecretProvider>,
}

impl SecureInputAction {
    pub fn new(
        name: impl Into<String>,
        secret_name: impl Into<String>,
        entered_message: impl Into<String>,
        provider: Arc<dyn SecretProvider>,
    ) -> Self {
        Self {
            name: name.into(),
            secret_name: secret_name.into(),
            entered_message: entered_message.into(),
            provider,
        }
    }

    pub fn email(provider: Arc<dyn SecretProvider>) -> Self {
        Self::new(
            INPUT_EMAIL_ACTION,
            TEST_EMAIL_VAR,
            "Email entered securely",
            provider,
        )
    }

    pub fn password(provider: Arc<dyn SecretProvider>) -> Self {
        Self::new(
            INPUT_PASSWORD_ACTION,
            TEST_PASSWORD_VAR,
            "Password entered securely",
            provider,
        )
    }
}

#[async_trait]
impl CustomAction for SecureInputAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, page: &mut dyn PageHandle) -> ActionResult {
        let Some(secret) = self.provider.get(&self.secret_name) else {
            warn!(action = %self.name, variable = %self.secret_name, "Secret unavailable");
            return ActionResult::fail(format!(
                "{} environment variable not set",
                self.secret_name
            ));
        };

        if let Err(e) = page.press("Control+a").await {
            return ActionResult::fail(format!("Failed to select input contents: {e}"));
        }
        if let Err(e) = page.type_text(secret.expose()).await {
            return ActionResult::fail(format!("Failed to type {}: {e}", self.secret_name));
        }

        debug!(action = %self.name, "Secure input entered");
        ActionResult::ok(self.entered_message.clone())
    }
}

/// Lets the page settle between steps.
pub struct WaitAction {
    name: String,
    duration: Duration,
}

impl WaitAction {
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }
}

impl Default for WaitAction {
    fn default() -> Self {
        Self::new(WAIT_ACTION, Duration::from_secs(2))
    }
}

#[async_trait]
impl CustomAction for WaitAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, _page: &mut dyn PageHandle) -> ActionResult {
        tokio::time::sleep(self.duration).await;
        ActionResult::ok(format!("Waited {} seconds", self.duration.as_secs()))
    }
}

/// Clicks an element located by selector after waiting for it, then pauses
/// so dropdowns can open.
pub struct ClickSelectorAction {
    name: String,
    selector: String,
    description: String,
    timeout_ms: u64,
    settle: Duration,
}

impl ClickSelectorAction {
    pub fn model_selector() -> Self {
        Self {
            name: CLICK_MODEL_SELECTOR_ACTION.to_string(),
            selector: MODEL_SELECTOR.to_string(),
            description: "model selector".to_string(),
            timeout_ms: 5000,
            settle: Duration::from_secs(1),
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

#[async_trait]
impl CustomAction for ClickSelectorAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, page: &mut dyn PageHandle) -> ActionResult {
        let clicked: E2eResult<()> = async {
            page.wait_for_selector(&self.selector, self.timeout_ms).await?;
            page.click(&self.selector).await
        }
        .await;

        match clicked {
            Ok(()) => {
                tokio::time::sleep(self.settle).await;
                ActionResult::ok(format!("Successfully clicked {} button", self.description))
            }
            Err(e) => ActionResult::fail(format!("Failed to click {}: {e}", self.description)),
        }
    }
}

/// Ordered set of actions the agent may call by name.
#[derive(Default, Clone)]
pub struct ActionRegistry {
    actions: Vec<Arc<dyn CustomAction>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action; a later action with the same name replaces the
    /// earlier one.
    pub fn register(mut self, action: impl CustomAction + 'static) -> Self {
        self.actions.retain(|a| a.name() != action.name());
        self.actions.push(Arc::new(action));
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub async fn invoke(&self, name: &str, page: &mut dyn PageHandle) -> ActionResult {
        match self.actions.iter().find(|a| a.name() == name) {
            Some(action) => action.invoke(page).await,
            None => ActionResult::fail(format!("Unknown action: {name}")),
        }
    }
}

/// Actions used by every login-gated scenario.
pub fn login_actions(provider: Arc<dyn SecretProvider>) -> ActionRegistry {
    ActionRegistry::new()
        .register(SecureInputAction::email(provider.clone()))
        .register(SecureInputAction::password(provider))
        .register(WaitAction::default())
        .register(ClickSelectorAction::model_selector())
}
