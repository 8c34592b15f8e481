//! Agent runner seam — the external LLM-driven browser agent that interprets a
//! task and performs page actions, and the outcome it hands back.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use maple_e2e_core::{E2eError, E2eResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::actions::{ActionRegistry, ActionResult};
use crate::page::MemoryPage;

/// One invocation of the agent.
#[derive(Clone, Copy)]
pub struct AgentRequest<'a> {
    pub task: &'a str,
    pub max_steps: u32,
    pub actions: Option<&'a ActionRegistry>,
}

/// A message in the agent's conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// What the agent returns. The harness only reads the completion flag and
/// the final answer; transcript and history are persisted for postmortems.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub done: bool,
    pub final_result: Option<String>,
    pub conversation: Vec<ConversationMessage>,
    pub history: Vec<serde_json::Value>,
}

impl AgentOutcome {
    pub fn completed(final_result: impl Into<String>) -> Self {
        Self {
            done: true,
            final_result: Some(final_result.into()),
            ..Default::default()
        }
    }

    pub fn incomplete() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn final_result(&self) -> Option<&str> {
        self.final_result.as_deref()
    }
}

/// Drives an agent to completion or until its step budget runs out.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run(&self, request: AgentRequest<'_>) -> E2eResult<AgentOutcome>;
}

/// A canned agent turn for [`ScriptedAgentRunner`].
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    Answer {
        done: bool,
        final_result: Option<String>,
        invoke: Vec<String>,
    },
    Error(String),
}

impl ScriptedTurn {
    pub fn answer(text: impl Into<String>) -> Self {
        ScriptedTurn::Answer {
            done: true,
            final_result: Some(text.into()),
            invoke: Vec::new(),
        }
    }

    pub fn incomplete() -> Self {
        ScriptedTurn::Answer {
            done: false,
            final_result: None,
            invoke: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ScriptedTurn::Error(message.into())
    }

    /// Invoke the named actions, in order, before answering.
    pub fn invoking<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self {
            ScriptedTurn::Answer {
                done, final_result, ..
            } => ScriptedTurn::Answer {
                done,
                final_result,
                invoke: names.into_iter().map(Into::into).collect(),
            },
            err => err,
        }
    }
}

/// Replays queued turns instead of talking to a real agent. Once the queue
/// is drained the fallback turn, if any, repeats.
#[derive(Default)]
pub struct ScriptedAgentRunner {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    fallback: Option<ScriptedTurn>,
    tasks: Mutex<Vec<String>>,
    typed: Mutex<String>,
}

impl ScriptedAgentRunner {
    pub fn new(turns: impl IntoIterator<Item = ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn always(turn: ScriptedTurn) -> Self {
        Self {
            fallback: Some(turn),
            ..Default::default()
        }
    }

    /// Tasks received so far, one per run.
    pub fn tasks(&self) -> Vec<String> {
        self.tasks.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn runs(&self) -> usize {
        self.tasks.lock().map(|t| t.len()).unwrap_or_default()
    }

    /// Everything typed into pages by invoked actions.
    pub fn typed(&self) -> String {
        self.typed.lock().map(|t| t.clone()).unwrap_or_default()
    }

    fn next_turn(&self) -> Option<ScriptedTurn> {
        let queued = self.turns.lock().ok().and_then(|mut q| q.pop_front());
        queued.or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl AgentRunner for ScriptedAgentRunner {
    async fn run(&self, request: AgentRequest<'_>) -> E2eResult<AgentOutcome> {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(request.task.to_string());
        }

        let (done, final_result, invoke) = match self.next_turn() {
            Some(ScriptedTurn::Answer {
                done,
                final_result,
                invoke,
            }) => (done, final_result, invoke),
            Some(ScriptedTurn::Error(message)) => return Err(E2eError::Agent(message)),
            None => return Err(E2eError::Agent("no scripted turn left".into())),
        };

        let mut outcome = AgentOutcome {
            done,
            final_result,
            ..Default::default()
        };
        outcome
            .conversation
            .push(ConversationMessage::new("user", request.task));

        let mut page = MemoryPage::new();
        for name in invoke.iter().take(request.max_steps as usize) {
            let result = match request.actions {
                Some(registry) => registry.invoke(name, &mut page).await,
                None => ActionResult::fail(format!("Unknown action: {name}")),
            };
            info!(action = %name, success = result.success, "Scripted agent invoked action");
            outcome.history.push(serde_json::json!({
                "action": name,
                "result": result,
            }));
        }
        if let Ok(mut typed) = self.typed.lock() {
            typed.push_str(&page.typed());
        }

        if let Some(answer) = &outcome.final_result {
            outcome
                .conversation
                .push(ConversationMessage::new("assistant", answer.clone()));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{login_actions, INPUT_EMAIL_ACTION};
    use maple_e2e_core::secrets::TEST_EMAIL_VAR;
    use maple_e2e_core::StaticSecretProvider;
    use std::sync::Arc;

    fn request(task: &str) -> AgentRequest<'_> {
        AgentRequest {
            task,
            max_steps: 10,
            actions: None,
        }
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = AgentOutcome::completed("{}");
        assert!(outcome.is_done());
        assert_eq!(outcome.final_result(), Some("{}"));

        let outcome = AgentOutcome::incomplete();
        assert!(!outcome.is_done());
        assert_eq!(outcome.final_result(), None);
    }

    #[tokio::test]
    async fn test_scripted_runner_replays_in_order() {
        let runner = ScriptedAgentRunner::new([
            ScriptedTurn::error("browser crashed"),
            ScriptedTurn::answer("done"),
        ]);

        let err = runner.run(request("first")).await.unwrap_err();
        assert!(err.to_string().contains("browser crashed"));

        let outcome = runner.run(request("second")).await.unwrap();
        assert_eq!(outcome.final_result(), Some("done"));
        assert_eq!(outcome.conversation.len(), 2);

        assert!(runner.run(request("third")).await.is_err());
        assert_eq!(runner.tasks(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_scripted_runner_fallback_repeats() {
        let runner = ScriptedAgentRunner::always(ScriptedTurn::incomplete());
        for _ in 0..3 {
            let outcome = runner.run(request("task")).await.unwrap();
            assert!(!outcome.is_done());
        }
        assert_eq!(runner.runs(), 3);
    }

    #[tokio::test]
    async fn test_scripted_runner_invokes_actions() {
        let provider = Arc::new(StaticSecretProvider::new().with(TEST_EMAIL_VAR, "qa@maple.test"));
        let registry = login_actions(provider);
        let runner = ScriptedAgentRunner::new([
            ScriptedTurn::answer("ok").invoking([INPUT_EMAIL_ACTION])
        ]);

        let outcome = runner
            .run(AgentRequest {
                task: "log in",
                max_steps: 5,
                actions: Some(&registry),
            })
            .await
            .unwrap();

        assert_eq!(outcome.history.len(), 1);
        assert_eq!(outcome.history[0]["result"]["success"], true);
        assert_eq!(runner.typed(), "qa@maple.test");
        // The transcript only ever sees the action's redacted report.
        let transcript = serde_json::to_string(&outcome).unwrap();
        assert!(!transcript.contains("qa@maple.test"));
    }
}
