//! Process bridge — runs an external agent program and talks to it over
//! newline-delimited JSON on stdin/stdout.
//!
//! Harness to agent:
//! - `{"type":"task","task":..,"max_steps":..,"actions":[..],"headless":..}` once, first
//! - `{"type":"page","op":"press"|"type"|"wait_for_selector"|"click",..}` while an action runs
//! - `{"type":"action_result","id":..,"success":..,"extracted_content":..}` when it finishes
//!
//! Agent to harness:
//! - `{"type":"message","role":..,"content":..}` conversation entries
//! - `{"type":"step",..}` free-form history entries
//! - `{"type":"invoke","id":..,"action":..}` custom action calls
//! - `{"type":"done","is_done":..,"final_result":..}` terminal result
//!
//! Page commands are fire-and-forget; the agent reports page failures in
//! its own transcript. Secret values only ever travel in `page` commands.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use maple_e2e_core::{E2eError, E2eResult};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::actions::ActionResult;
use crate::agent::{AgentOutcome, AgentRequest, AgentRunner, ConversationMessage};
use crate::page::PageHandle;

const EXIT_GRACE: Duration = Duration::from_secs(5);

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum HostMessage<'a> {
    Task {
        task: &'a str,
        max_steps: u32,
        actions: Vec<String>,
        headless: bool,
    },
    Page {
        #[serde(flatten)]
        command: PageCommand<'a>,
    },
    ActionResult {
        id: u64,
        #[serde(flatten)]
        result: &'a ActionResult,
    },
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum PageCommand<'a> {
    Press { key: &'a str },
    Type { text: &'a str },
    WaitForSelector { selector: &'a str, timeout_ms: u64 },
    Click { selector: &'a str },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AgentEvent {
    Message {
        role: String,
        content: String,
    },
    Step {
        #[serde(flatten)]
        data: serde_json::Map<String, serde_json::Value>,
    },
    Invoke {
        id: u64,
        action: String,
    },
    Done {
        is_done: bool,
        #[serde(default)]
        final_result: Option<String>,
    },
}

async fn send<W>(writer: &mut W, message: &HostMessage<'_>) -> E2eResult<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Page handle that forwards operations to the agent process.
pub struct RemotePage<'a, W> {
    writer: &'a mut W,
}

impl<'a, W> RemotePage<'a, W> {
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W> PageHandle for RemotePage<'_, W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn press(&mut self, key: &str) -> E2eResult<()> {
        let command = PageCommand::Press { key };
        send(&mut *self.writer, &HostMessage::Page { command }).await
    }

    async fn type_text(&mut self, text: &str) -> E2eResult<()> {
        let command = PageCommand::Type { text };
        send(&mut *self.writer, &HostMessage::Page { command }).await
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout_ms: u64) -> E2eResult<()> {
        let command = PageCommand::WaitForSelector {
            selector,
            timeout_ms,
        };
        send(&mut *self.writer, &HostMessage::Page { command }).await
    }

    async fn click(&mut self, selector: &str) -> E2eResult<()> {
        let command = PageCommand::Click { selector };
        send(&mut *self.writer, &HostMessage::Page { command }).await
    }
}

/// Runs each task in a fresh agent process.
#[derive(Debug, Clone)]
pub struct ProcessAgentRunner {
    command: Vec<String>,
    headless: bool,
}

impl ProcessAgentRunner {
    pub fn new(command: Vec<String>, headless: bool) -> Self {
        Self { command, headless }
    }
}

#[async_trait]
impl AgentRunner for ProcessAgentRunner {
    async fn run(&self, request: AgentRequest<'_>) -> E2eResult<AgentOutcome> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| E2eError::Config("agent command is empty".into()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Agent(format!("failed to start {program}: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Agent("agent stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Agent("agent stdout unavailable".into()))?;
        let mut reader = BufReader::new(stdout);
        let mut line = Vec::new();

        let actions = request.actions.map(|a| a.names()).unwrap_or_default();
        send(
            &mut stdin,
            &HostMessage::Task {
                task: request.task,
                max_steps: request.max_steps,
                actions,
                headless: self.headless,
            },
        )
        .await?;
        info!(program = %program, max_steps = request.max_steps, "Agent process started");

        let mut outcome = AgentOutcome::default();
        outcome
            .conversation
            .push(ConversationMessage::new("user", request.task));

        let mut finished = false;
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            // Agent output is not guaranteed to be UTF-8.
            let event: AgentEvent = match serde_json::from_slice(&line) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Ignoring unparseable agent output line");
                    continue;
                }
            };

            match event {
                AgentEvent::Message { role, content } => {
                    outcome
                        .conversation
                        .push(ConversationMessage::new(role, content));
                }
                AgentEvent::Step { data } => {
                    outcome.history.push(serde_json::Value::Object(data));
                }
                AgentEvent::Invoke { id, action } => {
                    debug!(id, action = %action, "Agent invoked custom action");
                    let result = match request.actions {
                        Some(registry) => {
                            let mut page = RemotePage::new(&mut stdin);
                            registry.invoke(&action, &mut page).await
                        }
                        None => ActionResult::fail(format!("Unknown action: {action}")),
                    };
                    send(
                        &mut stdin,
                        &HostMessage::ActionResult {
                            id,
                            result: &result,
                        },
                    )
                    .await?;
                    outcome.history.push(serde_json::json!({
                        "action": action,
                        "result": result,
                    }));
                }
                AgentEvent::Done {
                    is_done,
                    final_result,
                } => {
                    outcome.done = is_done;
                    outcome.final_result = final_result;
                    finished = true;
                    break;
                }
            }
        }

        if !finished {
            warn!(program = %program, "Agent exited without a result");
        }
        if let Some(answer) = &outcome.final_result {
            outcome
                .conversation
                .push(ConversationMessage::new("assistant", answer.clone()));
        }

        drop(stdin);
        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) if !status.success() => {
                warn!(program = %program, status = %status, "Agent process exited unsuccessfully");
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(program = %program, error = %e, "Failed to reap agent process"),
            Err(_) => {
                warn!(program = %program, "Agent process did not exit, killing it");
                child.kill().await?;
            }
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

    fn sh(script: &str) -> ProcessAgentRunner {
        ProcessAgentRunner::new(vec!["sh".into(), "-c".into(), script.into()], true)
    }

    fn request(task: &str) -> AgentRequest<'_> {
        AgentRequest {
            task,
            max_steps: 10,
            actions: None,
        }
    }

    #[test]
    fn test_host_message_wire_format() {
        let page = HostMessage::Page {
            command: PageCommand::Press { key: "Control+a" },
        };
        assert_eq!(
            serde_json::to_string(&page).unwrap(),
            r#"{"type":"page","op":"press","key":"Control+a"}"#
        );

        let result = ActionResult::ok("Email entered securely");
        let reply = HostMessage::ActionResult {
            id: 7,
            result: &result,
        };
        assert_eq!(
            serde_json::to_string(&reply).unwrap(),
            r#"{"type":"action_result","id":7,"success":true,"extracted_content":"Email entered securely"}"#
        );
    }

    #[test]
    fn test_agent_event_parsing() {
        let event: AgentEvent =
            serde_json::from_str(r#"{"type":"step","n":3,"action":"click"}"#).unwrap();
        match event {
            AgentEvent::Step { data } => assert_eq!(data["n"], 3),
            other => panic!("unexpected event {other:?}"),
        }

        let event: AgentEvent = serde_json::from_str(r#"{"type":"done","is_done":false}"#).unwrap();
        assert!(matches!(
            event,
            AgentEvent::Done {
                is_done: false,
                final_result: None
            }
        ));
    }

    #[tokio::test]
    async fn test_runs_to_done() {
        let runner = sh(r#"read task
printf '%s\n' 'not json'
printf '%s\n' '{"type":"message","role":"assistant","content":"looking at the page"}'
printf '%s\n' '{"type":"step","n":1}'
printf '%s\n' '{"type":"done","is_done":true,"final_result":"{\"test_case_passed\": true}"}'"#);

        let outcome = runner.run(request("check the page")).await.unwrap();
        assert!(outcome.is_done());
        assert_eq!(outcome.final_result(), Some(r#"{"test_case_passed": true}"#));
        assert_eq!(outcome.history.len(), 1);
        // user task, agent message, final answer
        assert_eq!(outcome.conversation.len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_skipped() {
        let runner = sh(r#"read task
printf '\377\376 garbage\n'
printf '%s\n' '{"type":"done","is_done":true,"final_result":"{\"test_case_passed\": true}"}'"#);

        let outcome = runner.run(request("check the page")).await.unwrap();
        assert!(outcome.is_done());
        assert_eq!(outcome.final_result(), Some(r#"{"test_case_passed": true}"#));
    }

    #[tokio::test]
    async fn test_exit_without_done_is_incomplete() {
        let runner = sh("read task; exit 0");
        let outcome = runner.run(request("anything")).await.unwrap();
        assert!(!outcome.is_done());
        assert_eq!(outcome.final_result(), None);
    }

    #[tokio::test]
    async fn test_secure_action_over_bridge() {
        let provider = Arc::new(StaticSecretProvider::new().with(TEST_EMAIL_VAR, "qa@maple.test"));
        let registry = login_actions(provider);
        let runner = sh(r#"read task
case "$task" in *"Input the email for Maple login"*) offered=yes ;; *) offered=no ;; esac
echo '{"type":"invoke","id":1,"action":"Input the email for Maple login"}'
seen=no
while read line; do
  case "$line" in
    *'"op":"type"'*qa@maple.test*) seen=yes ;;
    *action_result*) break ;;
  esac
done
echo "{\"type\":\"done\",\"is_done\":true,\"final_result\":\"offered=$offered seen=$seen\"}""#);

        let outcome = runner
            .run(AgentRequest {
                task: "log in",
                max_steps: 10,
                actions: Some(&registry),
            })
            .await
            .unwrap();

        assert_eq!(outcome.final_result(), Some("offered=yes seen=yes"));
        assert_eq!(outcome.history[0]["action"], INPUT_EMAIL_ACTION);
        assert_eq!(outcome.history[0]["result"]["success"], true);
        let transcript = serde_json::to_string(&outcome).unwrap();
        assert!(!transcript.contains("qa@maple.test"));
    }

    #[tokio::test]
    async fn test_empty_command_is_config_error() {
        let runner = ProcessAgentRunner::new(Vec::new(), true);
        let err = runner.run(request("task")).await.unwrap_err();
        assert!(matches!(err, E2eError::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_program_is_agent_error() {
        let runner = ProcessAgentRunner::new(vec!["/nonexistent/maple-agent".into()], true);
        let err = runner.run(request("task")).await.unwrap_err();
        assert!(matches!(err, E2eError::Agent(_)));
    }
}
