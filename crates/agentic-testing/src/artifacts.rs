//! Per-test artifacts written for postmortem inspection: the agent's
//! conversation transcript and the full interaction history.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use maple_e2e_core::E2eResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{AgentOutcome, ConversationMessage};

pub const CONVERSATION_FILE: &str = "conversation.json";
pub const HISTORY_FILE: &str = "test_history.json";

/// History record of one attempt, as written to `test_history.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub run_id: Uuid,
    pub test_name: String,
    pub attempt: u32,
    pub done: bool,
    pub final_result: Option<String>,
    pub error: Option<String>,
    pub history: Vec<serde_json::Value>,
    pub recorded_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn from_outcome(test_name: &str, attempt: u32, outcome: &AgentOutcome) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            test_name: test_name.to_string(),
            attempt,
            done: outcome.done,
            final_result: outcome.final_result.clone(),
            error: None,
            history: outcome.history.clone(),
            recorded_at: Utc::now(),
        }
    }

    pub fn from_error(test_name: &str, attempt: u32, error: impl ToString) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            test_name: test_name.to_string(),
            attempt,
            done: false,
            final_result: None,
            error: Some(error.to_string()),
            history: Vec::new(),
            recorded_at: Utc::now(),
        }
    }
}

/// The log directory owned by one test, `<logs_dir>/<test_name>/`.
#[derive(Debug, Clone)]
pub struct TestArtifacts {
    dir: PathBuf,
}

impl TestArtifacts {
    pub fn new(logs_dir: &Path, test_name: &str) -> Self {
        Self {
            dir: logs_dir.join(test_name),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn conversation_path(&self) -> PathBuf {
        self.dir.join(CONVERSATION_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    /// Write both files, replacing those of any earlier attempt.
    pub async fn save(
        &self,
        conversation: &[ConversationMessage],
        record: &AttemptRecord,
    ) -> E2eResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(
            self.conversation_path(),
            serde_json::to_vec_pretty(conversation)?,
        )
        .await?;
        tokio::fs::write(self.history_path(), serde_json::to_vec_pretty(record)?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_writes_both_files() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = TestArtifacts::new(tmp.path(), "model_selector");

        let mut outcome = AgentOutcome::completed(r#"{"test_case_passed": true}"#);
        outcome
            .conversation
            .push(ConversationMessage::new("assistant", "done"));
        let record = AttemptRecord::from_outcome("model_selector", 2, &outcome);

        artifacts.save(&outcome.conversation, &record).await.unwrap();

        let conversation: Vec<ConversationMessage> =
            serde_json::from_slice(&std::fs::read(artifacts.conversation_path()).unwrap())
                .unwrap();
        assert_eq!(conversation.len(), 1);

        let history: AttemptRecord =
            serde_json::from_slice(&std::fs::read(artifacts.history_path()).unwrap()).unwrap();
        assert_eq!(history.attempt, 2);
        assert!(history.done);
        assert!(artifacts.dir().ends_with("model_selector"));
    }

    #[tokio::test]
    async fn test_error_record() {
        let tmp = tempfile::tempdir().unwrap();
        let artifacts = TestArtifacts::new(tmp.path(), "crashy");
        let record = AttemptRecord::from_error("crashy", 1, "browser crashed");

        artifacts.save(&[], &record).await.unwrap();

        let history: AttemptRecord =
            serde_json::from_slice(&std::fs::read(artifacts.history_path()).unwrap()).unwrap();
        assert_eq!(history.error.as_deref(), Some("browser crashed"));
        assert!(!history.done);
    }
}
