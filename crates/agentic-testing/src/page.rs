//! The page surface that custom actions operate on.
//!
//! The harness never drives a browser itself. An agent framework lends a
//! [`PageHandle`] for the duration of a custom action invocation.

use std::collections::HashSet;

use async_trait::async_trait;
use maple_e2e_core::{E2eError, E2eResult};

/// Keyboard and element primitives available to custom actions.
#[async_trait]
pub trait PageHandle: Send {
    /// Press a key chord such as `Control+a`.
    async fn press(&mut self, key: &str) -> E2eResult<()>;

    /// Type text into the focused element.
    async fn type_text(&mut self, text: &str) -> E2eResult<()>;

    async fn wait_for_selector(&mut self, selector: &str, timeout_ms: u64) -> E2eResult<()>;

    async fn click(&mut self, selector: &str) -> E2eResult<()>;
}

/// A recorded page operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOp {
    Press(String),
    TypeText(String),
    WaitForSelector(String),
    Click(String),
}

/// In-memory page that records operations. Selectors listed as missing make
/// `wait_for_selector` and `click` fail.
#[derive(Debug, Default)]
pub struct MemoryPage {
    ops: Vec<PageOp>,
    missing: HashSet<String>,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing_selector(mut self, selector: impl Into<String>) -> Self {
        self.missing.insert(selector.into());
        self
    }

    pub fn ops(&self) -> &[PageOp] {
        &self.ops
    }

    /// Concatenation of everything typed so far.
    pub fn typed(&self) -> String {
        self.ops
            .iter()
            .filter_map(|op| match op {
                PageOp::TypeText(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    fn check(&self, selector: &str) -> E2eResult<()> {
        if self.missing.contains(selector) {
            Err(E2eError::Page(format!("selector {selector} not found")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PageHandle for MemoryPage {
    async fn press(&mut self, key: &str) -> E2eResult<()> {
        self.ops.push(PageOp::Press(key.to_string()));
        Ok(())
    }

    async fn type_text(&mut self, text: &str) -> E2eResult<()> {
        self.ops.push(PageOp::TypeText(text.to_string()));
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, _timeout_ms: u64) -> E2eResult<()> {
        self.check(selector)?;
        self.ops.push(PageOp::WaitForSelector(selector.to_string()));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> E2eResult<()> {
        self.check(selector)?;
        self.ops.push(PageOp::Click(selector.to_string()));
        Ok(())
    }
}
