//! Agent-driven end-to-end testing for the Maple web app.
//!
//! Scenarios are handed to an external LLM browser agent as natural-language
//! tasks; the agent's final answer carries a JSON verdict that decides
//! pass/fail.
//!
//! # Modules
//! - `actions` — Named custom actions the agent may invoke, incl. secure credential input
//! - `agent` — The agent runner seam and its outcome type
//! - `artifacts` — Per-test transcript and history files
//! - `orchestrator` — Sequential suite execution with bounded retries
//! - `page` — The page surface custom actions operate on
//! - `process` — Runner that drives an external agent process over stdio
//! - `reporter` — Suite summary artifact and text report
//! - `scenario` — Task composition and the built-in scenarios
//! - `test_case` — One scenario run end to end
//! - `verdict` — JSON verdict extraction from free-text answers

pub mod actions;
pub mod agent;
pub mod artifacts;
pub mod orchestrator;
pub mod page;
pub mod process;
pub mod reporter;
pub mod scenario;
pub mod test_case;
pub mod verdict;

pub use agent::{AgentOutcome, AgentRequest, AgentRunner};
pub use orchestrator::{RetryPolicy, SuiteOrchestrator, SuiteReport};
pub use test_case::{AgentTestCase, TestCase, TestStatus};
pub use verdict::{parse_verdict, Verdict};
