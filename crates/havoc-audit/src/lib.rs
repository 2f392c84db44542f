//! Structured audit report for a chaos run.
//!
//! Every phase of the pipeline (ready check, system load, scenario
//! execution) records its outcome and the outcome of its hooks into a
//! [`Reporter`] tree, which serializes to a single JSON document. Field
//! order is the struct declaration order, so serialized output is stable
//! enough for golden-file comparison.

use std::io::Write;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while writing a report.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

/// Success or failure of a recorded step. `Unset` is the zero value for
/// slots that were never written (e.g. a hook that was not configured).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "Success")]
    Success,
    #[serde(rename = "Failure")]
    Failure,
    #[default]
    #[serde(rename = "")]
    Unset,
}

/// A single result entry in the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub result: Outcome,
    pub message: String,
}

impl Message {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            result: Outcome::Success,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            result: Outcome::Failure,
            message: message.into(),
        }
    }
}

/// Report of the ready phase and its hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyPhase {
    pub pre_ready: Message,
    pub post_ready: Message,
    #[serde(flatten)]
    pub message: Message,
}

/// Report of the system load phase and its hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadPhase {
    pub pre_load: Message,
    pub post_load: Message,
    #[serde(flatten)]
    pub message: Message,
}

/// One executed chaos scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    /// Canonical multi-line rendering of the identifiers that were killed.
    pub identifiers: String,
    #[serde(flatten)]
    pub message: Message,
}

/// Report of the chaos testing phase: hooks plus one record per scenario,
/// in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenariosPhase {
    pub pre_chaos_tests: Message,
    pub post_chaos_tests: Message,
    pub scenarios: Vec<ScenarioRecord>,
}

/// The complete report of a chaos run. Append-only within a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reporter {
    pub ready: ReadyPhase,
    pub load: LoadPhase,
    pub scenarios: ScenariosPhase,
    pub miscellaneous: Vec<Message>,
}

impl Reporter {
    /// Writes the JSON representation of the report into `writer`.
    pub fn report<W: Write>(&self, mut writer: W) -> Result<(), ReportError> {
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}
