//! Workflow phases and results.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::activities::UploadResult;

/// Phases of a top-level download run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadPhase {
    Fetching,
    FanningOut,
    Aggregating,
    Succeeded,
    Failed,
}

impl DownloadPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::FanningOut => "fanning_out",
            Self::Aggregating => "aggregating",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DownloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phases of a per-file parse run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePhase {
    NamingPending,
    Publishing,
    Done,
    Failed,
}

impl ParsePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NamingPending => "naming_pending",
            Self::Publishing => "publishing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ParsePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback receiving `(workflow_id, phase)` on every phase change.
pub type PhaseObserver<P> = Arc<dyn Fn(&str, P) + Send + Sync>;

/// Successful outcome of a download run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub programme_id: String,
    pub workflow_id: String,
    /// One entry per fetched file, in file order.
    pub uploads: Vec<UploadResult>,
}

/// Id of the child that handles the file at `index`.
pub fn child_workflow_id(parent_id: &str, index: usize) -> String {
    format!("{}_parse_{}", parent_id, index)
}
