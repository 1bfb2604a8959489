//! Download orchestration.
//!
//! A [`DownloadWorkflow`] runs the fetch activity once, then starts one
//! [`ParseWorkflow`] child per fetched file (`<parent>_parse_<i>`) and waits
//! for all of them. The run succeeds only if every child does; the first
//! child failure cancels the others.

mod children;
mod download;
mod parse;
mod types;

pub use children::ChildSet;
pub use download::DownloadWorkflow;
pub use parse::ParseWorkflow;
pub use types::{child_workflow_id, AggregateResult, DownloadPhase, ParsePhase, PhaseObserver};
