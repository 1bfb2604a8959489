//! Metadata activity: resolves the target name of one file.

use tracing::{debug, info};

use super::types::{FileTask, ProgrammeName};
use super::{Activities, MetadataError};
use crate::engine::ActivityContext;
use crate::metrics;
use crate::naming;

impl Activities {
    /// Looks up the programme and builds the file's target name.
    pub async fn generate_programme_name(
        &self,
        ctx: &ActivityContext,
        task: &FileTask,
        parent_id: &str,
    ) -> Result<ProgrammeName, MetadataError> {
        debug!(
            workflow_id = %ctx.workflow_id(),
            parent = %parent_id,
            pid = %task.programme_id,
            "Looking up programme name"
        );

        let metadata = match self.catalogue.programme(&task.programme_id).await {
            Ok(metadata) => {
                metrics::CATALOGUE_LOOKUPS.with_label_values(&["found"]).inc();
                metadata
            }
            Err(e) => {
                let label = if e.is_retryable() { "error" } else { "unknown" };
                metrics::CATALOGUE_LOOKUPS.with_label_values(&[label]).inc();
                return Err(e.into());
            }
        };

        let extension = naming::file_extension(&task.source_file);
        let name = naming::target_name(&metadata, &extension);

        info!(
            workflow_id = %ctx.workflow_id(),
            pid = %task.programme_id,
            name = %name,
            "Resolved programme name"
        );

        Ok(ProgrammeName { name, metadata })
    }
}
