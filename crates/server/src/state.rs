use std::sync::Arc;

use beeb_core::{
    Activities, BroadcastBus, Config, DownloadPhase, DownloadWorkflow, LocalScheduler,
    SanitizedConfig,
};

use crate::runs::RunRegistry;

/// Shared application state
pub struct AppState {
    config: Config,
    bus: BroadcastBus,
    scheduler: LocalScheduler,
    workflow: DownloadWorkflow<LocalScheduler>,
    runs: RunRegistry,
}

impl AppState {
    /// Wires the download workflow so that every phase change lands in the
    /// run registry.
    pub fn new(
        config: Config,
        bus: BroadcastBus,
        scheduler: LocalScheduler,
        activities: Arc<Activities>,
    ) -> Self {
        let runs = RunRegistry::from_config(&config.workflow);
        let observed = runs.clone();
        let workflow = DownloadWorkflow::new(
            scheduler.clone(),
            activities,
            config.workflow.clone(),
        )
        .with_observer(Arc::new(move |workflow_id: &str, phase: DownloadPhase| {
            observed.set_phase(workflow_id, phase);
        }));

        Self {
            config,
            bus,
            scheduler,
            workflow,
            runs,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn bus(&self) -> &BroadcastBus {
        &self.bus
    }

    pub fn scheduler(&self) -> &LocalScheduler {
        &self.scheduler
    }

    pub fn workflow(&self) -> &DownloadWorkflow<LocalScheduler> {
        &self.workflow
    }

    pub fn runs(&self) -> &RunRegistry {
        &self.runs
    }
}
