//! Mock programme catalogue for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalogue::{CatalogueError, ProgrammeCatalogue, ProgrammeMetadata};

/// Mock implementation of the ProgrammeCatalogue trait.
///
/// Unregistered PIDs answer like the real API does for an unknown
/// programme: `UnknownProgramme` with status 404.
#[derive(Debug, Default)]
pub struct MockCatalogue {
    programmes: Arc<RwLock<HashMap<String, ProgrammeMetadata>>>,
    lookups: Arc<RwLock<Vec<String>>>,
    next_error: Arc<RwLock<Option<CatalogueError>>>,
}

impl MockCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalogue that knows one programme.
    pub fn with_programme(pid: &str, metadata: ProgrammeMetadata) -> Self {
        let mut programmes = HashMap::new();
        programmes.insert(pid.to_string(), metadata);
        Self {
            programmes: Arc::new(RwLock::new(programmes)),
            ..Self::default()
        }
    }

    pub async fn add_programme(&self, pid: &str, metadata: ProgrammeMetadata) {
        self.programmes
            .write()
            .await
            .insert(pid.to_string(), metadata);
    }

    /// PIDs looked up so far, in order.
    pub async fn recorded_lookups(&self) -> Vec<String> {
        self.lookups.read().await.clone()
    }

    /// Configure the next lookup to fail with the given error.
    pub async fn set_next_error(&self, error: CatalogueError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl ProgrammeCatalogue for MockCatalogue {
    async fn programme(&self, pid: &str) -> Result<ProgrammeMetadata, CatalogueError> {
        self.lookups.write().await.push(pid.to_string());

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        self.programmes
            .read()
            .await
            .get(pid)
            .cloned()
            .ok_or_else(|| CatalogueError::UnknownProgramme {
                pid: pid.to_string(),
                status: 404,
            })
    }
}
