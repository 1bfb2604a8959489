//! Client for the programmes JSON API.
//!
//! One GET per lookup with a bounded timeout; no retries here, the caller's
//! retry policy decides.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::types::{ProgrammeMetadata, ProgrammeResponse};
use super::{CatalogueError, ProgrammeCatalogue};
use crate::config::CatalogueConfig;

/// HTTP catalogue client.
pub struct BbcCatalogue {
    client: Client,
    base_url: String,
}

impl BbcCatalogue {
    /// Create a new catalogue client.
    pub fn new(config: &CatalogueConfig) -> Result<Self, CatalogueError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn programme_url(&self, pid: &str) -> String {
        format!("{}/programmes/{}.json", self.base_url, pid)
    }
}

#[async_trait]
impl ProgrammeCatalogue for BbcCatalogue {
    async fn programme(&self, pid: &str) -> Result<ProgrammeMetadata, CatalogueError> {
        let url = self.programme_url(pid);
        debug!(url = %url, "Making call to catalogue API for programme name");

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(pid = %pid, status = status.as_u16(), "Unknown programme ID");
            return Err(CatalogueError::UnknownProgramme {
                pid: pid.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let parsed: ProgrammeResponse = serde_json::from_slice(&body).map_err(|e| {
            CatalogueError::Parse(format!("Failed to parse programme {}: {}", pid, e))
        })?;

        Ok(parsed.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::MediaType;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> BbcCatalogue {
        BbcCatalogue::new(&CatalogueConfig {
            base_url: format!("{}/", server.uri()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_programme_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/programmes/m0008bbc.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "programme": {
                    "position": 3,
                    "title": "Part Three",
                    "display_title": { "title": "In Our Time", "subtitle": "" },
                    "parent": { "programme": { "position": 1 } },
                    "media_type": "audio"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let metadata = client_for(&server).programme("m0008bbc").await.unwrap();
        assert_eq!(metadata.show_title, "In Our Time");
        assert_eq!(metadata.episode_number, 3);
        assert_eq!(metadata.series_number, 1);
        assert_eq!(metadata.media_type, MediaType::Audio);
    }

    #[tokio::test]
    async fn test_empty_parent_falls_back_to_no_series() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/programmes/m0008bbc.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "programme": {
                    "position": 4,
                    "title": "Part Four",
                    "display_title": { "title": "In Our Time" },
                    "parent": {}
                }
            })))
            .mount(&server)
            .await;

        let metadata = client_for(&server).programme("m0008bbc").await.unwrap();
        assert_eq!(metadata.episode_number, 4);
        assert_eq!(metadata.series_number, 0);
        assert_eq!(metadata.media_type, MediaType::Other);
    }

    #[tokio::test]
    async fn test_non_success_is_unknown_programme() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/programmes/b0000000.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).programme("b0000000").await.unwrap_err();
        assert!(matches!(
            err,
            CatalogueError::UnknownProgramme { status: 404, .. }
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/programmes/p0000001.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).programme("p0000001").await.unwrap_err();
        assert!(matches!(err, CatalogueError::Parse(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        let catalogue = BbcCatalogue::new(&CatalogueConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 1,
        })
        .unwrap();

        let err = catalogue.programme("m0008bbc").await.unwrap_err();
        assert!(matches!(err, CatalogueError::Http(_)));
        assert!(err.is_retryable());
    }
}
