//! Types for programme metadata and the catalogue API wire format.

use serde::{Deserialize, Serialize};

/// Broad media classification of a programme.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Audio,
    #[default]
    Other,
}

impl MediaType {
    /// Maps the catalogue's free-text `media_type` onto the two kinds we branch on.
    pub fn from_catalogue(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("audio") => Self::Audio,
            _ => Self::Other,
        }
    }
}

/// Metadata needed to name one programme file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgrammeMetadata {
    /// Episode title (`programme.title`).
    pub episode_title: String,
    /// Show title (`programme.display_title.title`).
    pub show_title: String,
    /// Position within the series, 0 when not part of one.
    pub episode_number: u32,
    /// Position of the parent series, 0 when there is no parent.
    pub series_number: u32,
    pub media_type: MediaType,
}

// ============================================================================
// Catalogue API wire types
// ============================================================================

/// Top-level body of `GET /programmes/<pid>.json`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProgrammeResponse {
    pub programme: ProgrammeBody,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProgrammeBody {
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub display_title: DisplayTitle,
    #[serde(default)]
    pub parent: Option<ParentLink>,
    #[serde(default)]
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DisplayTitle {
    #[serde(default)]
    pub title: String,
    #[allow(dead_code)]
    #[serde(default)]
    pub subtitle: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ParentLink {
    #[serde(default)]
    pub programme: ParentProgramme,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ParentProgramme {
    #[serde(default)]
    pub position: Option<u32>,
}

impl From<ProgrammeResponse> for ProgrammeMetadata {
    fn from(response: ProgrammeResponse) -> Self {
        let programme = response.programme;
        Self {
            episode_title: programme.title,
            show_title: programme.display_title.title,
            episode_number: programme.position.unwrap_or(0),
            series_number: programme
                .parent
                .and_then(|p| p.programme.position)
                .unwrap_or(0),
            media_type: MediaType::from_catalogue(programme.media_type.as_deref()),
        }
    }
}
