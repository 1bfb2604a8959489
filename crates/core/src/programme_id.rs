//! Programme identifier (PID) extraction from iPlayer / Sounds URLs.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::Url;
use thiserror::Error;

const PID_PATTERN: &str = "[a-z0-9]{7,}";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PidError {
    #[error("Cannot parse as URL: {0}")]
    InvalidUrl(String),

    #[error("Cannot extract the programme ID from {0}")]
    NoProgrammeId(String),

    #[error("Not a valid programme ID: {0}")]
    InvalidPid(String),
}

/// Where a matcher looks for the PID.
enum Source {
    Path,
    SeriesIdParam,
}

struct Matcher {
    regex: Regex,
    source: Source,
}

// Order is important: the first matcher whose input matches wins.
static MATCHERS: Lazy<Vec<Matcher>> = Lazy::new(|| {
    let build = |pattern: String, source: Source| Matcher {
        regex: Regex::new(&pattern).expect("static PID pattern"),
        source,
    };
    vec![
        build(
            format!(r"^{PID_PATTERN}-[\w]+-\d-({PID_PATTERN})"),
            Source::SeriesIdParam,
        ),
        build(format!("^/sounds/play/({PID_PATTERN})"), Source::Path),
        build(format!("^/programmes/({PID_PATTERN})"), Source::Path),
        build(format!("^/iplayer/episode/({PID_PATTERN})"), Source::Path),
    ]
});

static PID_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{PID_PATTERN}$")).expect("static PID pattern"));

/// Returns true if `candidate` looks like a bare PID.
pub fn is_valid_pid(candidate: &str) -> bool {
    PID_ONLY.is_match(candidate)
}

/// Validates a bare PID.
pub fn validate_pid(candidate: &str) -> Result<&str, PidError> {
    if is_valid_pid(candidate) {
        Ok(candidate)
    } else {
        Err(PidError::InvalidPid(candidate.to_string()))
    }
}

/// Extracts the PID from an iPlayer or Sounds URL.
pub fn parse_programme_url(input: &str) -> Result<String, PidError> {
    let url = Url::parse(input).map_err(|_| PidError::InvalidUrl(input.to_string()))?;

    let series_id = url
        .query_pairs()
        .find(|(key, _)| key == "seriesId")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();

    for matcher in MATCHERS.iter() {
        let haystack = match matcher.source {
            Source::Path => url.path(),
            Source::SeriesIdParam => series_id.as_str(),
        };
        if let Some(pid) = matcher.regex.captures(haystack).and_then(|c| c.get(1)) {
            return Ok(pid.as_str().to_string());
        }
    }

    Err(PidError::NoProgrammeId(input.to_string()))
}
