//! Canonical file naming from programme metadata.
//!
//! The resolved name is used verbatim as the destination object key, so it
//! must be a pure function of the metadata and the source file extension.

use std::path::Path;

use crate::catalogue::ProgrammeMetadata;

/// Strips every character that is not an ASCII letter, digit or space.
pub fn sanitize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect()
}

/// Zero-pads to at least two digits.
pub fn pad_number(n: u32) -> String {
    format!("{:02}", n)
}

/// Builds the target name for a programme file.
///
/// Position 0 for both series and episode means a standalone piece (a film,
/// a one-off), which is named after the episode title alone. Anything else is
/// named `"<show> - sSSeEE - <episode>"`.
pub fn target_name(metadata: &ProgrammeMetadata, extension: &str) -> String {
    let episode_title = sanitize(&metadata.episode_title);

    let mut name = if metadata.episode_number == 0 && metadata.series_number == 0 {
        episode_title
    } else {
        format!(
            "{} - s{}e{} - {}",
            sanitize(&metadata.show_title),
            pad_number(metadata.series_number),
            pad_number(metadata.episode_number),
            episode_title,
        )
    };

    name.push_str(extension);
    name
}

/// Returns the extension of `path` including its leading dot, or an empty string.
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}
