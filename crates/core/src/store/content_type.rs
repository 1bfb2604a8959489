//! Content type detection from leading file bytes.

use std::path::Path;

use tokio::io::AsyncReadExt;

/// Number of leading bytes inspected when sniffing a file.
pub const SNIFF_LEN: usize = 512;

const OCTET_STREAM: &str = "application/octet-stream";

/// Detects a MIME type from the first bytes of a file.
///
/// Falls back to `application/octet-stream` when nothing matches.
pub fn detect_content_type(bytes: &[u8]) -> &'static str {
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return match &bytes[8..12] {
            b"M4A " | b"M4B " | b"M4P " => "audio/mp4",
            _ => "video/mp4",
        };
    }
    if bytes.starts_with(b"ID3") {
        return "audio/mpeg";
    }
    if bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0 {
        // ADTS AAC shares the frame sync; layer bits are zero
        return if bytes[1] & 0x06 == 0 {
            "audio/aac"
        } else {
            "audio/mpeg"
        };
    }
    if bytes.starts_with(b"fLaC") {
        return "audio/flac";
    }
    if bytes.starts_with(b"OggS") {
        return "audio/ogg";
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WAVE" {
        return "audio/wav";
    }
    if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return "video/x-matroska";
    }
    if bytes.len() > 188 && bytes[0] == 0x47 && bytes[188] == 0x47 {
        return "video/mp2t";
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        return "image/png";
    }
    if looks_like_text(bytes) {
        return "text/plain; charset=utf-8";
    }
    OCTET_STREAM
}

fn looks_like_text(bytes: &[u8]) -> bool {
    if bytes.contains(&0) {
        return false;
    }
    match std::str::from_utf8(bytes) {
        Ok(_) => true,
        // A multi-byte sequence cut off by the sniff window is still text
        Err(e) => e.error_len().is_none() && e.valid_up_to() + 4 > bytes.len(),
    }
}

/// Reads the head of `path` and detects its content type.
pub async fn detect_file_content_type(path: &Path) -> std::io::Result<&'static str> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = vec![0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(detect_content_type(&buf[..filled]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ftyp(brand: &[u8; 4]) -> Vec<u8> {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x20];
        bytes.extend_from_slice(b"ftyp");
        bytes.extend_from_slice(brand);
        bytes.extend_from_slice(&[0; 16]);
        bytes
    }

    #[test]
    fn test_detect_mp4_family() {
        assert_eq!(detect_content_type(&ftyp(b"isom")), "video/mp4");
        assert_eq!(detect_content_type(&ftyp(b"M4A ")), "audio/mp4");
    }

    #[test]
    fn test_detect_audio() {
        assert_eq!(detect_content_type(b"ID3\x04\x00\x00"), "audio/mpeg");
        assert_eq!(detect_content_type(&[0xFF, 0xFB, 0x90, 0x00]), "audio/mpeg");
        assert_eq!(detect_content_type(&[0xFF, 0xF1, 0x50, 0x80]), "audio/aac");
        assert_eq!(detect_content_type(b"fLaC\x00\x00\x00\x22"), "audio/flac");
        assert_eq!(detect_content_type(b"OggS\x00\x02"), "audio/ogg");
        assert_eq!(
            detect_content_type(b"RIFF\x24\x08\x00\x00WAVEfmt "),
            "audio/wav"
        );
    }

    #[test]
    fn test_detect_video_containers() {
        assert_eq!(
            detect_content_type(&[0x1A, 0x45, 0xDF, 0xA3, 0x01]),
            "video/x-matroska"
        );

        let mut ts = vec![0u8; 376];
        ts[0] = 0x47;
        ts[188] = 0x47;
        assert_eq!(detect_content_type(&ts), "video/mp2t");
    }

    #[test]
    fn test_detect_images() {
        assert_eq!(detect_content_type(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(
            detect_content_type(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            "image/png"
        );
    }

    #[test]
    fn test_detect_text_and_binary() {
        assert_eq!(
            detect_content_type(b"1\n00:00:01,000 --> 00:00:02,000\nHello\n"),
            "text/plain; charset=utf-8"
        );
        assert_eq!(
            detect_content_type(&[0x00, 0x01, 0x02, 0x03]),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_truncated_utf8_is_text() {
        let mut bytes = b"caf".to_vec();
        bytes.push(0xC3);
        assert_eq!(detect_content_type(&bytes), "text/plain; charset=utf-8");
    }

    #[tokio::test]
    async fn test_detect_file_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episode.mp4");
        tokio::fs::write(&path, ftyp(b"mp42")).await.unwrap();

        assert_eq!(detect_file_content_type(&path).await.unwrap(), "video/mp4");
        assert!(detect_file_content_type(&dir.path().join("missing"))
            .await
            .is_err());
    }
}
