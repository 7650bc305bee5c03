use crate::models::MediaKind;
use std::path::Path;

/// Sniff a MIME type from leading magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x25, 0x50, 0x44, 0x46, ..] => Some("application/pdf"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x41, 0x56, 0x45, ..] => Some("audio/wav"),
        [_, _, _, _, 0x66, 0x74, 0x79, 0x70, b'q', b't', b' ', b' ', ..] => Some("video/quicktime"),
        [_, _, _, _, 0x66, 0x74, 0x79, 0x70, b'M', b'4', b'A', b' ', ..] => Some("audio/mp4"),
        [_, _, _, _, 0x66, 0x74, 0x79, 0x70, ..] => Some("video/mp4"),
        [0x1A, 0x45, 0xDF, 0xA3, ..] => Some("video/webm"),
        [0x49, 0x44, 0x33, ..] | [0xFF, 0xFB, ..] | [0xFF, 0xF3, ..] | [0xFF, 0xF2, ..] => {
            Some("audio/mpeg")
        }
        [0x4F, 0x67, 0x67, 0x53, ..] => Some("audio/ogg"),
        [0x66, 0x4C, 0x61, 0x43, ..] => Some("audio/flac"),
        _ => None,
    }
}

/// Guess a MIME type from a file name's extension.
pub fn mime_from_extension(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();

    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "mpeg" | "mpg" => "video/mpeg",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        _ => return None,
    };
    Some(mime)
}

/// Resolve the MIME type for an upload: magic bytes, then extension, then
/// the media kind's default.
pub fn detect_mime(bytes: &[u8], file_name: &str, kind: MediaKind) -> &'static str {
    if let Some(mime) = sniff_mime(bytes).or_else(|| mime_from_extension(file_name)) {
        return mime;
    }

    tracing::warn!(
        "Unrecognized format for {} (first 4 bytes: {:02X?}), falling back to {}",
        file_name,
        &bytes[..bytes.len().min(4)],
        kind.default_mime()
    );
    kind.default_mime()
}
