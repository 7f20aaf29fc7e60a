//! File metadata helpers

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Guess a mime type from the file extension. Unknown extensions map to
/// `application/octet-stream`; the storage backend does not rely on it.
pub fn guess_mime_type(filename: &str) -> &'static str {
    let extension = match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => return DEFAULT_MIME_TYPE,
    };

    match extension.as_str() {
        // Video
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "ogv" => "video/ogg",
        // Images
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        // Subtitles and captions
        "vtt" => "text/vtt",
        "srt" => "application/x-subrip",
        // Documents
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "odp" => "application/vnd.oasis.opendocument.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "zip" => "application/zip",
        // Audio
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        _ => DEFAULT_MIME_TYPE,
    }
}

/// Compact human-readable size, e.g. `1Gb`, `500Mb`, `1.5Kb`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [(&str, u64); 4] = [
        ("Tb", 1 << 40),
        ("Gb", 1 << 30),
        ("Mb", 1 << 20),
        ("Kb", 1 << 10),
    ];

    for (unit, factor) in UNITS {
        if bytes >= factor {
            let value = bytes as f64 / factor as f64;
            let rounded = (value * 10.0).round() / 10.0;
            return if rounded.fract() == 0.0 {
                format!("{}{}", rounded as u64, unit)
            } else {
                format!("{:.1}{}", rounded, unit)
            };
        }
    }
    format!("{}b", bytes)
}
