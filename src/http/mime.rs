//! MIME type detection module
//!
//! Returns the corresponding Content-Type based on file extension. The same
//! table decides which request paths look like static asset requests.

/// Content-Type for anything not in the table
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn lookup(extension: &str) -> Option<&'static str> {
    let content_type = match extension {
        // Text
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "txt" | "md" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "csv" => "text/csv; charset=utf-8",

        // JavaScript/WASM
        "js" | "mjs" | "cjs" => "application/javascript",
        "json" | "map" => "application/json",
        "webmanifest" => "application/manifest+json",
        "wasm" => "application/wasm",

        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",

        // Video
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ogv" => "video/ogg",

        // Audio
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",

        // Fonts
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",

        // Documents
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",

        // Build artefacts that are served but have no better type
        "bin" | "dat" => DEFAULT_CONTENT_TYPE,

        _ => return None,
    };
    Some(content_type)
}

/// Get MIME Content-Type based on file extension (case-insensitive)
///
/// # Examples
/// ```
/// use spa_origin::http::mime::get_content_type;
/// assert_eq!(get_content_type(Some("html")), "text/html; charset=utf-8");
/// assert_eq!(get_content_type(Some("WOFF2")), "font/woff2");
/// assert_eq!(get_content_type(None), "application/octet-stream");
/// ```
pub fn get_content_type(extension: Option<&str>) -> &'static str {
    extension
        .and_then(|ext| lookup(&ext.to_ascii_lowercase()))
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

/// Whether the extension belongs to a recognized static asset type
pub fn is_known_extension(extension: &str) -> bool {
    lookup(&extension.to_ascii_lowercase()).is_some()
}
