//! File extension to content-type mapping.
use std::collections::HashMap;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

const BUILTIN: &[(&str, &str)] = &[
    ("css", "text/css"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("xml", "text/xml"),
    ("java", "text/x-java-source"),
    ("md", "text/plain"),
    ("txt", "text/plain"),
    ("asc", "text/plain"),
    ("gif", "image/gif"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("mp3", "audio/mpeg"),
    ("m3u", "audio/mpeg-url"),
    ("mp4", "video/mp4"),
    ("ogv", "video/ogg"),
    ("flv", "video/x-flv"),
    ("mov", "video/quicktime"),
    ("swf", "application/x-shockwave-flash"),
    ("js", "application/javascript"),
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    ("ogg", "application/x-ogg"),
    ("zip", "application/octet-stream"),
    ("exe", "application/octet-stream"),
    ("class", "application/octet-stream"),
    ("m3u8", "application/vnd.apple.mpegurl"),
    ("ts", "video/mp2t"),
];

/// Read-only extension table, built once when the handler is configured.
///
/// Lookup order: this table, then the `mime_guess` database, then
/// `application/octet-stream`.
#[derive(Debug, Clone)]
pub struct MimeTypes {
    table: HashMap<String, String>,
}

impl Default for MimeTypes {
    fn default() -> Self {
        MimeTypes {
            table: BUILTIN
                .iter()
                .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
                .collect(),
        }
    }
}

impl MimeTypes {
    /// The builtin table.
    pub fn new() -> MimeTypes {
        MimeTypes::default()
    }

    /// Add or replace a mapping. The extension is matched case-insensitively.
    pub fn with(mut self, ext: &str, mime: impl Into<String>) -> MimeTypes {
        self.table
            .insert(ext.trim_start_matches('.').to_ascii_lowercase(), mime.into());
        self
    }

    /// Content-type for a file name.
    pub fn lookup(&self, name: &str) -> String {
        let ext = match name.rfind('.') {
            Some(idx) => name[idx + 1..].to_ascii_lowercase(),
            None => return DEFAULT_MIME_TYPE.to_string(),
        };
        if let Some(mime) = self.table.get(&ext) {
            return mime.clone();
        }
        mime_guess::from_ext(&ext)
            .first_raw()
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string()
    }
}
