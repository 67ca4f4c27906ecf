//! Media source resolution.
//!
//! Adapters prefer inline bytes, decode `data:` URLs to inline bytes, and otherwise pass
//! the URL through as a remote reference. A malformed `data:` URL is treated as an opaque
//! remote reference instead of failing the request.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use gateway_core::MediaSource;

/// Media in the form an adapter can emit
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResolvedMedia<'a> {
    /// Bytes to send inline
    Inline { data: Vec<u8>, mime_type: String },
    /// URL the vendor fetches itself
    Remote {
        url: &'a str,
        mime_type: Option<&'a str>,
    },
    /// Vendor-side file reference
    File {
        file_id: &'a str,
        mime_type: Option<&'a str>,
    },
}

impl ResolvedMedia<'_> {
    /// Inline payload as base64, with its MIME type
    pub(crate) fn inline_base64(&self) -> Option<(String, &str)> {
        match self {
            Self::Inline { data, mime_type } => Some((encode_base64(data), mime_type.as_str())),
            _ => None,
        }
    }
}

/// Resolve a media source using the three-way fallback
pub(crate) fn resolve(source: &MediaSource) -> ResolvedMedia<'_> {
    match source {
        MediaSource::Bytes { data, mime_type } => ResolvedMedia::Inline {
            data: data.clone(),
            mime_type: mime_type.clone(),
        },
        MediaSource::Url { url, mime_type } => match parse_data_url(url) {
            Some((mime_type, data)) => ResolvedMedia::Inline { data, mime_type },
            None => ResolvedMedia::Remote {
                url,
                mime_type: mime_type.as_deref(),
            },
        },
        MediaSource::File { file_id, mime_type } => ResolvedMedia::File {
            file_id,
            mime_type: mime_type.as_deref(),
        },
    }
}

/// Decode `data:<mime>;base64,<payload>` into MIME type and bytes
pub(crate) fn parse_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?;
    if mime_type.is_empty() || !mime_type.contains('/') {
        return None;
    }
    let data = STANDARD.decode(payload.trim()).ok()?;
    Some((mime_type.to_string(), data))
}

/// Standard base64 with padding
pub(crate) fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encode bytes as a `data:` URL
pub(crate) fn to_data_url(mime_type: &str, data: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(data))
}

/// Best-effort MIME type from a URL's file extension
pub(crate) fn guess_mime_type(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "mp4" => "video/mp4",
        _ => return None,
    };
    Some(mime)
}
