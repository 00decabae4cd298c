use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Wraps an already base64-encoded payload as a `data:` URL.
pub fn from_base64(mime_type: Option<&str>, payload: &str) -> String {
    let mime = mime_type
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_IMAGE_MIME);
    format!("data:{};base64,{}", mime, payload.trim())
}

pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
    from_base64(Some(mime_type), &STANDARD.encode(bytes))
}

/// Splits a base64 `data:` URL into its MIME type and decoded bytes.
pub fn decode(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| anyhow!("Not a data URL"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| anyhow!("Data URL has no payload"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| anyhow!("Only base64 data URLs are supported"))?;
    let bytes = STANDARD
        .decode(payload)
        .context("Invalid base64 in data URL")?;
    Ok((mime.to_string(), bytes))
}

/// File extension for an image MIME type.
pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}
