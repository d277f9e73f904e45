use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

// An image ready to be attached to a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub data_uri: String,
    pub filename: Option<String>,
}

/// Reads an image file and encodes it as a `data:` URI.
pub async fn load_attachment(path: &Path) -> Result<ImageAttachment> {
    log::debug!("Loading image attachment: {}", path.display());
    let bytes = tokio::fs::read(path)
        .await
        .context(format!("Failed to read image file '{}'", path.display()))?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    Ok(ImageAttachment {
        data_uri: encode_data_uri(&bytes, &mime_for_path(path)),
        filename,
    })
}

pub fn encode_data_uri(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

pub fn mime_for_path(path: &Path) -> String {
    mime_guess::from_path(path).first_or_octet_stream().to_string()
}
