use std::path::{Path, PathBuf};

use reqwest::multipart::Part;
use thiserror::Error;

/// Largest upload the input screen accepts.
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("failed to read photo {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported photo type {0:?}, expected JPG, PNG or WebP")]
    UnsupportedType(String),
    #[error("photo is {size} bytes, the limit is {max}")]
    TooLarge { size: usize, max: usize },
}

/// A single ingredient photo, ready to be sent to the detection endpoint.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    file_name: String,
    content_type: &'static str,
    bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).unwrap_or("application/octet-stream");
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Reads a photo from disk, applying the upload constraints of the input
    /// screen (JPG, PNG or WebP, at most [`MAX_PHOTO_BYTES`]).
    pub async fn from_path(path: &Path) -> Result<Self, PhotoError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        if content_type_for(&file_name).is_none() {
            return Err(PhotoError::UnsupportedType(file_name));
        }

        let bytes = tokio::fs::read(path).await.map_err(|source| PhotoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if bytes.len() > MAX_PHOTO_BYTES {
            return Err(PhotoError::TooLarge {
                size: bytes.len(),
                max: MAX_PHOTO_BYTES,
            });
        }

        Ok(Self::new(file_name, bytes))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_part(&self) -> Result<Part, reqwest::Error> {
        Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(self.content_type)
    }
}

fn content_type_for(file_name: &str) -> Option<&'static str> {
    let extension = Path::new(file_name)
        .extension()?
        .to_string_lossy()
        .to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
