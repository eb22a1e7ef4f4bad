use image::{DynamicImage, ImageFormat};
use std::fmt;
use std::path::Path;

use crate::error::UploadError;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// File kinds recognised at the upload boundary, from the declared MIME
/// type or the file extension. Content is never sniffed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Png,
    Jpeg,
    Pdf,
    Word,
    Excel,
    OutlookMessage,
}

impl DocumentKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        let kind = match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => DocumentKind::Png,
            "image/jpeg" | "image/jpg" => DocumentKind::Jpeg,
            "application/pdf" => DocumentKind::Pdf,
            "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                DocumentKind::Word
            }
            "application/vnd.ms-excel"
            | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                DocumentKind::Excel
            }
            "application/vnd.ms-outlook" => DocumentKind::OutlookMessage,
            _ => return None,
        };
        Some(kind)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let kind = match ext.to_ascii_lowercase().as_str() {
            "png" => DocumentKind::Png,
            "jpg" | "jpeg" => DocumentKind::Jpeg,
            "pdf" => DocumentKind::Pdf,
            "doc" | "docx" => DocumentKind::Word,
            "xls" | "xlsx" => DocumentKind::Excel,
            "msg" => DocumentKind::OutlookMessage,
            _ => return None,
        };
        Some(kind)
    }

    pub fn mime(self) -> &'static str {
        match self {
            DocumentKind::Png => "image/png",
            DocumentKind::Jpeg => "image/jpeg",
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Word => "application/msword",
            DocumentKind::Excel => "application/vnd.ms-excel",
            DocumentKind::OutlookMessage => "application/vnd.ms-outlook",
        }
    }

    /// `Some` for the kinds the annotation canvas can use as a background.
    pub fn image_format(self) -> Option<ImageFormat> {
        match self {
            DocumentKind::Png => Some(ImageFormat::Png),
            DocumentKind::Jpeg => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }

    pub fn is_image(self) -> bool {
        self.image_format().is_some()
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DocumentKind::Png => "PNG",
            DocumentKind::Jpeg => "JPEG",
            DocumentKind::Pdf => "PDF",
            DocumentKind::Word => "Word",
            DocumentKind::Excel => "Excel",
            DocumentKind::OutlookMessage => "Outlook message",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: Option<u64>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: Some(DEFAULT_MAX_UPLOAD_BYTES),
        }
    }
}

impl UploadPolicy {
    fn check_size(&self, size: u64) -> Result<(), UploadError> {
        match self.max_bytes {
            Some(limit) if size > limit => Err(UploadError::TooLarge { size, limit }),
            _ => Ok(()),
        }
    }
}

/// The user-supplied file. Immutable once accepted.
#[derive(Clone, Debug)]
pub struct SourceDocument {
    name: String,
    kind: DocumentKind,
    bytes: Vec<u8>,
}

impl SourceDocument {
    /// Accept an uploaded file for annotation. The declared MIME type wins
    /// over the extension when both are present.
    pub fn from_bytes(
        name: impl Into<String>,
        declared_mime: Option<&str>,
        bytes: Vec<u8>,
        policy: &UploadPolicy,
    ) -> Result<Self, UploadError> {
        let name = name.into();
        policy.check_size(bytes.len() as u64)?;

        let kind = classify(&name, declared_mime)?;
        if !kind.is_image() {
            log::info!("rejecting {name}: {kind} is view-only");
            return Err(UploadError::NotAnnotatable(kind));
        }
        Ok(Self { name, kind, bytes })
    }

    pub fn open(path: &Path, policy: &UploadPolicy) -> Result<Self, UploadError> {
        let io_err = |source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let meta = std::fs::metadata(path).map_err(io_err)?;
        policy.check_size(meta.len())?;
        let bytes = std::fs::read(path).map_err(io_err)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();
        Self::from_bytes(name, None, bytes, policy)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    /// Extension as uploaded, falling back to the canonical one.
    pub fn extension(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && DocumentKind::from_extension(ext).is_some() => ext,
            _ => match self.kind {
                DocumentKind::Jpeg => "jpg",
                _ => "png",
            },
        }
    }

    pub fn decode(&self) -> Result<DynamicImage, UploadError> {
        let format = self
            .kind
            .image_format()
            .ok_or(UploadError::NotAnnotatable(self.kind))?;
        Ok(image::load_from_memory_with_format(&self.bytes, format)?)
    }
}

fn classify(name: &str, declared_mime: Option<&str>) -> Result<DocumentKind, UploadError> {
    if let Some(kind) = declared_mime.and_then(DocumentKind::from_mime) {
        return Ok(kind);
    }
    let ext = Path::new(name).extension().and_then(|e| e.to_str());
    ext.and_then(DocumentKind::from_extension).ok_or_else(|| {
        let label = declared_mime
            .filter(|m| !m.is_empty())
            .or(ext)
            .unwrap_or(name);
        UploadError::UnsupportedType(label.to_string())
    })
}
