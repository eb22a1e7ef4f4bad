use std::path::PathBuf;

use crate::document::DocumentKind;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("file is {}, the limit is {}", human_size(*.size), human_size(*.limit))]
    TooLarge { size: u64, limit: u64 },
    #[error("unsupported file type '{0}'")]
    UnsupportedType(String),
    #[error("{0} files can be viewed but not annotated; upload a PNG or JPEG image")]
    NotAnnotatable(DocumentKind),
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export: no image is loaded")]
    NoBackground,
    #[error("cannot allocate a {width}x{height} drawing surface")]
    Surface { width: u32, height: u32 },
    #[error("cannot build path for object {0}")]
    Path(u64),
    #[error("could not encode image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("could not write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn human_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KIB * KIB {
        format!("{:.1} MB", b / (KIB * KIB))
    } else if b >= KIB {
        format!("{:.1} KB", b / KIB)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_read_naturally() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn oversize_message_names_both_sizes() {
        let err = UploadError::TooLarge {
            size: 6 * 1024 * 1024,
            limit: 5 * 1024 * 1024,
        };
        assert_eq!(err.to_string(), "file is 6.0 MB, the limit is 5.0 MB");
    }
}
