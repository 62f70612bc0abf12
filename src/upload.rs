//! Upload intake: turn stored files into validated [`UploadedFile`] records.
//!
//! The HTTP layer that receives multipart uploads is not part of this crate.
//! It stores each file somewhere on disk and hands us the path, the original
//! file name, the declared MIME type, and the form fields. Everything after
//! that is validated here, before the pipeline touches the file:
//!
//! * the file exists and is readable,
//! * MIME type **and** extension are on the allow-list
//!   (`jpeg|jpg|png|gif|pdf|docx`),
//! * the file is no larger than `max_upload_bytes`,
//! * the request carries no more than `max_files` files.
//!
//! File names are sanitised by replacing every whitespace run with `-`, and
//! each file's language comes from the `language_<index>` form field.

use crate::config::{IngestConfig, Language};
use crate::error::IngestError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// How the pipeline treats a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    /// Split into pages and rasterised before recognition.
    Pdf,
    /// Recognised directly.
    Image,
    /// Accepted and stored, but not recognised.
    WordProcessor,
}

impl FileKind {
    /// Classify a MIME type, or `None` if it is not accepted.
    pub fn from_mime(mime: &str) -> Option<FileKind> {
        match mime.trim().to_ascii_lowercase().as_str() {
            PDF_MIME => Some(FileKind::Pdf),
            "image/png" | "image/jpeg" | "image/jpg" | "image/gif" => Some(FileKind::Image),
            DOCX_MIME => Some(FileKind::WordProcessor),
            _ => None,
        }
    }
}

/// MIME type for an accepted file extension.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => Some(PDF_MIME),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "docx" => Some(DOCX_MIME),
        _ => None,
    }
}

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Replace every run of whitespace with a single `-`.
pub fn sanitize_file_name(name: &str) -> String {
    RE_WHITESPACE.replace_all(name, "-").into_owned()
}

/// Look up the `language_<index>` form field for the file at `index`.
pub fn language_tag(form: &HashMap<String, String>, index: usize) -> Option<&str> {
    form.get(&format!("language_{index}")).map(String::as_str)
}

/// A validated upload, owned by the orchestrator for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub original_name: String,
    pub sanitized_name: String,
    pub stored_path: PathBuf,
    pub mime_type: String,
    pub kind: FileKind,
    pub declared_language: Language,
}

impl UploadedFile {
    /// Validate a file the upload boundary has already stored.
    pub fn new(
        original_name: &str,
        stored_path: impl Into<PathBuf>,
        mime_type: &str,
        language: Option<&str>,
        config: &IngestConfig,
    ) -> Result<Self, IngestError> {
        let stored_path = stored_path.into();

        let unsupported = || IngestError::UnsupportedFileType {
            name: original_name.to_string(),
            mime: mime_type.to_string(),
        };
        let kind = FileKind::from_mime(mime_type).ok_or_else(unsupported)?;
        let ext_mime = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(mime_for_extension)
            .ok_or_else(unsupported)?;
        if FileKind::from_mime(ext_mime) != Some(kind) {
            return Err(unsupported());
        }

        check_readable(&stored_path, original_name, config.max_upload_bytes)?;

        let declared_language =
            Language::from_tag(language, &config.languages, config.default_language);
        let file = Self {
            original_name: original_name.to_string(),
            sanitized_name: sanitize_file_name(original_name),
            stored_path,
            mime_type: mime_type.to_string(),
            kind,
            declared_language,
        };
        debug!(
            "Accepted upload '{}' as {:?} ({:?})",
            file.sanitized_name, file.kind, file.declared_language
        );
        Ok(file)
    }

    /// Validate a local file, deriving its MIME type from the extension.
    pub fn from_path(
        path: impl AsRef<Path>,
        language: Option<&str>,
        config: &IngestConfig,
    ) -> Result<Self, IngestError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| IngestError::FileNotFound {
                path: path.to_path_buf(),
            })?;
        let mime = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(mime_for_extension)
            .ok_or_else(|| IngestError::UnsupportedFileType {
                name: name.clone(),
                mime: "unknown".to_string(),
            })?;
        Self::new(&name, path, mime, language, config)
    }
}

/// Validate a whole request: the file-count limit first, then every file.
///
/// `files` holds `(path, language tag)` pairs in upload order.
pub fn accept_paths<P: AsRef<Path>>(
    files: &[(P, Option<String>)],
    config: &IngestConfig,
) -> Result<Vec<UploadedFile>, IngestError> {
    if files.len() > config.max_files {
        return Err(IngestError::TooManyFiles {
            count: files.len(),
            limit: config.max_files,
        });
    }
    files
        .iter()
        .map(|(path, tag)| UploadedFile::from_path(path, tag.as_deref(), config))
        .collect()
}

fn check_readable(path: &Path, name: &str, limit: u64) -> Result<(), IngestError> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(IngestError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(IngestError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };
    if !meta.is_file() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    // Check read permission by attempting to open
    match std::fs::File::open(path) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(IngestError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(IngestError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    if meta.len() > limit {
        return Err(IngestError::FileTooLarge {
            name: name.to_string(),
            size: meta.len(),
            limit,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stored(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn sanitize_replaces_whitespace_runs() {
        assert_eq!(sanitize_file_name("my  scan\tfinal.pdf"), "my-scan-final.pdf");
        assert_eq!(sanitize_file_name("plain.png"), "plain.png");
    }

    #[test]
    fn language_tag_lookup() {
        let mut form = HashMap::new();
        form.insert("language_1".to_string(), "deu".to_string());
        assert_eq!(language_tag(&form, 0), None);
        assert_eq!(language_tag(&form, 1), Some("deu"));
    }

    #[test]
    fn accepts_pdf_with_default_language() {
        let dir = TempDir::new().unwrap();
        let path = stored(&dir, "report.pdf", b"%PDF-1.7");
        let file = UploadedFile::new(
            "quarterly report.pdf",
            &path,
            "application/pdf",
            None,
            &IngestConfig::default(),
        )
        .unwrap();
        assert_eq!(file.kind, FileKind::Pdf);
        assert_eq!(file.sanitized_name, "quarterly-report.pdf");
        assert_eq!(file.declared_language, Language::Primary);
    }

    #[test]
    fn rejects_mismatched_extension() {
        let dir = TempDir::new().unwrap();
        let path = stored(&dir, "x", b"data");
        let err = UploadedFile::new(
            "notes.txt",
            &path,
            "image/png",
            None,
            &IngestConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFileType { .. }));

        let err = UploadedFile::new(
            "scan.png",
            &path,
            "application/pdf",
            None,
            &IngestConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFileType { .. }));
    }

    #[test]
    fn rejects_missing_and_oversized_files() {
        let dir = TempDir::new().unwrap();
        let err = UploadedFile::from_path(
            dir.path().join("absent.png"),
            None,
            &IngestConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::FileNotFound { .. }));

        let path = stored(&dir, "big.png", &[0u8; 64]);
        let config = IngestConfig::builder().max_upload_bytes(16).build().unwrap();
        let err = UploadedFile::from_path(&path, None, &config).unwrap_err();
        assert!(matches!(err, IngestError::FileTooLarge { size: 64, .. }));
    }

    #[test]
    fn accept_paths_enforces_file_limit() {
        let dir = TempDir::new().unwrap();
        let a = stored(&dir, "a.png", b"a");
        let b = stored(&dir, "b.jpg", b"b");
        let config = IngestConfig::builder().max_files(1).build().unwrap();
        let files = vec![(a.clone(), None), (b.clone(), Some("deu".to_string()))];

        let err = accept_paths(&files, &config).unwrap_err();
        assert!(matches!(err, IngestError::TooManyFiles { count: 2, limit: 1 }));

        let accepted = accept_paths(&files, &IngestConfig::default()).unwrap();
        assert_eq!(accepted[1].declared_language, Language::Secondary);
        assert_eq!(accepted[1].mime_type, "image/jpeg");
    }
}
