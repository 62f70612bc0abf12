//! Recognizer backed by the `tesseract` command-line program.

use crate::config::{Language, LanguageCodes};
use crate::error::RecognitionError;
use crate::pipeline::extract::Recognizer;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Runs `tesseract <image> stdout -l <code>` and returns its stdout.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    program: PathBuf,
    codes: LanguageCodes,
}

impl TesseractRecognizer {
    pub fn new(program: impl Into<PathBuf>, codes: LanguageCodes) -> Self {
        Self {
            program: program.into(),
            codes,
        }
    }

    fn command(&self, image: &Path, language: Language) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(language.code(&self.codes))
            .kill_on_drop(true);
        cmd
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new("tesseract", LanguageCodes::default())
    }
}

#[async_trait]
impl Recognizer for TesseractRecognizer {
    async fn recognize(&self, image: &Path, language: Language) -> Result<String, RecognitionError> {
        debug!(
            "Running {} on {} ({})",
            self.program.display(),
            image.display(),
            language.code(&self.codes)
        );
        let output = self
            .command(image, language)
            .output()
            .await
            .map_err(RecognitionError::Spawn)?;

        if !output.status.success() {
            return Err(RecognitionError::Engine {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let recognizer = TesseractRecognizer::new(
            "/nonexistent/definitely-not-tesseract",
            LanguageCodes::default(),
        );
        let err = recognizer
            .recognize(Path::new("page-1.png"), Language::Primary)
            .await
            .unwrap_err();
        assert!(matches!(err, RecognitionError::Spawn(_)));
    }

    #[test]
    fn command_uses_language_code() {
        let recognizer = TesseractRecognizer::default();
        let cmd = recognizer.command(Path::new("scan.png"), Language::Secondary);
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["scan.png", "stdout", "-l", "deu"]);
    }
}
