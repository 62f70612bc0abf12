//! Configuration types for document ingestion.
//!
//! All pipeline behaviour is controlled through [`IngestConfig`], built via
//! its [`IngestConfigBuilder`]. Every tunable that used to differ between
//! copies of the pipeline (concurrency limit, samples per page, settle delay,
//! output scale, page margin) lives here, so one parameterised pipeline
//! covers all of them.

use crate::error::IngestError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Configuration for one ingestion pipeline.
///
/// Built via [`IngestConfig::builder()`] or using [`IngestConfig::default()`].
///
/// # Example
/// ```rust
/// use docingest::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .concurrency(4)
///     .sample_count(3)
///     .scale_factor(3.0)
///     .build()
///     .unwrap();
/// assert_eq!(config.sample_count, 3);
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// Maximum number of pages rendered at once per document. Default: 7.
    ///
    /// Each in-flight render holds one surface context plus a full-page
    /// bitmap in memory. Raise it on machines with many cores, lower it when
    /// rendering very large pages.
    pub concurrency: usize,

    /// Render rounds per page; the largest PNG wins. Default: 1.
    ///
    /// With more than one round, every candidate except the largest is
    /// deleted. A larger PNG usually means more painted detail, so this
    /// filters out renders captured before the surface finished painting.
    pub sample_count: usize,

    /// Wait between the surface reporting idle and the capture. Default: 300 ms.
    pub settle_delay_ms: u64,

    /// Output pixels per PDF point. Range: 1.0–7.0. Default: 2.0.
    ///
    /// A US-letter page (612 × 792 pt) at 2× is 1224 × 1584 px, enough for
    /// OCR of body text. Higher factors help with fine print at a steep cost
    /// in render time and PNG size.
    pub scale_factor: f32,

    /// Points subtracted from each page's width and height before rendering.
    /// Default: 0.0.
    pub page_margin: f32,

    /// Timeout for each individual surface step. Default: 30 s.
    pub render_timeout_secs: u64,

    /// What to do with the document when a page cannot be rendered.
    pub page_failure_policy: PageFailurePolicy,

    /// How the digit-aware correction pass applies replacements.
    pub replacement_mode: ReplacementMode,

    /// Language assumed when an upload carries no language tag.
    pub default_language: Language,

    /// Locale codes for the two supported languages.
    pub languages: LanguageCodes,

    /// Maximum concurrent recognition calls. Default: 1.
    pub recognition_concurrency: usize,

    /// Largest accepted upload in bytes. Default: 10 MiB.
    pub max_upload_bytes: u64,

    /// Largest accepted number of files per request. Default: 10.
    pub max_files: usize,

    /// Report processing failures as server errors instead of client errors.
    /// Default: false.
    pub processing_errors_are_server_errors: bool,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: 7,
            sample_count: 1,
            settle_delay_ms: 300,
            scale_factor: 2.0,
            page_margin: 0.0,
            render_timeout_secs: 30,
            page_failure_policy: PageFailurePolicy::default(),
            replacement_mode: ReplacementMode::default(),
            default_language: Language::default(),
            languages: LanguageCodes::default(),
            recognition_concurrency: 1,
            max_upload_bytes: 10 * 1024 * 1024,
            max_files: 10,
            processing_errors_are_server_errors: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("concurrency", &self.concurrency)
            .field("sample_count", &self.sample_count)
            .field("settle_delay_ms", &self.settle_delay_ms)
            .field("scale_factor", &self.scale_factor)
            .field("page_margin", &self.page_margin)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("page_failure_policy", &self.page_failure_policy)
            .field("replacement_mode", &self.replacement_mode)
            .field("default_language", &self.default_language)
            .field("languages", &self.languages)
            .field("recognition_concurrency", &self.recognition_concurrency)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn IngestProgressCallback>"),
            )
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn sample_count(mut self, n: usize) -> Self {
        self.config.sample_count = n;
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.settle_delay_ms = ms;
        self
    }

    pub fn scale_factor(mut self, scale: f32) -> Self {
        self.config.scale_factor = scale.clamp(1.0, 7.0);
        self
    }

    pub fn page_margin(mut self, points: f32) -> Self {
        self.config.page_margin = points.max(0.0);
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn page_failure_policy(mut self, policy: PageFailurePolicy) -> Self {
        self.config.page_failure_policy = policy;
        self
    }

    pub fn replacement_mode(mut self, mode: ReplacementMode) -> Self {
        self.config.replacement_mode = mode;
        self
    }

    pub fn default_language(mut self, language: Language) -> Self {
        self.config.default_language = language;
        self
    }

    pub fn languages(mut self, codes: LanguageCodes) -> Self {
        self.config.languages = codes;
        self
    }

    pub fn recognition_concurrency(mut self, n: usize) -> Self {
        self.config.recognition_concurrency = n;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn max_files(mut self, n: usize) -> Self {
        self.config.max_files = n;
        self
    }

    pub fn processing_errors_are_server_errors(mut self, v: bool) -> Self {
        self.config.processing_errors_are_server_errors = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(IngestError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.sample_count == 0 {
            return Err(IngestError::InvalidConfig(
                "Sample count must be ≥ 1".into(),
            ));
        }
        if c.recognition_concurrency == 0 {
            return Err(IngestError::InvalidConfig(
                "Recognition concurrency must be ≥ 1".into(),
            ));
        }
        if !(1.0..=7.0).contains(&c.scale_factor) {
            return Err(IngestError::InvalidConfig(format!(
                "Scale factor must be 1.0–7.0, got {}",
                c.scale_factor
            )));
        }
        if c.render_timeout_secs == 0 {
            return Err(IngestError::InvalidConfig(
                "Render timeout must be at least one second".into(),
            ));
        }
        if c.languages.primary.trim().is_empty() || c.languages.secondary.trim().is_empty() {
            return Err(IngestError::InvalidConfig(
                "Language codes must not be empty".into(),
            ));
        }
        if c.languages.primary == c.languages.secondary {
            return Err(IngestError::InvalidConfig(format!(
                "Primary and secondary language codes are both '{}'",
                c.languages.primary
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The two languages the recognition and dictionary engines are set up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// The primary locale (English by default).
    #[default]
    Primary,
    /// The secondary locale (German by default).
    Secondary,
}

impl Language {
    /// Resolve a caller-supplied tag.
    ///
    /// A missing or blank tag yields `default`. Any tag other than the
    /// primary code selects the secondary language, which is what the
    /// recognition engine falls back to.
    pub fn from_tag(tag: Option<&str>, codes: &LanguageCodes, default: Language) -> Language {
        match tag.map(str::trim) {
            None | Some("") => default,
            Some(t) if t.eq_ignore_ascii_case(&codes.primary) => Language::Primary,
            Some(t) => {
                if !t.eq_ignore_ascii_case(&codes.secondary) {
                    tracing::warn!(
                        "Unknown language tag '{}', using secondary language '{}'",
                        t,
                        codes.secondary
                    );
                }
                Language::Secondary
            }
        }
    }

    /// The locale code for this language.
    pub fn code<'a>(&self, codes: &'a LanguageCodes) -> &'a str {
        match self {
            Language::Primary => &codes.primary,
            Language::Secondary => &codes.secondary,
        }
    }
}

/// Locale codes handed to the recognition engine and echoed in responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageCodes {
    pub primary: String,
    pub secondary: String,
}

impl Default for LanguageCodes {
    fn default() -> Self {
        Self {
            primary: "eng".to_string(),
            secondary: "deu".to_string(),
        }
    }
}

/// What happens to a document when one of its pages fails to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageFailurePolicy {
    /// Record the page as unresolved and keep the other pages. (default)
    #[default]
    Continue,
    /// Fail the whole document once all pages have settled.
    Abort,
}

/// How the digit-aware pass writes a correction back into the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReplacementMode {
    /// Replace the first textual occurrence of the flagged token. (default)
    ///
    /// If an identical token appears earlier in the text, that earlier one is
    /// replaced instead of the flagged one.
    #[default]
    FirstOccurrence,
    /// Replace exactly the flagged token, by its position.
    TokenPosition,
}
