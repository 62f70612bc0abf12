//! End-to-end tests against the real backends (pdfium + tesseract).
//!
//! These tests use real files in `./test_cases/` and need a pdfium library
//! plus a `tesseract` binary with the `eng` and `deu` language packs. They
//! are gated behind the `E2E_ENABLED` environment variable so they do not
//! run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture
//!
//! Optional dictionaries are picked up from `test_cases/dict/en_US.dic` and
//! `test_cases/dict/de_DE.dic`; without them correction is a no-op.

use docingest::backend::dictionary::WordListDictionary;
use docingest::backend::pdfium::{locate_pdfium, pdfium_backends};
use docingest::backend::tesseract::TesseractRecognizer;
use docingest::{Engines, IngestConfig, Ingestor, IngestionResponse};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn dictionary(name: &str) -> WordListDictionary {
    let path = test_cases_dir().join("dict").join(name);
    WordListDictionary::from_path(&path).unwrap_or_else(|_| {
        println!("no dictionary at {}, correction disabled", path.display());
        WordListDictionary::from_words(Vec::<String>::new())
    })
}

fn ingestor(config: IngestConfig) -> Ingestor {
    let (pdf, surface) = pdfium_backends(locate_pdfium().expect("pdfium library should bind"));
    let engines = Engines {
        pdf,
        surface,
        recognizer: Arc::new(TesseractRecognizer::new(
            "tesseract",
            config.languages.clone(),
        )),
        primary_dictionary: Arc::new(dictionary("en_US.dic")),
        secondary_dictionary: Arc::new(dictionary("de_DE.dic")),
    };
    Ingestor::new(config, engines)
}

/// Copy `source` into a scratch dir so the `<stem>_images` output lands there.
fn stage(source: &Path) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::TempDir::new().unwrap();
    let target = dir.path().join(source.file_name().unwrap());
    std::fs::copy(source, &target).unwrap();
    (dir, target)
}

fn assert_success(response: &IngestionResponse, files: usize) {
    assert_eq!(response.status_code, 200, "response: {response:?}");
    assert_eq!(response.files.len(), files);
    assert!(response.error.is_none());
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pdf_pages_are_rendered_and_recognised() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample_text.pdf"));
    let (_dir, staged) = stage(&path);

    let ingestor = ingestor(IngestConfig::builder().concurrency(3).build().unwrap());
    let result = ingestor.ingest_paths(&[(staged.clone(), None)]).await;
    let response = ingestor.respond(&result);
    assert_success(&response, 1);

    let report = result.unwrap();
    let images = report.files[0].images.as_ref().expect("PDF should list images");
    assert!(!images.is_empty());
    for (i, image) in images.iter().enumerate() {
        assert_eq!(image.page_index, i + 1);
        let decoded = image::open(&image.path).expect("page image should be a valid PNG");
        assert!(decoded.width() > 0 && decoded.height() > 0);
    }
    assert_eq!(report.texts.len(), images.len());
    assert!(
        report.texts.iter().any(|t| !t.corrected_text.trim().is_empty()),
        "expected some recognised text"
    );
    println!("{}", serde_json::to_string_pretty(&response).unwrap());
}

#[tokio::test]
async fn test_multi_sample_keeps_one_image_per_page() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample_text.pdf"));
    let (_dir, staged) = stage(&path);

    let config = IngestConfig::builder().sample_count(3).build().unwrap();
    let ingestor = ingestor(config);
    let render = ingestor
        .scheduler()
        .render_all(&staged, "sample_text.pdf")
        .await
        .expect("render should succeed");

    let mut names: Vec<String> = std::fs::read_dir(&render.output_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    let mut expected: Vec<String> = (1..=render.pages.len())
        .map(|n| format!("page-{n}.png"))
        .collect();
    expected.sort();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn test_german_image_uses_secondary_language() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("german_scan.png"));

    let ingestor = ingestor(IngestConfig::default());
    let result = ingestor
        .ingest_paths(&[(path, Some("deu".to_string()))])
        .await;
    let response = ingestor.respond(&result);
    assert_success(&response, 1);
    assert_eq!(response.files[0].language, "deu");
    assert!(response.files[0].images.is_none());
}

#[tokio::test]
async fn test_not_a_pdf_is_rejected() {
    let _ = e2e_skip_unless_ready!(test_cases_dir());
    let dir = tempfile::TempDir::new().unwrap();
    let bogus = dir.path().join("bogus.pdf");
    std::fs::write(&bogus, b"this is plain text").unwrap();

    let ingestor = ingestor(IngestConfig::default());
    let result = ingestor.ingest_paths(&[(bogus, None)]).await;
    assert!(matches!(
        result,
        Err(docingest::IngestError::MalformedDocument { .. })
    ));
    assert!(!dir.path().join("bogus_images").exists());
}
