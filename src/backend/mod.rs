//! Concrete implementations of the pipeline's capability traits.
//!
//! | Capability | Implementation |
//! |------------|----------------|
//! | [`PdfModel`](crate::pipeline::split::PdfModel) | [`pdfium::PdfiumModel`] |
//! | [`SurfaceLauncher`](crate::pipeline::surface::SurfaceLauncher) | [`pdfium::PdfiumLauncher`] |
//! | [`Recognizer`](crate::pipeline::extract::Recognizer) | [`tesseract::TesseractRecognizer`] |
//! | [`SpellEngine`](crate::pipeline::normalize::SpellEngine) | [`dictionary::WordListDictionary`] |

pub mod dictionary;
pub mod pdfium;
pub mod tesseract;
