//! Pipeline stages for document ingestion.
//!
//! Each submodule implements exactly one transformation step and talks to
//! the outside world only through a capability trait, so every stage can be
//! tested against in-memory fakes.
//!
//! ## Data Flow
//!
//! ```text
//! split ──▶ render ──▶ extract ──▶ normalize
//! (PdfModel) (RenderSurface) (Recognizer) (SpellEngine)
//!      └─ schedule ─┘
//! ```
//!
//! 1. [`split`]     one PDF → single-page PDFs with their geometry
//! 2. [`surface`]   rendering-surface traits and the scoped surface lifetime
//! 3. [`render`]    one page → one selected PNG (multi-round, largest wins)
//! 4. [`schedule`]  all pages of a document under a concurrency bound
//! 5. [`extract`]   image → raw text via the recognizer
//! 6. [`normalize`] dictionary pass, then digit/punctuation pass

pub mod extract;
pub mod normalize;
pub mod render;
pub mod schedule;
pub mod split;
pub mod surface;
