//! Pipeline stages for image analysis and report generation.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ llm ──▶ layout ──▶ render
//! (path/URL) (payload)  (VLM)   (pages)    (pdfium)
//! ```
//!
//! 1. [`input`]  — collect the prompt and the uploaded image
//! 2. [`encode`] — wrap the raw image bytes for the model request
//! 3. [`llm`]    — the single model call; the only stage with network I/O
//!    besides URL downloads
//! 4. [`layout`] — pure pagination of the narrative into draw operations
//! 5. [`render`] — replay the layout onto a PDF; runs in `spawn_blocking`
//!    because pdfium is not async-safe

pub mod encode;
pub mod input;
pub mod layout;
pub mod llm;
pub mod render;
