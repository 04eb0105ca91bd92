//! Pipeline stages for document analysis.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. switch the sanitiser rules) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preprocess ──▶ encode ──▶ oracle ──▶ sanitize ──▶ validate ──▶ merge
//! (ref)     (RGB/resize)   (base64)   (VLM)      (JSON slice)  (conform)    (document)
//! ```
//!
//! 1. [`input`]      — resolve a page's image reference (path or URL) to bytes
//! 2. [`preprocess`] — normalise colour mode and bound size/dimensions
//! 3. [`encode`]     — base64-wrap the JPEG for the multimodal request body
//! 4. oracle         — [`crate::oracle`]; the only stage with network I/O
//! 5. [`sanitize`]   — isolate the JSON payload in the raw oracle text
//! 6. [`validate`]   — conform one page's JSON to the extraction schema
//! 7. [`merge`]      — combine per-page records into one document record

pub mod encode;
pub mod input;
pub mod merge;
pub mod preprocess;
pub mod sanitize;
pub mod validate;
