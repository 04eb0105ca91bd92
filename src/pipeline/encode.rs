//! Image encoding: preprocessed JPEG bytes → base64 `ImageData`.
//!
//! Oracle vision APIs accept images as base64 data embedded in the JSON
//! request body. The preprocessor has already normalised everything to
//! bounded RGB JPEG, so this stage is a pure wrap. `detail: "high"`
//! instructs GPT-4-class providers to use the full image tile budget;
//! without it the fine print on ID cards and registration papers is lost.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// Wrap preprocessed JPEG bytes for the oracle request body.
pub fn encode_image(jpeg: &[u8]) -> ImageData {
    let b64 = STANDARD.encode(jpeg);
    debug!("encoded image → {} bytes base64", b64.len());
    ImageData::new(b64, "image/jpeg").with_detail("high")
}
