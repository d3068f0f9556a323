//! Base64 ingestion for JSON photo payloads.

use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;

use crate::buffer::{ContentType, ImageBuffer};
use crate::error::Result;

/// Standard alphabet with padding, tolerating non-zero trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Decode a base64 photo payload into an [`ImageBuffer`].
///
/// An optional data-URL prefix (`data:image/png;base64,`) is stripped by
/// dropping everything up to and including the first comma. ASCII whitespace
/// anywhere in the payload is ignored, so line-wrapped (MIME) base64 decodes.
/// The content type comes from the filename suffix only.
///
/// # Errors
///
/// Returns [`Error::InvalidEncoding`](crate::Error::InvalidEncoding) if the
/// remainder is not valid standard base64.
pub fn decode_base64(data: &str, filename: &str) -> Result<ImageBuffer> {
    let payload: String = strip_data_url(data)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = LENIENT.decode(payload)?;

    log::debug!("decoded {} base64 bytes for {filename}", bytes.len());

    Ok(ImageBuffer::new(
        bytes,
        filename,
        ContentType::from_filename(filename),
    ))
}

fn strip_data_url(data: &str) -> &str {
    match data.split_once(',') {
        Some((_, rest)) => rest,
        None => data,
    }
}
