//! Output format negotiation from a client's `Accept` header.

use crate::domain::entities::OutputFormat;

/// Media type whose presence opts a client into WebP.
const WEBP_MEDIA_TYPE: &str = "image/webp";

/// Picks the output format a client can display.
///
/// Plain substring check: no q-values, no wildcards. A missing header or one
/// without `image/webp` falls back to JPEG.
#[must_use]
pub fn pick_format(accept: Option<&str>) -> OutputFormat {
    match accept {
        Some(accept) if accept.contains(WEBP_MEDIA_TYPE) => OutputFormat::Webp,
        _ => OutputFormat::Jpeg,
    }
}
