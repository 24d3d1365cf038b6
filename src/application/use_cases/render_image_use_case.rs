//! Render image use case implementation.

use tracing::{debug, info};

use crate::application::dto::{RenderRequest, RenderResponse};
use crate::domain::entities::{FormatPreference, OptionOverrides};
use crate::domain::errors::TransformResult;
use crate::domain::services::pick_format;
use crate::infrastructure::image::ImageTransformer;

/// Turns a validated client request into image bytes.
#[derive(Debug, Clone)]
pub struct RenderImageUseCase {
    transformer: ImageTransformer,
}

impl RenderImageUseCase {
    /// Creates new render use case.
    #[must_use]
    pub const fn new(transformer: ImageTransformer) -> Self {
        Self { transformer }
    }

    /// Applies the format preference to the request's overrides.
    #[must_use]
    pub fn effective_overrides(request: &RenderRequest) -> OptionOverrides {
        let mut overrides = request.overrides;
        overrides.format = match &request.format {
            FormatPreference::Default => overrides.format,
            FormatPreference::Explicit(format) => Some(*format),
            FormatPreference::Negotiate(accept) => Some(pick_format(accept.as_deref())),
        };
        overrides
    }

    /// Executes the render.
    ///
    /// # Errors
    /// Returns error if the source cannot be read or transcoded.
    pub async fn execute(&self, request: RenderRequest) -> TransformResult<RenderResponse> {
        let overrides = Self::effective_overrides(&request);
        debug!(source = %request.source.display(), stream = request.stream, "Rendering image");

        if request.stream {
            let stream = self
                .transformer
                .open_transformed_stream(&request.source, &overrides)
                .await?;
            return Ok(RenderResponse::Streamed(stream));
        }

        let image = self
            .transformer
            .get_transformed(&request.source, &overrides)
            .await?;

        info!(
            source = %request.source.display(),
            origin = %image.source,
            content_type = image.content_type,
            size = image.bytes.len(),
            "Rendered image"
        );

        Ok(RenderResponse::Buffered(image))
    }
}
