//! Data transfer objects.

mod render_dto;

pub use render_dto::{RenderRequest, RenderResponse};
