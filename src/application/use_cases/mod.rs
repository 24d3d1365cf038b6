//! Use case implementations.

mod render_image_use_case;

pub use render_image_use_case::RenderImageUseCase;
