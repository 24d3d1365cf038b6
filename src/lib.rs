//! pixcache - Resized image cache for camera snapshots.
//!
//! This crate turns a source image plus transform parameters into an encoded
//! thumbnail, memoizing results on disk and recomputing them when the source
//! changes.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing use cases and DTOs.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing codec, cache and configuration adapters.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "pixcache";
