//! Domain services.

mod format_negotiation;

pub use format_negotiation::pick_format;
