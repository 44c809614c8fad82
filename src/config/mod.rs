//! CLI-side configuration helpers.

mod duration;

pub use duration::parse_duration;
