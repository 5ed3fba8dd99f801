pub mod config;
pub mod duration;
pub mod image;
pub mod types;

pub use config::FnscaleConfig;
pub use duration::parse_duration;
pub use image::{DEFAULT_REGISTRY, ImageError, ImageReference};
pub use types::*;
