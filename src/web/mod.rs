// Web server module
// Serves the image resize endpoint and the small landing routes around it

mod app;
mod assets;
mod error;
mod handlers;
mod image_codec;
mod listeners;
mod models;

pub use app::create_app;
pub use assets::ImageDirs;
pub use listeners::create_listener;

use std::sync::Arc;

pub type SharedImageDirs = Arc<ImageDirs>;
