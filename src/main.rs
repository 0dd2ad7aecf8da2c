// Main entry point for thumbd.
// Parses configuration, sets up logging, and serves the image resize API.

mod shutdown_signal;
mod web;

use clap::Parser;
use shutdown_signal::shutdown_signal;
use std::path::PathBuf;
use tracing::Level;
use web::ImageDirs;

/// Command line arguments for thumbd
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct AppConfig {
    /// Hostname/IP to bind the server to.
    /// If this option is specified without value, it will default to "*", meaning the server will listen on all interfaces.
    #[arg(long, env = "THUMBD_HOST", default_value = "localhost", num_args = 0..=1, default_missing_value = "*")]
    host: String,

    /// Port number to listen on.
    #[arg(short, long, env = "THUMBD_PORT", default_value_t = 3000)]
    port: u16,

    /// Asset root holding the `full` (originals) and `thumb` (resized) folders.
    #[arg(long, env = "THUMBD_ASSETS_DIR", default_value = "assets")]
    assets_dir: PathBuf,

    /// Folder with the original images. Defaults to `<assets-dir>/full`.
    #[arg(long, env = "THUMBD_FULL_DIR")]
    full_dir: Option<PathBuf>,

    /// Folder the resized images are written to. Defaults to `<assets-dir>/thumb`.
    #[arg(long, env = "THUMBD_THUMB_DIR")]
    thumb_dir: Option<PathBuf>,
}

impl AppConfig {
    fn image_dirs(&self) -> ImageDirs {
        let defaults = ImageDirs::under(&self.assets_dir);
        ImageDirs {
            source: self.full_dir.clone().unwrap_or(defaults.source),
            destination: self.thumb_dir.clone().unwrap_or(defaults.destination),
        }
    }
}

#[tokio::main]
async fn main() {
    let config = AppConfig::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting thumbd...");

    let dirs = config.image_dirs();
    tracing::info!("Source images: {}", dirs.source.display());
    tracing::info!("Resized images: {}", dirs.destination.display());

    let app = web::create_app(dirs);

    let listener = match web::create_listener(&config.host, config.port).await {
        Ok((addr, l)) => {
            tracing::info!("Server successfully bound. Listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("FATAL: Failed to bind server: {}", e);
            eprintln!("FATAL: Could not bind server. Error: {}. Exiting.", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server run error: {}", e);
        eprintln!("ERROR: Server shut down unexpectedly. Error: {}", e);
    }

    tracing::info!("thumbd has shut down.");
}
