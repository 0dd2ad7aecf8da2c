// API handlers for the web server

use super::{
    SharedImageDirs,
    assets::{ensure_dir, resolve_filename},
    error::{ApiError, MissingParam},
    image_codec::{ImageEncoding, resize_image_file},
    models::{ResizeParams, ResizeQuery},
};
use axum::{
    body::Body,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use uuid::Uuid;

// --- GET / ---
// 302 Found, not the 303 that `Redirect::to` produces
pub async fn root() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/api")]).into_response()
}

// --- GET /api ---
pub async fn home() -> &'static str {
    "Home route"
}

// --- GET /api/images?filename=NAME&width=W&height=H ---
// Resizes full/NAME.* into thumb/ and returns the resized file
pub async fn resize_image(
    State(dirs): State<SharedImageDirs>,
    query: Result<Query<ResizeQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|rejection| {
        debug!("Unparseable query string: {}", rejection);
        ApiError::MissingParameter(MissingParam::Filename)
    })?;
    let params = ResizeParams::try_from(query)?;

    let request_id = Uuid::new_v4();
    info!(
        "Resize request: filename={}, size={:?}, request_id={}",
        params.filename, params.size, request_id
    );

    ensure_dir(&dirs.source).await?;
    ensure_dir(&dirs.destination).await?;

    // A missing file and an unknown extension end up in the same place.
    let source_name = resolve_filename(&params.filename, &dirs.source).await?;
    let encoding = source_name
        .as_deref()
        .map_or(ImageEncoding::Unsupported, ImageEncoding::from_path);
    let source_name = match (source_name, encoding) {
        (Some(name), enc) if enc != ImageEncoding::Unsupported => name,
        _ => return Err(ApiError::ImageNotFound(params.filename)),
    };

    let source = dirs.source.join(&source_name);
    let destination = dirs.destination.join(&source_name);
    resize_image_file(source, destination.clone(), params.size, encoding).await?;

    debug!(
        "Resized image written to {}, request_id={}",
        destination.display(),
        request_id
    );

    send_image(&destination, encoding).await
}

/// Streams a resized file back to the client.
///
/// The file is opened before the response starts, so a vanished file is a
/// single error response; nothing is sent twice.
async fn send_image(path: &Path, encoding: ImageEncoding) -> Result<Response, ApiError> {
    let file = tokio::fs::File::open(path).await.map_err(ApiError::Send)?;
    let length = file.metadata().await.map_err(ApiError::Send)?.len();

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (header::CONTENT_TYPE, encoding.content_type().to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
        ],
        body,
    )
        .into_response())
}
