// Error types for the resize endpoint.
// Every failure ends the request with a single plain-text response.

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;
use tracing::{error, warn};

/// Query parameters whose absence ends a request early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingParam {
    Filename,
    WidthOrHeight,
}

/// API server error types
#[derive(Debug)]
pub enum ApiError {
    MissingParameter(MissingParam),
    InvalidDimension,
    FolderAccess(std::io::Error),
    ImageNotFound(String),
    Resize { file: String, details: String },
    Send(std::io::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        // No 5xx distinction: storage and codec failures are reported as
        // bad requests just like validation failures.
        StatusCode::BAD_REQUEST
    }

    pub fn message(&self) -> String {
        match self {
            Self::MissingParameter(MissingParam::Filename) => {
                "Please pass the required query params!".to_string()
            }
            Self::MissingParameter(MissingParam::WidthOrHeight) => {
                "Please pass width or height params!".to_string()
            }
            Self::InvalidDimension => "Enter valid values of width or height!".to_string(),
            Self::FolderAccess(_) => "Unable to access the images folder!".to_string(),
            Self::ImageNotFound(filename) => {
                format!("The specified image \"{}\" is not found!", filename)
            }
            Self::Resize { file, .. } => format!("Error while resizing image {}!", file),
            Self::Send(_) => "Error while sending the resized image!".to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FolderAccess(err) | Self::Send(err) => Some(err),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Causes stay in the log; the client only sees the fixed message.
        match &self {
            Self::FolderAccess(err) => error!("Image folder access failed: {}", err),
            Self::Resize { file, details } => error!("Resizing {} failed: {}", file, details),
            Self::Send(err) => error!("Sending resized image failed: {}", err),
            Self::ImageNotFound(filename) => warn!("No source image matches {:?}", filename),
            Self::MissingParameter(_) | Self::InvalidDimension => {}
        }

        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message(),
        )
            .into_response()
    }
}
