// Request data models for the resize endpoint

use super::error::{ApiError, MissingParam};
use serde::Deserialize;

/// Raw query parameters of `GET /api/images`, as sent by the client.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ResizeQuery {
    pub filename: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

/// Requested output size. When only one axis is given the other one
/// follows the source aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSize {
    Exact { width: u32, height: u32 },
    Width(u32),
    Height(u32),
}

/// Validated resize request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeParams {
    /// Basename of the source image, without extension.
    pub filename: String,
    pub size: TargetSize,
}

impl TryFrom<ResizeQuery> for ResizeParams {
    type Error = ApiError;

    fn try_from(query: ResizeQuery) -> Result<Self, Self::Error> {
        let filename = non_empty(query.filename)
            .ok_or(ApiError::MissingParameter(MissingParam::Filename))?;

        let size = match (non_empty(query.width), non_empty(query.height)) {
            (None, None) => return Err(ApiError::MissingParameter(MissingParam::WidthOrHeight)),
            (Some(width), Some(height)) => TargetSize::Exact {
                width: parse_dimension(&width)?,
                height: parse_dimension(&height)?,
            },
            (Some(width), None) => TargetSize::Width(parse_dimension(&width)?),
            (None, Some(height)) => TargetSize::Height(parse_dimension(&height)?),
        };

        Ok(ResizeParams { filename, size })
    }
}

// `?filename` and `?filename=` carry an empty value, which counts as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Parses a width or height the lenient way browsers' `parseInt` does:
/// leading whitespace, an optional sign, then the leading run of digits.
/// Anything after the digits is ignored, so `"100px"` is 100.
pub fn parse_dimension(raw: &str) -> Result<u32, ApiError> {
    let trimmed = raw.trim_start();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_len = unsigned
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits_len == 0 {
        return Err(ApiError::InvalidDimension);
    }

    let value: u32 = unsigned[..digits_len]
        .parse()
        .map_err(|_| ApiError::InvalidDimension)?;

    if negative || value == 0 {
        return Err(ApiError::InvalidDimension);
    }

    Ok(value)
}
