use crate::error::{Error, Result};
use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Response, StatusCode};
use http_body_util::Empty;

/// Builds a `301 Moved Permanently` response pointing at `location`.
///
/// # Errors
///
/// Returns [`Error::InvalidLocation`] when `location` is empty or cannot be
/// sent as a header value.
pub fn permanent_redirect(location: &str) -> Result<Response<Empty<Bytes>>> {
    let location = location_value(location)?;

    let mut response = Response::new(Empty::new());
    *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
    response.headers_mut().insert(header::LOCATION, location);
    Ok(response)
}

/// Validates `location` as a `Location` header value.
pub fn location_value(location: &str) -> Result<HeaderValue> {
    if location.trim().is_empty() {
        return Err(Error::InvalidLocation(location.to_owned()));
    }
    HeaderValue::from_str(location).map_err(|_| Error::InvalidLocation(location.to_owned()))
}
