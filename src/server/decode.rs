//! Request body decoding.

use crate::error::{Error, ErrorKind, Result};
use serde::de::DeserializeOwned;
use serde_json::error::Category;

pub const EMPTY_BODY_MESSAGE: &str = "Request Body cannot be empty";
pub const MALFORMED_JSON_MESSAGE: &str = "Malformed JSON";

/// Decode a JSON request body, classifying every failure as `InvalidRequest`.
///
/// The decoder error stays in the chain for logging.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::new(ErrorKind::InvalidRequest, EMPTY_BODY_MESSAGE));
    }

    serde_json::from_slice(body).map_err(|e| {
        let message = match e.classify() {
            Category::Syntax | Category::Eof => MALFORMED_JSON_MESSAGE.to_string(),
            Category::Data | Category::Io => e.to_string(),
        };
        Error::new(ErrorKind::InvalidRequest, message).with_cause(e)
    })
}
