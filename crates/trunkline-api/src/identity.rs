//! Sender identity resolution from the request path.
//!
//! The identity is the first non-empty path segment when it is a
//! well-formed token. Anything else resolves to a sentinel that no
//! provisioned secret can match, so malformed or missing identities fail
//! closed downstream instead of failing the request here.

use trunkline_core::SenderId;
use url::Url;

const RESOLUTION_BASE: &str = "http://sender.invalid/";

/// Resolves the sender identity from a request path.
///
/// Never fails the request: absent or malformed segments resolve to the
/// `unknown` sentinel, and an internal parse failure resolves to the
/// `error` sentinel. Resolution is idempotent for valid identities.
pub fn resolve_sender(path: &str) -> SenderId {
    match first_path_segment(path) {
        Ok(Some(segment)) if SenderId::is_valid_token(&segment) => SenderId(segment),
        Ok(_) => SenderId::unknown(),
        Err(_) => SenderId::error(),
    }
}

fn first_path_segment(path: &str) -> Result<Option<String>, url::ParseError> {
    let mut url = Url::parse(RESOLUTION_BASE)?;
    url.set_path(path);

    Ok(url
        .path_segments()
        .into_iter()
        .flatten()
        .find(|segment| !segment.is_empty())
        .map(ToString::to_string))
}
