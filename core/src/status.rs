//! Classification of response status codes.
//!
//! 200 and 201 are the only success codes. A 401 never has its body parsed.
//! Every other status becomes `Error::Service`, enriched with the error
//! entries of the body when it is an error envelope.

use crate::codec::xml_to_mapping;
use crate::error::{Error, RemoteError, Result};
use crate::http::HttpResponse;

/// Reason phrase used in error messages.
pub fn status_label(status: u16) -> &'static str {
    match status {
        204 => "No content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown Error",
    }
}

pub fn check_status(response: &HttpResponse, envelope: &str) -> Result<()> {
    let status = response.status;
    if matches!(status, 200 | 201) {
        return Ok(());
    }
    let label = format!("PrestaShop error: {status} {}.", status_label(status));
    if status == 401 {
        return Err(Error::Authentication { status, message: label });
    }

    let remote = parse_remote_errors(&response.body, envelope);
    let detail = remote
        .iter()
        .filter_map(|e| e.message.as_deref())
        .collect::<Vec<_>>()
        .join(" ");
    let message = if detail.is_empty() {
        label
    } else {
        format!("{label} {detail}")
    };
    Err(Error::Service {
        message,
        status: Some(status),
        remote,
    })
}

/// Error entries of an `<envelope><errors><error>...` body. Bodies that are
/// empty, malformed or differently shaped yield nothing.
pub fn parse_remote_errors(body: &str, envelope: &str) -> Vec<RemoteError> {
    let Ok(document) = xml_to_mapping(body) else {
        return Vec::new();
    };
    let Some(errors) = document
        .get(envelope)
        .and_then(|root| root.get("errors"))
        .and_then(|errors| errors.get("error"))
    else {
        return Vec::new();
    };
    errors
        .items()
        .into_iter()
        .map(|error| RemoteError {
            code: error.get("code").and_then(|c| c.text()).map(str::to_string),
            message: error.get("message").and_then(|m| m.text()).map(str::to_string),
        })
        .collect()
}
