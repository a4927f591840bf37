//! Request body capture for the Raven middleware
//!
//! Buffers incoming payloads so they can be attached to events, then puts
//! them back so handlers still see the complete body.
//! Only text-based content types are captured to avoid binary bloat.

use actix_web::dev::{Payload, ServiceRequest};
use actix_web::error::PayloadError;
use actix_web::web::{Bytes, BytesMut};
use actix_web::HttpMessage;
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;

use crate::error::BodyReadError;

/// Upper bound on a body we are willing to buffer (1MB)
///
/// Snapshots keep at most [`MAX_BODY_SIZE`](crate::context::MAX_BODY_SIZE)
/// of it; the handler always gets the full body back.
const MAX_BUFFERED_SIZE: usize = 1024 * 1024;

/// Payload handed back to the handler: buffered prefix, then the rest
type ReplayStream = Pin<Box<dyn Stream<Item = Result<Bytes, PayloadError>>>>;

/// Captures request body if it's text-based and under size limit
///
/// Returns `None` when the body is not captured (binary or oversized),
/// `Some(Err(_))` when the payload stream failed. The payload is always
/// re-inserted for downstream handlers once it has been taken.
pub async fn capture_request_body(
    req: &mut ServiceRequest,
) -> Option<Result<Bytes, BodyReadError>> {
    let headers = extract_request_headers(req);

    // Only capture text-based payloads to avoid binary bloat
    if !should_capture_body(&headers) {
        return None;
    }

    // Check Content-Length header to skip oversized payloads early
    if let Some(content_length) = headers.get("content-length") {
        if let Ok(size) = content_length.parse::<usize>() {
            if size > MAX_BUFFERED_SIZE {
                return None;
            }
        }
    }

    Some(read_and_buffer_body(req).await)
}

/// Checks if body should be captured based on Content-Type
///
/// Returns true for text-based formats only (JSON, XML, form data, plain text)
fn should_capture_body(headers: &HashMap<String, String>) -> bool {
    let content_type = match headers.get("content-type") {
        Some(ct) => ct.to_lowercase(),
        None => return false, // No content-type, assume binary
    };

    content_type.contains("application/json")
        || content_type.contains("application/xml")
        || content_type.contains("text/xml")
        || content_type.contains("application/x-www-form-urlencoded")
        || content_type.contains("text/")
        || content_type.contains("application/graphql")
}

/// Buffers the start of the request payload
///
/// Reads until the stream ends, fails, or [`MAX_BUFFERED_SIZE`] is reached.
/// The handler then gets the buffered bytes followed by whatever the original
/// stream still has to say: its remaining chunks, or the error it failed with.
async fn read_and_buffer_body(req: &mut ServiceRequest) -> Result<Bytes, BodyReadError> {
    let mut payload = req.take_payload();
    let mut buffer = BytesMut::new();
    let mut failure = None;
    let mut finished = false;

    while buffer.len() < MAX_BUFFERED_SIZE {
        match payload.next().await {
            Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
            Some(Err(e)) => {
                failure = Some(e);
                break;
            }
            None => {
                finished = true;
                break;
            }
        }
    }

    let bytes = buffer.freeze();
    let captured = match &failure {
        Some(e) => Err(BodyReadError::new(e.to_string())),
        None => Ok(bytes.slice(..bytes.len().min(MAX_BUFFERED_SIZE))),
    };

    let prefix = stream::once(future::ready(Ok::<_, PayloadError>(bytes)));
    let replay: ReplayStream = match failure {
        Some(e) => Box::pin(prefix.chain(stream::once(future::ready(Err(e))))),
        None if finished => Box::pin(prefix),
        None => Box::pin(prefix.chain(payload)),
    };
    req.set_payload(Payload::Stream { payload: replay });

    captured
}

/// Extracts request headers into a HashMap for easy lookup
pub(crate) fn extract_request_headers(req: &ServiceRequest) -> HashMap<String, String> {
    req.headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}
