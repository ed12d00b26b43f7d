//! HTTP routing and response encoding
//!
//! | Method | Path | Operation |
//! |---|---|---|
//! | GET | `/` | liveness |
//! | GET | `/health` | backend connectivity |
//! | GET, HEAD | `/s3/{bucket}/{key..}` | get object or implicit listing |
//! | GET, HEAD | `/s3/{bucket}?prefix=` | explicit listing |
//! | PUT | `/s3/{bucket}/{key..}` | create or update object |
//! | DELETE | `/s3/{bucket}/{key..}` | delete object |
//!
//! Every failure is turned into a response here; nothing propagates past a
//! single request.

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{Gateway, GetObjectOutput};
use crate::utils::{decode_segment, quote_etag};
use crate::xml::ErrorDocument;
use bytes::Bytes;
use futures::FutureExt;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{error, warn};

/// Prefix under which the S3 routes are mounted
pub const S3_MOUNT: &str = "/s3";

/// Placeholder echoed in `NoSuchKey` when the route carried no key
const UNKNOWN_KEY: &str = "unknown-key";

const APPLICATION_JSON: &str = "application/json";
const APPLICATION_XML: &str = "application/xml";
const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Resolved request target
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Root,
    Health,
    /// `/s3/{bucket}/{key..}`; the key may be empty
    Object { bucket: String, key: String },
    /// `/s3/{bucket}`
    Bucket { bucket: String },
    Unknown,
}

/// Operation a failure happened in; drives status mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Get,
    List,
    Put,
    Delete,
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    prefix: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[derive(Serialize)]
struct FailureBody<'a> {
    error: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct PutBody<'a> {
    #[serde(rename = "ETag")]
    etag: &'a str,
}

impl Gateway {
    /// Serve one HTTP request
    ///
    /// Panics inside a handler are caught, logged, and answered with a 500
    /// carrying the panic message.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>,
    {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        match AssertUnwindSafe(self.dispatch(request)).catch_unwind().await {
            Ok(response) => response,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    %method,
                    path = %path,
                    message = %message,
                    "Unhandled failure while processing request"
                );
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &FailureBody {
                        error: "Internal Server Error",
                        message: &message,
                    },
                )
            }
        }
    }

    async fn dispatch<B>(&self, request: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        let route = resolve(parts.uri.path());

        match (&parts.method, route) {
            (&Method::GET | &Method::HEAD, Route::Root) => {
                json_response(StatusCode::OK, &self.liveness())
            }
            (&Method::GET | &Method::HEAD, Route::Health) => {
                json_response(StatusCode::OK, &self.health().await)
            }
            (&Method::GET | &Method::HEAD, Route::Object { bucket, key }) => {
                match self.get_object(&bucket, &key).await {
                    Ok(GetObjectOutput::Object(file)) => object_response(file.data, &file.sha),
                    Ok(GetObjectOutput::Listing(listing)) => match listing.to_xml() {
                        Ok(xml) => xml_response(StatusCode::OK, xml),
                        Err(e) => error_response(Operation::Get, &bucket, &key, &e),
                    },
                    Err(e) => error_response(Operation::Get, &bucket, &key, &e),
                }
            }
            (&Method::GET | &Method::HEAD, Route::Bucket { bucket }) => {
                let prefix = list_prefix(parts.uri.query());
                let result = match self.list_bucket(&bucket, &prefix).await {
                    Ok(listing) => listing.to_xml(),
                    Err(e) => Err(e),
                };
                match result {
                    Ok(xml) => xml_response(StatusCode::OK, xml),
                    Err(e) => error_response(Operation::List, &bucket, &prefix, &e),
                }
            }
            (&Method::PUT, Route::Object { bucket, key }) => {
                let result = match read_body(body, self.config().max_body_size).await {
                    Ok(data) => self.put_object(&bucket, &key, data).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(etag) => put_response(&etag),
                    Err(e) => error_response(Operation::Put, &bucket, &key, &e),
                }
            }
            (&Method::DELETE, Route::Object { bucket, key }) => {
                match self.delete_object(&bucket, &key).await {
                    Ok(()) => empty_response(StatusCode::NO_CONTENT),
                    Err(e) => error_response(Operation::Delete, &bucket, &key, &e),
                }
            }
            _ => json_error(StatusCode::NOT_FOUND, "Not Found"),
        }
    }
}

/// Map a request path onto a route
fn resolve(path: &str) -> Route {
    match path {
        "/" => return Route::Root,
        "/health" | "/health/" => return Route::Health,
        _ => {}
    }

    let rest = match path.strip_prefix(S3_MOUNT).and_then(|r| r.strip_prefix('/')) {
        Some(rest) => rest,
        None => return Route::Unknown,
    };

    match rest.split_once('/') {
        Some((bucket, _)) if bucket.is_empty() => Route::Unknown,
        Some((bucket, key)) => Route::Object {
            bucket: decode_segment(bucket),
            key: decode_segment(key),
        },
        None if rest.is_empty() => Route::Unknown,
        None => Route::Bucket {
            bucket: decode_segment(rest),
        },
    }
}

/// `prefix` query value, empty when absent
fn list_prefix(query: Option<&str>) -> String {
    query
        .and_then(|q| serde_urlencoded::from_str::<ListQuery>(q).ok())
        .and_then(|q| q.prefix)
        .unwrap_or_default()
}

async fn read_body<B>(body: B, limit: usize) -> GatewayResult<Bytes>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => Err(GatewayError::PayloadTooLarge(limit)),
        Err(e) => Err(GatewayError::Body(e.to_string())),
    }
}

/// Convert a handler failure into the response its operation calls for
fn error_response(
    operation: Operation,
    bucket: &str,
    key: &str,
    err: &GatewayError,
) -> Response<Full<Bytes>> {
    let response = match err {
        GatewayError::InvalidBucketFormat => json_error(StatusCode::BAD_REQUEST, &err.to_string()),
        GatewayError::PayloadTooLarge(_) => {
            json_error(StatusCode::PAYLOAD_TOO_LARGE, &err.to_string())
        }
        e if e.is_not_found() && operation == Operation::Get => no_such_key(key),
        e if e.is_not_found() && operation == Operation::Delete => {
            json_error(StatusCode::NOT_FOUND, "Not Found")
        }
        _ => json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    };

    if response.status().is_server_error() {
        error!(?operation, bucket, path = key, error = %err, "Request processing failed");
    } else {
        warn!(?operation, bucket, path = key, error = %err, "Request rejected");
    }
    response
}

fn no_such_key(key: &str) -> Response<Full<Bytes>> {
    let key = if key.is_empty() { UNKNOWN_KEY } else { key };
    match ErrorDocument::no_such_key(key).to_xml() {
        Ok(xml) => xml_response(StatusCode::NOT_FOUND, xml),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn object_response(data: Bytes, sha: &str) -> Response<Full<Bytes>> {
    let length = data.len() as u64;
    let mut response = Response::new(Full::new(data));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_OCTET_STREAM));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    if let Ok(etag) = HeaderValue::from_str(&quote_etag(sha)) {
        headers.insert(ETAG, etag);
    }
    response
}

fn put_response(etag: &str) -> Response<Full<Bytes>> {
    let mut response = json_response(StatusCode::OK, &PutBody { etag });
    if let Ok(value) = HeaderValue::from_str(etag) {
        response.headers_mut().insert(ETAG, value);
    }
    response
}

fn xml_response(status: StatusCode, xml: String) -> Response<Full<Bytes>> {
    with_content_type(status, Bytes::from(xml), APPLICATION_XML)
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => with_content_type(status, Bytes::from(body), APPLICATION_JSON),
        Err(e) => {
            error!(error = %e, "Failed to encode JSON response");
            empty_response(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn json_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &ErrorBody { error: message })
}

fn with_content_type(
    status: StatusCode,
    body: Bytes,
    content_type: &'static str,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_static_routes() {
        assert_eq!(resolve("/"), Route::Root);
        assert_eq!(resolve("/health"), Route::Health);
        assert_eq!(resolve("/nope"), Route::Unknown);
        assert_eq!(resolve("/s3"), Route::Unknown);
        assert_eq!(resolve("/s3/"), Route::Unknown);
        assert_eq!(resolve("/s3//file.txt"), Route::Unknown);
    }

    #[test]
    fn test_resolve_s3_routes() {
        assert_eq!(
            resolve("/s3/alice@proj"),
            Route::Bucket {
                bucket: "alice@proj".to_string()
            }
        );
        assert_eq!(
            resolve("/s3/alice@proj/a/b.txt"),
            Route::Object {
                bucket: "alice@proj".to_string(),
                key: "a/b.txt".to_string()
            }
        );
        // Trailing slash addresses the repository root
        assert_eq!(
            resolve("/s3/alice@proj/"),
            Route::Object {
                bucket: "alice@proj".to_string(),
                key: String::new()
            }
        );
        assert_eq!(
            resolve("/s3/alice%40proj/my%20notes.md"),
            Route::Object {
                bucket: "alice@proj".to_string(),
                key: "my notes.md".to_string()
            }
        );
    }

    #[test]
    fn test_list_prefix() {
        assert_eq!(list_prefix(None), "");
        assert_eq!(list_prefix(Some("")), "");
        assert_eq!(list_prefix(Some("prefix=docs")), "docs");
        assert_eq!(list_prefix(Some("prefix=a%2Fb&max-keys=5")), "a/b");
        assert_eq!(list_prefix(Some("delimiter=%2F")), "");
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
