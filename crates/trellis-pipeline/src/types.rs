//! Common types used throughout the dispatch pipeline.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use trellis_core::RequestContext;

/// The HTTP request type carried through the pipeline.
///
/// This is a standard `http::Request` with a `Full<Bytes>` body.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type carried through the pipeline.
///
/// This is a standard `http::Response` with a `Full<Bytes>` body.
pub type Response = http::Response<Full<Bytes>>;

/// The request/response pair threaded through a single chain invocation.
///
/// One exchange exists per inbound request. It is passed by mutable
/// reference through every filter, the endpoint dispatcher, and the
/// fallback chain; the response is mutated in place and never copied.
/// Filters that need to hand data to later participants use the request's
/// `http::Extensions`.
///
/// # Example
///
/// ```
/// use trellis_pipeline::{Exchange, Request};
/// use bytes::Bytes;
/// use http_body_util::Full;
///
/// let request: Request = http::Request::builder()
///     .uri("/users/42")
///     .body(Full::new(Bytes::new()))
///     .unwrap();
///
/// let exchange = Exchange::new(request);
/// assert_eq!(exchange.path(), "/users/42");
/// ```
#[derive(Debug)]
pub struct Exchange {
    context: RequestContext,
    request: Request,
    response: Response,
}

impl Exchange {
    /// Creates an exchange for the given request.
    ///
    /// The response starts as an empty `404 Not Found`; it reflects the
    /// request's fate until some participant services it.
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self::with_context(RequestContext::new(), request)
    }

    /// Creates an exchange with an existing request context.
    #[must_use]
    pub fn with_context(context: RequestContext, request: Request) -> Self {
        let response = http::Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::new()))
            .unwrap_or_else(|_| http::Response::new(Full::new(Bytes::new())));

        Self {
            context,
            request,
            response,
        }
    }

    /// Returns the request context.
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Returns the request.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the request mutably.
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    /// Returns the response.
    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Returns the response mutably.
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Replaces the response wholesale.
    pub fn set_response(&mut self, response: Response) {
        self.response = response;
    }

    /// Consumes the exchange, yielding the final response.
    #[must_use]
    pub fn into_response(self) -> Response {
        self.response
    }
}

/// Extension trait for building plain and JSON error responses.
pub trait ResponseExt {
    /// Creates an error response with the given status code and message.
    fn error(status: StatusCode, message: &str) -> Response;

    /// Creates a JSON error response.
    fn json_error(status: StatusCode, code: &str, message: &str) -> Response;
}

impl ResponseExt for Response {
    fn error(status: StatusCode, message: &str) -> Response {
        http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Full::new(Bytes::from(message.to_string())))
            .unwrap_or_else(|_| http::Response::new(Full::new(Bytes::new())))
    }

    fn json_error(status: StatusCode, code: &str, message: &str) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": code,
                "message": message
            }
        });

        http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap_or_else(|_| http::Response::new(Full::new(Bytes::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(path: &str) -> Request {
        http::Request::builder()
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[test]
    fn test_exchange_starts_unhandled() {
        let exchange = Exchange::new(make_request("/test"));
        assert_eq!(exchange.response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_exchange_set_response() {
        let mut exchange = Exchange::new(make_request("/test"));
        exchange.set_response(Response::error(StatusCode::OK, "done"));
        assert_eq!(exchange.response().status(), StatusCode::OK);
        assert_eq!(exchange.into_response().status(), StatusCode::OK);
    }

    #[test]
    fn test_exchange_mutate_in_place() {
        let mut exchange = Exchange::new(make_request("/test"));
        *exchange.response_mut().status_mut() = StatusCode::ACCEPTED;
        assert_eq!(exchange.response().status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn test_error_response() {
        let response = Response::error(StatusCode::BAD_REQUEST, "Invalid input");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_json_error_response() {
        let response =
            Response::json_error(StatusCode::UNAUTHORIZED, "AUTH_REQUIRED", "Login first");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
