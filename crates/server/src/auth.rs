//! Bearer-token authentication.
//!
//! A stripped-down descendant of the teacher's OAuth/JWT `AuthLayer`/`AuthService` pair: instead
//! of verifying a signed token against a JWKS, it compares the presented token against a
//! configured list of accepted tokens. An empty list means the server accepts any bearer token
//! (development mode).

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::body::Body;
use http::{Request, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tower::Layer;

/// Records that a request's bearer token was accepted, for handlers that want to know a request
/// was authenticated without re-parsing the header.
#[derive(Debug, Clone, Default)]
pub struct Authentication {
    pub authenticated: bool,
}

#[derive(Clone)]
pub struct AuthLayer {
    tokens: Arc<Vec<SecretString>>,
}

impl AuthLayer {
    pub fn new(api_keys: Vec<SecretString>) -> Self {
        Self {
            tokens: Arc::new(api_keys),
        }
    }
}

impl<Service> Layer<Service> for AuthLayer {
    type Service = AuthService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        AuthService {
            next,
            tokens: self.tokens.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthService<Service> {
    next: Service,
    tokens: Arc<Vec<SecretString>>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for AuthService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: http_body::Body + Send + 'static,
{
    type Response = Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();
        let tokens = self.tokens.clone();

        Box::pin(async move {
            let (mut parts, body) = req.into_parts();

            match authenticate(&parts, &tokens) {
                Ok(()) => {
                    parts.extensions.insert(Authentication { authenticated: true });
                    next.call(Request::from_parts(parts, body)).await
                }
                Err(message) => Ok(unauthorized(message)),
            }
        })
    }
}

fn authenticate(parts: &http::request::Parts, tokens: &[SecretString]) -> Result<(), &'static str> {
    let Some(header) = parts.headers.get(http::header::AUTHORIZATION) else {
        return Err("missing Authorization header");
    };

    let Ok(value) = header.to_str() else {
        return Err("malformed Authorization header");
    };

    let Some(presented) = value.strip_prefix("Bearer ") else {
        return Err("malformed Authorization header");
    };

    if presented.is_empty() {
        return Err("missing bearer token");
    }

    if tokens.is_empty() {
        return Ok(());
    }

    if tokens.iter().any(|token| constant_time_eq(token.expose_secret(), presented)) {
        Ok(())
    } else {
        Err("invalid bearer token")
    }
}

/// Constant-time string comparison so token checking doesn't leak timing information about how
/// many leading characters matched.
fn constant_time_eq(expected: &str, actual: &str) -> bool {
    if expected.len() != actual.len() {
        return false;
    }

    expected
        .bytes()
        .zip(actual.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn unauthorized(message: &'static str) -> Response<Body> {
    let body = serde_json::json!({
        "error": {
            "message": message,
            "type": "unauthorized",
            "param": null,
            "code": null,
        }
    });

    Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn parts(auth: Option<&str>) -> http::request::Parts {
        let mut builder = Request::builder().uri("/v1/responses");
        if let Some(value) = auth {
            builder = builder.header(http::header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn empty_token_list_accepts_any_bearer_token() {
        let result = authenticate(&parts(Some("Bearer anything")), &[]);
        assert!(result.is_ok());
    }

    #[test]
    fn empty_token_list_still_requires_a_header() {
        let result = authenticate(&parts(None), &[]);
        assert_eq!(result.unwrap_err(), "missing Authorization header");
    }

    #[test]
    fn configured_tokens_reject_unknown_token() {
        let tokens = vec![SecretString::from("secret-key".to_string())];
        let result = authenticate(&parts(Some("Bearer wrong")), &tokens);
        assert_eq!(result.unwrap_err(), "invalid bearer token");
    }

    #[test]
    fn configured_tokens_accept_matching_token() {
        let tokens = vec![SecretString::from("secret-key".to_string())];
        let result = authenticate(&parts(Some("Bearer secret-key")), &tokens);
        assert!(result.is_ok());
    }

    #[test]
    fn malformed_header_is_rejected() {
        let result = authenticate(&parts(Some("secret-key")), &[]);
        assert_eq!(result.unwrap_err(), "malformed Authorization header");
    }
}
