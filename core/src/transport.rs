//! Collaborator boundaries: the transport that performs the network call and
//! the credentials that decorate a request before it is sent.
//!
//! # Design
//! The core never opens sockets itself. A host supplies a `Transport`
//! implementation (reqwest, ureq on a blocking pool, an in-memory fake) and
//! the executor drives it once per request. Credentials mutate the request
//! headers in place right before that single send.

use async_trait::async_trait;
use base64::Engine;

use crate::error::TransportError;
use crate::http::{Request, Response};

/// Performs one HTTP round-trip.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the raw response. The request URL is
    /// already absolute and all headers are final. A streamed request body
    /// may be taken with `Request::take_body`.
    async fn send(&self, request: &mut Request) -> Result<Response, TransportError>;
}

/// Adds authentication to a request.
pub trait Credentials: Send + Sync {
    fn prepare_request(&self, request: &mut Request);
}

/// OAuth bearer token credentials.
#[derive(Debug, Clone)]
pub struct BearerCredentials {
    token: String,
}

impl BearerCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Credentials for BearerCredentials {
    fn prepare_request(&self, request: &mut Request) {
        request.add_header("Authorization", format!("Bearer {}", self.token));
    }
}

/// HTTP basic credentials.
#[derive(Debug, Clone)]
pub struct BasicCredentials {
    user: String,
    password: String,
}

impl BasicCredentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl Credentials for BasicCredentials {
    fn prepare_request(&self, request: &mut Request) {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.user, self.password));
        request.add_header("Authorization", format!("Basic {encoded}"));
    }
}
