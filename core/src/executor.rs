//! Request execution pipeline.
//!
//! # Design
//! `RequestExecutor` turns a caller-built `Request` into one transport call
//! and a classified result:
//! 1. resolve the URL against the configured base;
//! 2. inject protocol headers, letting caller values win except for the
//!    `Accept` and OData version headers;
//! 3. let the configured credentials (if any) sign the request;
//! 4. send through the `Transport`;
//! 5. buffer the body and close the response, unless streaming was
//!    requested;
//! 6. classify by status: 200..=299 is success, anything else fails with
//!    the status and the body text.
//!
//! The executor keeps no per-request state, so one instance serves any
//! number of concurrent callers.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::OrcError;
use crate::http::{Request, RequestBody};
use crate::response::OrcResponse;
use crate::transport::{Credentials, Transport};

pub const USER_AGENT_HEADER: &str = "User-Agent";
pub const TELEMETRY_HEADER: &str = "X-ClientService-ClientTag";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const ACCEPT_HEADER: &str = "Accept";
pub const ODATA_VERSION_HEADER: &str = "OData-Version";
pub const ODATA_MAXVERSION_HEADER: &str = "OData-MaxVersion";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Headers the executor always sets itself, overriding caller values.
const PROTOCOL_HEADERS: [&str; 3] = [ACCEPT_HEADER, ODATA_VERSION_HEADER, ODATA_MAXVERSION_HEADER];

/// Decorates, sends and classifies requests.
pub struct RequestExecutor {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    credentials: Option<Arc<dyn Credentials>>,
}

impl RequestExecutor {
    pub fn new(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: impl Credentials + 'static) -> Self {
        self.credentials = Some(Arc::new(credentials));
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send `request` and classify the outcome.
    ///
    /// The request is decorated in place, so after the call it holds exactly
    /// the headers that were sent.
    pub async fn execute(&self, request: &mut Request) -> Result<OrcResponse, OrcError> {
        request.url_mut().set_base_url(self.config.base_url());
        let full_url = request.url().to_url()?;
        info!(url = %full_url, verb = %request.verb(), "preparing OData request");

        match request.body() {
            RequestBody::Bytes(bytes) => info!(bytes = bytes.len(), "request carries a payload"),
            RequestBody::Stream(_) => info!("request carries a streamed payload"),
            RequestBody::Empty => {}
        }

        self.decorate_headers(request);

        match &self.credentials {
            Some(credentials) => credentials.prepare_request(request),
            None => warn!("executing request without credentials"),
        }

        for (name, value) in request.headers().iter() {
            debug!(header = name, value = redact(name, value), "request header");
        }

        let response = self.transport.send(request).await.map_err(OrcError::Transport)?;
        let status = response.status();
        info!(status, "OData response received");

        let mut result = OrcResponse::new(response);

        if !request.is_stream_response() {
            let data = match result.payload().await {
                Ok(data) => data,
                Err(source) => {
                    error!(error = %source, "failed reading response body");
                    if let Err(close_err) = result.response_mut().close() {
                        debug!(error = %close_err, "close after failed read also failed");
                    }
                    return Err(OrcError::Body {
                        source,
                        response: Box::new(result),
                    });
                }
            };
            debug!(bytes = data.len(), "response body read");

            if let Err(source) = result.response_mut().close() {
                error!(error = %source, "error closing response");
                return Err(OrcError::Close {
                    source,
                    response: Box::new(result),
                });
            }
            debug!("response closed");
        }

        if !is_success(status) {
            let content = match result.payload_text().await {
                Ok(content) => content,
                Err(source) => {
                    return Err(OrcError::Body {
                        source,
                        response: Box::new(result),
                    })
                }
            };
            if request.is_stream_response() {
                if let Err(close_err) = result.response_mut().close() {
                    debug!(error = %close_err, "close of failed streamed response failed");
                }
            }
            let message = format!("Response status: {status}\nResponse content: {content}");
            error!(status, "{message}");
            return Err(OrcError::Status {
                status,
                message,
                response: Box::new(result),
            });
        }

        Ok(result)
    }

    fn decorate_headers(&self, request: &mut Request) {
        let caller_headers = request.headers().clone();
        let user_agent = self.config.platform_user_agent();
        let headers = request.headers_mut();

        headers.insert(USER_AGENT_HEADER, user_agent.clone());
        headers.insert(TELEMETRY_HEADER, user_agent);
        if !caller_headers.contains(CONTENT_TYPE_HEADER) {
            headers.insert(CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE);
        }
        headers.insert(ACCEPT_HEADER, JSON_CONTENT_TYPE);
        headers.insert(ODATA_VERSION_HEADER, self.config.odata_version());
        headers.insert(ODATA_MAXVERSION_HEADER, self.config.odata_max_version());

        for (name, value) in caller_headers.iter() {
            if PROTOCOL_HEADERS.iter().any(|p| p.eq_ignore_ascii_case(name)) {
                continue;
            }
            headers.insert(name, value);
        }
    }
}

/// Success is the closed range 200..=299.
pub fn is_success(status: u16) -> bool {
    (200..=299).contains(&status)
}

fn redact<'a>(name: &str, value: &'a str) -> &'a str {
    if name.eq_ignore_ascii_case("Authorization") {
        "<redacted>"
    } else {
        value
    }
}
