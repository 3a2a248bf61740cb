//! Client runtime for OData v4 REST services.
//!
//! # Overview
//! Generated service bindings sit on top of this crate. It supplies the
//! request pipeline (header decoration, credentials, status classification,
//! streamed or buffered bodies), the JSON layer (reserved-name rewriting,
//! discriminator-driven subtype resolution, parent back-references on
//! decoded graphs), and multipart upload framing.
//!
//! # Design
//! - Networking is delegated to a host-supplied `Transport`, so the core is
//!   deterministic under test and free of any HTTP client dependency.
//! - `RequestExecutor` holds only immutable configuration and can be shared
//!   across tasks.
//! - Entity types are plain serde structs registered in a `TypeRegistry`;
//!   the [`entity!`] macro derives their runtime glue.
//! - Every failure is one `OrcError`; failures raised after a response
//!   arrived still carry that response.

pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod executor;
pub mod http;
pub mod multipart;
pub mod response;
pub mod serializer;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::{selector_path, OrcClient};
pub use config::ClientConfig;
pub use entity::{Entity, EntityBase, EntityList, EntityType};
pub use error::{OrcError, SerializerError};
pub use executor::RequestExecutor;
pub use http::{HttpVerb, Request, Response};
pub use multipart::{MultipartPart, MultipartRequestBuilder};
pub use response::OrcResponse;
pub use serializer::resolver::TypeRegistry;
pub use serializer::EntitySerializer;
pub use transport::{BasicCredentials, BearerCredentials, Credentials, Transport};

#[doc(hidden)]
pub mod __private {
    pub use serde_json::{to_value, Error as JsonError, Value};
}
