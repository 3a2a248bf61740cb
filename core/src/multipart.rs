//! `multipart/form-data` request construction.
//!
//! # Design
//! The builder is pure: it frames the parts into one buffered body and
//! returns a POST `Request` for the executor. Every call draws a fresh
//! boundary token, so concurrent uploads never share one.

use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::executor::CONTENT_TYPE_HEADER;
use crate::http::{HttpVerb, Request};

pub const MULTIPART_BOUNDARY_NAME: &str = "MultiPartBoundary";
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data; boundary=";
const NEW_LINE: &[u8] = b"\r\n";

/// One named part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    pub name: String,
    pub content_type: String,
    pub content: Bytes,
}

impl MultipartPart {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            content: content.into(),
        }
    }
}

/// Frames parts into a multipart POST request.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultipartRequestBuilder;

impl MultipartRequestBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, parts: &[MultipartPart]) -> Request {
        let boundary = format!("{MULTIPART_BOUNDARY_NAME}{}", Uuid::new_v4());
        let mut request = Request::new(HttpVerb::Post);
        request.add_header(CONTENT_TYPE_HEADER, format!("{MULTIPART_CONTENT_TYPE}{boundary}"));
        request.set_content(encode_parts(&boundary, parts));
        request
    }
}

/// Boundary token carried by a multipart `Content-Type` value.
pub fn boundary_of(content_type: &str) -> Option<&str> {
    content_type.strip_prefix(MULTIPART_CONTENT_TYPE).filter(|b| !b.is_empty())
}

fn encode_parts(boundary: &str, parts: &[MultipartPart]) -> Bytes {
    let mut body = BytesMut::new();
    for part in parts {
        body.put_slice(format!("--{boundary}").as_bytes());
        body.put_slice(NEW_LINE);
        body.put_slice(format!("Content-Disposition: form-data; name={}", part.name).as_bytes());
        body.put_slice(NEW_LINE);
        body.put_slice(format!("Content-type: {}", part.content_type).as_bytes());
        body.put_slice(NEW_LINE);
        body.put_slice(NEW_LINE);
        body.put_slice(&part.content);
        body.put_slice(NEW_LINE);
    }
    body.put_slice(format!("--{boundary}--").as_bytes());
    body.freeze()
}
