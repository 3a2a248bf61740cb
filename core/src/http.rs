//! HTTP request and response types exchanged with the transport.
//!
//! # Design
//! `Request` is plain data owned by the caller until it is handed to the
//! executor, which decorates its headers in place before the send. The
//! caller can therefore inspect exactly what went over the wire.
//!
//! `Response` is produced by a `Transport` and carries a live body reader
//! plus a close capability. Exactly one party releases it: the executor when
//! the body is buffered eagerly, or the caller when the request asked for a
//! streamed response.

use std::collections::BTreeMap;
use std::fmt;
use std::io;

use bytes::Bytes;
use tokio::io::AsyncRead;
use url::Url;

/// Request option that leaves the response body unread so the caller can
/// stream it.
pub const MUST_STREAM_RESPONSE_CONTENT: &str = "MUST_STREAM_RESPONSE_CONTENT";

/// HTTP verb for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Head => "HEAD",
            HttpVerb::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// Ordered request headers. Names are unique ignoring ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`. An existing entry with the same name keeps its
    /// position and original spelling; only the value changes.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.entries[idx].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.position(name).map(|idx| self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// Response headers: every name maps to the ordered list of values the
/// server sent for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMultimap {
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderMultimap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

// ---------------------------------------------------------------------------
// URL
// ---------------------------------------------------------------------------

/// Request URL assembled from a base, ordered path components and query
/// parameters. The base is usually filled in by the executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrcUrl {
    base_url: String,
    path: Vec<String>,
    query: Vec<(String, String)>,
}

impl OrcUrl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
    }

    pub fn append_path_component(&mut self, component: impl Into<String>) {
        self.path.push(component.into());
    }

    pub fn prepend_path_component(&mut self, component: impl Into<String>) {
        self.path.insert(0, component.into());
    }

    pub fn add_query_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.query.push((name.into(), value.into()));
    }

    pub fn path_components(&self) -> &[String] {
        &self.path
    }

    pub fn query_parameters(&self) -> &[(String, String)] {
        &self.query
    }

    /// Render base, path and query into an absolute URL.
    pub fn to_url(&self) -> Result<Url, url::ParseError> {
        let mut full = self.base_url.trim_end_matches('/').to_string();
        for component in &self.path {
            let component = component.trim_matches('/');
            if !component.is_empty() {
                full.push('/');
                full.push_str(component);
            }
        }

        let mut url = Url::parse(&full)?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Outgoing payload. A buffer and a stream are mutually exclusive.
#[derive(Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Bytes(Bytes),
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            RequestBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A logical request before and after executor decoration.
#[derive(Debug, Default)]
pub struct Request {
    verb: HttpVerb,
    url: OrcUrl,
    headers: Headers,
    body: RequestBody,
    options: BTreeMap<String, String>,
}

impl Request {
    pub fn new(verb: HttpVerb) -> Self {
        Self {
            verb,
            ..Self::default()
        }
    }

    pub fn verb(&self) -> HttpVerb {
        self.verb
    }

    pub fn set_verb(&mut self, verb: HttpVerb) {
        self.verb = verb;
    }

    pub fn url(&self) -> &OrcUrl {
        &self.url
    }

    pub fn url_mut(&mut self) -> &mut OrcUrl {
        &mut self.url
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    /// Buffered payload, if any.
    pub fn content(&self) -> Option<&Bytes> {
        match &self.body {
            RequestBody::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn set_content(&mut self, content: impl Into<Bytes>) {
        self.body = RequestBody::Bytes(content.into());
    }

    pub fn set_streamed_content(&mut self, reader: impl AsyncRead + Send + Unpin + 'static) {
        self.body = RequestBody::Stream(Box::new(reader));
    }

    /// Move the body out, leaving `Empty`. Transports use this to consume a
    /// streamed payload.
    pub fn take_body(&mut self) -> RequestBody {
        std::mem::take(&mut self.body)
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).map(String::as_str)
    }

    pub fn set_option(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.options.insert(name.into(), value.into());
    }

    /// Ask the executor to leave the response body unread.
    pub fn set_stream_response(&mut self) {
        self.set_option(MUST_STREAM_RESPONSE_CONTENT, "true");
    }

    pub fn is_stream_response(&self) -> bool {
        self.options.contains_key(MUST_STREAM_RESPONSE_CONTENT)
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Readable response body with an explicit release step.
pub trait ResponseBody: AsyncRead + Send + Sync + Unpin {
    /// Release the underlying connection. `Response::close` calls this at
    /// most once.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseBody for io::Cursor<Vec<u8>> {}

impl ResponseBody for io::Cursor<Bytes> {}

/// Raw response handed back by a `Transport`.
pub struct Response {
    status: u16,
    headers: HeaderMultimap,
    body: Box<dyn ResponseBody>,
    closed: bool,
}

impl Response {
    pub fn new(status: u16, headers: HeaderMultimap, body: impl ResponseBody + 'static) -> Self {
        Self {
            status,
            headers,
            body: Box::new(body),
            closed: false,
        }
    }

    /// Response whose body is already in memory.
    pub fn from_bytes(status: u16, headers: HeaderMultimap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self::new(status, headers, io::Cursor::new(body))
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMultimap {
        &self.headers
    }

    pub fn body_mut(&mut self) -> &mut dyn ResponseBody {
        self.body.as_mut()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the transport resource. Later calls are no-ops.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.body.close()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Drop for Response {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(status = self.status, "response dropped without being closed");
        }
    }
}
