//! Entity-set level operations on top of the executor and serializer.
//!
//! # Design
//! `OrcClient` owns one `RequestExecutor` and one `EntitySerializer`. Each
//! operation builds a `Request` for a service-relative path, stamps the
//! client's custom headers and query parameters onto it, executes it, and
//! decodes the buffered payload. Requests are independent, so a shared
//! `&OrcClient` can run any number of operations concurrently.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::entity::{Entity, EntityType};
use crate::error::OrcError;
use crate::executor::RequestExecutor;
use crate::http::{Headers, HttpVerb, Request};
use crate::multipart::{MultipartPart, MultipartRequestBuilder};
use crate::response::OrcResponse;
use crate::serializer::resolver::TypeRegistry;
use crate::serializer::EntitySerializer;

/// `set('id')`, the OData key selector for a single entity.
pub fn selector_path(set: &str, id: &str) -> String {
    format!("{set}('{id}')")
}

pub struct OrcClient {
    executor: RequestExecutor,
    serializer: EntitySerializer,
    custom_headers: Headers,
    custom_parameters: Vec<(String, String)>,
}

impl OrcClient {
    pub fn new(executor: RequestExecutor, registry: TypeRegistry) -> Self {
        Self {
            executor,
            serializer: EntitySerializer::new(registry),
            custom_headers: Headers::new(),
            custom_parameters: Vec::new(),
        }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn serializer(&self) -> &EntitySerializer {
        &self.serializer
    }

    /// Header sent with every request this client creates.
    pub fn add_custom_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.custom_headers.insert(name, value);
    }

    /// Query parameter sent with every request this client creates.
    pub fn add_custom_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.custom_parameters.push((name.into(), value.into()));
    }

    /// A request for `path` carrying the client's custom headers and
    /// parameters.
    pub fn create_request(&self, verb: HttpVerb, path: &str) -> Request {
        let mut request = Request::new(verb);
        request.url_mut().append_path_component(path);
        for (name, value) in &self.custom_parameters {
            request.url_mut().add_query_parameter(name.as_str(), value.as_str());
        }
        for (name, value) in self.custom_headers.iter() {
            request.add_header(name, value);
        }
        request
    }

    /// GET `path` and return the body as text.
    pub async fn read_raw(&self, path: &str) -> Result<String, OrcError> {
        let mut request = self.create_request(HttpVerb::Get, path);
        let response = self.executor.execute(&mut request).await?;
        Ok(text(buffered(&response)?))
    }

    /// GET a single entity requested as `E`.
    pub async fn read<E: EntityType>(&self, path: &str) -> Result<Box<dyn Entity>, OrcError> {
        let payload = self.read_raw(path).await?;
        Ok(self.serializer.deserialize::<E>(&payload)?)
    }

    /// GET an entity set requested as `E`.
    pub async fn read_collection<E: EntityType>(&self, path: &str) -> Result<Vec<Box<dyn Entity>>, OrcError> {
        let payload = self.read_raw(path).await?;
        let entities = self.serializer.deserialize_collection::<E>(&payload)?;
        debug!(path, count = entities.len(), "read collection");
        Ok(entities)
    }

    /// POST `entity` to the set at `path` and decode the created entity.
    pub async fn add<E: EntityType>(&self, path: &str, entity: &E) -> Result<Box<dyn Entity>, OrcError> {
        let body = self.serializer.serialize(entity)?;
        let payload = self.send_json(HttpVerb::Post, path, body).await?;
        Ok(self.serializer.deserialize::<E>(&payload)?)
    }

    /// PATCH `entity` at `path`. Services answering `204 No Content` yield
    /// `None`.
    pub async fn update<E: EntityType>(&self, path: &str, entity: &E) -> Result<Option<Box<dyn Entity>>, OrcError> {
        let body = self.serializer.serialize(entity)?;
        let payload = self.send_json(HttpVerb::Patch, path, body).await?;
        if payload.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(self.serializer.deserialize::<E>(&payload)?))
    }

    pub async fn delete(&self, path: &str) -> Result<(), OrcError> {
        let mut request = self.create_request(HttpVerb::Delete, path);
        self.executor.execute(&mut request).await?;
        Ok(())
    }

    /// POST `parts` as one `multipart/form-data` body.
    pub async fn add_multipart(&self, path: &str, parts: &[MultipartPart]) -> Result<(), OrcError> {
        let mut request = MultipartRequestBuilder::new().build(parts);
        let template = self.create_request(HttpVerb::Post, path);
        *request.url_mut() = template.url().clone();
        for (name, value) in template.headers().iter() {
            request.add_header(name, value);
        }
        debug!(path, parts = parts.len(), "uploading multipart body");
        self.executor.execute(&mut request).await?;
        Ok(())
    }

    /// GET `path` without buffering; the caller reads and closes the body.
    pub async fn read_stream(&self, path: &str) -> Result<OrcResponse, OrcError> {
        let mut request = self.create_request(HttpVerb::Get, path);
        request.set_stream_response();
        self.executor.execute(&mut request).await
    }

    /// POST an action's parameters to `path` and return the body as text.
    pub async fn invoke_action(&self, path: &str, parameters: &BTreeMap<String, Value>) -> Result<String, OrcError> {
        let body = self.serializer.generate_parameters_payload(parameters)?;
        self.send_json(HttpVerb::Post, path, body).await
    }

    /// Body of an entity serialized for sending, e.g. to batch by hand.
    pub fn to_payload<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, OrcError> {
        Ok(self.serializer.serialize(value)?)
    }

    async fn send_json(&self, verb: HttpVerb, path: &str, body: String) -> Result<String, OrcError> {
        let mut request = self.create_request(verb, path);
        request.set_content(body);
        let response = self.executor.execute(&mut request).await?;
        Ok(text(buffered(&response)?))
    }
}

fn buffered(response: &OrcResponse) -> Result<&Bytes, OrcError> {
    response
        .buffered_payload()
        .ok_or(OrcError::Stream("response body was not buffered"))
}

fn text(payload: &Bytes) -> String {
    String::from_utf8_lossy(payload).into_owned()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::config::ClientConfig;
    use crate::error::TransportError;
    use crate::http::{HeaderMultimap, Response};
    use crate::multipart::boundary_of;
    use crate::testing::{registry, Employee, Manager};
    use crate::transport::Transport;

    #[derive(Debug, Clone)]
    struct Sent {
        verb: HttpVerb,
        url: String,
        headers: Vec<(String, String)>,
        body: Option<Bytes>,
    }

    /// Answers every request with one canned response and records what it saw.
    struct CannedTransport {
        status: u16,
        body: &'static str,
        sent: Arc<Mutex<Vec<Sent>>>,
    }

    #[async_trait]
    impl Transport for CannedTransport {
        async fn send(&self, request: &mut Request) -> Result<Response, TransportError> {
            self.sent.lock().push(Sent {
                verb: request.verb(),
                url: request.url().to_url()?.to_string(),
                headers: request
                    .headers()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                body: request.content().cloned(),
            });
            Ok(Response::from_bytes(self.status, HeaderMultimap::new(), self.body))
        }
    }

    fn client(status: u16, body: &'static str) -> (OrcClient, Arc<Mutex<Vec<Sent>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = CannedTransport {
            status,
            body,
            sent: sent.clone(),
        };
        let executor = RequestExecutor::new(ClientConfig::new("http://localhost:3000/api/v2.0"), transport);
        (OrcClient::new(executor, registry()), sent)
    }

    fn last(sent: &Arc<Mutex<Vec<Sent>>>) -> Sent {
        sent.lock().last().cloned().unwrap()
    }

    fn header<'a>(sent: &'a Sent, name: &str) -> Option<&'a str> {
        sent.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    // --- reads ---

    #[test]
    fn selector_renders_quoted_key() {
        assert_eq!(selector_path("Employees", "AAMk=="), "Employees('AAMk==')");
    }

    #[tokio::test]
    async fn read_applies_custom_headers_and_parameters() {
        let (mut client, sent) = client(200, r##"{ "@odata.type": "#Contoso.Staff.Manager", "Name": "Grace" }"##);
        client.add_custom_header("Prefer", "outlook.timezone=\"UTC\"");
        client.add_custom_parameter("$select", "Name");

        let entity = client.read::<Employee>(&selector_path("Employees", "42")).await.unwrap();
        assert!(entity.is::<Manager>());

        let request = last(&sent);
        assert_eq!(request.verb, HttpVerb::Get);
        assert_eq!(
            request.url,
            "http://localhost:3000/api/v2.0/Employees('42')?%24select=Name"
        );
        assert_eq!(header(&request, "Prefer"), Some("outlook.timezone=\"UTC\""));
        assert_eq!(header(&request, "Accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn read_collection_decodes_value_array() {
        let (client, _sent) = client(
            200,
            r##"{ "value": [ { "Name": "a" }, { "@odata.type": "#Contoso.Staff.Manager", "Name": "b" } ] }"##,
        );
        let entities = client.read_collection::<Employee>("Employees").await.unwrap();
        assert_eq!(entities.len(), 2);
        assert!(entities[0].is::<Employee>());
        assert!(entities[1].is::<Manager>());
    }

    #[tokio::test]
    async fn read_raw_returns_body_text() {
        let (client, _sent) = client(200, "plain text");
        assert_eq!(client.read_raw("Me/Photo/$value").await.unwrap(), "plain text");
    }

    #[tokio::test]
    async fn failed_read_surfaces_status() {
        let (client, _sent) = client(404, r#"{"error":{"code":"ErrorItemNotFound"}}"#);
        let err = client.read::<Employee>("Employees('nope')").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("ErrorItemNotFound"));
    }

    // --- writes ---

    #[tokio::test]
    async fn add_posts_wire_json() {
        let (client, sent) = client(201, r#"{ "Name": "Ada" }"#);
        let employee = Employee {
            name: "Ada".to_string(),
            ..Employee::default()
        };

        let created = client.add("Employees", &employee).await.unwrap();
        assert_eq!(created.downcast_ref::<Employee>().unwrap().name, "Ada");

        let request = last(&sent);
        assert_eq!(request.verb, HttpVerb::Post);
        assert_eq!(header(&request, "Content-Type"), Some("application/json"));
        let body: Value = serde_json::from_slice(&request.body.unwrap()).unwrap();
        assert_eq!(body["@odata.type"], "#Contoso.Staff.Employee");
        assert_eq!(body["Name"], "Ada");
    }

    #[tokio::test]
    async fn update_without_content_yields_none() {
        let (client, sent) = client(204, "");
        let updated = client.update("Employees('1')", &Employee::default()).await.unwrap();
        assert!(updated.is_none());
        assert_eq!(last(&sent).verb, HttpVerb::Patch);
    }

    #[tokio::test]
    async fn delete_sends_delete() {
        let (client, sent) = client(204, "");
        client.delete("Employees('1')").await.unwrap();
        let request = last(&sent);
        assert_eq!(request.verb, HttpVerb::Delete);
        assert!(request.url.ends_with("/Employees('1')"));
    }

    #[tokio::test]
    async fn multipart_keeps_its_content_type() {
        let (mut client, sent) = client(200, "");
        client.add_custom_header("X-Trace", "abc");
        let parts = [MultipartPart::new("file", "text/plain", "hello")];

        client.add_multipart("Attachments", &parts).await.unwrap();

        let request = last(&sent);
        assert_eq!(request.verb, HttpVerb::Post);
        assert!(request.url.ends_with("/Attachments"));
        assert_eq!(header(&request, "X-Trace"), Some("abc"));
        let content_type = header(&request, "Content-Type").unwrap();
        let boundary = boundary_of(content_type).unwrap().to_string();
        let body = String::from_utf8(request.body.clone().unwrap().to_vec()).unwrap();
        assert!(body.ends_with(&format!("--{boundary}--")));
    }

    #[tokio::test]
    async fn invoke_action_posts_parameters() {
        let (client, sent) = client(200, r#"{"value":true}"#);
        let mut parameters = BTreeMap::new();
        parameters.insert("Comment".to_string(), json!("on my way"));

        let answer = client.invoke_action("Me/Events('1')/Accept", &parameters).await.unwrap();
        assert_eq!(answer, r#"{"value":true}"#);

        let body: Value = serde_json::from_slice(&last(&sent).body.unwrap()).unwrap();
        assert_eq!(body, json!({ "Comment": "on my way" }));
    }

    // --- streaming ---

    #[tokio::test]
    async fn read_stream_leaves_body_open() {
        let (client, _sent) = client(200, "chunked bytes");
        let mut response = client.read_stream("Me/Photo/$value").await.unwrap();
        assert!(response.buffered_payload().is_none());

        let mut content = String::new();
        response
            .open_streamed_response()
            .unwrap()
            .read_to_string(&mut content)
            .await
            .unwrap();
        assert_eq!(content, "chunked bytes");
        response.close_streamed_response().unwrap();
        assert!(response.is_closed());
    }
}
