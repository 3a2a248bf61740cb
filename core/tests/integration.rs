//! End-to-end tests against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `OrcClient` and
//! `RequestExecutor` over real HTTP through a ureq-backed `Transport`. ureq is
//! blocking, so each send runs on tokio's blocking pool.

use std::collections::BTreeMap;
use std::io::Cursor;

use async_trait::async_trait;
use orc_core::entity::{EntityBase, EntityList, EntityType};
use orc_core::error::TransportError;
use orc_core::http::HeaderMultimap;
use orc_core::{
    selector_path, BearerCredentials, ClientConfig, HttpVerb, MultipartPart, MultipartRequestBuilder, OrcClient,
    OrcError, Request, RequestExecutor, Response, Transport, TypeRegistry,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;

// ---------------------------------------------------------------------------
// Entity types served by the mock
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Employee {
    #[serde(flatten)]
    base: EntityBase,
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
}

impl Default for Employee {
    fn default() -> Self {
        Self {
            base: EntityBase::new(Self::declared_odata_type()),
            id: String::new(),
            name: String::new(),
        }
    }
}

orc_core::entity!(Employee, scope = "Contoso.Staff", fields = [id, name]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Manager {
    #[serde(flatten)]
    base: EntityBase,
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Reports", default)]
    reports: EntityList<Employee>,
}

impl Default for Manager {
    fn default() -> Self {
        Self {
            base: EntityBase::new(Self::declared_odata_type()),
            id: String::new(),
            name: String::new(),
            reports: EntityList::new(),
        }
    }
}

orc_core::entity!(Manager, scope = "Contoso.Staff", fields = [id, name, reports]);

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Sends requests with a ureq agent on the blocking pool.
struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .build()
            .new_agent();
        Self { agent }
    }
}

struct Outgoing {
    verb: HttpVerb,
    url: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    builder
}

fn call(agent: &ureq::Agent, out: Outgoing) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    let url = out.url.as_str();
    let headers = out.headers.as_slice();
    match out.verb {
        HttpVerb::Get => with_headers(agent.get(url), headers).call(),
        HttpVerb::Delete => with_headers(agent.delete(url), headers).call(),
        HttpVerb::Head => with_headers(agent.head(url), headers).call(),
        HttpVerb::Options => with_headers(agent.options(url), headers).call(),
        HttpVerb::Post => with_headers(agent.post(url), headers).send(&out.body[..]),
        HttpVerb::Put => with_headers(agent.put(url), headers).send(&out.body[..]),
        HttpVerb::Patch => with_headers(agent.patch(url), headers).send(&out.body[..]),
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn send(&self, request: &mut Request) -> Result<Response, TransportError> {
        let out = Outgoing {
            verb: request.verb(),
            url: request.url().to_url()?.to_string(),
            headers: request
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: request.content().map(|b| b.to_vec()).unwrap_or_default(),
        };
        let agent = self.agent.clone();

        let (status, headers, body) = tokio::task::spawn_blocking(move || -> Result<_, TransportError> {
            let mut response = call(&agent, out)?;
            let mut headers = HeaderMultimap::new();
            for (name, value) in response.headers() {
                headers.append(name.as_str(), value.to_str().unwrap_or_default());
            }
            let body = response.body_mut().read_to_vec()?;
            Ok((response.status().as_u16(), headers, body))
        })
        .await??;

        Ok(Response::new(status, headers, Cursor::new(body)))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Start the mock server on a random port and return its root URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn registry() -> TypeRegistry {
    TypeRegistry::new().with::<Employee>().with::<Manager>()
}

fn config(base_url: &str) -> ClientConfig {
    ClientConfig::new(base_url).with_product_name("orc-it")
}

fn client(base_url: &str) -> OrcClient {
    let executor = RequestExecutor::new(config(base_url), UreqTransport::new()).with_credentials(BearerCredentials::new("t0ken"));
    OrcClient::new(executor, registry())
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn collection_resolves_subtypes() {
    let client = client(&start_server());

    let employees = client.read_collection::<Employee>("Employees").await.unwrap();
    assert_eq!(employees.len(), 3);
    assert!(employees[0].is::<Employee>());
    assert!(employees[1].is::<Manager>());

    let manager = employees[1].downcast_ref::<Manager>().unwrap();
    assert_eq!(manager.name, "Grace");
    assert_eq!(manager.reports.len(), 1);
    assert!(!manager.reports.is_observed());
}

#[tokio::test]
async fn single_read_binds_parents() {
    let client = client(&start_server());

    let entity = client.read::<Employee>(&selector_path("Employees", "2")).await.unwrap();
    let manager = entity.downcast::<Manager>().unwrap();

    assert!(manager.reports.is_observed());
    let parent = manager.reports[0].base.parent().unwrap();
    assert_eq!(parent.owner(), manager.base.id());
    assert_eq!(parent.field(), "reports");
}

#[tokio::test]
async fn protocol_headers_reach_the_server() {
    let mut client = client(&start_server());
    client.add_custom_header("Prefer", "odata.maxpagesize=10");

    let raw = client.read_raw("echo-headers").await.unwrap();
    let headers: Value = serde_json::from_str(&raw).unwrap();

    assert!(headers["user-agent"].as_str().unwrap().starts_with("orc-it/"));
    assert_eq!(headers["user-agent"], headers["x-clientservice-clienttag"]);
    assert_eq!(headers["accept"], "application/json");
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(headers["odata-version"], "4.0");
    assert_eq!(headers["odata-maxversion"], "4.0");
    assert_eq!(headers["authorization"], "Bearer t0ken");
    assert_eq!(headers["prefer"], "odata.maxpagesize=10");
}

#[tokio::test]
async fn streamed_read_leaves_body_to_caller() {
    let client = client(&start_server());

    let mut response = client.read_stream("Employees").await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.buffered_payload().is_none());

    let mut raw = String::new();
    response
        .open_streamed_response()
        .unwrap()
        .read_to_string(&mut raw)
        .await
        .unwrap();
    response.close_streamed_response().unwrap();

    let body: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(body["value"].as_array().unwrap().len(), 3);
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn entity_lifecycle() {
    let client = client(&start_server());

    let draft = Employee {
        name: "Linus".to_string(),
        ..Employee::default()
    };
    let created = client.add("Employees", &draft).await.unwrap();
    let created = created.downcast::<Employee>().unwrap();
    assert_eq!(created.name, "Linus");
    assert!(!created.id.is_empty());
    let path = selector_path("Employees", &created.id);

    let renamed = Employee {
        name: "Linus T.".to_string(),
        ..Employee::default()
    };
    assert!(client.update(&path, &renamed).await.unwrap().is_none());

    let fetched = client.read::<Employee>(&path).await.unwrap();
    assert_eq!(fetched.downcast_ref::<Employee>().unwrap().name, "Linus T.");

    client.delete(&path).await.unwrap();

    let err = client.read::<Employee>(&path).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn multipart_upload_round_trip() {
    let base_url = start_server();
    let executor = RequestExecutor::new(config(&base_url), UreqTransport::new());

    let mut request = MultipartRequestBuilder::new().build(&[
        MultipartPart::new("note", "text/plain", "hello"),
        MultipartPart::new("meta", "application/json", r#"{"a":1}"#),
    ]);
    request.url_mut().append_path_component("Attachments");

    let mut response = executor.execute(&mut request).await.unwrap();
    let parts: Value = serde_json::from_slice(&response.payload().await.unwrap()).unwrap();
    assert_eq!(
        parts,
        json!([
            { "name": "note", "content_type": "text/plain", "content": "hello" },
            { "name": "meta", "content_type": "application/json", "content": "{\"a\":1}" },
        ])
    );

    client(&base_url)
        .add_multipart("Attachments", &[MultipartPart::new("only", "text/plain", "x")])
        .await
        .unwrap();
}

#[tokio::test]
async fn action_parameters_are_posted() {
    let client = client(&start_server());
    let mut parameters = BTreeMap::new();
    parameters.insert("Comment".to_string(), json!("on my way"));
    parameters.insert("SendResponse".to_string(), json!(true));

    let echoed = client.invoke_action("echo-body", &parameters).await.unwrap();
    assert_eq!(
        serde_json::from_str::<Value>(&echoed).unwrap(),
        json!({ "Comment": "on my way", "SendResponse": true })
    );
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_classification_over_http() {
    let client = client(&start_server());

    for code in [200u16, 204, 299] {
        let path = format!("status/{code}");
        assert!(client.read_raw(&path).await.is_ok(), "{code} should succeed");
    }

    for code in [404u16, 500] {
        let path = format!("status/{code}");
        let err = client.read_raw(&path).await.unwrap_err();
        assert_eq!(err.status(), Some(code));
        let message = err.to_string();
        assert!(message.contains(&format!("Response status: {code}")), "{message}");
        assert!(message.contains(&format!("Status{code}")), "{message}");
        assert_eq!(err.response().map(|r| r.status()), Some(code));
    }
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = closed.local_addr().unwrap();
    drop(closed);

    let err = client(&format!("http://{addr}")).read_raw("Employees").await.unwrap_err();
    assert!(matches!(err, OrcError::Transport(_)), "{err}");
}
