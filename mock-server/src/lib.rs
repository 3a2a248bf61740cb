//! OData-flavoured mock service for exercising the client runtime over HTTP.
//!
//! Routes:
//! - `GET /Employees` → `{ "value": [...] }` with mixed `@odata.type`s
//! - `POST /Employees` → 201 with the stored entity
//! - `GET|PATCH|DELETE /Employees('{id}')`
//! - `POST /Attachments` → summary of the multipart parts received
//! - `GET /echo-headers` → request headers as a JSON object
//! - `POST /echo-body` → request body echoed back
//! - `GET /status/{code}` → an OData error body with that status

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

pub const NAMESPACE: &str = "Contoso.Staff";
pub const EMPLOYEE_TYPE: &str = "#Contoso.Staff.Employee";
pub const MANAGER_TYPE: &str = "#Contoso.Staff.Manager";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    #[serde(rename = "@odata.type", default = "default_type")]
    pub odata_type: String,
    #[serde(rename = "Id", default)]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Reports", default, skip_serializing_if = "Vec::is_empty")]
    pub reports: Vec<Employee>,
}

fn default_type() -> String {
    EMPLOYEE_TYPE.to_string()
}

#[derive(Deserialize)]
pub struct UpdateEmployee {
    #[serde(rename = "Name")]
    pub name: Option<String>,
}

/// One part of a received multipart body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartSummary {
    pub name: String,
    pub content_type: String,
    pub content: String,
}

pub type Db = Arc<RwLock<HashMap<String, Employee>>>;

/// Employees every fresh app starts with.
pub fn seed() -> Vec<Employee> {
    let report = Employee {
        odata_type: EMPLOYEE_TYPE.to_string(),
        id: "3".to_string(),
        name: "Alan".to_string(),
        reports: Vec::new(),
    };
    vec![
        Employee {
            odata_type: EMPLOYEE_TYPE.to_string(),
            id: "1".to_string(),
            name: "Ada".to_string(),
            reports: Vec::new(),
        },
        Employee {
            odata_type: MANAGER_TYPE.to_string(),
            id: "2".to_string(),
            name: "Grace".to_string(),
            reports: vec![report.clone()],
        },
        report,
    ]
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(
        seed().into_iter().map(|employee| (employee.id.clone(), employee)).collect(),
    ));
    Router::new()
        .route("/Employees", get(list_employees).post(create_employee))
        .route(
            "/{selector}",
            get(get_employee).patch(update_employee).delete(delete_employee),
        )
        .route("/Attachments", post(upload_attachments))
        .route("/echo-headers", get(echo_headers))
        .route("/echo-body", post(echo_body))
        .route("/status/{code}", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock OData service listening");
    }
    axum::serve(listener, app()).await
}

/// Key inside an `Employees('{id}')` selector segment.
pub fn employee_key(selector: &str) -> Option<&str> {
    selector.strip_prefix("Employees('")?.strip_suffix("')")
}

async fn list_employees(State(db): State<Db>) -> Json<Value> {
    let employees = db.read().await;
    let mut value: Vec<Employee> = employees.values().cloned().collect();
    value.sort_by(|a, b| a.id.cmp(&b.id));
    Json(json!({
        "@odata.context": "$metadata#Employees",
        "value": value,
    }))
}

async fn create_employee(State(db): State<Db>, Json(mut input): Json<Employee>) -> (StatusCode, Json<Employee>) {
    input.id = Uuid::new_v4().to_string();
    debug!(id = %input.id, odata_type = %input.odata_type, "created employee");
    db.write().await.insert(input.id.clone(), input.clone());
    (StatusCode::CREATED, Json(input))
}

async fn get_employee(State(db): State<Db>, Path(selector): Path<String>) -> Result<Json<Employee>, StatusCode> {
    let id = employee_key(&selector).ok_or(StatusCode::NOT_FOUND)?;
    let employees = db.read().await;
    employees.get(id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_employee(
    State(db): State<Db>,
    Path(selector): Path<String>,
    Json(input): Json<UpdateEmployee>,
) -> StatusCode {
    let Some(id) = employee_key(&selector) else {
        return StatusCode::NOT_FOUND;
    };
    let mut employees = db.write().await;
    let Some(employee) = employees.get_mut(id) else {
        return StatusCode::NOT_FOUND;
    };
    if let Some(name) = input.name {
        employee.name = name;
    }
    StatusCode::NO_CONTENT
}

async fn delete_employee(State(db): State<Db>, Path(selector): Path<String>) -> StatusCode {
    let Some(id) = employee_key(&selector) else {
        return StatusCode::NOT_FOUND;
    };
    let mut employees = db.write().await;
    employees
        .remove(id)
        .map(|_| StatusCode::NO_CONTENT)
        .unwrap_or(StatusCode::NOT_FOUND)
}

async fn upload_attachments(headers: HeaderMap, body: Bytes) -> Result<Json<Vec<PartSummary>>, (StatusCode, String)> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let boundary = content_type
        .strip_prefix("multipart/form-data; boundary=")
        .filter(|b| !b.is_empty())
        .ok_or((StatusCode::UNSUPPORTED_MEDIA_TYPE, format!("not multipart: {content_type}")))?;

    let parts = parse_multipart(&String::from_utf8_lossy(&body), boundary)
        .ok_or((StatusCode::BAD_REQUEST, "malformed multipart body".to_string()))?;
    debug!(parts = parts.len(), "received multipart upload");
    Ok(Json(parts))
}

/// Split a text multipart body framed with `boundary`. Returns `None` when
/// the closing delimiter is missing or a part lacks its headers.
pub fn parse_multipart(body: &str, boundary: &str) -> Option<Vec<PartSummary>> {
    let delimiter = format!("--{boundary}");
    let closing = format!("{delimiter}--");
    let body = body.strip_suffix(&closing)?;

    let mut parts = Vec::new();
    for chunk in body.split(&delimiter).skip(1) {
        let chunk = chunk.strip_prefix("\r\n")?;
        let (head, content) = chunk.split_once("\r\n\r\n")?;
        let content = content.strip_suffix("\r\n")?;

        let mut name = None;
        let mut content_type = None;
        for line in head.split("\r\n") {
            let (key, value) = line.split_once(':')?;
            let value = value.trim();
            if key.eq_ignore_ascii_case("Content-Disposition") {
                name = value.split(';').find_map(|p| p.trim().strip_prefix("name=")).map(str::to_string);
            } else if key.eq_ignore_ascii_case("Content-Type") {
                content_type = Some(value.to_string());
            }
        }
        parts.push(PartSummary {
            name: name?,
            content_type: content_type?,
            content: content.to_string(),
        });
    }
    Some(parts)
}

async fn echo_headers(headers: HeaderMap) -> Json<HashMap<String, String>> {
    Json(
        headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.to_str().unwrap_or_default().to_string()))
            .collect(),
    )
}

async fn echo_body(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    ([(header::CONTENT_TYPE, content_type)], body)
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((
        status,
        Json(json!({
            "error": { "code": format!("Status{code}"), "message": status.canonical_reason().unwrap_or("unknown") }
        })),
    ))
}
