use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const WORKFLOW_KIND: &str = "Workflow";
pub const WORKFLOW_API_VERSION: &str = "argoproj.io/v1alpha1";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Workflows keyed by (namespace, name). Stored without type metadata.
pub type Db = Arc<RwLock<HashMap<(String, String), Value>>>;

#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    /// When set, every request must carry `Authorization: Bearer <token>`.
    pub token: Option<String>,
}

#[derive(Clone)]
struct AppState {
    db: Db,
    token: Option<Arc<str>>,
}

type Reply = (StatusCode, Json<Value>);

pub fn app(config: ServerConfig) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(HashMap::new())),
        token: config.token.map(Arc::from),
    };
    Router::new()
        .route(
            "/api/v1/workflows/{namespace}",
            get(list_server).post(create_server),
        )
        .route(
            "/api/v1/workflows/{namespace}/{name}",
            get(get_server).delete(delete_workflow),
        )
        .route(
            "/apis/argoproj.io/v1alpha1/namespaces/{namespace}/workflows",
            get(list_kube).post(create_kube),
        )
        .route(
            "/apis/argoproj.io/v1alpha1/namespaces/{namespace}/workflows/{name}",
            get(get_kube).delete(delete_workflow),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer))
        .with_state(state)
}

pub async fn run(listener: TcpListener, config: ServerConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app(config)).await
}

async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(expected) = &state.token {
        let presented = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(&**expected) {
            tracing::warn!(
                path = %request.uri().path(),
                "rejected request without valid bearer token"
            );
            return failure(StatusCode::UNAUTHORIZED, "token not valid").into_response();
        }
    }
    next.run(request).await
}

fn failure(status: StatusCode, message: &str) -> Reply {
    (
        status,
        Json(json!({ "code": status.as_u16(), "message": message })),
    )
}

// --- workflow server shape ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub workflow: Value,
    #[serde(default)]
    pub create_options: Option<CreateOptions>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateOptions {
    #[serde(default)]
    pub dry_run: Vec<String>,
}

#[derive(Deserialize)]
struct ServerListParams {
    #[serde(rename = "listOptions.labelSelector")]
    label_selector: Option<String>,
}

async fn create_server(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(input): Json<CreateRequest>,
) -> Result<Reply, Reply> {
    let dry_run = input
        .create_options
        .is_some_and(|o| o.dry_run.iter().any(|d| d == "All"));
    let created = admit(&state.db, &namespace, input.workflow, dry_run).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_server(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(params): Query<ServerListParams>,
) -> Result<Reply, Reply> {
    let items = select(&state.db, &namespace, params.label_selector.as_deref()).await?;
    // The workflow server renders an empty list as null.
    let items = if items.is_empty() {
        Value::Null
    } else {
        Value::Array(items)
    };
    Ok((StatusCode::OK, Json(json!({ "metadata": {}, "items": items }))))
}

async fn get_server(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Reply, Reply> {
    let wf = lookup(&state.db, &namespace, &name).await?;
    Ok((StatusCode::OK, Json(wf)))
}

// --- kubernetes-style shape ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KubeCreateParams {
    dry_run: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KubeListParams {
    label_selector: Option<String>,
}

async fn create_kube(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(params): Query<KubeCreateParams>,
    Json(mut resource): Json<Value>,
) -> Result<Reply, Reply> {
    let fields = resource
        .as_object_mut()
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "body must be an object"))?;
    let kind = fields.remove("kind");
    let api_version = fields.remove("apiVersion");
    if kind.as_ref().and_then(Value::as_str) != Some(WORKFLOW_KIND)
        || api_version.as_ref().and_then(Value::as_str) != Some(WORKFLOW_API_VERSION)
    {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            "Object 'Kind' is missing or does not match 'Workflow' argoproj.io/v1alpha1",
        ));
    }
    let dry_run = params.dry_run.as_deref() == Some("All");
    let created = admit(&state.db, &namespace, resource, dry_run).await?;
    Ok((StatusCode::CREATED, Json(with_type_meta(created))))
}

async fn list_kube(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(params): Query<KubeListParams>,
) -> Result<Reply, Reply> {
    let items: Vec<Value> = select(&state.db, &namespace, params.label_selector.as_deref())
        .await?
        .into_iter()
        .map(with_type_meta)
        .collect();
    Ok((
        StatusCode::OK,
        Json(json!({
            "kind": "WorkflowList",
            "apiVersion": WORKFLOW_API_VERSION,
            "metadata": {},
            "items": items,
        })),
    ))
}

async fn get_kube(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Reply, Reply> {
    let wf = lookup(&state.db, &namespace, &name).await?;
    Ok((StatusCode::OK, Json(with_type_meta(wf))))
}

// --- shared ---

async fn delete_workflow(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Reply, Reply> {
    state
        .db
        .write()
        .await
        .remove(&(namespace.clone(), name.clone()))
        .ok_or_else(|| not_found(&name))?;
    tracing::info!(%namespace, %name, "workflow deleted");
    Ok((StatusCode::OK, Json(json!({}))))
}

/// Validate and store a new workflow. A dry run is validated and named but
/// not stored and gets no uid.
async fn admit(
    db: &Db,
    namespace: &str,
    mut resource: Value,
    dry_run: bool,
) -> Result<Value, Reply> {
    let fields = resource
        .as_object_mut()
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "workflow must be an object"))?;
    fields.remove("kind");
    fields.remove("apiVersion");
    let metadata = fields
        .entry("metadata")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "metadata must be an object"))?;
    if metadata.contains_key("uid") {
        return Err(failure(StatusCode::BAD_REQUEST, "metadata.uid must not be set"));
    }

    let name = match (
        metadata.get("name").and_then(Value::as_str),
        metadata.get("generateName").and_then(Value::as_str),
    ) {
        (Some(name), _) if !name.is_empty() => name.to_string(),
        (_, Some(prefix)) => format!("{prefix}{}", &Uuid::new_v4().simple().to_string()[..5]),
        _ => {
            return Err(failure(
                StatusCode::BAD_REQUEST,
                "metadata.name or metadata.generateName is required",
            ))
        }
    };
    metadata.insert("name".to_string(), json!(name));
    metadata.insert("namespace".to_string(), json!(namespace));

    let key = (namespace.to_string(), name.clone());
    let mut workflows = db.write().await;
    if workflows.contains_key(&key) {
        return Err(failure(
            StatusCode::CONFLICT,
            &format!("workflows.argoproj.io \"{name}\" already exists"),
        ));
    }
    if dry_run {
        return Ok(resource);
    }

    metadata.insert("uid".to_string(), json!(Uuid::new_v4().to_string()));
    metadata.insert(
        "creationTimestamp".to_string(),
        json!(Utc::now().format(TIMESTAMP_FORMAT).to_string()),
    );
    fields.insert("status".to_string(), json!({ "phase": "Pending" }));
    workflows.insert(key, resource.clone());
    tracing::info!(%namespace, %name, "workflow created");
    Ok(resource)
}

async fn lookup(db: &Db, namespace: &str, name: &str) -> Result<Value, Reply> {
    db.read()
        .await
        .get(&(namespace.to_string(), name.to_string()))
        .cloned()
        .ok_or_else(|| not_found(name))
}

async fn select(db: &Db, namespace: &str, selector: Option<&str>) -> Result<Vec<Value>, Reply> {
    let requirements = parse_selector(selector.unwrap_or_default())?;
    let workflows = db.read().await;
    let mut items: Vec<Value> = workflows
        .iter()
        .filter(|((ns, _), wf)| ns == namespace && matches_labels(wf, &requirements))
        .map(|(_, wf)| wf.clone())
        .collect();
    items.sort_by(|a, b| {
        a["metadata"]["name"]
            .as_str()
            .cmp(&b["metadata"]["name"].as_str())
    });
    Ok(items)
}

/// Equality-based selectors only: `a=b,c=d`.
fn parse_selector(selector: &str) -> Result<Vec<(String, String)>, Reply> {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| {
            term.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim_start_matches('=').trim().to_string()))
                .ok_or_else(|| {
                    failure(
                        StatusCode::BAD_REQUEST,
                        &format!("unsupported label selector term {term:?}"),
                    )
                })
        })
        .collect()
}

fn matches_labels(wf: &Value, requirements: &[(String, String)]) -> bool {
    let labels = &wf["metadata"]["labels"];
    requirements
        .iter()
        .all(|(k, v)| labels.get(k).and_then(Value::as_str) == Some(v.as_str()))
}

fn with_type_meta(mut wf: Value) -> Value {
    if let Some(fields) = wf.as_object_mut() {
        fields.insert("kind".to_string(), json!(WORKFLOW_KIND));
        fields.insert("apiVersion".to_string(), json!(WORKFLOW_API_VERSION));
    }
    wf
}

fn not_found(name: &str) -> Reply {
    failure(
        StatusCode::NOT_FOUND,
        &format!("workflows.argoproj.io \"{name}\" not found"),
    )
}
