//! Typed workflow operations against either server shape.
//!
//! The workflow server wraps the resource in a request envelope and infers
//! its type from the URL. The Kubernetes-style API server takes the bare
//! resource and needs `kind` and `apiVersion` in the body. Which one applies
//! is a property of the [`Destination`], never of the payload type, so the
//! same `Workflow` value can be sent to either.

use serde_json::{Map, Value};

use crate::client::ApiClient;
use crate::error::{ClientError, EncodeError};
use crate::http::HttpMethod;
use crate::transport::Transport;
use crate::types::{Workflow, WorkflowList};

/// Status the servers answer a successful create with.
pub const CREATED: u16 = 201;
pub const OK: u16 = 200;

/// Kubernetes type metadata merged into bodies at the serialization boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMeta {
    pub kind: &'static str,
    pub api_version: &'static str,
}

pub const WORKFLOW_TYPE_META: TypeMeta = TypeMeta {
    kind: "Workflow",
    api_version: "argoproj.io/v1alpha1",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// The workflow server's own REST API (`/api/v1/workflows/...`).
    WorkflowServer,
    /// A Kubernetes-style API server (`/apis/argoproj.io/v1alpha1/...`).
    KubernetesApi,
}

impl Destination {
    pub fn collection_path(&self, namespace: &str) -> String {
        match self {
            Destination::WorkflowServer => format!("/api/v1/workflows/{namespace}"),
            Destination::KubernetesApi => format!(
                "/apis/{}/namespaces/{namespace}/workflows",
                WORKFLOW_TYPE_META.api_version
            ),
        }
    }

    pub fn item_path(&self, namespace: &str, name: &str) -> String {
        format!("{}/{name}", self.collection_path(namespace))
    }

    pub fn injects_type_meta(&self) -> bool {
        matches!(self, Destination::KubernetesApi)
    }

    /// Body for a create request.
    pub fn create_body(
        &self,
        workflow: &Workflow,
        options: &CreateOptions,
    ) -> Result<Value, EncodeError> {
        let resource = serde_json::to_value(workflow)?;
        match self {
            Destination::WorkflowServer => {
                let mut envelope = Map::new();
                envelope.insert("workflow".to_string(), resource);
                if options.dry_run {
                    envelope.insert(
                        "createOptions".to_string(),
                        serde_json::json!({ "dryRun": ["All"] }),
                    );
                }
                Ok(Value::Object(envelope))
            }
            Destination::KubernetesApi => inject_type_meta(resource, WORKFLOW_TYPE_META),
        }
    }

    /// Query parameters for a create request.
    pub fn create_query(&self, options: &CreateOptions) -> Vec<(String, String)> {
        match self {
            Destination::KubernetesApi if options.dry_run => {
                vec![("dryRun".to_string(), "All".to_string())]
            }
            _ => Vec::new(),
        }
    }

    pub fn list_query(&self, options: &ListOptions) -> Vec<(String, String)> {
        let key = match self {
            Destination::WorkflowServer => "listOptions.labelSelector",
            Destination::KubernetesApi => "labelSelector",
        };
        options
            .label_selector
            .iter()
            .map(|selector| (key.to_string(), selector.clone()))
            .collect()
    }
}

/// Shallow-merge `kind` and `apiVersion` into a serialized resource.
pub fn inject_type_meta(value: Value, meta: TypeMeta) -> Result<Value, EncodeError> {
    match value {
        Value::Object(mut fields) => {
            fields.insert("kind".to_string(), Value::String(meta.kind.to_string()));
            fields.insert(
                "apiVersion".to_string(),
                Value::String(meta.api_version.to_string()),
            );
            Ok(Value::Object(fields))
        }
        other => Err(EncodeError::NotAnObject {
            found: json_type_name(&other),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// Validate on the server without persisting. The response carries no uid.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub label_selector: Option<String>,
}

impl ListOptions {
    pub fn with_label_selector(selector: &str) -> Self {
        Self {
            label_selector: Some(selector.to_string()),
        }
    }
}

/// Workflow operations bound to one client and one destination.
pub struct WorkflowApi<'a, T> {
    client: &'a ApiClient<T>,
    destination: Destination,
}

impl<'a, T: Transport> WorkflowApi<'a, T> {
    pub fn new(client: &'a ApiClient<T>, destination: Destination) -> Self {
        Self {
            client,
            destination,
        }
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    /// Create `workflow` and return the server's copy, uid included.
    pub fn submit(&self, namespace: &str, workflow: &Workflow) -> Result<Workflow, ClientError> {
        self.create(namespace, workflow, &CreateOptions::default())
    }

    pub fn create(
        &self,
        namespace: &str,
        workflow: &Workflow,
        options: &CreateOptions,
    ) -> Result<Workflow, ClientError> {
        let body = self.destination.create_body(workflow, options)?;
        let query = self.destination.create_query(options);
        let response = self.client.call(
            &self.destination.collection_path(namespace),
            HttpMethod::Post,
            &query,
            &[],
            Some(&body),
        )?;
        let created: Workflow = self.client.decode_typed(&response, CREATED)?;
        tracing::debug!(
            namespace,
            name = created.metadata.name.as_deref().unwrap_or_default(),
            uid = created.metadata.uid.as_deref().unwrap_or_default(),
            dry_run = options.dry_run,
            "workflow created"
        );
        Ok(created)
    }

    pub fn list(
        &self,
        namespace: &str,
        options: &ListOptions,
    ) -> Result<WorkflowList, ClientError> {
        let response = self.client.call(
            &self.destination.collection_path(namespace),
            HttpMethod::Get,
            &self.destination.list_query(options),
            &[],
            None,
        )?;
        self.client.decode_typed(&response, OK)
    }

    pub fn get(&self, namespace: &str, name: &str) -> Result<Workflow, ClientError> {
        let response = self.client.call(
            &self.destination.item_path(namespace, name),
            HttpMethod::Get,
            &[],
            &[],
            None,
        )?;
        self.client.decode_typed(&response, OK)
    }

    pub fn delete(&self, namespace: &str, name: &str) -> Result<(), ClientError> {
        let response = self.client.call(
            &self.destination.item_path(namespace, name),
            HttpMethod::Delete,
            &[],
            &[],
            None,
        )?;
        self.client.decode_empty(&response, OK)
    }
}
