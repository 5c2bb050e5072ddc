//! Typed REST client for the Argo Workflows API.
//!
//! # Overview
//! `ApiClient` issues JSON requests against a base URL with optional bearer
//! authentication, a swappable `Codec`, and a `Transport` that performs one
//! blocking round trip per call. `WorkflowApi` layers typed workflow
//! operations on top and targets either the workflow server or a
//! Kubernetes-style API server.
//!
//! # Design
//! - Requests and responses are plain data (`HttpRequest`, `HttpResponse`);
//!   only the `Transport` touches the network.
//! - Status interpretation is the caller's: each typed operation names the
//!   status it expects and anything else is an `ApiError`.
//! - Server timestamps use a strict wire format handled by `TimeValue`.
//! - The client never reads the environment; `Settings` does that for
//!   callers who want it.

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod settings;
pub mod time;
pub mod transport;
pub mod types;
pub mod workflows;

pub use client::ApiClient;
pub use codec::{Codec, JsonCodec, PrettyJsonCodec};
pub use config::{ClientBuilder, Endpoint};
pub use error::{
    ApiError, ClientError, DecodeError, EncodeError, TransportError, TransportErrorKind,
};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use settings::{Settings, SettingsError};
pub use time::TimeValue;
pub use transport::{Transport, UreqTransport};
pub use types::{ObjectMeta, Workflow, WorkflowList, WorkflowSpec, WorkflowStatus};
pub use workflows::{CreateOptions, Destination, ListOptions, WorkflowApi};
