//! Endpoint descriptor and client builder.
//!
//! `ClientBuilder` collects settings and yields an `ApiClient` whose
//! `Endpoint` never changes afterwards. Only the bearer token and the codec
//! can be replaced later, and both need `&mut ApiClient`.

use std::sync::Arc;
use std::time::Duration;

use crate::client::ApiClient;
use crate::codec::{Codec, JsonCodec};
use crate::transport::{Transport, UreqTransport};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest response body read before the call fails. Large workflow lists
/// easily pass the HTTP library's own 10 MB default.
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 256 * 1024 * 1024;

/// Where and how requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub base_path: String,
    pub verify_ssl: bool,
    pub debug_logging: bool,
    pub default_headers: Vec<(String, String)>,
    pub timeout: Duration,
    pub max_response_bytes: u64,
}

impl Endpoint {
    pub fn new(base_path: &str) -> Self {
        Self {
            base_path: base_path.trim_end_matches('/').to_string(),
            verify_ssl: true,
            debug_logging: false,
            default_headers: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Join a server-relative path onto the base path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_path, path.trim_start_matches('/'))
    }
}

pub struct ClientBuilder {
    endpoint: Endpoint,
    token: Option<String>,
    codec: Arc<dyn Codec>,
}

impl ClientBuilder {
    pub fn new(base_path: &str) -> Self {
        Self {
            endpoint: Endpoint::new(base_path),
            token: None,
            codec: Arc::new(JsonCodec),
        }
    }

    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.endpoint.verify_ssl = verify;
        self
    }

    pub fn debug_logging(mut self, enabled: bool) -> Self {
        self.endpoint.debug_logging = enabled;
        self
    }

    /// Add a header sent with every request. Repeated names are all sent.
    pub fn default_header(mut self, name: &str, value: &str) -> Self {
        self.endpoint
            .default_headers
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn default_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.endpoint
            .default_headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.endpoint.timeout = timeout;
        self
    }

    pub fn max_response_bytes(mut self, limit: u64) -> Self {
        self.endpoint.max_response_bytes = limit;
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Finish with the default ureq transport, configured from the endpoint.
    pub fn build(self) -> ApiClient {
        let transport = UreqTransport::new(&self.endpoint);
        self.build_with_transport(transport)
    }

    pub fn build_with_transport<T: Transport>(self, transport: T) -> ApiClient<T> {
        let mut client = ApiClient::with_transport(self.endpoint, transport);
        client.set_codec(self.codec);
        if let Some(token) = self.token {
            client.set_auth_token(token);
        }
        client
    }
}
