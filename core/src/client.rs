//! Typed HTTP+JSON client.
//!
//! # Design
//! `ApiClient` is split the same way a single call is: `build_request`
//! turns arguments into a plain `HttpRequest` without I/O, `call` hands it to
//! the `Transport` for one round trip, and `decode_typed` checks the status
//! and decodes the body. Each half is usable on its own, which keeps request
//! construction and response classification testable without a server.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::codec::{Codec, JsonCodec};
use crate::config::Endpoint;
use crate::error::{ApiError, ClientError, DecodeError, EncodeError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};

/// Target for `tracing` wire dumps when debug logging is enabled.
pub const WIRE_LOG_TARGET: &str = "argo_client::wire";

pub struct ApiClient<T = UreqTransport> {
    endpoint: Endpoint,
    token: Option<String>,
    codec: Arc<dyn Codec>,
    transport: T,
}

impl ApiClient<UreqTransport> {
    /// Client for `endpoint` using the default ureq transport and JSON codec.
    pub fn configure(endpoint: Endpoint) -> Self {
        let transport = UreqTransport::new(&endpoint);
        Self::with_transport(endpoint, transport)
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(endpoint: Endpoint, transport: T) -> Self {
        Self {
            endpoint,
            token: None,
            codec: Arc::new(JsonCodec),
            transport,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Replace the bearer token used by subsequent requests. An empty token
    /// clears it.
    pub fn set_auth_token(&mut self, token: impl Into<String>) {
        let token = token.into();
        self.token = if token.is_empty() { None } else { Some(token) };
    }

    pub fn set_codec(&mut self, codec: Arc<dyn Codec>) {
        self.codec = codec;
    }

    /// Build the request `call` would send.
    ///
    /// Header order: endpoint defaults, per-call headers, `Authorization`,
    /// then content negotiation headers when a body is present.
    pub fn build_request(
        &self,
        path: &str,
        method: HttpMethod,
        query: &[(String, String)],
        headers: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<HttpRequest, ClientError> {
        let mut all_headers = self.endpoint.default_headers.clone();
        all_headers.extend_from_slice(headers);
        if let Some(token) = &self.token {
            all_headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        let body = match body {
            Some(value) => {
                all_headers.push(("Content-Type".to_string(), "application/json".to_string()));
                all_headers.push(("Accept".to_string(), "application/json".to_string()));
                Some(self.codec.encode(value)?)
            }
            None => None,
        };

        Ok(HttpRequest {
            method,
            url: self.endpoint.url(path),
            query: query.to_vec(),
            headers: all_headers,
            body,
        })
    }

    /// Perform one round trip. Any status is returned as data; only
    /// transport failures are errors.
    pub fn call(
        &self,
        path: &str,
        method: HttpMethod,
        query: &[(String, String)],
        headers: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<HttpResponse, ClientError> {
        let request = self.build_request(path, method, query, headers, body)?;
        self.send(&request)
    }

    /// `call` with a typed body, serialized to a JSON value first.
    pub fn call_json<B: Serialize>(
        &self,
        path: &str,
        method: HttpMethod,
        query: &[(String, String)],
        body: &B,
    ) -> Result<HttpResponse, ClientError> {
        let value = serde_json::to_value(body).map_err(EncodeError::from)?;
        self.call(path, method, query, &[], Some(&value))
    }

    pub fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ClientError> {
        tracing::trace!(method = %request.method, url = %request.url, "dispatching request");
        if self.endpoint.debug_logging {
            log_request(request);
        }
        let response = self.transport.execute(request)?;
        if self.endpoint.debug_logging {
            log_response(&response);
        }
        Ok(response)
    }

    /// Check the status, then decode the body into `R`.
    ///
    /// The status check happens first: a body is never decoded for an
    /// unexpected status.
    pub fn decode_typed<R: DeserializeOwned>(
        &self,
        response: &HttpResponse,
        expected_status: u16,
    ) -> Result<R, ClientError> {
        check_status(response, expected_status)?;
        let value = self.codec.decode(&response.body)?;
        let typed = serde_json::from_value(value).map_err(DecodeError::from)?;
        Ok(typed)
    }

    /// Check the status only; the body is ignored.
    pub fn decode_empty(
        &self,
        response: &HttpResponse,
        expected_status: u16,
    ) -> Result<(), ClientError> {
        check_status(response, expected_status)?;
        Ok(())
    }
}

fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == expected {
        return Ok(());
    }
    Err(ApiError {
        status: response.status,
        expected,
        body: response.body.clone(),
        headers: response.headers.clone(),
    })
}

fn log_request(request: &HttpRequest) {
    let headers: Vec<(&str, &str)> = request
        .headers
        .iter()
        .map(|(k, v)| {
            if k.eq_ignore_ascii_case("authorization") {
                (k.as_str(), "Bearer <redacted>")
            } else {
                (k.as_str(), v.as_str())
            }
        })
        .collect();
    let body = request
        .body
        .as_deref()
        .map(String::from_utf8_lossy)
        .unwrap_or_default();
    tracing::debug!(
        target: WIRE_LOG_TARGET,
        method = %request.method,
        url = %request.url,
        query = ?request.query,
        headers = ?headers,
        %body,
        "request"
    );
}

fn log_response(response: &HttpResponse) {
    tracing::debug!(
        target: WIRE_LOG_TARGET,
        status = response.status,
        headers = ?response.headers,
        body = %response.body_text(),
        "response"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TransportError, TransportErrorKind};
    use crate::transport::MockTransport;
    use crate::types::Workflow;
    use serde_json::json;
    use std::io::Write;
    use std::sync::Mutex;

    fn endpoint() -> Endpoint {
        Endpoint::new("http://localhost:2746")
    }

    fn client_returning(status: u16, body: &str) -> ApiClient<MockTransport> {
        let body = body.as_bytes().to_vec();
        let mut transport = MockTransport::new();
        transport.expect_execute().times(1).returning(move |_| {
            Ok(HttpResponse {
                status,
                headers: vec![("content-type".to_string(), "application/json".to_string())],
                body: body.clone(),
            })
        });
        ApiClient::with_transport(endpoint(), transport)
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn build_get_request_has_no_body_or_auth() {
        let client = ApiClient::with_transport(endpoint(), MockTransport::new());
        let req = client
            .build_request("/api/v1/workflows/argo", HttpMethod::Get, &[], &[], None)
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:2746/api/v1/workflows/argo");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn bearer_token_is_attached() {
        let mut client = ApiClient::with_transport(endpoint(), MockTransport::new());
        client.set_auth_token("s3cret");
        let req = client
            .build_request("/x", HttpMethod::Get, &[], &[], None)
            .unwrap();
        assert_eq!(req.header("authorization"), Some("Bearer s3cret"));

        client.set_auth_token("rotated");
        let req = client
            .build_request("/x", HttpMethod::Get, &[], &[], None)
            .unwrap();
        assert_eq!(req.header("Authorization"), Some("Bearer rotated"));

        client.set_auth_token("");
        let req = client
            .build_request("/x", HttpMethod::Get, &[], &[], None)
            .unwrap();
        assert_eq!(req.header("Authorization"), None);
    }

    #[test]
    fn headers_are_ordered_defaults_then_call_then_auth() {
        let mut endpoint = endpoint();
        endpoint.default_headers = vec![("X-Default".to_string(), "d".to_string())];
        let mut client = ApiClient::with_transport(endpoint, MockTransport::new());
        client.set_auth_token("t");
        let req = client
            .build_request(
                "/x",
                HttpMethod::Post,
                &[("dryRun".to_string(), "All".to_string())],
                &[("X-Call".to_string(), "c".to_string())],
                Some(&json!({"a": 1})),
            )
            .unwrap();
        let names: Vec<&str> = req.headers.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["X-Default", "X-Call", "Authorization", "Content-Type", "Accept"]
        );
        assert_eq!(req.query, vec![("dryRun".to_string(), "All".to_string())]);
        assert_eq!(req.body.as_deref(), Some(br#"{"a":1}"#.as_slice()));
    }

    #[test]
    fn body_is_encoded_with_active_codec() {
        struct Fixed;
        impl Codec for Fixed {
            fn encode(&self, _: &Value) -> Result<Vec<u8>, EncodeError> {
                Ok(b"fixed".to_vec())
            }
            fn decode(&self, _: &[u8]) -> Result<Value, DecodeError> {
                Ok(json!({"metadata": {"uid": "from-codec"}, "spec": {}}))
            }
        }

        let mut client = client_returning(201, "ignored");
        client.set_codec(Arc::new(Fixed));
        let req = client
            .build_request("/x", HttpMethod::Post, &[], &[], Some(&json!({})))
            .unwrap();
        assert_eq!(req.body.as_deref(), Some(b"fixed".as_slice()));

        let resp = client.call("/x", HttpMethod::Post, &[], &[], Some(&json!({}))).unwrap();
        let wf: Workflow = client.decode_typed(&resp, 201).unwrap();
        assert_eq!(wf.metadata.uid.as_deref(), Some("from-codec"));
    }

    #[test]
    fn created_resource_decodes_with_uid() {
        let client = client_returning(
            201,
            r#"{"metadata":{"name":"hello-x7k2q","namespace":"argo","uid":"abc-123","creationTimestamp":"2024-03-01T12:30:45Z"},"spec":{"entrypoint":"main"}}"#,
        );
        let resp = client
            .call("/api/v1/workflows/argo", HttpMethod::Post, &[], &[], Some(&json!({})))
            .unwrap();
        let wf: Workflow = client.decode_typed(&resp, 201).unwrap();
        assert_eq!(wf.metadata.uid.as_deref(), Some("abc-123"));
        assert_eq!(
            wf.metadata
                .creation_timestamp
                .unwrap()
                .to_wire_string()
                .unwrap(),
            "2024-03-01T12:30:45Z"
        );
    }

    #[test]
    fn server_error_is_api_error_regardless_of_body() {
        for body in ["internal error", r#"{"metadata":{"uid":"abc-123"}}"#, ""] {
            let client = client_returning(500, body);
            let resp = client.call("/x", HttpMethod::Post, &[], &[], None).unwrap();
            let err = client.decode_typed::<Workflow>(&resp, 201).unwrap_err();
            match err {
                ClientError::Api(api) => {
                    assert_eq!(api.status, 500);
                    assert_eq!(api.expected, 201);
                    assert_eq!(api.body, body.as_bytes());
                    assert_eq!(api.headers.len(), 1);
                }
                other => panic!("expected ApiError, got {other:?}"),
            }
        }
    }

    #[test]
    fn unexpected_success_code_is_still_an_api_error() {
        let client = ApiClient::with_transport(endpoint(), MockTransport::new());
        let err = client
            .decode_typed::<Workflow>(&response(200, "{}"), 201)
            .unwrap_err();
        assert_eq!(err.status(), Some(200));
    }

    #[test]
    fn not_found_is_flagged() {
        let client = ApiClient::with_transport(endpoint(), MockTransport::new());
        let err = client.decode_empty(&response(404, ""), 200).unwrap_err();
        match err {
            ClientError::Api(api) => assert!(api.is_not_found()),
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[test]
    fn transport_failure_is_not_an_api_error() {
        let mut transport = MockTransport::new();
        transport.expect_execute().times(1).returning(|_| {
            Err(TransportError::new(
                TransportErrorKind::Connect,
                "connection refused",
            ))
        });
        let client = ApiClient::with_transport(endpoint(), transport);
        let err = client.call("/x", HttpMethod::Get, &[], &[], None).unwrap_err();
        match err {
            ClientError::Transport(t) => assert_eq!(t.kind, TransportErrorKind::Connect),
            other => panic!("expected TransportError, got {other:?}"),
        }
    }

    #[test]
    fn bad_json_is_decode_error() {
        let client = ApiClient::with_transport(endpoint(), MockTransport::new());
        let err = client
            .decode_typed::<Workflow>(&response(200, "not json"), 200)
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(DecodeError::Json(_))));
    }

    #[test]
    fn malformed_timestamp_is_decode_error() {
        let client = ApiClient::with_transport(endpoint(), MockTransport::new());
        let body =
            r#"{"metadata":{"uid":"abc","creationTimestamp":"2024-03-01 12:30:45"},"spec":{}}"#;
        let err = client
            .decode_typed::<Workflow>(&response(201, body), 201)
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
        assert!(err.to_string().contains("2024-03-01 12:30:45"));
    }

    #[test]
    fn call_json_serializes_typed_body() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req| {
                req.method == HttpMethod::Put
                    && req.body.as_deref() == Some(br#"{"name":"wf"}"#.as_slice())
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse {
                    status: 200,
                    headers: Vec::new(),
                    body: Vec::new(),
                })
            });
        let client = ApiClient::with_transport(endpoint(), transport);
        let resp = client
            .call_json("/x", HttpMethod::Put, &[], &json!({"name": "wf"}))
            .unwrap();
        assert_eq!(resp.status, 200);
    }

    /// Shared buffer the fmt subscriber writes into.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn with_captured_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        let text = String::from_utf8_lossy(&logs.0.lock().unwrap()).into_owned();
        (out, text)
    }

    fn logging_client(debug_logging: bool, canned: &HttpResponse) -> ApiClient<MockTransport> {
        let mut endpoint = endpoint();
        endpoint.debug_logging = debug_logging;
        let canned = canned.clone();
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(move |_| Ok(canned.clone()));
        let mut client = ApiClient::with_transport(endpoint, transport);
        client.set_auth_token("s3cret-token");
        client
    }

    #[test]
    fn debug_logging_dumps_wire_without_the_token() {
        let canned = HttpResponse {
            status: 201,
            headers: vec![("x-request-id".to_string(), "req-42".to_string())],
            body: br#"{"metadata":{"uid":"abc-123"}}"#.to_vec(),
        };
        let body = json!({"metadata": {"generateName": "hello-"}});
        let path = "/api/v1/workflows/argo";

        let (logged_response, logged) = with_captured_logs(|| {
            logging_client(true, &canned)
                .call(path, HttpMethod::Post, &[], &[], Some(&body))
                .unwrap()
        });
        let (quiet_response, quiet) = with_captured_logs(|| {
            logging_client(false, &canned)
                .call(path, HttpMethod::Post, &[], &[], Some(&body))
                .unwrap()
        });

        assert_eq!(logged_response, canned);
        assert_eq!(quiet_response, logged_response);

        assert!(logged.contains(WIRE_LOG_TARGET), "{logged}");
        assert!(logged.contains("Bearer <redacted>"), "{logged}");
        assert!(logged.contains("generateName"), "{logged}");
        assert!(logged.contains("req-42"), "{logged}");
        assert!(logged.contains("abc-123"), "{logged}");
        assert!(!logged.contains("s3cret-token"), "{logged}");

        assert!(!quiet.contains(WIRE_LOG_TARGET), "{quiet}");
        assert!(!quiet.contains("s3cret-token"), "{quiet}");
    }

    #[test]
    fn codec_rewrites_values_but_not_timestamp_policy() {
        let body = r#"{"metadata":{"creationTimestamp":"2024-03-01 12:30:45"},"spec":{}}"#;
        let client = ApiClient::with_transport(endpoint(), MockTransport::new());
        let err = client
            .decode_typed::<Workflow>(&response(200, body), 200)
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));

        /// Rewrites space-separated timestamps into the wire layout.
        struct LegacyTimestamps;
        impl Codec for LegacyTimestamps {
            fn encode(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
                JsonCodec.encode(value)
            }
            fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
                let mut value = JsonCodec.decode(bytes)?;
                let field = value.pointer_mut("/metadata/creationTimestamp");
                if let Some(Value::String(ts)) = field {
                    *ts = format!("{}Z", ts.replacen(' ', "T", 1));
                }
                Ok(value)
            }
        }

        let mut client = ApiClient::with_transport(endpoint(), MockTransport::new());
        client.set_codec(Arc::new(LegacyTimestamps));
        let wf: Workflow = client.decode_typed(&response(200, body), 200).unwrap();
        assert_eq!(
            wf.metadata.creation_timestamp.map(|t| t.epoch_millis()),
            Some(1_709_296_245_000)
        );
    }
}
