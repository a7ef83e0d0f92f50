//! HTTP clients and the generic forwarding operation.

use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use normgate_error::UpstreamError;

/// Timeout for ordinary pass-through requests.
const FORWARD_TIMEOUT: Duration = Duration::from_secs(60);
/// Connect timeout for the long processing path and for streams.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Read budget for the long processing path. No retries.
const LONG_TIMEOUT: Duration = Duration::from_secs(3600);

/// Outcome of a non-streaming forward: the upstream body verbatim plus
/// whether it was a 2xx.
#[derive(Debug, Clone)]
pub struct Forwarded {
    /// Whether the upstream answered 2xx.
    pub ok: bool,
    /// Status code to relay.
    pub status: u16,
    /// Body to relay (parsed JSON, or an `{error, detail}` wrapper when the
    /// upstream body is not JSON).
    pub body: Value,
}

/// Shared upstream HTTP clients. Cheap to clone.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    forward: reqwest::Client,
    long: reqwest::Client,
    stream: reqwest::Client,
}

impl UpstreamClient {
    /// Build the three client profiles: 60 s forwarding, 30 s/3600 s long
    /// path, and an untimed streaming profile (streams end when the
    /// upstream closes).
    pub fn new() -> Result<Self, UpstreamError> {
        let build = |builder: reqwest::ClientBuilder| {
            builder.build().map_err(|e| UpstreamError::Request {
                message: e.to_string(),
            })
        };
        Ok(Self {
            forward: build(reqwest::Client::builder().timeout(FORWARD_TIMEOUT))?,
            long: build(
                reqwest::Client::builder()
                    .connect_timeout(CONNECT_TIMEOUT)
                    .timeout(LONG_TIMEOUT),
            )?,
            stream: build(reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT))?,
        })
    }

    fn authorized(&self, builder: RequestBuilder, key: &str) -> RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {key}"))
            .header("Content-Type", "application/json")
    }

    /// Forward a request and hand the upstream reply back verbatim.
    pub async fn forward(
        &self,
        method: Method,
        url: &str,
        key: &str,
        query: Option<&[(String, String)]>,
        body: Option<&Value>,
    ) -> Result<Forwarded, UpstreamError> {
        let mut builder = self.authorized(self.forward.request(method.clone(), url), key);
        if let Some(query) = query {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        debug!(%method, %url, "forwarding upstream request");
        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let forwarded = relay_body(response).await;
        info!(%method, %url, status = status.as_u16(), ok = forwarded.ok, "upstream reply");
        Ok(forwarded)
    }

    /// Open a streaming POST. On 2xx the live body is returned as an opaque
    /// byte stream; a non-2xx is resolved into an error with the upstream
    /// body before any bytes flow.
    pub async fn forward_stream(
        &self,
        url: &str,
        key: &str,
        body: &Value,
    ) -> Result<impl Stream<Item = Result<Bytes, reqwest::Error>>, UpstreamError> {
        let response = self
            .authorized(self.stream.post(url), key)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let forwarded = relay_body(response).await;
            error!(%url, status = status.as_u16(), "upstream refused stream");
            return Err(UpstreamError::Status {
                status: forwarded.status,
                body: forwarded.body,
            });
        }

        info!(%url, "upstream stream opened");
        Ok(response.bytes_stream())
    }

    /// Blocking POST on the long path (up to one hour, no retries). Returns
    /// the parsed 2xx body; non-2xx bodies surface verbatim in the error.
    pub async fn send_blocking(&self, url: &str, key: &str, body: &Value) -> Result<Value, UpstreamError> {
        let response = self
            .authorized(self.long.post(url), key)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let forwarded = relay_body(response).await;
            error!(%url, status = status.as_u16(), body = %forwarded.body, "long upstream call failed");
            return Err(UpstreamError::Status {
                status: forwarded.status,
                body: forwarded.body,
            });
        }

        response.json().await.map_err(|e| UpstreamError::InvalidResponse {
            reason: e.to_string(),
        })
    }

    /// Forwarding client for auxiliary calls (conversation ops, uploads).
    pub(crate) fn forward_client(&self) -> &reqwest::Client {
        &self.forward
    }
}

pub(crate) fn map_transport_error(e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::Request {
            message: e.to_string(),
        }
    }
}

/// Convert an upstream reply into a relayable `(ok, status, body)` triple.
/// A non-JSON body is wrapped as `{error, detail}` with the text clipped.
pub(crate) async fn relay_body(response: Response) -> Forwarded {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body = match serde_json::from_str::<Value>(&text) {
        Ok(value) => value,
        Err(_) => json!({
            "error": format!("API返回错误: {}", status.as_u16()),
            "detail": clip(&text, 200),
        }),
    };
    Forwarded {
        ok: status.is_success(),
        status: status.as_u16(),
        body,
    }
}

/// Treat an empty / unparseable 2xx body as success (the upstream DELETE
/// answers 204-style).
pub(crate) fn is_success_body(status: StatusCode, text: &str) -> bool {
    if !status.is_success() {
        return false;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(value) => value.get("result").and_then(Value::as_str) == Some("success"),
        Err(_) => true,
    }
}

fn clip(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_forward_attaches_bearer_and_parses_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/conversations"))
            .and(header("Authorization", "Bearer app-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let client = UpstreamClient::new().unwrap();
        let forwarded = client
            .forward(
                Method::GET,
                &format!("{}/v1/conversations", server.uri()),
                "app-key",
                None,
                None,
            )
            .await
            .unwrap();
        assert!(forwarded.ok);
        assert_eq!(forwarded.status, 200);
        assert_eq!(forwarded.body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_forward_relays_error_body_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "files is required"})),
            )
            .mount(&server)
            .await;

        let client = UpstreamClient::new().unwrap();
        let forwarded = client
            .forward(Method::POST, &server.uri(), "k", None, Some(&json!({})))
            .await
            .unwrap();
        assert!(!forwarded.ok);
        assert_eq!(forwarded.status, 400);
        assert_eq!(forwarded.body["message"], "files is required");
    }

    #[tokio::test]
    async fn test_forward_wraps_non_json_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = UpstreamClient::new().unwrap();
        let forwarded = client
            .forward(Method::GET, &server.uri(), "k", None, None)
            .await
            .unwrap();
        assert_eq!(forwarded.status, 502);
        assert_eq!(forwarded.body["detail"], "bad gateway");
        assert!(forwarded.body["error"].as_str().unwrap().contains("502"));
    }

    #[tokio::test]
    async fn test_send_blocking_returns_parsed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"answer": "done", "mode": "blocking"})),
            )
            .mount(&server)
            .await;

        let client = UpstreamClient::new().unwrap();
        let body = client
            .send_blocking(&server.uri(), "k", &json!({"query": "go"}))
            .await
            .unwrap();
        assert_eq!(body["answer"], "done");
    }

    #[tokio::test]
    async fn test_send_blocking_surfaces_upstream_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "bad key"})))
            .mount(&server)
            .await;

        let client = UpstreamClient::new().unwrap();
        let err = client
            .send_blocking(&server.uri(), "k", &json!({}))
            .await
            .unwrap_err();
        match err {
            UpstreamError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body["message"], "bad key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_forward_stream_passes_bytes_verbatim() {
        use futures::StreamExt;

        let server = MockServer::start().await;
        let payload = "data: {\"answer\":\"x\"}\n\ndata: [DONE]\n\n";
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "text/event-stream")
                    .set_body_string(payload),
            )
            .mount(&server)
            .await;

        let client = UpstreamClient::new().unwrap();
        let mut stream = client
            .forward_stream(&server.uri(), "k", &json!({"query": "hi"}))
            .await
            .unwrap();

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, payload.as_bytes());
    }

    #[tokio::test]
    async fn test_forward_stream_resolves_error_before_streaming() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({"message": "slow down"})))
            .mount(&server)
            .await;

        let client = UpstreamClient::new().unwrap();
        let err = client
            .forward_stream(&server.uri(), "k", &json!({}))
            .await
            .err()
            .expect("stream must fail");
        match err {
            UpstreamError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body["message"], "slow down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_is_success_body_variants() {
        assert!(is_success_body(StatusCode::OK, r#"{"result":"success"}"#));
        assert!(is_success_body(StatusCode::OK, ""));
        assert!(is_success_body(StatusCode::OK, "not json"));
        assert!(!is_success_body(StatusCode::OK, r#"{"result":"partial"}"#));
        assert!(!is_success_body(StatusCode::BAD_REQUEST, ""));
    }
}
