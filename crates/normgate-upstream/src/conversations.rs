//! Conversation rename / delete operations.
//!
//! Both take the `conversations` credential pair and append the
//! conversation id to the base URL. Replies pass through unwrapped, except
//! that a successful delete is normalised to the gateway's uniform shape.

use serde_json::{json, Value};
use tracing::info;

use normgate_error::UpstreamError;

use crate::client::{is_success_body, map_transport_error, relay_body, Forwarded, UpstreamClient};

/// `POST <base>/<conversation_id>/name` with the client body verbatim.
pub async fn rename_conversation(
    client: &UpstreamClient,
    base_url: &str,
    key: &str,
    conversation_id: &str,
    body: &Value,
) -> Result<Forwarded, UpstreamError> {
    let url = format!("{base_url}/{conversation_id}/name");
    let response = client
        .forward_client()
        .post(&url)
        .header("Authorization", format!("Bearer {key}"))
        .json(body)
        .send()
        .await
        .map_err(map_transport_error)?;
    Ok(relay_body(response).await)
}

/// `DELETE <base>/<conversation_id>`. A 2xx `{result: "success"}` or an
/// empty / unparseable 2xx body normalises to
/// `{success: "true", message: "删除成功"}`; anything else passes through.
pub async fn delete_conversation(
    client: &UpstreamClient,
    base_url: &str,
    key: &str,
    conversation_id: &str,
    body: Option<&Value>,
) -> Result<Forwarded, UpstreamError> {
    let url = format!("{base_url}/{conversation_id}");
    let mut builder = client
        .forward_client()
        .delete(&url)
        .header("Authorization", format!("Bearer {key}"));
    if let Some(body) = body {
        builder = builder.json(body);
    }
    let response = builder.send().await.map_err(map_transport_error)?;

    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    if is_success_body(status, &text) {
        info!(conversation_id = %conversation_id, "conversation deleted");
        return Ok(Forwarded {
            ok: true,
            status: 200,
            body: json!({"success": "true", "message": "删除成功"}),
        });
    }

    // Either a non-2xx, or a 2xx with an unrecognised JSON shape: relay.
    let body = serde_json::from_str::<Value>(&text).unwrap_or_else(|_| {
        json!({
            "error": format!("API返回错误: {}", status.as_u16()),
            "detail": text.chars().take(200).collect::<String>(),
        })
    });
    Ok(Forwarded {
        ok: status.is_success(),
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_delete_normalises_success_result() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/conversations/c-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "success"})))
            .mount(&server)
            .await;

        let client = UpstreamClient::new().unwrap();
        let forwarded = delete_conversation(
            &client,
            &format!("{}/v1/conversations", server.uri()),
            "k",
            "c-1",
            None,
        )
        .await
        .unwrap();
        assert!(forwarded.ok);
        assert_eq!(forwarded.body["success"], "true");
        assert_eq!(forwarded.body["message"], "删除成功");
    }

    #[tokio::test]
    async fn test_delete_normalises_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = UpstreamClient::new().unwrap();
        let forwarded = delete_conversation(&client, &server.uri(), "k", "c-2", None)
            .await
            .unwrap();
        assert!(forwarded.ok);
        assert_eq!(forwarded.body["message"], "删除成功");
    }

    #[tokio::test]
    async fn test_delete_relays_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "not found"})))
            .mount(&server)
            .await;

        let client = UpstreamClient::new().unwrap();
        let forwarded = delete_conversation(&client, &server.uri(), "k", "c-3", None)
            .await
            .unwrap();
        assert!(!forwarded.ok);
        assert_eq!(forwarded.status, 404);
        assert_eq!(forwarded.body["message"], "not found");
    }

    #[tokio::test]
    async fn test_rename_passes_body_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/conversations/c-9/name"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "c-9", "name": "新名字"})),
            )
            .mount(&server)
            .await;

        let client = UpstreamClient::new().unwrap();
        let forwarded = rename_conversation(
            &client,
            &format!("{}/v1/conversations", server.uri()),
            "k",
            "c-9",
            &json!({"name": "新名字"}),
        )
        .await
        .unwrap();
        assert!(forwarded.ok);
        assert_eq!(forwarded.body["name"], "新名字");
    }
}
