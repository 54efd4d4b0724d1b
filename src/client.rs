//! Terminal-side client for the proxy's `/api` endpoints.

use anyhow::{anyhow, bail, Context, Result};
use futures_util::StreamExt;
use log::debug;
use reqwest::{header, multipart, Client, Response};
use serde_json::{json, Value};
use std::path::Path;

use crate::config::join_endpoint;
use crate::reply::{self, DEFAULT_REPLY};
use crate::stream::{ChatStream, ChatUpdate};

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const DOC_MIME: &str = "application/msword";
const OCTET_STREAM_MIME: &str = "application/octet-stream";

pub struct ChatClient {
    base_url: String,
    http: Client,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            http: Client::builder().build()?,
        })
    }

    fn url(&self, path: &str) -> String {
        join_endpoint(&self.base_url, path)
    }

    /// Sends a message and calls `on_text` for every piece of streamed reply.
    /// Returns the complete reply as it should be displayed.
    pub async fn send_message<F>(&self, message: &str, mut on_text: F) -> Result<String>
    where
        F: FnMut(&str),
    {
        let response = self
            .http
            .post(self.url("/api/chat"))
            .json(&json!({ "message": message }))
            .send()
            .await
            .context("could not reach the chat server")?;
        let response = check_status(response).await?;

        if is_json(&response) {
            let value: Value = response.json().await?;
            let text = reply::display_text(&value, DEFAULT_REPLY);
            on_text(&text);
            return Ok(text);
        }

        let mut stream = ChatStream::new();
        let mut body = response.bytes_stream();
        'read: while let Some(chunk) = body.next().await {
            let chunk = chunk.context("reply stream was interrupted")?;
            for update in stream.push(&chunk) {
                match update {
                    ChatUpdate::Text(text) => on_text(&text),
                    ChatUpdate::Error(message) => bail!(message),
                    ChatUpdate::Done => break 'read,
                    ChatUpdate::FileReport(_) => {}
                }
            }
        }
        for update in stream.finish() {
            match update {
                ChatUpdate::Text(text) => on_text(&text),
                ChatUpdate::Error(message) => bail!(message),
                _ => {}
            }
        }

        if !stream.is_finished() {
            debug!("Reply stream closed without a [DONE] marker");
        }
        debug!("Streamed reply complete: {} characters", stream.text().chars().count());
        if stream.text().is_empty() {
            return Ok(DEFAULT_REPLY.to_string());
        }
        Ok(stream.display_text())
    }

    /// Uploads a Word document and returns the backend's reply text.
    pub async fn upload(&self, path: &Path) -> Result<String> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("{} has no usable file name", path.display()))?
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("could not read {}", path.display()))?;

        let part = multipart::Part::bytes(bytes)
            .file_name(name.clone())
            .mime_str(mime_for(&name))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.url("/api/upload"))
            .multipart(form)
            .send()
            .await
            .context("could not reach the chat server")?;
        let value: Value = check_status(response).await?.json().await?;
        Ok(reply::display_text(&value, &reply::upload_fallback(&name)))
    }

    pub async fn set_role(&self, role: &str, roles: &[String]) -> Result<Value> {
        let response = self
            .http
            .post(self.url("/api/role"))
            .json(&json!({ "role": role, "roles": roles }))
            .send()
            .await?;
        let value: Value = check_status(response).await?.json().await?;
        Ok(value.get("role").cloned().unwrap_or(Value::Null))
    }

    pub async fn reset(&self) -> Result<()> {
        let response = self.http.post(self.url("/api/reset")).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

// Only Word extensions get a Word type; the server decides about everything else.
fn mime_for(name: &str) -> &'static str {
    let name = name.to_lowercase();
    if name.ends_with(".docx") {
        DOCX_MIME
    } else if name.ends_with(".doc") {
        DOC_MIME
    } else {
        OCTET_STREAM_MIME
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false)
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| reply::error_message(&value))
        .unwrap_or_else(|| format!("server responded with status {}", status.as_u16()));
    bail!(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn streamed_reply_is_delivered_in_pieces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({ "message": "سلام" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    "data: {\"response\":\"سلام، \"}\n\ndata: {\"response\":\"خوبم\"}\n\ndata: [DONE]\n\n",
                    "text/event-stream",
                ),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri()).unwrap();
        let mut pieces = Vec::new();
        let reply = client
            .send_message("سلام", |text| pieces.push(text.to_string()))
            .await
            .unwrap();
        assert_eq!(pieces, vec!["سلام، ".to_string(), "خوبم".to_string()]);
        assert_eq!(reply, "سلام، خوبم");
    }

    #[tokio::test]
    async fn json_reply_falls_back_to_display_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "answer": "42" })))
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri()).unwrap();
        let reply = client.send_message("q", |_| {}).await.unwrap();
        assert_eq!(reply, "42");
    }

    #[tokio::test]
    async fn error_body_becomes_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({ "error": "Backend responded with status: 502" })),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri()).unwrap();
        let err = client.send_message("q", |_| {}).await.unwrap_err();
        assert_eq!(err.to_string(), "Backend responded with status: 502");
    }

    #[tokio::test]
    async fn empty_stream_uses_default_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(": keep-alive\n\n", "text/event-stream"),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri()).unwrap();
        assert_eq!(client.send_message("q", |_| {}).await.unwrap(), DEFAULT_REPLY);
    }

    #[tokio::test]
    async fn upload_posts_multipart_and_reads_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "File \"cv.docx\" uploaded and processed successfully",
                "backendResponse": { "text_response": "رزومه خوبی است", "file_report": "۲ صفحه" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cv.docx");
        std::fs::write(&file, b"PK").unwrap();

        let client = ChatClient::new(server.uri()).unwrap();
        let reply = client.upload(&file).await.unwrap();
        assert_eq!(reply, "رزومه خوبی است\n\n📋 گزارش فایل:\n۲ صفحه");

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
    }

    #[test]
    fn mime_type_follows_word_extensions_only() {
        assert_eq!(mime_for("CV.DOCX"), DOCX_MIME);
        assert_eq!(mime_for("old.doc"), DOC_MIME);
        assert_eq!(mime_for("notes.pdf"), OCTET_STREAM_MIME);
        assert_eq!(mime_for("README"), OCTET_STREAM_MIME);
    }

    #[tokio::test]
    async fn non_word_upload_is_not_labelled_as_word() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "error": "Only Word documents (.doc, .docx) are allowed" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let client = ChatClient::new(server.uri()).unwrap();
        let err = client.upload(&file).await.unwrap_err();
        assert_eq!(err.to_string(), "Only Word documents (.doc, .docx) are allowed");

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("Content-Type: application/octet-stream"));
        assert!(!body.contains("application/msword"));
    }

    #[tokio::test]
    async fn role_and_reset_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/role"))
            .and(body_json(json!({ "role": "tutor", "roles": ["tutor", "lawyer"] })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "success": true, "role": "tutor" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/reset"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(server.uri()).unwrap();
        let role = client
            .set_role("tutor", &["tutor".to_string(), "lawyer".to_string()])
            .await
            .unwrap();
        assert_eq!(role, json!("tutor"));
        client.reset().await.unwrap();
    }
}
