use log::{debug, error, info};
use reqwest::{header, Client, Response};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{ProxyError, Result};

/// Body of a `process_request` call.
#[derive(Debug, Serialize)]
pub struct PromptRequest<'a> {
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct RoleRequest<'a> {
    role: &'a str,
    roles: &'a [Value],
}

// A wrapper for the external chat backend's HTTP API
pub struct BackendClient {
    config: Arc<Config>,
    client: Client,
}

impl BackendClient {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        info!("Using chat backend at: {}", config.backend_url);
        info!("Using control backend at: {}", config.control_url);

        // No overall timeout: chat replies are long-lived streams.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { config, client })
    }

    /// Opens a streamed prompt request and hands back the live response.
    pub async fn open_prompt_stream(&self, prompt: &str, file_path: Option<&str>) -> Result<Response> {
        let url = self.config.process_request_url();
        let payload = PromptRequest {
            prompt,
            file_path,
            username: None,
        };

        info!("Forwarding prompt to {} ({} characters)", url, prompt.chars().count());
        debug!("Prompt payload: {}", serde_json::to_string(&payload).unwrap_or_default());

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "text/event-stream")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            error!("Backend rejected prompt with status {}", status);
            return Err(ProxyError::BackendStatus(status));
        }

        Ok(response)
    }

    /// Sends an uploaded file's text to the backend and returns its JSON reply.
    pub async fn process_file(&self, prompt: &str, file_path: &str, username: &str) -> Result<Value> {
        let url = self.config.process_request_url();
        let payload = PromptRequest {
            prompt,
            file_path: Some(file_path),
            username: Some(username),
        };

        info!("Forwarding file {} to {}", file_path, url);

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            error!("Backend rejected file with status {}", status);
            return Err(ProxyError::BackendStatus(status));
        }

        Ok(response.json().await?)
    }

    pub async fn set_role(&self, role: &str, roles: &[Value]) -> Result<Value> {
        let url = self.config.set_role_url();
        info!("Syncing role {:?} ({} available) to {}", role, roles.len(), url);

        let response = self
            .client
            .post(&url)
            .json(&RoleRequest { role, roles })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProxyError::RoleSync {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    pub async fn reset_chat(&self) -> Result<()> {
        let url = self.config.reset_url();
        info!("Resetting chat history via {}", url);

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProxyError::Reset {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header as header_is, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> BackendClient {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.backend_url = server.uri();
        config.control_url = server.uri();
        BackendClient::new(Arc::new(config)).unwrap()
    }

    #[tokio::test]
    async fn prompt_stream_sends_prompt_and_accept_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/process_request/"))
            .and(header_is("accept", "text/event-stream"))
            .and(body_json(json!({ "prompt": "سلام" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: hi\n\n"))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server).open_prompt_stream("سلام", None).await.unwrap();
        assert_eq!(response.text().await.unwrap(), "data: hi\n\n");
    }

    #[tokio::test]
    async fn prompt_stream_includes_file_path_when_present() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/process_request/"))
            .and(body_json(json!({ "prompt": "again", "file_path": "/remote/a.docx" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: [DONE]\n\n"))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .open_prompt_stream("again", Some("/remote/a.docx"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn prompt_stream_reports_backend_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/process_request/"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client_for(&server).open_prompt_stream("hi", None).await.unwrap_err();
        assert_eq!(err.to_string(), "Backend responded with status: 502");
    }

    #[tokio::test]
    async fn process_file_includes_path_and_username() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/process_request/"))
            .and(body_json(json!({
                "prompt": "text",
                "file_path": "/remote/a.docx",
                "username": "guest"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text_response": "ok" })))
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .process_file("text", "/remote/a.docx", "guest")
            .await
            .unwrap();
        assert_eq!(reply["text_response"], "ok");
    }

    #[tokio::test]
    async fn set_role_failure_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/set_role/"))
            .respond_with(ResponseTemplate::new(422).set_body_string("unknown role"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .set_role("pilot", &[json!("tutor")])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Role sync failed with status 422: unknown role");
    }

    #[tokio::test]
    async fn reset_posts_to_configured_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/reset_chat/"))
            .and(header_is("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).reset_chat().await.unwrap();
    }
}
