use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};

use crate::config::AppConfig;
use crate::models::FileUpload;

/// HTTP client for the PDF analysis backend. One call per turn; the response
/// body is a `text/event-stream` consumed incrementally by the caller.
#[derive(Clone)]
pub struct AskClient {
    client: Client,
    base_url: String,
}

impl AskClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            base_url: config.backend_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Posts one question. The file is only required on the first turn; on
    /// follow-ups the backend resumes from `sdk_session_id` instead of
    /// re-reading the document.
    pub async fn ask(
        &self,
        question: &str,
        file: Option<FileUpload>,
        session_id: Option<&str>,
    ) -> Result<Response> {
        let mut form = Form::new().text("question", question.to_string());
        if let Some(session) = session_id {
            form = form.text("sdk_session_id", session.to_string());
        }
        if let Some(upload) = file {
            tracing::debug!(
                "uploading {} ({} bytes) with question",
                upload.filename,
                upload.bytes.len()
            );
            let part = Part::bytes(upload.bytes)
                .file_name(upload.filename)
                .mime_str("application/pdf")
                .context("invalid upload mime type")?;
            form = form.part("file", part);
        }

        let url = format!("{}/pdf/ask", self.base_url);
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .context("failed to call pdf ask endpoint")?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "pdf ask endpoint returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        Ok(response)
    }
}

fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(err) = json.get("error").and_then(|v| v.as_str()) {
            return err.to_string();
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_prefers_json_error_field() {
        assert_eq!(
            normalize_err_body("{\"error\": \"no such session\"}"),
            "no such session"
        );
        assert_eq!(normalize_err_body("  plain failure  "), "plain failure");
        assert_eq!(normalize_err_body("   "), "<empty body>");
    }
}
