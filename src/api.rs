use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::conversation::{Answer, ResultSet};
use crate::error::ApiError;
use crate::history::HistoryMessage;

/// Shown when the service rejects a question without saying why.
pub const ASK_FALLBACK_ERROR: &str = "Error processing question";
pub const UPLOAD_FALLBACK_ERROR: &str = "Error uploading file";
const UPLOAD_OK: &str = "File uploaded successfully";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskRequest {
    pub question: String,
    pub history: Vec<HistoryMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskResponse {
    #[serde(default)]
    pub sql_query: Option<String>,
    #[serde(default)]
    pub result: Option<ResultSet>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub reasoning: Option<Vec<String>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AskResponse {
    /// Absent fields become their empty form; empty strings count as absent.
    pub fn into_answer(self) -> Answer {
        if let Some(error) = &self.error {
            warn!("answer arrived with an error field: {}", error);
        }
        Answer::new(
            self.sql_query.filter(|s| !s.trim().is_empty()),
            self.result,
            self.explanation.filter(|s| !s.trim().is_empty()),
            self.reasoning.unwrap_or_default(),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
struct StatusBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Anything that can answer a question about the uploaded database.
#[async_trait]
pub trait AskBackend: Send + Sync {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, ApiError>;
}

/// HTTP client for the question-answering service.
pub struct QaClient {
    base_url: String,
    ask_path: String,
    upload_path: String,
    client: reqwest::Client,
}

impl QaClient {
    pub fn with_config(server: &ServerConfig) -> Self {
        QaClient {
            base_url: server.host.trim_end_matches('/').to_string(),
            ask_path: server.ask_path.clone(),
            upload_path: server.upload_path.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn post_question(&self, request: &AskRequest) -> Result<AskResponse, ApiError> {
        debug!(
            question_len = request.question.len(),
            history = request.history.len(),
            "posting question"
        );

        let response = self
            .client
            .post(self.endpoint(&self.ask_path))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        debug!(%status, bytes = body.len(), "question response");

        if !status.is_success() {
            let message = serde_json::from_slice::<StatusBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| ASK_FALLBACK_ERROR.to_string());
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }

    /// Upload a database file. Returns the server's confirmation text.
    pub async fn upload(&self, path: &Path) -> Result<String, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::File {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "database.db".to_string());
        debug!(file = %file_name, bytes = bytes.len(), "uploading database");

        let form = multipart::Form::new().part("file", multipart::Part::bytes(bytes).file_name(file_name));
        let response = self
            .client
            .post(self.endpoint(&self.upload_path))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        let parsed = serde_json::from_slice::<StatusBody>(&body).unwrap_or_default();

        if status.is_success() {
            Ok(parsed
                .message
                .or(parsed.error)
                .unwrap_or_else(|| UPLOAD_OK.to_string()))
        } else {
            Err(ApiError::Rejected {
                status: status.as_u16(),
                message: parsed
                    .error
                    .or(parsed.message)
                    .unwrap_or_else(|| UPLOAD_FALLBACK_ERROR.to_string()),
            })
        }
    }
}

#[async_trait]
impl AskBackend for QaClient {
    async fn ask(&self, request: &AskRequest) -> Result<AskResponse, ApiError> {
        self.post_question(request).await
    }
}
