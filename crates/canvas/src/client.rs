use std::time::Duration;

use async_trait::async_trait;
use db::models::graph::{GraphSnapshot, ProjectGraph};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;
use utils::response::ApiResponse;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("failed to decode server response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("server response carried no data")]
    EmptyResponse,
}

impl ClientError {
    /// The save was based on a graph version the server has moved past.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Api { status, .. } if *status == StatusCode::CONFLICT.as_u16())
    }
}

/// Where the editor loads and persists project graphs.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    async fn load_graph(&self, project_id: Uuid) -> Result<ProjectGraph, ClientError>;

    async fn replace_graph(
        &self,
        project_id: Uuid,
        snapshot: &GraphSnapshot,
    ) -> Result<ProjectGraph, ClientError>;
}

/// [`GraphBackend`] over the server's JSON API.
#[derive(Debug, Clone)]
pub struct HttpGraphClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl HttpGraphClient {
    /// `base_url` is the server root, e.g. `http://localhost:8081/`.
    pub fn new(base_url: Url, token: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    fn graph_url(&self, project_id: Uuid) -> Result<Url, ClientError> {
        Ok(self
            .base_url
            .join(&format!("api/projects/{project_id}/graph"))?)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let body: ApiResponse<T> = match serde_json::from_slice(&bytes) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(ClientError::Api {
                    status: status.as_u16(),
                    message: String::from_utf8_lossy(&bytes).into_owned(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        if !status.is_success() || !body.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: body
                    .message()
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"))
                    .to_string(),
            });
        }

        body.into_data().ok_or(ClientError::EmptyResponse)
    }
}

#[async_trait]
impl GraphBackend for HttpGraphClient {
    async fn load_graph(&self, project_id: Uuid) -> Result<ProjectGraph, ClientError> {
        let url = self.graph_url(project_id)?;
        self.send(self.client.get(url)).await
    }

    async fn replace_graph(
        &self,
        project_id: Uuid,
        snapshot: &GraphSnapshot,
    ) -> Result<ProjectGraph, ClientError> {
        let url = self.graph_url(project_id)?;
        self.send(self.client.put(url).json(snapshot)).await
    }
}
