pub mod http;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use log::info;
use url::Url;

use crate::error::ConsoleError;
use crate::point::{ Point, UpdatePointRequest };
use crate::schema::{ CreateVectorRequest, TableSchema };

pub use http::HttpBackend;

/// The REST surface of the vectorization backend that the console drives.
#[async_trait]
pub trait ConsoleBackend: Send + Sync {
    /// Succeeds when the backend answers `/docs` with a 2xx status.
    async fn health_check(&self) -> Result<(), ConsoleError>;

    async fn fetch_schema(&self) -> Result<TableSchema, ConsoleError>;

    /// Starts vectorization. `manual_input` is forwarded as the `flag` query parameter.
    async fn create_vector(
        &self,
        request: &CreateVectorRequest,
        manual_input: bool
    ) -> Result<Value, ConsoleError>;

    async fn list_points(&self) -> Result<Vec<Point>, ConsoleError>;

    async fn update_point(&self, request: &UpdatePointRequest) -> Result<Value, ConsoleError>;
}

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: Url,
    pub timeout: Option<Duration>,
}

impl BackendConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: None,
        }
    }
}

pub fn create_backend(config: BackendConfig) -> Result<Arc<dyn ConsoleBackend>, ConsoleError> {
    info!("Creating HTTP backend for {}", config.base_url);
    let backend = HttpBackend::new(&config.base_url, config.timeout)?;
    Ok(Arc::new(backend))
}

/// Parses an operator-supplied backend URL, accepting only http and https.
pub fn parse_backend_url(raw: &str) -> Result<Url, ConsoleError> {
    let url = Url::parse(raw.trim()).map_err(|_| ConsoleError::InvalidUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(ConsoleError::InvalidUrl(raw.to_string())),
    }
}
