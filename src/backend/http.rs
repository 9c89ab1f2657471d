use async_trait::async_trait;
use reqwest::{ Client, Method, RequestBuilder };
use reqwest::header::{ ACCEPT, CONTENT_TYPE };
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use log::{ debug, error, info, warn };
use url::Url;

use super::ConsoleBackend;
use crate::error::ConsoleError;
use crate::point::{ Point, UpdatePointRequest };
use crate::schema::{ CreateVectorRequest, TableSchema };

/// `ConsoleBackend` over the backend's JSON REST API.
pub struct HttpBackend {
    client: Client,
    host: String,
}

impl HttpBackend {
    pub fn new(base_url: &Url, timeout: Option<Duration>) -> Result<Self, ConsoleError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        info!("Initializing backend client for host: {}", base_url);

        Ok(Self {
            client,
            host: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    fn build_request<T: Serialize>(
        &self,
        method: Method,
        url: &str,
        body: Option<&T>
    ) -> RequestBuilder {
        let mut request_builder = self.client.request(method, url).header(ACCEPT, "application/json");

        if let Some(b) = body {
            request_builder = request_builder.header(CONTENT_TYPE, "application/json").json(b);
        }

        request_builder
    }

    /// Sends the request and returns the body text of a 2xx response.
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<String, ConsoleError> {
        let response = request.send().await.map_err(|e| {
            error!("{} failed before reaching the backend: {}", what, e);
            ConsoleError::Transport(e)
        })?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("{} failed (Status: {}): {}", what, status, text);
            return Err(ConsoleError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!("{} response text: {}", what, text);
        Ok(text)
    }

    fn decode<T: DeserializeOwned>(text: &str, what: &str) -> Result<T, ConsoleError> {
        serde_json::from_str(text).map_err(|e| {
            error!("Failed to parse {} response: {}. Text: {}", what, e, text);
            ConsoleError::Decode {
                context: format!("{} response", what),
                source: e,
            }
        })
    }

    /// Mutation responses are shown verbatim, so a non-JSON body is kept as a string.
    fn decode_lenient(text: &str, what: &str) -> Value {
        if text.trim().is_empty() {
            return Value::Null;
        }
        serde_json::from_str(text).unwrap_or_else(|e| {
            warn!("{} response is not JSON ({}); keeping raw text.", what, e);
            Value::String(text.to_string())
        })
    }
}

#[async_trait]
impl ConsoleBackend for HttpBackend {
    async fn health_check(&self) -> Result<(), ConsoleError> {
        let url = self.url("/docs");
        debug!("Health check against {}", url);
        let request = self.build_request(Method::GET, &url, None::<&Value>);
        self.send(request, "Health check").await?;
        Ok(())
    }

    async fn fetch_schema(&self) -> Result<TableSchema, ConsoleError> {
        let url = self.url("/vector/schema");
        debug!("Fetching schema from {}", url);
        let request = self.build_request(Method::GET, &url, None::<&Value>);
        let text = self.send(request, "Schema fetch").await?;
        let schema: TableSchema = Self::decode(&text, "schema")?;
        info!("Loaded schema with {} tables.", schema.len());
        Ok(schema)
    }

    async fn create_vector(
        &self,
        request: &CreateVectorRequest,
        manual_input: bool
    ) -> Result<Value, ConsoleError> {
        let url = self.url("/vector/");
        debug!(
            "Create vector request to {}?flag={}: {}",
            url,
            manual_input,
            serde_json::to_string(request).unwrap_or_default()
        );
        let builder = self
            .build_request(Method::POST, &url, Some(request))
            .query(&[("flag", manual_input)]);
        let text = self.send(builder, "Create vector").await?;
        info!("Vectorization accepted for '{}'.", request.vector_database.vector_database);
        Ok(Self::decode_lenient(&text, "Create vector"))
    }

    async fn list_points(&self) -> Result<Vec<Point>, ConsoleError> {
        let url = self.url("/vector/points");
        debug!("Listing points from {}", url);
        let request = self.build_request(Method::GET, &url, None::<&Value>);
        let text = self.send(request, "Point listing").await?;
        let points: Vec<Point> = Self::decode(&text, "points")?;
        debug!("Parsed {} points.", points.len());
        Ok(points)
    }

    async fn update_point(&self, request: &UpdatePointRequest) -> Result<Value, ConsoleError> {
        let url = self.url("/vector/update_point");
        debug!("Saving point {} to {}", request.point.id, url);
        let builder = self.build_request(Method::PUT, &url, Some(request));
        let text = self.send(builder, "Point update").await?;
        info!("Point '{}' updated.", request.point.id);
        Ok(Self::decode_lenient(&text, "Point update"))
    }
}
