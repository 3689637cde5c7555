use std::time::Duration;

use async_trait::async_trait;
use lightbox_config::ViewerConfig;
use lightbox_model::CacheKey;

use crate::error::{LightboxError, Result};
use crate::transport::{Transport, TransportError, TransportResponse};

/// [`Transport`] over HTTP(S). Cache keys are used verbatim as URLs.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &ViewerConfig) -> Result<Self> {
        if config.request_timeout_ms == 0 {
            return Err(LightboxError::InvalidConfig(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Self::new(config.request_timeout())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        key: &CacheKey,
    ) -> std::result::Result<Box<dyn TransportResponse>, TransportError> {
        log::debug!("Fetching media from: {}", key);
        let response = self
            .client
            .get(key.as_str())
            .send()
            .await
            .map_err(|err| TransportError::new(err.to_string()))?;
        Ok(Box::new(HttpResponse(response)))
    }
}

struct HttpResponse(reqwest::Response);

#[async_trait]
impl TransportResponse for HttpResponse {
    fn status(&self) -> u16 {
        self.0.status().as_u16()
    }

    async fn body(
        self: Box<Self>,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        let bytes = self
            .0
            .bytes()
            .await
            .map_err(|err| TransportError::new(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}
