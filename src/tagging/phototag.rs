use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};

use super::{TagResult, TaggingService, parse_response};
use crate::config::ServiceConfig;
use crate::error::TagError;

/// Client for the PhotoTag.ai keyword endpoint.
///
/// Sends one multipart POST per image and never retries.
pub struct PhotoTagClient {
    endpoint: String,
    api_token: String,
    language: String,
    max_keywords: u32,
    client: Client,
}

impl PhotoTagClient {
    pub fn new(config: &ServiceConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Use a preconfigured HTTP client (proxy, TLS or timeout settings).
    pub fn with_client(config: &ServiceConfig, client: Client) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_token: config.api_token.clone(),
            language: config.language.clone(),
            max_keywords: config.max_keywords,
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl TaggingService for PhotoTagClient {
    fn name(&self) -> &str {
        "PhotoTag.ai"
    }

    async fn tag(
        &self,
        image: Vec<u8>,
        file_name: &str,
        context: &str,
    ) -> Result<TagResult, TagError> {
        let file = Part::bytes(image)
            .file_name(file_name.to_string())
            .mime_str("image/jpeg")?;

        let form = Form::new()
            .text("language", self.language.clone())
            .text("maxKeywords", self.max_keywords.to_string())
            .text("customContext", context.to_string())
            .part("file", file);

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        let text = if status == StatusCode::OK {
            resp.text().await?
        } else {
            log::warn!("Failed to fetch metadata for {file_name}. Status code: {status}");
            // The status decides the outcome, so an unreadable body is not an error here.
            resp.text().await.unwrap_or_default()
        };

        let result = parse_response(status.as_u16(), &text)?;
        log::debug!(
            "{file_name}: title={:?} description={:?} keywords={:?}",
            result.title,
            result.description,
            result.keywords
        );
        Ok(result)
    }
}
