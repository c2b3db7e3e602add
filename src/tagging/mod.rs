mod phototag;

pub use phototag::PhotoTagClient;

use serde::{Deserialize, Serialize};

use crate::error::TagError;

/// Longest slice of an error body kept in a [`TagError::Status`].
const MAX_ERROR_BODY: usize = 200;

/// Title, description and keywords generated for one image.
///
/// `keywords` keep the order the service returned them in, which is
/// relevance order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagResult {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
}

impl TagResult {
    /// Whether the result may be written: a title and at least one keyword.
    /// An empty description is accepted.
    pub fn is_complete(&self) -> bool {
        !self.title.is_empty() && !self.keywords.is_empty()
    }
}

/// Trait for keyword tagging services.
///
/// The batch pipeline only talks to this trait, so a different backend (or a
/// test double) can stand in for [`PhotoTagClient`].
///
/// # Example
///
/// ```rust,no_run
/// use phototag_batch::config::ServiceConfig;
/// use phototag_batch::tagging::{PhotoTagClient, TaggingService};
///
/// # async fn example() -> anyhow::Result<()> {
/// let mut service = ServiceConfig::default();
/// service.api_token = "pt-...".into();
/// let client = PhotoTagClient::new(&service);
///
/// let bytes = std::fs::read("photo.jpg")?;
/// let result = client.tag(bytes, "photo.jpg", "harbour at dusk").await?;
/// println!("Title: {}", result.title);
/// # Ok(())
/// # }
/// ```
#[async_trait::async_trait]
pub trait TaggingService: Send + Sync {
    /// The display name of this service.
    fn name(&self) -> &str;

    /// Generate metadata for one image.
    ///
    /// * `image`: Raw JPEG bytes
    /// * `file_name`: Name the image is uploaded under
    /// * `context`: Free-text hint, usually the image's existing title and description
    async fn tag(&self, image: Vec<u8>, file_name: &str, context: &str)
    -> Result<TagResult, TagError>;
}

#[derive(Debug, Deserialize)]
struct KeywordResponse {
    data: Option<KeywordData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KeywordData {
    title: Option<String>,
    description: Option<String>,
    keywords: Option<Vec<String>>,
}

/// Turn a raw service response into a [`TagResult`].
///
/// Any status other than 200 is a failure whatever the body says. A 200
/// response must carry a `data` object; fields missing from it default to
/// empty.
pub fn parse_response(status: u16, body: &str) -> Result<TagResult, TagError> {
    match status {
        200 => {}
        401 | 403 => return Err(TagError::Unauthorized { status }),
        _ => {
            return Err(TagError::Status {
                status,
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }
    }

    let response: KeywordResponse =
        serde_json::from_str(body).map_err(|e| TagError::Payload(e.to_string()))?;
    let data = response
        .data
        .ok_or_else(|| TagError::Payload("response has no `data` object".to_string()))?;

    Ok(TagResult {
        title: data.title.unwrap_or_default(),
        description: data.description.unwrap_or_default(),
        keywords: data.keywords.unwrap_or_default(),
    })
}
