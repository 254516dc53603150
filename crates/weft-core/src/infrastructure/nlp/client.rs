//! Entity-extraction service client
//!
//! POSTs capture plain text to an external NLP analysis endpoint and maps
//! the response into domain entities. Every transport or decode failure
//! surfaces as [`Error::ExtractionUnavailable`]; the ingestion pipeline's
//! gateway decides what to do with it.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::NlpSettings;
use crate::domain::extraction::{EntityExtractor, ExtractedEntity};
use crate::domain::graph::node::{EntityCategory, KnowledgeMetadata};
use crate::error::{Error, Result};

/// Connection settings for the extraction service
#[derive(Debug, Clone)]
pub struct NlpClientConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl NlpClientConfig {
    pub fn from_settings(settings: &NlpSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    entities: Vec<WireEntity>,
}

#[derive(Debug, Deserialize)]
struct WireEntity {
    name: String,
    #[serde(rename = "type")]
    category: String,
    #[serde(default)]
    salience: f32,
    #[serde(default)]
    metadata: WireMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct WireMetadata {
    wikipedia_url: Option<String>,
    mid: Option<String>,
}

/// [`EntityExtractor`] backed by an HTTP analysis service
pub struct HttpEntityExtractor {
    client: Client,
    config: NlpClientConfig,
}

impl HttpEntityExtractor {
    pub fn new(config: NlpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::ExtractionUnavailable(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl EntityExtractor for HttpEntityExtractor {
    async fn extract(&self, plain_text: &str) -> Result<Vec<ExtractedEntity>> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .json(&AnalyzeRequest { text: plain_text });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::ExtractionUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::ExtractionUnavailable(format!(
                "analysis service returned {}",
                response.status()
            )));
        }

        let body: AnalyzeResponse = response
            .json()
            .await
            .map_err(|e| Error::ExtractionUnavailable(e.to_string()))?;

        debug!(count = body.entities.len(), "Analysis response received");
        Ok(body.entities.into_iter().map(into_extracted).collect())
    }
}

fn into_extracted(wire: WireEntity) -> ExtractedEntity {
    let metadata = match (wire.metadata.wikipedia_url, wire.metadata.mid) {
        (None, None) => None,
        (wikipedia, mid) => Some(KnowledgeMetadata { wikipedia, mid }),
    };

    ExtractedEntity {
        name: wire.name,
        category: EntityCategory::parse(&wire.category),
        salience: wire.salience.clamp(0.0, 1.0),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_entity_mapping() {
        let wire = WireEntity {
            name: "Priya Sharma".into(),
            category: "PERSON".into(),
            salience: 0.82,
            metadata: WireMetadata {
                wikipedia_url: Some("https://en.wikipedia.org/wiki/Example".into()),
                mid: None,
            },
        };

        let extracted = into_extracted(wire);
        assert_eq!(extracted.category, EntityCategory::Person);
        assert_eq!(extracted.salience, 0.82);
        let metadata = extracted.metadata.expect("metadata should survive mapping");
        assert!(metadata.wikipedia.is_some());
        assert!(metadata.mid.is_none());
    }

    #[test]
    fn test_empty_metadata_collapses_to_none() {
        let wire = WireEntity {
            name: "Somewhere".into(),
            category: "LOCATION".into(),
            salience: 0.1,
            metadata: WireMetadata::default(),
        };
        assert!(into_extracted(wire).metadata.is_none());
    }

    #[test]
    fn test_response_tolerates_missing_fields() {
        let body: AnalyzeResponse =
            serde_json::from_str(r#"{"entities": [{"name": "Initech", "type": "ORGANIZATION"}]}"#)
                .expect("minimal entity should decode");
        assert_eq!(body.entities.len(), 1);
        assert_eq!(body.entities[0].salience, 0.0);
    }

    #[test]
    fn test_unknown_category_mapped_to_unknown() {
        let wire = WireEntity {
            name: "X".into(),
            category: "PHONE_NUMBER".into(),
            salience: 0.5,
            metadata: WireMetadata::default(),
        };
        assert_eq!(into_extracted(wire).category, EntityCategory::Unknown);
    }
}
