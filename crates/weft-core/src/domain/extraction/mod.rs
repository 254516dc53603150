//! Entity-extraction gateway
//!
//! Thin adapter around the external NLP collaborator. The collaborator trait
//! returns `Result` so failure is visible in the type; the gateway applies
//! the ingestion pipeline's tolerance policy explicitly: bound the call with
//! a timeout and treat failure or timeout as "zero entities found", so tag
//! and link relationships still persist when the NLP service is down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::graph::node::{Entity, EntityCategory, KnowledgeMetadata};
use crate::error::Result;

/// Default bound on a single extraction call
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// An entity reported by the NLP collaborator for one input text
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedEntity {
    pub name: String,
    pub category: EntityCategory,
    /// Relative importance within the input text, in [0, 1]. Used for edge
    /// weighting and visual emphasis only.
    pub salience: f32,
    pub metadata: Option<KnowledgeMetadata>,
}

/// The external NLP collaborator: plain text in, unordered entities out
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, plain_text: &str) -> Result<Vec<ExtractedEntity>>;
}

/// Gateway wrapping an extractor with the pipeline's failure policy
#[derive(Clone)]
pub struct ExtractionGateway {
    extractor: Arc<dyn EntityExtractor>,
    timeout: Duration,
}

impl ExtractionGateway {
    pub fn new(extractor: Arc<dyn EntityExtractor>) -> Self {
        Self {
            extractor,
            timeout: DEFAULT_EXTRACTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extract entities, recovering any failure as an empty result.
    ///
    /// Partial-result tolerance over all-or-nothing consistency: NLP-derived
    /// data is an enrichment, never a reason to lose a capture.
    pub async fn extract_or_empty(&self, plain_text: &str) -> Vec<ExtractedEntity> {
        if plain_text.trim().is_empty() {
            return Vec::new();
        }

        match tokio::time::timeout(self.timeout, self.extractor.extract(plain_text)).await {
            Ok(Ok(entities)) => {
                debug!(count = entities.len(), "Entities extracted");
                coalesce(entities)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Entity extraction failed; continuing without entities");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Entity extraction timed out; continuing without entities"
                );
                Vec::new()
            }
        }
    }
}

/// Collapse repeated mentions of the same entity within one text, keeping
/// the highest salience. One capture referencing an entity twice yields one
/// `References` edge, not two.
fn coalesce(entities: Vec<ExtractedEntity>) -> Vec<ExtractedEntity> {
    let mut seen: HashMap<(String, EntityCategory), usize> = HashMap::new();
    let mut out: Vec<ExtractedEntity> = Vec::with_capacity(entities.len());

    for entity in entities {
        let key = (Entity::canonicalize(&entity.name), entity.category);
        match seen.get(&key) {
            Some(&index) => {
                if entity.salience > out[index].salience {
                    out[index].salience = entity.salience;
                }
            }
            None => {
                seen.insert(key, out.len());
                out.push(entity);
            }
        }
    }

    out
}
