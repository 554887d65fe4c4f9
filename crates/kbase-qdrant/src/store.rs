//! Vector store client operations.

use std::fmt;
use std::sync::Arc;

use jiff::Timestamp;
use kbase_core::ServiceHealth;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder,
    Distance, FieldType, Filter, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};

use crate::config::VectorStoreConfig;
use crate::error::{QdrantError, QdrantResult};
use crate::point::{ScoredSegment, SegmentPoint, segment_point_id};
use crate::{TRACING_TARGET_CONNECTION, TRACING_TARGET_POINTS, TRACING_TARGET_SEARCH};

/// Client for the segment embedding collection.
///
/// Upserts are idempotent on `seg_id` (deterministic point ids) and the
/// `wait` flag is set on writes so that a returned upsert is durable: the
/// pipeline commits `splited` only after this store acknowledged.
#[derive(Clone)]
pub struct VectorStore {
    inner: Arc<VectorStoreInner>,
}

struct VectorStoreInner {
    client: Qdrant,
    config: VectorStoreConfig,
}

impl fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStore")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Connects to Qdrant with the given configuration.
    pub async fn connect(config: VectorStoreConfig) -> QdrantResult<Self> {
        config.validate()?;

        tracing::debug!(
            target: TRACING_TARGET_CONNECTION,
            url = %config.qdrant_url,
            collection = %config.qdrant_collection,
            "Connecting to Qdrant"
        );

        let mut builder = Qdrant::from_url(&config.qdrant_url);
        if let Some(ref api_key) = config.qdrant_api_key {
            builder = builder.api_key(api_key.clone());
        }
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        let client = builder.build()?;
        let store = Self {
            inner: Arc::new(VectorStoreInner { client, config }),
        };

        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            collection = %store.collection(),
            "Connected to Qdrant"
        );

        Ok(store)
    }

    /// Returns the configured collection name.
    pub fn collection(&self) -> &str {
        &self.inner.config.qdrant_collection
    }

    /// Creates the segment collection and payload indexes if missing.
    ///
    /// The collection uses cosine distance; search scores are similarities
    /// in higher-is-better order.
    pub async fn ensure_collection(&self, dimensions: u64) -> QdrantResult<()> {
        let collection = self.collection().to_owned();

        if self.inner.client.collection_exists(&collection).await? {
            tracing::debug!(
                target: TRACING_TARGET_CONNECTION,
                collection = %collection,
                "Collection already exists"
            );
            return Ok(());
        }

        self.inner
            .client
            .create_collection(
                CreateCollectionBuilder::new(&collection)
                    .vectors_config(VectorParamsBuilder::new(dimensions, Distance::Cosine)),
            )
            .await?;

        for field in ["seg_id", "doc_id", "seg_type"] {
            self.inner
                .client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    &collection,
                    field,
                    FieldType::Keyword,
                ))
                .await?;
        }

        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            collection = %collection,
            dimensions,
            "Created segment collection"
        );

        Ok(())
    }

    /// Upserts segment embeddings; idempotent on `seg_id`.
    pub async fn upsert_segments(&self, segments: Vec<SegmentPoint>) -> QdrantResult<()> {
        if segments.is_empty() {
            return Ok(());
        }

        let count = segments.len();
        let points: Vec<_> = segments.into_iter().map(SegmentPoint::into_point).collect();

        self.inner
            .client
            .upsert_points(UpsertPointsBuilder::new(self.collection(), points).wait(true))
            .await?;

        tracing::debug!(
            target: TRACING_TARGET_POINTS,
            collection = %self.collection(),
            count,
            "Upserted segment points"
        );

        Ok(())
    }

    /// Searches for the nearest segments among the allowed documents.
    ///
    /// Returns up to `k` hits ordered by similarity descending. An empty
    /// `allowed_doc_ids` slice yields no hits; permission filtering must
    /// never fall open.
    pub async fn search(
        &self,
        query_vector: Vec<f32>,
        k: u64,
        allowed_doc_ids: &[String],
    ) -> QdrantResult<Vec<ScoredSegment>> {
        if allowed_doc_ids.is_empty() {
            return Ok(vec![]);
        }

        let filter = Filter::should(
            allowed_doc_ids
                .iter()
                .map(|doc_id| Condition::matches("doc_id", doc_id.clone()))
                .collect::<Vec<_>>(),
        );

        let response = self
            .inner
            .client
            .search_points(
                SearchPointsBuilder::new(self.collection(), query_vector, k)
                    .filter(filter)
                    .with_payload(true),
            )
            .await?;

        let hits = response
            .result
            .into_iter()
            .map(ScoredSegment::try_from)
            .collect::<QdrantResult<Vec<_>>>()?;

        tracing::debug!(
            target: TRACING_TARGET_SEARCH,
            collection = %self.collection(),
            hits = hits.len(),
            allowed_docs = allowed_doc_ids.len(),
            "Vector search complete"
        );

        Ok(hits)
    }

    /// Removes every point belonging to a document.
    pub async fn delete_by_doc(&self, doc_id: &str) -> QdrantResult<()> {
        self.inner
            .client
            .delete_points(
                DeletePointsBuilder::new(self.collection())
                    .points(Filter::must([Condition::matches(
                        "doc_id",
                        doc_id.to_owned(),
                    )]))
                    .wait(true),
            )
            .await?;

        tracing::debug!(
            target: TRACING_TARGET_POINTS,
            collection = %self.collection(),
            doc_id = %doc_id,
            "Deleted document points"
        );

        Ok(())
    }

    /// Removes specific segments, used when rolling back a partial index.
    pub async fn delete_by_seg_ids(&self, seg_ids: &[String]) -> QdrantResult<()> {
        if seg_ids.is_empty() {
            return Ok(());
        }

        let ids: Vec<qdrant_client::qdrant::PointId> = seg_ids
            .iter()
            .map(|seg_id| segment_point_id(seg_id).to_string().into())
            .collect();

        self.inner
            .client
            .delete_points(
                DeletePointsBuilder::new(self.collection())
                    .points(ids)
                    .wait(true),
            )
            .await?;

        Ok(())
    }

    /// Performs a health check against the Qdrant endpoint.
    pub async fn health_check(&self) -> QdrantResult<ServiceHealth> {
        let started_at = Timestamp::now();
        match self.inner.client.health_check().await {
            Ok(_) => {
                let elapsed = Timestamp::now().duration_since(started_at);
                Ok(ServiceHealth::healthy()
                    .with_response_time(elapsed.unsigned_abs()))
            }
            Err(error) => Ok(ServiceHealth::unhealthy(error.to_string())),
        }
    }
}
