//! LanceDB table management for chunk vectors.

use crate::error::{DbError, Result};
use crate::vector::{IndexEntry, RetrievedChunk, VectorIndex};

use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, RecordBatchIterator};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::DistanceType;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

const TABLE_NAME: &str = "chunk_vectors";

/// Below this many rows an ANN index is not worth building; search is exhaustive.
const MIN_ROWS_FOR_VECTOR_INDEX: usize = 256;

/// LanceDB-backed vector index persisted in a directory.
#[derive(Clone)]
pub struct LanceIndex {
    table: lancedb::Table,
    dimensions: usize,
}

impl LanceIndex {
    /// Open the index stored in `directory`, creating it if needed.
    pub async fn open(directory: &Path, dimensions: usize) -> Result<Self> {
        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|source| crate::Error::Io {
                path: directory.to_path_buf(),
                source,
            })?;

        let uri = directory.to_string_lossy();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| DbError::LanceDb(e.to_string()))?;

        let index = Self::open_or_create(&connection, dimensions).await?;
        tracing::debug!(directory = %directory.display(), dimensions, "vector index opened");
        Ok(index)
    }

    /// Open existing table or create a new one.
    ///
    /// If the table exists but is corrupted (e.g. process killed mid-write),
    /// it is dropped and recreated.
    pub async fn open_or_create(
        connection: &lancedb::Connection,
        dimensions: usize,
    ) -> Result<Self> {
        match connection.open_table(TABLE_NAME).execute().await {
            Ok(table) => {
                let index = Self { table, dimensions };
                index.check_stored_dimensions().await?;
                return Ok(index);
            }
            Err(error) => {
                tracing::debug!(%error, "failed to open chunk_vectors table, will create");
            }
        }

        match Self::create_empty_table(connection, dimensions).await {
            Ok(table) => return Ok(Self { table, dimensions }),
            Err(error) => {
                tracing::warn!(
                    %error,
                    "failed to create chunk_vectors table, attempting recovery from corrupted state"
                );
            }
        }

        if let Err(error) = connection.drop_table(TABLE_NAME, &[]).await {
            tracing::warn!(%error, "drop_table failed during recovery, proceeding anyway");
        }

        let table = Self::create_empty_table(connection, dimensions).await?;
        tracing::info!("chunk_vectors table recovered, documents will need re-ingesting");

        Ok(Self { table, dimensions })
    }

    async fn create_empty_table(
        connection: &lancedb::Connection,
        dimensions: usize,
    ) -> Result<lancedb::Table> {
        let schema = Arc::new(Self::schema(dimensions));
        let batches = RecordBatchIterator::new(vec![].into_iter().map(Ok), schema);

        connection
            .create_table(TABLE_NAME, Box::new(batches))
            .execute()
            .await
            .map_err(|e| DbError::LanceDb(e.to_string()).into())
    }

    /// An existing table must have been created with the configured dimension.
    async fn check_stored_dimensions(&self) -> Result<()> {
        let schema = self
            .table
            .schema()
            .await
            .map_err(|e| DbError::LanceDb(e.to_string()))?;

        let stored = schema
            .field_with_name("embedding")
            .ok()
            .and_then(|field| match field.data_type() {
                arrow_schema::DataType::FixedSizeList(_, size) => Some(*size as usize),
                _ => None,
            });

        match stored {
            Some(stored) if stored != self.dimensions => Err(DbError::DimensionMismatch {
                expected: self.dimensions,
                actual: stored,
            }
            .into()),
            Some(_) => Ok(()),
            None => Err(DbError::LanceDb("chunk_vectors table has no embedding column".into()).into()),
        }
    }

    /// Delete rows by id.
    pub async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let quoted_ids = ids
            .iter()
            .map(|id| format!("'{}'", id.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(", ");
        let predicate = format!("id IN ({quoted_ids})");

        self.table
            .delete(&predicate)
            .await
            .map_err(|e| DbError::LanceDb(e.to_string()))?;

        Ok(())
    }

    /// Build an ANN index on the embedding column once the table is large
    /// enough to train one. Smaller tables are searched exhaustively.
    pub async fn create_indexes(&self) -> Result<()> {
        let rows = self.count().await?;
        if rows < MIN_ROWS_FOR_VECTOR_INDEX {
            tracing::debug!(rows, "skipping vector index, table too small");
            return Ok(());
        }

        let index = lancedb::index::Index::IvfPq(
            lancedb::index::vector::IvfPqIndexBuilder::default()
                .distance_type(DistanceType::Cosine),
        );

        match self
            .table
            .create_index(&["embedding"], index)
            .replace(true)
            .execute()
            .await
        {
            Ok(()) => {
                tracing::debug!(rows, "vector index created on embedding column");
                Ok(())
            }
            Err(error) => Err(DbError::LanceDb(format!(
                "Failed to create vector index: {error}"
            ))
            .into()),
        }
    }

    /// Compact files and prune old versions.
    ///
    /// Each delete + append creates a new lance version; without this the
    /// version count grows on every ingest.
    pub async fn optimize(&self) -> Result<()> {
        self.table
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| DbError::LanceDb(e.to_string()))?;
        Ok(())
    }

    fn schema(dimensions: usize) -> arrow_schema::Schema {
        arrow_schema::Schema::new(vec![
            arrow_schema::Field::new("id", arrow_schema::DataType::Utf8, false),
            arrow_schema::Field::new("content", arrow_schema::DataType::Utf8, false),
            arrow_schema::Field::new("source", arrow_schema::DataType::Utf8, false),
            arrow_schema::Field::new("chunk_index", arrow_schema::DataType::UInt32, false),
            arrow_schema::Field::new("metadata", arrow_schema::DataType::Utf8, false),
            arrow_schema::Field::new(
                "embedding",
                arrow_schema::DataType::FixedSizeList(
                    Arc::new(arrow_schema::Field::new(
                        "item",
                        arrow_schema::DataType::Float32,
                        true,
                    )),
                    dimensions as i32,
                ),
                false,
            ),
        ])
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(DbError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    /// Replaces any existing rows with the same ids, so re-ingesting a
    /// document does not accumulate duplicates.
    async fn write(&self, entries: Vec<IndexEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        for entry in &entries {
            self.check_dimensions(&entry.embedding)?;
        }

        let ids: Vec<String> = entries.iter().map(|entry| entry.id.clone()).collect();
        self.delete(&ids).await?;

        use arrow_array::{FixedSizeListArray, RecordBatch, StringArray, UInt32Array};

        let schema = Arc::new(Self::schema(self.dimensions));

        let id_array = StringArray::from(ids);
        let content_array =
            StringArray::from_iter_values(entries.iter().map(|entry| entry.text.as_str()));
        let source_array = StringArray::from_iter_values(entries.iter().map(|entry| {
            entry
                .metadata
                .get("source")
                .map(String::as_str)
                .unwrap_or_default()
        }));
        let chunk_index_array = UInt32Array::from_iter_values(entries.iter().map(|entry| {
            entry
                .metadata
                .get("chunk_index")
                .and_then(|index| index.parse().ok())
                .unwrap_or_default()
        }));
        let metadata_json = entries
            .iter()
            .map(|entry| serde_json::to_string(&entry.metadata))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DbError::LanceDb(format!("failed to encode metadata: {e}")))?;
        let metadata_array = StringArray::from(metadata_json);

        let embedding_array = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            entries
                .iter()
                .map(|entry| Some(entry.embedding.iter().map(|v| Some(*v)).collect::<Vec<_>>())),
            self.dimensions as i32,
        );

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(id_array) as arrow_array::ArrayRef,
                Arc::new(content_array) as arrow_array::ArrayRef,
                Arc::new(source_array) as arrow_array::ArrayRef,
                Arc::new(chunk_index_array) as arrow_array::ArrayRef,
                Arc::new(metadata_array) as arrow_array::ArrayRef,
                Arc::new(embedding_array) as arrow_array::ArrayRef,
            ],
        )
        .map_err(|e| DbError::LanceDb(e.to_string()))?;

        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        self.table
            .add(Box::new(batches))
            .execute()
            .await
            .map_err(|e| DbError::LanceDb(e.to_string()))?;

        Ok(())
    }

    async fn delete_source(&self, source: &str) -> Result<()> {
        let predicate = format!("source = '{}'", source.replace('\'', "''"));
        self.table
            .delete(&predicate)
            .await
            .map_err(|e| DbError::LanceDb(e.to_string()))?;
        Ok(())
    }

    /// Vector similarity search using cosine distance.
    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        self.check_dimensions(query)?;

        use lancedb::query::{ExecutableQuery, QueryBase};

        let results: Vec<arrow_array::RecordBatch> = self
            .table
            .query()
            .nearest_to(query)
            .map_err(|e| DbError::LanceDb(e.to_string()))?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(|e| DbError::LanceDb(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| DbError::LanceDb(e.to_string()))?;

        let mut matches = Vec::new();
        for batch in results {
            if let (Some(id_col), Some(content_col), Some(metadata_col), Some(dist_col)) = (
                batch.column_by_name("id"),
                batch.column_by_name("content"),
                batch.column_by_name("metadata"),
                batch.column_by_name("_distance"),
            ) {
                let ids: &arrow_array::StringArray = id_col.as_string::<i32>();
                let contents: &arrow_array::StringArray = content_col.as_string::<i32>();
                let metadata: &arrow_array::StringArray = metadata_col.as_string::<i32>();
                let dists: &arrow_array::PrimitiveArray<Float32Type> = dist_col.as_primitive();

                for i in 0..ids.len() {
                    // Zero vectors have no cosine distance.
                    if !(ids.is_valid(i) && contents.is_valid(i) && dists.is_valid(i))
                        || dists.value(i).is_nan()
                    {
                        continue;
                    }
                    let parsed: BTreeMap<String, String> =
                        serde_json::from_str(metadata.value(i)).unwrap_or_else(|error| {
                            tracing::warn!(%error, id = ids.value(i), "unreadable chunk metadata");
                            BTreeMap::new()
                        });
                    matches.push(RetrievedChunk {
                        id: ids.value(i).to_string(),
                        text: contents.value(i).to_string(),
                        metadata: parsed,
                        score: 1.0 - dists.value(i),
                    });
                }
            }
        }

        // Batches arrive individually sorted; restore a global ranking.
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(matches)
    }

    async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| DbError::LanceDb(e.to_string()).into())
    }
}
