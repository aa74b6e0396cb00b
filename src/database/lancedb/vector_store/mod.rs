
use super::{ChunkMetadata, ChunkRecord, IndexManifest};
use crate::{RagError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the LanceDB table holding chunk rows
pub const TABLE_NAME: &str = "chunks";

/// Persisted chunk index backed by LanceDB.
///
/// A store only exists for a completely built index: [`VectorStore::create`] writes every row
/// before the manifest, and [`VectorStore::open`] refuses a directory without one.
pub struct VectorStore {
    connection: Connection,
    index_dir: PathBuf,
    manifest: IndexManifest,
}

/// A stored chunk returned by similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub metadata: ChunkMetadata,
    /// Cosine similarity, higher is closer
    pub score: f32,
    pub distance: f32,
}

/// True when `index_dir` holds a manifest and the chunk table, i.e. a finished build
#[inline]
pub fn index_exists(index_dir: &Path) -> bool {
    IndexManifest::path(index_dir).is_file() && table_path(index_dir).is_dir()
}

fn table_path(index_dir: &Path) -> PathBuf {
    index_dir.join(format!("{}.lance", TABLE_NAME))
}

async fn connect(index_dir: &Path) -> Result<Connection> {
    let uri = index_dir.to_string_lossy();
    debug!("Connecting to LanceDB at {}", uri);
    lancedb::connect(&uri)
        .execute()
        .await
        .map_err(|e| RagError::Database(format!("Failed to connect to LanceDB: {}", e)))
}

impl VectorStore {
    /// Build a new index in `index_dir` from embedded chunks, replacing any previous one.
    ///
    /// The manifest of an existing index is removed first and the new manifest is written
    /// only after the rows are stored, so an interrupted build never looks complete.
    #[inline]
    pub async fn create(
        index_dir: &Path,
        records: Vec<ChunkRecord>,
        manifest: IndexManifest,
    ) -> Result<Self> {
        if records.is_empty() {
            return Err(RagError::EmptyIndex(
                "no chunks were produced from the knowledge base".to_string(),
            ));
        }
        if manifest.dimension == 0 {
            return Err(RagError::Database(
                "Embedding dimension must be greater than zero".to_string(),
            ));
        }
        if let Some(bad) = records
            .iter()
            .find(|r| r.vector.len() != manifest.dimension)
        {
            return Err(RagError::Database(format!(
                "Inconsistent embedding dimension: expected {}, got {} for chunk from {}",
                manifest.dimension,
                bad.vector.len(),
                bad.metadata.source
            )));
        }

        std::fs::create_dir_all(index_dir)?;
        IndexManifest::remove(index_dir)?;

        let connection = connect(index_dir).await?;
        drop_table_if_exists(&connection).await?;

        let schema = create_schema(manifest.dimension)?;
        connection
            .create_empty_table(TABLE_NAME, Arc::clone(&schema))
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to create table: {}", e)))?;

        let table = connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))?;

        let record_batch = create_record_batch(schema, &records, manifest.dimension)?;
        let batch_schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), batch_schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to insert chunks: {}", e)))?;

        manifest.write(index_dir)?;
        info!(
            "Stored {} chunks ({} dimensions) in {}",
            records.len(),
            manifest.dimension,
            index_dir.display()
        );

        Ok(Self {
            connection,
            index_dir: index_dir.to_path_buf(),
            manifest,
        })
    }

    /// Open a previously built index
    #[inline]
    pub async fn open(index_dir: &Path) -> Result<Self> {
        if !index_exists(index_dir) {
            return Err(RagError::IndexNotFound(index_dir.to_path_buf()));
        }

        let manifest = IndexManifest::read(index_dir)?;
        let connection = connect(index_dir).await?;

        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to list tables: {}", e)))?;
        if !table_names.iter().any(|name| name == TABLE_NAME) {
            warn!("Manifest present but table '{}' is missing", TABLE_NAME);
            return Err(RagError::IndexNotFound(index_dir.to_path_buf()));
        }

        let store = Self {
            connection,
            index_dir: index_dir.to_path_buf(),
            manifest,
        };

        let stored_dimension = store.detect_vector_dimension().await?;
        if stored_dimension != store.manifest.dimension {
            return Err(RagError::Database(format!(
                "Index manifest declares {} dimensions but the table stores {}",
                store.manifest.dimension, stored_dimension
            )));
        }

        debug!(
            "Opened index in {} built with {}",
            index_dir.display(),
            store.manifest.embedding_model
        );
        Ok(store)
    }

    #[inline]
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    #[inline]
    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    async fn open_table(&self) -> Result<lancedb::Table> {
        self.connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to open table: {}", e)))
    }

    async fn detect_vector_dimension(&self) -> Result<usize> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| RagError::Database(format!("Failed to get table schema: {}", e)))?;

        let field = schema
            .field_with_name("vector")
            .map_err(|_| RagError::Database("Missing vector column".to_string()))?;
        match field.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size)
                .map_err(|_| RagError::Database(format!("Invalid vector size {}", size))),
            other => Err(RagError::Database(format!(
                "Unexpected vector column type {}",
                other
            ))),
        }
    }

    /// Return up to `k` chunks closest to `query_vector` by cosine distance, best first
    #[inline]
    pub async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query_vector.len() != self.manifest.dimension {
            return Err(RagError::Database(format!(
                "Query embedding has {} dimensions but the index was built with {} ({}). Rebuild the index.",
                query_vector.len(),
                self.manifest.dimension,
                self.manifest.embedding_model
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        debug!("Searching for {} nearest chunks", k);

        let results = self
            .open_table()
            .await?
            .vector_search(query_vector)
            .map_err(|e| RagError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(|e| RagError::Database(format!("Failed to execute search: {}", e)))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| RagError::Database(format!("Failed to read result stream: {}", e)))?;

        let mut search_results = Vec::new();
        for batch in &batches {
            search_results.extend(parse_search_batch(batch)?);
        }
        search_results.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        debug!("Search returned {} results", search_results.len());
        Ok(search_results)
    }

    /// Number of stored chunks
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| RagError::Database(format!("Failed to count rows: {}", e)))?;
        Ok(count)
    }
}

async fn drop_table_if_exists(connection: &Connection) -> Result<()> {
    let table_names = connection
        .table_names()
        .execute()
        .await
        .map_err(|e| RagError::Database(format!("Failed to list tables for drop: {}", e)))?;

    if table_names.iter().any(|name| name == TABLE_NAME) {
        info!("Dropping existing chunk table");
        connection
            .drop_table(TABLE_NAME)
            .await
            .map_err(|e| RagError::Database(format!("Failed to drop table: {}", e)))?;
    }
    Ok(())
}

fn vector_size(dimension: usize) -> Result<i32> {
    i32::try_from(dimension)
        .map_err(|_| RagError::Database(format!("Vector dimension {} is too large", dimension)))
}

fn create_schema(dimension: usize) -> Result<Arc<Schema>> {
    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_size(dimension)?,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("file_name", DataType::Utf8, false),
        Field::new("page", DataType::UInt32, true),
        Field::new("start_index", DataType::UInt32, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("created_at", DataType::Utf8, false),
    ])))
}

fn create_record_batch(
    schema: Arc<Schema>,
    records: &[ChunkRecord],
    dimension: usize,
) -> Result<RecordBatch> {
    let len = records.len();

    let mut ids = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * dimension);
    let mut contents = Vec::with_capacity(len);
    let mut sources = Vec::with_capacity(len);
    let mut file_names = Vec::with_capacity(len);
    let mut pages = Vec::with_capacity(len);
    let mut start_indices = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);
    let mut created_ats = Vec::with_capacity(len);

    for record in records {
        ids.push(record.id.as_str());
        flat_values.extend_from_slice(&record.vector);
        contents.push(record.metadata.content.as_str());
        sources.push(record.metadata.source.as_str());
        file_names.push(record.metadata.file_name.as_str());
        pages.push(record.metadata.page);
        start_indices.push(record.metadata.start_index);
        chunk_indices.push(record.metadata.chunk_index);
        created_ats.push(record.metadata.created_at.as_str());
    }

    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array = FixedSizeListArray::try_new(
        field,
        vector_size(dimension)?,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| RagError::Database(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(contents)),
        Arc::new(StringArray::from(sources)),
        Arc::new(StringArray::from(file_names)),
        Arc::new(UInt32Array::from(pages)),
        Arc::new(UInt32Array::from(start_indices)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| RagError::Database(format!("Failed to create record batch: {}", e)))
}

fn typed_column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| RagError::Database(format!("Invalid {} column type", name)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
    let contents = typed_column::<StringArray>(batch, "content")?;
    let sources = typed_column::<StringArray>(batch, "source")?;
    let file_names = typed_column::<StringArray>(batch, "file_name")?;
    let pages = typed_column::<UInt32Array>(batch, "page")?;
    let start_indices = typed_column::<UInt32Array>(batch, "start_index")?;
    let chunk_indices = typed_column::<UInt32Array>(batch, "chunk_index")?;
    let created_ats = typed_column::<StringArray>(batch, "created_at")?;
    let distances = typed_column::<Float32Array>(batch, "_distance")?;

    let results = (0..batch.num_rows())
        .filter_map(|row| {
            // A row without a distance cannot be ranked
            if distances.is_null(row) {
                warn!("Skipping search result without a distance");
                return None;
            }
            let distance = distances.value(row);

            let metadata = ChunkMetadata {
                content: contents.value(row).to_string(),
                source: sources.value(row).to_string(),
                file_name: file_names.value(row).to_string(),
                page: (!pages.is_null(row)).then(|| pages.value(row)),
                start_index: start_indices.value(row),
                chunk_index: chunk_indices.value(row),
                created_at: created_ats.value(row).to_string(),
            };

            Some(SearchResult {
                metadata,
                score: 1.0 - distance,
                distance,
            })
        })
        .collect();

    Ok(results)
}
