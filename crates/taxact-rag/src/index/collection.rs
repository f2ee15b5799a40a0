//! SQLite-backed chunk collection with metadata filtering
//!
//! Stores chunk text, filterable metadata columns, and the embedding as a
//! little-endian `f32` blob. Filters are pushed down as SQL equality
//! constraints; ranking is squared L2 over the filtered rows.

use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::{
    Chunk, ChunkMetadata, FilterValue, MetadataFilter, ResultId, RetrievalResult, SectionType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Text,
    Integer,
    Flag,
}

/// Metadata columns that filters may reference
const FILTER_COLUMNS: &[(&str, ColumnKind)] = &[
    ("document_name", ColumnKind::Text),
    ("section_type", ColumnKind::Text),
    ("section_number", ColumnKind::Text),
    ("section_title", ColumnKind::Text),
    ("page_start", ColumnKind::Integer),
    ("page_end", ColumnKind::Integer),
    ("contains_definition", ColumnKind::Flag),
    ("contains_rate", ColumnKind::Flag),
    ("contains_date", ColumnKind::Flag),
    ("contains_amount", ColumnKind::Flag),
];

/// Collection key for the chunk at `ordinal`
pub fn chunk_key(ordinal: usize) -> String {
    format!("chunk_{}", ordinal)
}

/// Persistent, filterable chunk collection
pub struct ChunkCollection {
    conn: Arc<Mutex<Connection>>,
}

impl ChunkCollection {
    /// Open (or create) the collection at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::storage(format!("Failed to open collection: {}", e)))?;

        let collection = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        collection.migrate()?;
        Ok(collection)
    }

    /// Open an existing collection, failing if it was never built
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::missing_artifact(path, "run the index command to build it"));
        }
        Self::open(path)
    }

    /// Create an in-memory collection
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::storage(format!("Failed to open in-memory collection: {}", e)))?;

        let collection = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        collection.migrate()?;
        Ok(collection)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                ordinal INTEGER NOT NULL,
                text TEXT NOT NULL,
                document_name TEXT NOT NULL,
                section_type TEXT NOT NULL,
                section_number TEXT NOT NULL,
                section_title TEXT NOT NULL,
                page_start INTEGER NOT NULL,
                page_end INTEGER NOT NULL,
                contains_definition INTEGER NOT NULL,
                contains_rate INTEGER NOT NULL,
                contains_date INTEGER NOT NULL,
                contains_amount INTEGER NOT NULL,
                embedding BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_chunks_section_type ON chunks(section_type);
            CREATE INDEX IF NOT EXISTS idx_chunks_document_name ON chunks(document_name);

            CREATE TABLE IF NOT EXISTS collection_info (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    /// Remove every chunk and collection setting
    pub fn clear(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch("DELETE FROM chunks; DELETE FROM collection_info;")?;
        Ok(())
    }

    /// Record the embedding model and dimension the collection was built with
    pub fn set_embedding_info(&self, model: &str, dimension: usize) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO collection_info (key, value) VALUES ('model', ?1)",
            params![model],
        )?;
        conn.execute(
            "INSERT OR REPLACE INTO collection_info (key, value) VALUES ('dimension', ?1)",
            params![dimension.to_string()],
        )?;
        Ok(())
    }

    pub fn embedding_model(&self) -> Result<Option<String>> {
        self.info("model")
    }

    pub fn dimension(&self) -> Result<Option<usize>> {
        match self.info("dimension")? {
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|_| Error::storage(format!("Invalid stored dimension '{}'", v))),
            None => Ok(None),
        }
    }

    fn info(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM collection_info WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert chunks with their embeddings; chunk `i` of the slice gets `first_ordinal + i`
    pub fn insert_batch(
        &self,
        first_ordinal: usize,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(Error::storage(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"INSERT OR REPLACE INTO chunks (
                    id, ordinal, text, document_name, section_type, section_number,
                    section_title, page_start, page_end, contains_definition,
                    contains_rate, contains_date, contains_amount, embedding
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"#,
            )?;

            for (i, (chunk, embedding)) in chunks.iter().zip(embeddings).enumerate() {
                let ordinal = first_ordinal + i;
                stmt.execute(params![
                    chunk_key(ordinal),
                    ordinal as i64,
                    chunk.text,
                    chunk.document_name,
                    chunk.section_type.as_str(),
                    chunk.section_number,
                    chunk.section_title,
                    chunk.page_start as i64,
                    chunk.page_end as i64,
                    chunk.contains_definition,
                    chunk.contains_rate,
                    chunk.contains_date,
                    chunk.contains_amount,
                    encode_embedding(embedding),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Nearest chunks to `embedding` among rows matching `filter`
    pub fn query(
        &self,
        embedding: &[f32],
        filter: Option<&MetadataFilter>,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        if let Some(dimension) = self.dimension()? {
            if embedding.len() != dimension {
                return Err(Error::dimension_mismatch(
                    "collection query",
                    dimension,
                    embedding.len(),
                ));
            }
        }

        let (where_clause, values) = match filter {
            Some(filter) if !filter.is_empty() => build_where(filter)?,
            _ => (String::new(), Vec::new()),
        };

        let sql = format!(
            r#"SELECT id, text, document_name, section_type, section_number, section_title,
                      page_start, page_end, contains_definition, contains_rate,
                      contains_date, contains_amount, embedding
               FROM chunks{}
               ORDER BY ordinal"#,
            where_clause
        );

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            let metadata = ChunkMetadata {
                document_name: row.get(2)?,
                section_type: SectionType::from_name(&row.get::<_, String>(3)?),
                section_number: row.get(4)?,
                section_title: row.get(5)?,
                page_start: row.get::<_, i64>(6)? as u32,
                page_end: row.get::<_, i64>(7)? as u32,
                contains_definition: row.get(8)?,
                contains_rate: row.get(9)?,
                contains_date: row.get(10)?,
                contains_amount: row.get(11)?,
            };
            let blob: Vec<u8> = row.get(12)?;
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, metadata, blob))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, text, metadata, blob) = row?;
            let stored = decode_embedding(&blob);
            if stored.len() != embedding.len() {
                return Err(Error::dimension_mismatch(
                    format!("collection row {}", id),
                    embedding.len(),
                    stored.len(),
                ));
            }
            results.push(RetrievalResult {
                id: ResultId::Key(id),
                text,
                metadata,
                distance: squared_l2(&stored, embedding),
            });
        }

        // stable sort keeps ordinal order for equal distances
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(k);
        Ok(results)
    }
}

fn build_where(filter: &MetadataFilter) -> Result<(String, Vec<Value>)> {
    let mut clauses = Vec::with_capacity(filter.len());
    let mut values = Vec::with_capacity(filter.len());

    for (field, value) in filter.iter() {
        let kind = FILTER_COLUMNS
            .iter()
            .find(|(name, _)| *name == field.as_str())
            .map(|(_, kind)| *kind)
            .ok_or_else(|| Error::InvalidFilter(format!("unknown field '{}'", field)))?;

        let sql_value = match (kind, value) {
            (ColumnKind::Text, FilterValue::Text(s)) => Value::Text(s.clone()),
            (ColumnKind::Integer, FilterValue::Integer(n)) => Value::Integer(*n),
            (ColumnKind::Flag, FilterValue::Bool(b)) => Value::Integer(i64::from(*b)),
            _ => {
                return Err(Error::InvalidFilter(format!(
                    "field '{}' cannot be compared with {:?}",
                    field, value
                )));
            }
        };

        clauses.push(format!("{} = ?{}", field, values.len() + 1));
        values.push(sql_value);
    }

    Ok((format!(" WHERE {}", clauses.join(" AND ")), values))
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
