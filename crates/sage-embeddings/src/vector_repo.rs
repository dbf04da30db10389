//! Vector repository with `SQLite` BLOB storage and brute-force KNN search.
//!
//! Rows are keyed by `(entry_id, model_id)`: an entry may carry one vector
//! per model, and queries only ever see vectors from the query's model.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, params};

use crate::errors::{EmbeddingError, Result};
use crate::normalize::cosine_similarity;

/// Shared handle used by the knowledge store and retriever.
pub type SharedVectorRepository = Arc<Mutex<VectorRepository>>;

/// Convert an f32 slice to a byte blob for storage.
pub fn f32_slice_to_blob(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert a byte blob back to an f32 vector.
pub fn blob_to_f32_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Options for vector search.
#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    /// Maximum number of results to return (0 = 10).
    pub limit: usize,
    /// Restrict to a single domain.
    pub domain: Option<String>,
    /// Drop hits below this similarity.
    pub min_similarity: f32,
}

/// A single search result.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorHit {
    /// Knowledge entry the vector belongs to.
    pub entry_id: String,
    /// Domain of that entry.
    pub domain: String,
    /// Cosine similarity score (higher = more similar).
    pub similarity: f32,
}

/// Vector repository using a regular `SQLite` table.
pub struct VectorRepository {
    conn: Connection,
}

impl VectorRepository {
    /// Wrap an existing connection.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open (or create) a database file and ensure the table exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EmbeddingError::Storage(format!("create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let repo = Self::new(conn);
        repo.ensure_table()?;
        Ok(repo)
    }

    /// Open an in-memory database with the table created.
    pub fn in_memory() -> Result<Self> {
        let repo = Self::new(Connection::open_in_memory()?);
        repo.ensure_table()?;
        Ok(repo)
    }

    /// Wrap into a [`SharedVectorRepository`].
    pub fn shared(self) -> SharedVectorRepository {
        Arc::new(Mutex::new(self))
    }

    /// Create the `knowledge_vectors` table if it doesn't exist.
    pub fn ensure_table(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS knowledge_vectors (
                entry_id TEXT NOT NULL,
                model_id TEXT NOT NULL,
                domain TEXT NOT NULL,
                embedding BLOB NOT NULL,
                PRIMARY KEY (entry_id, model_id)
            );
            CREATE INDEX IF NOT EXISTS idx_knowledge_vectors_model
                ON knowledge_vectors (model_id, domain);",
        )?;
        Ok(())
    }

    /// Store an embedding, replacing any earlier vector for the same
    /// entry and model.
    pub fn store(&self, entry_id: &str, model_id: &str, domain: &str, embedding: &[f32]) -> Result<()> {
        if embedding.is_empty() {
            return Err(EmbeddingError::Storage("refusing to store empty vector".into()));
        }
        let blob = f32_slice_to_blob(embedding);
        let _ = self.conn.execute(
            "INSERT OR REPLACE INTO knowledge_vectors (entry_id, model_id, domain, embedding)
             VALUES (?1, ?2, ?3, ?4)",
            params![entry_id, model_id, domain, blob],
        )?;
        Ok(())
    }

    /// Delete every vector for an entry.
    pub fn delete(&self, entry_id: &str) -> Result<()> {
        let _ = self.conn.execute(
            "DELETE FROM knowledge_vectors WHERE entry_id = ?1",
            params![entry_id],
        )?;
        Ok(())
    }

    /// Count stored vectors.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM knowledge_vectors", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Search for nearest neighbors among vectors from `model_id`.
    pub fn search(&self, model_id: &str, query: &[f32], opts: &SearchOptions) -> Result<Vec<VectorHit>> {
        let limit = if opts.limit == 0 { 10 } else { opts.limit };
        let rows = self.load_vectors(model_id, opts.domain.as_deref())?;
        let mut hits: Vec<VectorHit> = rows
            .into_iter()
            .filter_map(|(entry_id, domain, blob)| {
                let similarity = cosine_similarity(query, &blob_to_f32_vec(&blob));
                (similarity >= opts.min_similarity).then_some(VectorHit {
                    entry_id,
                    domain,
                    similarity,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    /// All `(entry_id, vector)` pairs of one domain under one model.
    pub fn vectors_for_domain(&self, domain: &str, model_id: &str) -> Result<Vec<(String, Vec<f32>)>> {
        Ok(self
            .load_vectors(model_id, Some(domain))?
            .into_iter()
            .map(|(entry_id, _, blob)| (entry_id, blob_to_f32_vec(&blob)))
            .collect())
    }

    fn load_vectors(&self, model_id: &str, domain: Option<&str>) -> Result<Vec<(String, String, Vec<u8>)>> {
        let extract_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, String, Vec<u8>)> {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        };

        let rows = if let Some(domain) = domain {
            let mut stmt = self.conn.prepare(
                "SELECT entry_id, domain, embedding FROM knowledge_vectors
                 WHERE model_id = ?1 AND domain = ?2",
            )?;
            stmt.query_map(params![model_id, domain], extract_row)?
                .filter_map(std::result::Result::ok)
                .collect()
        } else {
            let mut stmt = self.conn.prepare(
                "SELECT entry_id, domain, embedding FROM knowledge_vectors WHERE model_id = ?1",
            )?;
            stmt.query_map(params![model_id], extract_row)?
                .filter_map(std::result::Result::ok)
                .collect()
        };
        Ok(rows)
    }
}
