//! SQLite backend with vector similarity via the `sqlite-vec` extension.
//!
//! Layout mirrors the conceptual schema: a `documents` table for sources, an
//! `embeddings` table keyed by `(document_id, chunk_index)`, and an
//! `embeddings_vec` vec0 virtual table whose rowids track `embeddings.id`.
//! The vec0 table is the nearest-neighbor primitive; everything above it is
//! plain SQL.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tokio_rusqlite::{Connection, OptionalExtension, ffi, params};

use super::{Backend, DocumentRecord, EmbeddingRecord, NewDocument};
use crate::types::{Metadata, RetrievalError, decode_metadata};
use async_trait::async_trait;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename TEXT NOT NULL,
    content TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    file_type TEXT,
    processed_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS embeddings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL,
    content_chunk TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    UNIQUE(document_id, chunk_index)
);
CREATE INDEX IF NOT EXISTS idx_embeddings_document ON embeddings(document_id);
CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const DIMENSION_KEY: &str = "embedding_dimension";

/// Embedding store backed by a single SQLite file.
///
/// The connection is owned by the store and serially used: every operation
/// runs as one closure on the connection's worker thread, and multi-statement
/// writes run inside a transaction, so a failed upsert leaves the prior row
/// state (including "absent") intact.
#[derive(Clone)]
pub struct SqliteRagStore {
    conn: Connection,
    dimension: Arc<AtomicUsize>,
}

impl SqliteRagStore {
    /// Opens (or creates) a store at `path` configured for `dimension`-length
    /// vectors.
    ///
    /// Fails with [`RetrievalError::DimensionMismatch`] when the file already
    /// holds embeddings recorded under a different dimension; the caller must
    /// run [`Backend::reset_dimension`] (or clear the rows) first. Mixed
    /// dimensions cannot coexist in one store.
    pub async fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self, RetrievalError> {
        register_sqlite_vec()?;

        let conn = Connection::open(path)
            .await
            .map_err(|err| storage_err(tokio_rusqlite::Error::from(err)))?;

        // Probe the extension before touching any vec0 table.
        conn.call(|conn| {
            conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))?;
            Ok(())
        })
        .await
        .map_err(storage_err)?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA_SQL)?;
            Ok(())
        })
        .await
        .map_err(storage_err)?;

        let (recorded, existing_rows) = conn
            .call(|conn| {
                let recorded = conn
                    .query_row(
                        "SELECT value FROM store_meta WHERE key = ?1",
                        [DIMENSION_KEY],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?
                    .and_then(|value| value.parse::<usize>().ok());
                let rows: i64 =
                    conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
                Ok((recorded, rows as usize))
            })
            .await
            .map_err(storage_err)?;

        match recorded {
            Some(actual) if actual != dimension && existing_rows > 0 => {
                return Err(RetrievalError::DimensionMismatch {
                    expected: dimension,
                    actual,
                });
            }
            Some(actual) if actual == dimension => {
                ensure_vector_table(&conn, dimension).await?;
            }
            _ => {
                // Fresh store, or an empty one left over from another model.
                rebuild_vector_table(&conn, dimension).await?;
            }
        }

        tracing::debug!(dimension, existing_rows, "opened embedding store");

        Ok(Self {
            conn,
            dimension: Arc::new(AtomicUsize::new(dimension)),
        })
    }

    /// Underlying connection, for queries the [`Backend`] trait does not
    /// cover.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), RetrievalError> {
        let expected = self.dimension.load(Ordering::Relaxed);
        if vector.len() != expected {
            return Err(RetrievalError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for SqliteRagStore {
    fn dimension(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }

    async fn insert_document(
        &self,
        document: NewDocument,
    ) -> Result<DocumentRecord, RetrievalError> {
        let processed_at = Utc::now();
        let NewDocument {
            filename,
            content,
            file_type,
        } = document;
        let file_size = content.len() as i64;
        let stamp = processed_at.to_rfc3339();

        let (id, filename, content, file_type) = self
            .conn
            .call(move |conn| {
                let id: i64 = conn.query_row(
                    "INSERT INTO documents (filename, content, file_size, file_type, processed_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
                    params![filename, content, file_size, file_type, stamp],
                    |row| row.get(0),
                )?;
                Ok((id, filename, content, file_type))
            })
            .await
            .map_err(storage_err)?;

        Ok(DocumentRecord {
            id,
            filename,
            content,
            file_size,
            file_type,
            processed_at,
        })
    }

    async fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>, RetrievalError> {
        self.conn
            .call(move |conn| {
                let record = conn
                    .query_row(
                        "SELECT id, filename, content, file_size, file_type, processed_at \
                         FROM documents WHERE id = ?1",
                        [id],
                        |row| {
                            Ok(DocumentRecord {
                                id: row.get(0)?,
                                filename: row.get(1)?,
                                content: row.get(2)?,
                                file_size: row.get(3)?,
                                file_type: row.get(4)?,
                                processed_at: parse_timestamp(&row.get::<_, String>(5)?),
                            })
                        },
                    )
                    .optional()?;
                Ok(record)
            })
            .await
            .map_err(storage_err)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, RetrievalError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, filename, content, file_size, file_type, processed_at \
                     FROM documents WHERE content IS NOT NULL AND content != '' ORDER BY id",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(DocumentRecord {
                        id: row.get(0)?,
                        filename: row.get(1)?,
                        content: row.get(2)?,
                        file_size: row.get(3)?,
                        file_type: row.get(4)?,
                        processed_at: parse_timestamp(&row.get::<_, String>(5)?),
                    })
                })?;
                let mut records = Vec::new();
                for row in rows {
                    records.push(row?);
                }
                Ok(records)
            })
            .await
            .map_err(storage_err)
    }

    async fn exists(&self, document_id: i64, chunk_index: usize) -> Result<bool, RetrievalError> {
        let chunk_index = chunk_index as i64;
        self.conn
            .call(move |conn| {
                let found = conn
                    .query_row(
                        "SELECT 1 FROM embeddings WHERE document_id = ?1 AND chunk_index = ?2",
                        params![document_id, chunk_index],
                        |_| Ok(()),
                    )
                    .optional()?;
                Ok(found.is_some())
            })
            .await
            .map_err(storage_err)
    }

    async fn upsert_embedding(
        &self,
        document_id: i64,
        chunk_index: usize,
        content_chunk: &str,
        embedding: &[f32],
        metadata: Metadata,
    ) -> Result<i64, RetrievalError> {
        self.check_dimension(embedding)?;

        let content_chunk = content_chunk.to_string();
        let chunk_index = chunk_index as i64;
        let metadata_json = serde_json::Value::Object(metadata).to_string();
        let vector_json = serde_json::to_string(embedding)
            .map_err(|err| RetrievalError::Storage(err.to_string()))?;
        let created_at = Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let id: i64 = tx.query_row(
                    "INSERT INTO embeddings (document_id, content_chunk, chunk_index, metadata, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5) \
                     ON CONFLICT(document_id, chunk_index) DO UPDATE SET \
                         content_chunk = excluded.content_chunk, \
                         metadata = excluded.metadata, \
                         created_at = excluded.created_at \
                     RETURNING id",
                    params![document_id, content_chunk, chunk_index, metadata_json, created_at],
                    |row| row.get(0),
                )?;
                // Replace the vector row in the same transaction so text and
                // embedding commit together or not at all.
                tx.execute("DELETE FROM embeddings_vec WHERE rowid = ?1", [id])?;
                tx.execute(
                    "INSERT INTO embeddings_vec (rowid, embedding) VALUES (?1, ?2)",
                    params![id, vector_json],
                )?;
                tx.commit()?;
                Ok(id)
            })
            .await
            .map_err(storage_err)
    }

    async fn embeddings_for_document(
        &self,
        document_id: i64,
    ) -> Result<Vec<EmbeddingRecord>, RetrievalError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, document_id, chunk_index, content_chunk, metadata, created_at \
                     FROM embeddings WHERE document_id = ?1 ORDER BY chunk_index ASC",
                )?;
                let rows = stmt.query_map([document_id], |row| {
                    Ok(EmbeddingRecord {
                        id: row.get(0)?,
                        document_id: row.get(1)?,
                        chunk_index: row.get::<_, i64>(2)?.max(0) as usize,
                        content_chunk: row.get(3)?,
                        metadata: decode_metadata(&row.get::<_, String>(4)?),
                        created_at: parse_timestamp(&row.get::<_, String>(5)?),
                    })
                })?;
                let mut records = Vec::new();
                for row in rows {
                    records.push(row?);
                }
                Ok(records)
            })
            .await
            .map_err(storage_err)
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        similarity_threshold: f32,
        max_results: usize,
    ) -> Result<Vec<(EmbeddingRecord, f32)>, RetrievalError> {
        self.check_dimension(query_embedding)?;
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let query_json = serde_json::to_string(query_embedding)
            .map_err(|err| RetrievalError::Storage(err.to_string()))?;

        let ranked = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT e.id, e.document_id, e.chunk_index, e.content_chunk, e.metadata, \
                            e.created_at, \
                            vec_distance_cosine(v.embedding, vec_f32(?1)) AS distance \
                     FROM embeddings e \
                     JOIN embeddings_vec v ON v.rowid = e.id \
                     ORDER BY distance ASC, e.id ASC \
                     LIMIT {max_results}"
                ))?;
                let rows = stmt.query_map([&query_json], |row| {
                    let record = EmbeddingRecord {
                        id: row.get(0)?,
                        document_id: row.get(1)?,
                        chunk_index: row.get::<_, i64>(2)?.max(0) as usize,
                        content_chunk: row.get(3)?,
                        metadata: decode_metadata(&row.get::<_, String>(4)?),
                        created_at: parse_timestamp(&row.get::<_, String>(5)?),
                    };
                    let distance: f32 = row.get(6)?;
                    // Convert cosine distance to similarity.
                    Ok((record, 1.0 - distance))
                })?;
                let mut results = Vec::new();
                for row in rows {
                    results.push(row?);
                }
                Ok(results)
            })
            .await
            .map_err(storage_err)?;

        // Rows arrive ordered by distance, so dropping the sub-threshold tail
        // preserves both ranking and the max_results bound exactly.
        Ok(ranked
            .into_iter()
            .filter(|(_, similarity)| *similarity >= similarity_threshold)
            .collect())
    }

    async fn count_embeddings(&self) -> Result<usize, RetrievalError> {
        self.conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(storage_err)
    }

    async fn count_documents(&self) -> Result<usize, RetrievalError> {
        self.conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(storage_err)
    }

    async fn clear_embeddings(&self) -> Result<usize, RetrievalError> {
        let removed = self
            .conn
            .call(|conn| {
                let tx = conn.transaction()?;
                let removed = tx.execute("DELETE FROM embeddings", [])?;
                tx.execute("DELETE FROM embeddings_vec", [])?;
                tx.commit()?;
                Ok(removed)
            })
            .await
            .map_err(storage_err)?;
        tracing::info!(removed, "cleared embedding rows");
        Ok(removed)
    }

    async fn reset_dimension(&self, new_dimension: usize) -> Result<(), RetrievalError> {
        let previous = self.dimension.load(Ordering::Relaxed);
        self.conn
            .call(move |conn| {
                // Virtual-table DDL stays outside explicit transactions; a
                // vec row without its base row is unreachable through the
                // join, so the intermediate states are harmless.
                conn.execute("DELETE FROM embeddings", [])?;
                conn.execute("DROP TABLE IF EXISTS embeddings_vec", [])?;
                conn.execute(
                    &format!(
                        "CREATE VIRTUAL TABLE embeddings_vec USING vec0(embedding float[{new_dimension}])"
                    ),
                    [],
                )?;
                conn.execute(
                    "INSERT INTO store_meta (key, value) VALUES (?1, ?2) \
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![DIMENSION_KEY, new_dimension.to_string()],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)?;
        self.dimension.store(new_dimension, Ordering::Relaxed);
        tracing::info!(previous, new_dimension, "reset store dimension");
        Ok(())
    }
}

async fn ensure_vector_table(conn: &Connection, dimension: usize) -> Result<(), RetrievalError> {
    let present = conn
        .call(|conn| {
            let found = conn
                .query_row(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'embeddings_vec'",
                    [],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
        .map_err(storage_err)?;

    if present {
        return Ok(());
    }
    rebuild_vector_table(conn, dimension).await
}

async fn rebuild_vector_table(conn: &Connection, dimension: usize) -> Result<(), RetrievalError> {
    conn.call(move |conn| {
        conn.execute("DROP TABLE IF EXISTS embeddings_vec", [])?;
        conn.execute(
            &format!("CREATE VIRTUAL TABLE embeddings_vec USING vec0(embedding float[{dimension}])"),
            [],
        )?;
        conn.execute(
            "INSERT INTO store_meta (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![DIMENSION_KEY, dimension.to_string()],
        )?;
        Ok(())
    })
    .await
    .map_err(storage_err)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|stamp| stamp.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn storage_err(err: tokio_rusqlite::Error) -> RetrievalError {
    RetrievalError::Storage(err.to_string())
}

/// Registers sqlite-vec as a process-wide auto extension.
///
/// Must run before the first connection opens; subsequent calls reuse the
/// recorded outcome.
fn register_sqlite_vec() -> Result<(), RetrievalError> {
    use std::sync::Mutex;

    static INIT: Once = Once::new();
    static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let result = unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!("failed to register sqlite-vec extension (code {rc})"))
            } else {
                Ok(())
            }
        };
        *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
    });

    INIT_RESULT
        .lock()
        .expect("init result mutex poisoned")
        .clone()
        .expect("init was called but result not set")
        .map_err(RetrievalError::Storage)
}
