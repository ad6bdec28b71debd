//! Ingested chunks and visibility-scoped retrieval.
//!
//! A chunk is visible to a user when they own it, when it is public, or
//! when it is shared and the user is in its recipient list. The predicate
//! runs inside SQLite so rows the caller cannot see are never loaded.
//! Recipient matching wraps both the stored list and the candidate id in
//! delimiters, so id `2` does not match a list containing only `12`.

use lorebase_shared::embedding;
use lorebase_shared::similarity::{cosine_similarity, top_k};
use lorebase_shared::{RecipientSet, UserId, Visibility};
use rusqlite::{params, ToSql, Transaction};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Chunk, ChunkMatch, LibraryEntry, NewChunk};
use crate::timestamp;

const CHUNK_COLUMNS: &str =
    "c.id, c.user_id, c.source, c.text, c.tags, c.summary, c.visibility, c.shared_with, c.created_at";

/// Visibility predicate over alias `c`, user id bound as `?1`.
const VISIBLE_TO_USER: &str = "(c.user_id = ?1
    OR c.visibility = 'public'
    OR (c.visibility = 'shared'
        AND instr(',' || REPLACE(COALESCE(c.shared_with, ''), ' ', '') || ',',
                  ',' || ?1 || ',') > 0))";

/// Unscoped predicate, single-tenant mode only.
const VISIBLE_TO_ALL: &str = "1 = 1";

impl Database {
    // ------------------------------------------------------------------
    // Ingest
    // ------------------------------------------------------------------

    /// Store one chunk. Returns its id.
    pub fn insert_chunk(&self, owner: UserId, source: &str, chunk: &NewChunk) -> Result<i64> {
        self.write_tx(|tx| insert_chunk_tx(tx, owner, source, chunk))
    }

    /// Replace everything `owner` has stored for `source` with `chunks`, in
    /// one transaction. Re-ingesting a source never merges with the previous
    /// ingestion.
    pub fn replace_source_chunks(
        &self,
        owner: UserId,
        source: &str,
        chunks: &[NewChunk],
    ) -> Result<Vec<i64>> {
        let (removed, ids) = self.write_tx(|tx| {
            let removed = tx.execute(
                "DELETE FROM chunks WHERE user_id = ?1 AND source = ?2",
                params![owner.0, source],
            )?;
            let ids = chunks
                .iter()
                .map(|c| insert_chunk_tx(tx, owner, source, c))
                .collect::<Result<Vec<_>>>()?;
            Ok((removed, ids))
        })?;

        tracing::info!(
            owner = %owner,
            source,
            removed,
            inserted = ids.len(),
            "replaced source chunks"
        );
        Ok(ids)
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// The `k` chunks most similar to `query` among those visible to `user`,
    /// best first.
    pub fn search_by_user(&self, user: UserId, query: &[f32], k: usize) -> Result<Vec<ChunkMatch>> {
        self.rank_chunks(VISIBLE_TO_USER, params![user.0], query, k)
    }

    /// Like [`search_by_user`](Self::search_by_user) with no visibility
    /// filter. Reserved for single-tenant installs.
    pub fn search_all(&self, query: &[f32], k: usize) -> Result<Vec<ChunkMatch>> {
        self.rank_chunks(VISIBLE_TO_ALL, params![], query, k)
    }

    fn rank_chunks(
        &self,
        predicate: &str,
        args: &[&dyn ToSql],
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ChunkMatch>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHUNK_COLUMNS}, c.embedding FROM chunks c WHERE {predicate}"
        ))?;
        let rows = stmt.query_map(args, |row| Ok((row_to_chunk(row)?, row.get::<_, Vec<u8>>(9)?)))?;

        let mut candidates = Vec::new();
        for row in rows {
            let (chunk, blob) = row?;
            let Some(vector) = embedding::decode(&blob) else {
                tracing::warn!(
                    chunk_id = chunk.id,
                    source = %chunk.source,
                    len = blob.len(),
                    "skipping chunk with corrupt embedding"
                );
                continue;
            };
            candidates.push((cosine_similarity(query, &vector), chunk));
        }

        let scanned = candidates.len();
        let matches: Vec<ChunkMatch> = top_k(candidates, k)
            .into_iter()
            .map(|s| ChunkMatch {
                chunk: s.item,
                score: s.score,
            })
            .collect();

        tracing::debug!(scanned, returned = matches.len(), "ranked chunks");
        Ok(matches)
    }

    // ------------------------------------------------------------------
    // Library
    // ------------------------------------------------------------------

    /// Per-source summary of the chunks visible to `user`, newest source
    /// first.
    pub fn library_by_user(&self, user: UserId) -> Result<Vec<LibraryEntry>> {
        self.library(VISIBLE_TO_USER, params![user.0])
    }

    /// Unscoped library, single-tenant installs only.
    pub fn library_all(&self) -> Result<Vec<LibraryEntry>> {
        self.library(VISIBLE_TO_ALL, params![])
    }

    fn library(&self, predicate: &str, args: &[&dyn ToSql]) -> Result<Vec<LibraryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT g.source, g.user_id, g.chunk_count, g.first_created,
                    (SELECT c.summary FROM chunks c
                     WHERE c.user_id = g.user_id AND c.source = g.source
                       AND c.summary IS NOT NULL AND {predicate}
                     ORDER BY c.id DESC LIMIT 1),
                    (SELECT c.tags FROM chunks c
                     WHERE c.user_id = g.user_id AND c.source = g.source
                       AND c.tags IS NOT NULL AND {predicate}
                     ORDER BY c.id DESC LIMIT 1),
                    last.visibility, last.shared_with
             FROM (SELECT c.source, c.user_id,
                          COUNT(*)          AS chunk_count,
                          MIN(c.created_at) AS first_created,
                          MAX(c.id)         AS last_id
                   FROM chunks c
                   WHERE {predicate}
                   GROUP BY c.user_id, c.source) g
             JOIN chunks last ON last.id = g.last_id
             ORDER BY g.first_created DESC, g.last_id DESC"
        ))?;

        let rows = stmt.query_map(args, |row| {
            let visibility = visibility_column(row, 6)?;
            Ok(LibraryEntry {
                source: row.get(0)?,
                owner: UserId(row.get(1)?),
                chunk_count: row.get(2)?,
                created_at: timestamp::column(row, 3)?,
                summary: row.get(4)?,
                tags: decode_tags(row.get::<_, Option<String>>(5)?.as_deref()),
                visibility,
                shared_with: recipients_column(row, 7, visibility)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Owner-only mutations
    // ------------------------------------------------------------------

    /// Delete `owner`'s chunks for `source`. Chunks of the same source owned
    /// by someone else are untouched even when `owner` can read them.
    pub fn delete_chunks_by_source(&self, owner: UserId, source: &str) -> Result<usize> {
        let removed = self.conn()?.execute(
            "DELETE FROM chunks WHERE user_id = ?1 AND source = ?2",
            params![owner.0, source],
        )?;
        tracing::info!(owner = %owner, source, removed, "deleted source chunks");
        Ok(removed)
    }

    /// Change who can read `owner`'s chunks for `source`.
    pub fn set_source_visibility(
        &self,
        owner: UserId,
        source: &str,
        visibility: Visibility,
        shared_with: &RecipientSet,
    ) -> Result<usize> {
        let updated = self.conn()?.execute(
            "UPDATE chunks SET visibility = ?1, shared_with = ?2
             WHERE user_id = ?3 AND source = ?4",
            params![
                visibility.as_str(),
                recipients_to_column(visibility, shared_with),
                owner.0,
                source
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        tracing::info!(owner = %owner, source, %visibility, "changed source visibility");
        Ok(updated)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn insert_chunk_tx(tx: &Transaction<'_>, owner: UserId, source: &str, chunk: &NewChunk) -> Result<i64> {
    tx.execute(
        "INSERT INTO chunks (user_id, source, text, embedding, tags, summary, visibility, shared_with, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            owner.0,
            source,
            chunk.text,
            embedding::encode(&chunk.embedding),
            encode_tags(&chunk.tags),
            chunk.summary,
            chunk.visibility.as_str(),
            recipients_to_column(chunk.visibility, &chunk.shared_with),
            timestamp::now_sql(),
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Recipients are only persisted for shared chunks.
fn recipients_to_column(visibility: Visibility, recipients: &RecipientSet) -> Option<String> {
    match visibility {
        Visibility::Shared => recipients.to_column(),
        _ => None,
    }
}

fn encode_tags(tags: &[String]) -> Option<String> {
    let cleaned: Vec<&str> = tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.join(","))
    }
}

fn decode_tags(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

fn visibility_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Visibility> {
    let raw: String = row.get(idx)?;
    raw.parse::<Visibility>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn recipients_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
    visibility: Visibility,
) -> rusqlite::Result<RecipientSet> {
    if visibility != Visibility::Shared {
        return Ok(RecipientSet::new());
    }
    let raw: Option<String> = row.get(idx)?;
    let raw = raw.unwrap_or_default();
    Ok(RecipientSet::try_from_column(&raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring malformed recipient ids");
        RecipientSet::from_column_lossy(&raw)
    }))
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    let visibility = visibility_column(row, 6)?;
    Ok(Chunk {
        id: row.get(0)?,
        owner: UserId(row.get(1)?),
        source: row.get(2)?,
        text: row.get(3)?,
        tags: decode_tags(row.get::<_, Option<String>>(4)?.as_deref()),
        summary: row.get(5)?,
        visibility,
        shared_with: recipients_column(row, 7, visibility)?,
        created_at: timestamp::column(row, 8)?,
    })
}
