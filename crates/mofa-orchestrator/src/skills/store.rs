//! Embedded persistence and similarity search for skills.
//!
//! No `sqlite-vec` binding exists anywhere in this workspace's dependency
//! set, so rows are stored in a plain `rusqlite` table (embeddings as a
//! little-endian f32 blob) and `search` does a brute-force linear scan —
//! fine at the scale of a handful of skill documents.

use super::loader::Skill;
use crate::error::SkillStoreError;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_VECTOR_DIM: usize = 384;
const MAX_CONTENT_LEN: usize = 32_000;

pub trait Embedder: Send + Sync {
    /// Returns `None` when the embedder can't produce a vector for `text`
    /// (no model loaded, transient failure) — callers degrade to the
    /// trigger/tag fallback in that case, they never treat it as fatal.
    fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

fn encode_embedding(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

pub struct SkillStore {
    conn: Connection,
    vector_dim: usize,
    embedder: Option<Arc<dyn Embedder>>,
}

impl SkillStore {
    pub fn open(db_path: &Path, vector_dim: usize, embedder: Option<Arc<dyn Embedder>>) -> Result<Self, SkillStoreError> {
        if let Some(parent) = db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(db_path)?;
        let store = Self { conn, vector_dim, embedder };
        store.ensure_table()?;
        Ok(store)
    }

    pub fn open_in_memory(vector_dim: usize, embedder: Option<Arc<dyn Embedder>>) -> Result<Self, SkillStoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn, vector_dim, embedder };
        store.ensure_table()?;
        Ok(store)
    }

    fn ensure_table(&self) -> Result<(), SkillStoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS skill_vec (
                skill_name TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL
            );",
        )?;
        Ok(())
    }

    fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if text.is_empty() {
            return None;
        }
        self.embedder.as_ref()?.embed(text)
    }

    /// Full rebuild: drops and recreates the table so a reindex never mixes
    /// stale rows from skills that were since removed.
    pub fn index_skills(&self, skills: &[Skill]) -> Result<usize, SkillStoreError> {
        self.conn.execute("DROP TABLE IF EXISTS skill_vec", [])?;
        self.ensure_table()?;

        let mut count = 0;
        for skill in skills {
            let mut content = if !skill.instructions.trim().is_empty() {
                skill.instructions.trim().to_string()
            } else {
                skill.description.trim().to_string()
            };
            if content.chars().count() > MAX_CONTENT_LEN {
                content = content.chars().take(MAX_CONTENT_LEN).collect::<String>() + "\n...";
            }

            let Some(embedding) = self.embed(&content) else {
                continue;
            };
            if embedding.len() != self.vector_dim {
                warn!(skill = %skill.name, got = embedding.len(), expected = self.vector_dim, "embedding dimension mismatch, skipping");
                continue;
            }

            self.conn.execute(
                "INSERT INTO skill_vec (skill_name, content, embedding) VALUES (?1, ?2, ?3)",
                params![skill.name, content, encode_embedding(&embedding)],
            )?;
            count += 1;
        }

        info!(count, "indexed skills into skill_vec");
        Ok(count)
    }

    /// Indexes `skills` only if the table is currently empty and an
    /// embedder is configured. Returns whether indexing actually happened.
    pub fn ensure_indexed(&self, skills: &[Skill]) -> Result<bool, SkillStoreError> {
        if self.embedder.is_none() || skills.is_empty() {
            return Ok(false);
        }
        self.ensure_table()?;
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM skill_vec", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(false);
        }
        self.index_skills(skills)?;
        Ok(true)
    }

    /// Nearest neighbours by squared Euclidean distance, ascending.
    /// Empty if there's no embedder or no indexed rows.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<(String, String, f32)>, SkillStoreError> {
        let Some(query_embedding) = self.embed(query) else {
            return Ok(Vec::new());
        };

        let mut stmt = self.conn.prepare("SELECT skill_name, content, embedding FROM skill_vec")?;
        let mut rows: Vec<(String, String, f32)> = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let content: String = row.get(1)?;
                let embedding: Vec<u8> = row.get(2)?;
                Ok((name, content, embedding))
            })?
            .filter_map(|r| r.ok())
            .map(|(name, content, blob)| {
                let dist = squared_distance(&query_embedding, &decode_embedding(&blob));
                (name, content, dist)
            })
            .collect();

        rows.sort_by(|a, b| a.2.total_cmp(&b.2));
        rows.truncate(top_k);
        Ok(rows)
    }
}

#[cfg(test)]
pub struct FakeEmbedder;

#[cfg(test)]
impl Embedder for FakeEmbedder {
    /// A toy embedding: dimension = `vector_dim`, first component is the
    /// text's length mod 7, rest zero. Enough to make nearest-neighbour
    /// ordering deterministic in tests without pulling in a real model.
    fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let mut v = vec![0.0f32; DEFAULT_VECTOR_DIM];
        v[0] = (text.len() % 7) as f32;
        Some(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::loader::Skill;

    fn skill(name: &str, instructions: &str) -> Skill {
        Skill {
            name: name.to_string(),
            instructions: instructions.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn ensure_indexed_is_idempotent_and_requires_embedder() {
        let store = SkillStore::open_in_memory(DEFAULT_VECTOR_DIM, Some(Arc::new(FakeEmbedder))).unwrap();
        let skills = vec![skill("a", "aa"), skill("b", "bbbb")];

        assert!(store.ensure_indexed(&skills).unwrap());
        assert!(!store.ensure_indexed(&skills).unwrap());
    }

    #[test]
    fn search_without_embedder_returns_empty() {
        let store = SkillStore::open_in_memory(DEFAULT_VECTOR_DIM, None).unwrap();
        let hits = store.search("anything", 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn search_finds_closest_by_distance() {
        let store = SkillStore::open_in_memory(DEFAULT_VECTOR_DIM, Some(Arc::new(FakeEmbedder))).unwrap();
        store.index_skills(&[skill("short", "ab"), skill("long", "abcdefg")]).unwrap();

        let hits = store.search("ab", 2).unwrap();
        assert_eq!(hits[0].0, "short");
    }

    #[test]
    fn dimension_mismatch_rows_are_skipped() {
        struct WrongDim;
        impl Embedder for WrongDim {
            fn embed(&self, _text: &str) -> Option<Vec<f32>> {
                Some(vec![0.0; 3])
            }
        }
        let store = SkillStore::open_in_memory(DEFAULT_VECTOR_DIM, Some(Arc::new(WrongDim))).unwrap();
        let count = store.index_skills(&[skill("a", "aa")]).unwrap();
        assert_eq!(count, 0);
    }
}
