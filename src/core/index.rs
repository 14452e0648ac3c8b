//! Ordered, id-keyed post index.
//!
//! Two views over one collection: `entries` is sorted by cache key
//! descending (most recent first) and `positions` maps id to index in
//! `entries`. Every mutation updates both before returning, and none of
//! them suspend, so callers holding the write lock see them atomically.

use std::collections::HashMap;
use std::ops::Range;

use tracing::warn;

use crate::domain::{ArtifactName, PostMetadata};

/// Result of an upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upserted {
    /// The id was new and has been spliced in at `pos`
    Inserted { pos: usize },

    /// The id already existed; `previous` is the record it replaced.
    /// `moved` is set when the new cache key no longer fit at the old
    /// position and the entry was repositioned.
    Replaced { previous: PostMetadata, moved: bool },
}

/// In-memory index of live posts
#[derive(Debug, Default, Clone)]
pub struct PostIndex {
    entries: Vec<PostMetadata>,
    positions: HashMap<String, usize>,
}

impl PostIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from artifact filenames.
    ///
    /// Names that do not follow the artifact naming convention are skipped.
    /// When several artifacts exist for one id, the greatest name wins and
    /// the others are returned as superseded so the caller can delete them.
    pub fn load<I, S>(names: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut metas: Vec<PostMetadata> = names
            .into_iter()
            .filter_map(|name| {
                let name = name.as_ref();
                let parsed = ArtifactName::parse(name);
                if parsed.is_none() {
                    warn!("Skipping unrecognized artifact file: {}", name);
                }
                // Keep the on-disk spelling so later deletes hit the right file
                parsed.map(|n| PostMetadata {
                    cache_key: name.to_string(),
                    ..PostMetadata::from_name(&n)
                })
            })
            .collect();

        metas.sort_by(|a, b| b.cache_key.cmp(&a.cache_key));

        let mut index = Self::new();
        let mut superseded = Vec::new();

        for mut meta in metas {
            if index.positions.contains_key(&meta.id) {
                superseded.push(meta.cache_key);
                continue;
            }
            meta.pos = index.entries.len();
            index.positions.insert(meta.id.clone(), meta.pos);
            index.entries.push(meta);
        }

        (index, superseded)
    }

    /// Insert a new entry or replace the existing one with the same id.
    ///
    /// A replacement keeps its position as long as the new cache key still
    /// sorts between its neighbours; otherwise it is moved.
    pub fn upsert(&mut self, mut meta: PostMetadata) -> Upserted {
        if let Some(&pos) = self.positions.get(&meta.id) {
            if self.fits_at(pos, &meta.cache_key) {
                meta.pos = pos;
                let previous = std::mem::replace(&mut self.entries[pos], meta);
                return Upserted::Replaced {
                    previous,
                    moved: false,
                };
            }

            let previous = self.remove_at(pos);
            self.insert_sorted(meta);
            return Upserted::Replaced {
                previous,
                moved: true,
            };
        }

        let pos = self.insert_sorted(meta);
        Upserted::Inserted { pos }
    }

    /// Remove an entry, shifting every later entry up by one
    pub fn remove(&mut self, id: &str) -> Option<PostMetadata> {
        let pos = *self.positions.get(id)?;
        Some(self.remove_at(pos))
    }

    /// Look up an entry by id
    pub fn get(&self, id: &str) -> Option<&PostMetadata> {
        self.positions.get(id).map(|&pos| &self.entries[pos])
    }

    /// Check whether an id is indexed
    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// All entries, most recent first
    pub fn entries(&self) -> &[PostMetadata] {
        &self.entries
    }

    /// Ids in order, most recent first
    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    /// Ids of the entries within `range`, clamped to the index length
    pub fn ids_in(&self, range: Range<usize>) -> Vec<String> {
        let end = range.end.min(self.entries.len());
        let start = range.start.min(end);
        self.entries[start..end].iter().map(|e| e.id.clone()).collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Verify the positional invariants: the sequence is sorted descending
    /// by cache key, `pos` matches the real position of every entry and the
    /// id map points at exactly those positions.
    pub fn is_consistent(&self) -> bool {
        if self.positions.len() != self.entries.len() {
            return false;
        }

        let sorted = self
            .entries
            .windows(2)
            .all(|w| w[0].cache_key >= w[1].cache_key);

        sorted
            && self.entries.iter().enumerate().all(|(i, entry)| {
                entry.pos == i && self.positions.get(&entry.id) == Some(&i)
            })
    }

    /// Whether `cache_key` can sit at `pos` without breaking the ordering
    fn fits_at(&self, pos: usize, cache_key: &str) -> bool {
        let after_prev = pos == 0 || self.entries[pos - 1].cache_key.as_str() >= cache_key;
        let before_next = self
            .entries
            .get(pos + 1)
            .map_or(true, |next| next.cache_key.as_str() <= cache_key);
        after_prev && before_next
    }

    /// Splice `meta` in before the first entry whose key is not greater
    fn insert_sorted(&mut self, mut meta: PostMetadata) -> usize {
        let pos = self
            .entries
            .iter()
            .position(|e| e.cache_key <= meta.cache_key)
            .unwrap_or(self.entries.len());

        meta.pos = pos;
        self.positions.insert(meta.id.clone(), pos);
        self.entries.insert(pos, meta);
        self.renumber_from(pos + 1);
        pos
    }

    fn remove_at(&mut self, pos: usize) -> PostMetadata {
        let removed = self.entries.remove(pos);
        self.positions.remove(&removed.id);
        self.renumber_from(pos);
        removed
    }

    fn renumber_from(&mut self, start: usize) {
        for i in start..self.entries.len() {
            self.entries[i].pos = i;
            if let Some(slot) = self.positions.get_mut(&self.entries[i].id) {
                *slot = i;
            }
        }
    }
}
