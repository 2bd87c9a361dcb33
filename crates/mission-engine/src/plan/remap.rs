//! Placeholder identifiers and their remapping to storage identifiers.
//!
//! Normalized rows reference each other through [`PlaceholderId`]s only.
//! The storage layer mints real ids and records them in an [`IdMap`], which
//! refuses to map one placeholder twice or reuse a real id, so every row that
//! names a placeholder resolves to the same record.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A synthetic, pre-persistence identifier for a plan, phase, or task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceholderId(String);

impl PlaceholderId {
    pub fn plan() -> Self {
        Self("plan".to_owned())
    }

    pub fn phase(index: u32) -> Self {
        Self(format!("phase:{index}"))
    }

    pub fn task(key: &str) -> Self {
        Self(format!("task:{key}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceholderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors from building or applying an [`IdMap`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemapError {
    #[error("placeholder {0} has no real id")]
    Unmapped(PlaceholderId),

    #[error("placeholder {placeholder} is already mapped to {existing}")]
    AlreadyMapped {
        placeholder: PlaceholderId,
        existing: Uuid,
    },

    #[error("id {id} is already used by placeholder {placeholder}")]
    IdReused { id: Uuid, placeholder: PlaceholderId },
}

/// Injective placeholder -> real id mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMap {
    forward: BTreeMap<PlaceholderId, Uuid>,
    reverse: HashMap<Uuid, PlaceholderId>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the real id minted for a placeholder.
    pub fn insert(&mut self, placeholder: PlaceholderId, id: Uuid) -> Result<(), RemapError> {
        if let Some(existing) = self.forward.get(&placeholder) {
            return Err(RemapError::AlreadyMapped {
                placeholder,
                existing: *existing,
            });
        }
        if let Some(owner) = self.reverse.get(&id) {
            return Err(RemapError::IdReused {
                id,
                placeholder: owner.clone(),
            });
        }
        self.reverse.insert(id, placeholder.clone());
        self.forward.insert(placeholder, id);
        Ok(())
    }

    pub fn get(&self, placeholder: &PlaceholderId) -> Option<Uuid> {
        self.forward.get(placeholder).copied()
    }

    pub fn resolve(&self, placeholder: &PlaceholderId) -> Result<Uuid, RemapError> {
        self.get(placeholder)
            .ok_or_else(|| RemapError::Unmapped(placeholder.clone()))
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlaceholderId, Uuid)> {
        self.forward.iter().map(|(p, id)| (p, *id))
    }

    /// Mint a fresh random id for every placeholder, skipping ones already
    /// mapped.
    pub fn mint_missing<'a>(&mut self, placeholders: impl IntoIterator<Item = &'a PlaceholderId>) {
        for placeholder in placeholders {
            if !self.forward.contains_key(placeholder) {
                let id = Uuid::new_v4();
                self.reverse.insert(id, placeholder.clone());
                self.forward.insert(placeholder.clone(), id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_schemes() {
        assert_eq!(PlaceholderId::plan().as_str(), "plan");
        assert_eq!(PlaceholderId::phase(2).as_str(), "phase:2");
        assert_eq!(PlaceholderId::task("build-api").as_str(), "task:build-api");
    }

    #[test]
    fn rejects_remapping_a_placeholder() {
        let mut ids = IdMap::new();
        let first = Uuid::new_v4();
        ids.insert(PlaceholderId::phase(0), first).unwrap();
        let err = ids.insert(PlaceholderId::phase(0), Uuid::new_v4()).unwrap_err();
        assert_eq!(
            err,
            RemapError::AlreadyMapped {
                placeholder: PlaceholderId::phase(0),
                existing: first
            }
        );
    }

    #[test]
    fn rejects_reusing_a_real_id() {
        let mut ids = IdMap::new();
        let id = Uuid::new_v4();
        ids.insert(PlaceholderId::task("a"), id).unwrap();
        let err = ids.insert(PlaceholderId::task("b"), id).unwrap_err();
        assert!(matches!(err, RemapError::IdReused { .. }), "got {err}");
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn resolve_reports_unmapped() {
        let ids = IdMap::new();
        let err = ids.resolve(&PlaceholderId::task("x")).unwrap_err();
        assert_eq!(err.to_string(), "placeholder task:x has no real id");
    }

    #[test]
    fn mint_missing_keeps_existing_ids() {
        let mut ids = IdMap::new();
        let fixed = Uuid::new_v4();
        ids.insert(PlaceholderId::plan(), fixed).unwrap();
        let placeholders = [PlaceholderId::plan(), PlaceholderId::phase(0)];
        ids.mint_missing(&placeholders);
        assert_eq!(ids.get(&PlaceholderId::plan()), Some(fixed));
        assert!(ids.get(&PlaceholderId::phase(0)).is_some());
        assert_eq!(ids.len(), 2);
    }
}
