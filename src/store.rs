//! Dataset store: the imported rows and the dashboard filters.
//!
//! Owned by the caller and passed to whoever needs it; persistence is an
//! explicit `load`/`save` pair over a JSON file.
use crate::error::StoreError;
use crate::types::{CanonicalRow, FilterKey, Filters};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;

pub const DATASET_FILE_NAME: &str = "sf-data-v2.json";
const DATASET_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetStore {
    rows: Vec<CanonicalRow>,
    filters: Filters,
}

#[derive(Serialize, Deserialize)]
struct Persisted<T> {
    version: u32,
    #[serde(flatten)]
    state: T,
}

impl DatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[CanonicalRow] {
        &self.rows
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Replace the whole dataset.
    pub fn set_rows(&mut self, rows: Vec<CanonicalRow>) {
        self.rows = rows;
    }

    pub fn clear_rows(&mut self) {
        self.rows.clear();
    }

    pub fn set_filter(&mut self, key: FilterKey, value: impl Into<String>) {
        let value = value.into();
        match key {
            FilterKey::Famille => self.filters.famille = value,
            FilterKey::SsFamille => self.filters.ss_famille = value,
            FilterKey::Fournisseur => self.filters.fournisseur = value,
        }
    }

    pub fn clear_filters(&mut self) {
        self.filters = Filters::default();
    }

    /// What a fresh import does: new rows, filters reset.
    pub fn replace_from_import(&mut self, rows: Vec<CanonicalRow>) {
        self.set_rows(rows);
        self.clear_filters();
    }

    pub fn filtered_rows(&self) -> Vec<&CanonicalRow> {
        self.rows.iter().filter(|r| self.filters.matches(r)).collect()
    }

    /// Load from `path`; a missing file or an older schema gives an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        Ok(load_versioned(path, DATASET_SCHEMA_VERSION)?.unwrap_or_default())
    }

    /// Like [`DatasetStore::load`], but an unreadable file gives an empty store.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|error| {
            tracing::warn!(path = %path.display(), %error, "Ignoring unreadable dataset");
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        save_versioned(path, DATASET_SCHEMA_VERSION, self)
    }
}

pub(crate) fn load_versioned<T: DeserializeOwned>(
    path: &Path,
    version: u32,
) -> Result<Option<T>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    let raw: serde_json::Value = serde_json::from_str(&text)?;
    let found = raw.get("version").and_then(|v| v.as_u64());
    if found != Some(u64::from(version)) {
        tracing::warn!(path = %path.display(), ?found, expected = version, "Ignoring stored state with another schema version");
        return Ok(None);
    }
    let persisted: Persisted<T> = serde_json::from_value(raw)?;
    Ok(Some(persisted.state))
}

pub(crate) fn save_versioned<T: Serialize>(
    path: &Path,
    version: u32,
    state: &T,
) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let s = serde_json::to_string_pretty(&Persisted { version, state })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, s)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(f: &str, s: &str, fo: &str, ca: f64) -> CanonicalRow {
        CanonicalRow {
            famille: f.into(),
            ss_famille: s.into(),
            fournisseur: fo.into(),
            ca_total_ss_famille: 100.0,
            ca_fournisseur_dans_ssf: ca,
            ca_part_du_ssf: ca,
            marge_arriere: Some(1.5),
            score_fournisseur: ca + 1.5,
        }
    }

    #[test]
    fn starts_empty_and_replaces_wholesale() {
        let mut store = DatasetStore::new();
        assert!(store.rows().is_empty());
        store.set_rows(vec![row("A", "B", "C", 1.0), row("A", "B", "D", 2.0)]);
        store.set_rows(vec![row("X", "Y", "Z", 3.0)]);
        assert_eq!(store.rows().len(), 1);
        store.clear_rows();
        assert!(store.rows().is_empty());
    }

    #[test]
    fn filters_apply_and_reset_on_import() {
        let mut store = DatasetStore::new();
        store.set_rows(vec![row("A", "B", "C", 1.0), row("A", "E", "D", 2.0)]);
        store.set_filter(FilterKey::SsFamille, "E");
        assert_eq!(store.filtered_rows().len(), 1);
        assert_eq!(store.filtered_rows()[0].fournisseur, "D");

        store.replace_from_import(vec![row("Q", "R", "S", 4.0)]);
        assert!(store.filters().is_empty());
        assert_eq!(store.filtered_rows().len(), 1);
    }

    #[test]
    fn persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATASET_FILE_NAME);

        let mut store = DatasetStore::new();
        store.set_rows(vec![row("A", "B", "C", 1.0)]);
        store.set_filter(FilterKey::Famille, "A");
        store.save(&path).unwrap();

        let reloaded = DatasetStore::load(&path).unwrap();
        assert_eq!(reloaded, store);
    }

    #[test]
    fn missing_or_outdated_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(DATASET_FILE_NAME);
        assert_eq!(DatasetStore::load(&path).unwrap(), DatasetStore::new());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"version": 1, "rows": [], "filters": {}}"#).unwrap();
        assert_eq!(DatasetStore::load(&path).unwrap(), DatasetStore::new());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATASET_FILE_NAME);
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(DatasetStore::load(&path), Err(StoreError::Json(_))));
    }

    #[test]
    fn corrupt_file_loads_empty_when_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DATASET_FILE_NAME);
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(DatasetStore::load_or_default(&path), DatasetStore::new());

        let mut store = DatasetStore::new();
        store.set_rows(vec![row("A", "B", "C", 1.0)]);
        store.save(&path).unwrap();
        assert_eq!(DatasetStore::load_or_default(&path), store);
    }
}
