//! Set management
//!
//! A set is a directory of record files under `<root>/sets/<name>/`. Each
//! record is one JSON file named `<key>.json`.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::codec;
use super::record::{Record, RecordMeta};

/// A set of records backed by a directory
#[derive(Debug, Clone)]
pub struct Set {
    /// Name of the set
    pub name: String,
    /// Directory holding the record files
    pub path: PathBuf,
}

impl Set {
    /// Open a handle to a set under the given database root.
    ///
    /// Does not touch the filesystem; the directory may not exist yet.
    pub fn open(root: &Path, name: impl Into<String>) -> Self {
        let name = name.into();
        let path = root.join("sets").join(&name);
        Self { name, path }
    }

    /// Whether the set's directory exists
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Create the set's directory if it is missing
    pub async fn ensure_exists(&self) -> Result<()> {
        if !self.exists() {
            debug!(set = %self.name, "Creating set directory");
            tokio::fs::create_dir_all(&self.path)
                .await
                .with_context(|| format!("Failed to create set '{}'", self.name))?;
        }
        Ok(())
    }

    /// List all record keys in this set, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.path)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Number of records in this set
    pub fn count(&self) -> Result<usize> {
        Ok(self.list()?.len())
    }

    /// Read a record by key, or None if it does not exist
    pub async fn get(&self, key: &str) -> Result<Option<Record>> {
        let path = self.record_path(key);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(self.read_record(key, &path).await?))
    }

    /// Write a record, creating or replacing its file.
    ///
    /// The record's own generation is persisted as-is; bumping it is the
    /// caller's responsibility.
    pub async fn upsert(&self, record: &Record) -> Result<()> {
        self.ensure_exists().await?;
        let path = self.record_path(&record.key);
        let content = codec::render(&record.bins, record.meta.generation);
        debug!(set = %self.name, key = %record.key, generation = record.meta.generation, "Writing record");
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write record '{}'", record.key))?;
        Ok(())
    }

    /// Write a record only if no record with its key exists yet
    pub async fn insert(&self, record: &Record) -> Result<()> {
        if self.record_path(&record.key).is_file() {
            return Err(anyhow!(
                "Record '{}' already exists in set '{}'",
                record.key,
                self.name
            ));
        }
        self.upsert(record).await
    }

    /// Write a record only if a record with its key already exists
    pub async fn update(&self, record: &Record) -> Result<()> {
        if !self.record_path(&record.key).is_file() {
            return Err(anyhow!(
                "Record '{}' not found in set '{}'",
                record.key,
                self.name
            ));
        }
        self.upsert(record).await
    }

    /// Delete a record by key. Returns true if a record was removed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.record_path(key);
        if !path.is_file() {
            return Ok(false);
        }
        debug!(set = %self.name, key = %key, "Deleting record");
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to delete record '{}'", key))?;
        Ok(true)
    }

    /// Remove every record in the set, keeping the set itself.
    ///
    /// Returns the number of records removed. A missing set truncates to 0.
    pub async fn truncate(&self) -> Result<usize> {
        let keys = self.list()?;
        for key in &keys {
            tokio::fs::remove_file(self.record_path(key))
                .await
                .with_context(|| format!("Failed to delete record '{}'", key))?;
        }
        debug!(set = %self.name, removed = keys.len(), "Truncated set");
        Ok(keys.len())
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.path.join(format!("{key}.json"))
    }

    async fn read_record(&self, key: &str, path: &Path) -> Result<Record> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read record '{key}'"))?;
        let (bins, generation) = codec::parse(&content)
            .with_context(|| format!("Record '{key}' in set '{}' is corrupt", self.name))?;
        let modified_at = tokio::fs::metadata(path)
            .await
            .ok()
            .and_then(|m| m.modified().ok());

        Ok(Record {
            key: key.to_string(),
            bins,
            meta: RecordMeta {
                generation,
                modified_at,
            },
        })
    }
}

/// List the names of all sets under the given database root, sorted
pub fn list_sets(root: &Path) -> Result<Vec<String>> {
    let sets_dir = root.join("sets");
    if !sets_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in WalkDir::new(&sets_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::record::Value;
    use tempfile::TempDir;

    fn sample_record(key: &str) -> Record {
        let mut rec = Record::new(key);
        rec.set_bin("name", "Classic T-Shirt")
            .set_bin("quantity", 12i64);
        rec
    }

    #[tokio::test]
    async fn test_set_crud() {
        let dir = TempDir::new().unwrap();
        let set = Set::open(dir.path(), "products");

        assert!(!set.exists());
        assert_eq!(set.list().unwrap(), Vec::<String>::new());

        set.insert(&sample_record("10000001")).await.unwrap();
        set.insert(&sample_record("10000002")).await.unwrap();

        assert!(set.exists());
        assert_eq!(set.count().unwrap(), 2);
        assert_eq!(set.list().unwrap(), vec!["10000001", "10000002"]);

        let rec = set.get("10000001").await.unwrap().unwrap();
        assert_eq!(rec.bin("quantity"), Some(&Value::Int(12)));
        assert_eq!(rec.meta.generation, 0);

        // Inserting an existing key fails, updating succeeds
        assert!(set.insert(&sample_record("10000001")).await.is_err());
        let mut updated = sample_record("10000001");
        updated.set_bin("quantity", 20i64);
        updated.meta.generation = 1;
        set.update(&updated).await.unwrap();

        // Updating a key that was never inserted fails
        assert!(set.update(&sample_record("99999999")).await.is_err());

        let rec = set.get("10000001").await.unwrap().unwrap();
        assert_eq!(rec.bin("quantity"), Some(&Value::Int(20)));
        assert_eq!(rec.meta.generation, 1);

        assert!(set.delete("10000002").await.unwrap());
        assert!(!set.delete("10000002").await.unwrap());
        assert_eq!(set.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_truncate() {
        let dir = TempDir::new().unwrap();
        let set = Set::open(dir.path(), "products");

        // Truncating a set that was never written is a no-op
        assert_eq!(set.truncate().await.unwrap(), 0);

        set.insert(&sample_record("a")).await.unwrap();
        set.insert(&sample_record("b")).await.unwrap();
        assert_eq!(set.truncate().await.unwrap(), 2);
        assert!(set.exists());
        assert_eq!(set.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_sets() {
        let dir = TempDir::new().unwrap();
        assert_eq!(list_sets(dir.path()).unwrap(), Vec::<String>::new());

        Set::open(dir.path(), "products").ensure_exists().await.unwrap();
        Set::open(dir.path(), "orders").ensure_exists().await.unwrap();

        assert_eq!(list_sets(dir.path()).unwrap(), vec!["orders", "products"]);
    }

    #[tokio::test]
    async fn test_corrupt_record_reported() {
        let dir = TempDir::new().unwrap();
        let set = Set::open(dir.path(), "products");
        set.ensure_exists().await.unwrap();

        tokio::fs::write(set.path.join("bad.json"), "not json")
            .await
            .unwrap();
        assert!(set.get("bad").await.is_err());
    }
}
