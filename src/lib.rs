//! PathDB - an embedded document store queried with path expressions
//!
//! Records hold named bins of arbitrarily nested maps and lists. Path
//! expressions walk that nesting on the database side: a context chain of
//! steps (keys, indexes, and filtered enumerations) selects matching
//! substructure or rewrites it in place, without the caller pulling the
//! whole value out first.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                CLI (main.rs)                │
//! └──────────────────────┬──────────────────────┘
//!                        │
//! ┌──────────────────────▼──────────────────────┐
//! │              Database (lib.rs)              │
//! │    put/get/delete · select/modify by path   │
//! └───────┬──────────────────────────┬──────────┘
//!         │                          │
//! ┌───────▼────────┐        ┌────────▼─────────┐
//! │    storage     │        │      query       │
//! │  sets, records │        │ executor, filter │
//! └────────────────┘        └────────┬─────────┘
//!                                    │
//!                           ┌────────▼─────────┐
//!                           │  pathql (crate)  │
//!                           │   parser + AST   │
//!                           └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pathdb::{Database, Exp, PathStep, Selection, ValueType};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let db = Database::open("./mydb").await?;
//!
//! // Featured products with at least one variant in stock
//! let steps = vec![
//!     PathStep::key("inventory"),
//!     PathStep::filtered(Exp::eq(
//!         Exp::map_get("featured", ValueType::Bool, Exp::loop_value()),
//!         Exp::val(true),
//!     )),
//!     PathStep::key("variants"),
//!     PathStep::filtered(Exp::gt(
//!         Exp::map_get("quantity", ValueType::Int, Exp::loop_value()),
//!         Exp::val(0),
//!     )),
//! ];
//! let result = db
//!     .select_by_path("products", "catalog", "catalog", &steps, Selection::tree())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod query;
pub mod storage;
pub mod validation;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use error::Error;
pub use pathql::{
    Exp, Literal, LoopVar, PathStep, SelectMode, Selection, Statement, ValueType,
};
pub use storage::record::{Bins, Record, Value};

use storage::set::Set;

/// The outcome of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryResult {
    /// Pruned structure (SELECT TREE)
    Tree(Value),
    /// Flattened matched values (SELECT VALUES)
    Values(Vec<Value>),
    /// Matched keys or indexes (SELECT KEYS)
    Keys(Vec<Value>),
    /// Number of matches (SELECT COUNT)
    Count(usize),
    /// Number of nodes rewritten (MODIFY)
    Affected(usize),
}

/// A handle to a PathDB database rooted at a directory
#[derive(Debug, Clone)]
pub struct Database {
    root: PathBuf,
}

impl Database {
    /// Open (creating if needed) a database at the given directory
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(root.join("sets"))
            .await
            .with_context(|| format!("Failed to initialize database at {}", root.display()))?;
        debug!(root = %root.display(), "Opened database");
        Ok(Self { root })
    }

    /// The database's root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of all sets in the database
    pub fn sets(&self) -> Result<Vec<String>> {
        storage::set::list_sets(&self.root)
    }

    /// Keys of all records in a set
    pub fn keys(&self, set: &str) -> Result<Vec<String>> {
        validation::validate_set_name(set)?;
        self.set(set).list()
    }

    /// Write a record's bins, creating the record or replacing its bins.
    ///
    /// Returns the record's new generation.
    pub async fn put(&self, set: &str, key: &str, bins: Bins) -> Result<u64> {
        validation::validate_set_name(set)?;
        validation::validate_record_key(key)?;
        for bin in bins.keys() {
            validation::validate_bin_name(bin)?;
        }

        let set = self.set(set);
        let generation = match set.get(key).await? {
            Some(existing) => existing.meta.generation + 1,
            None => 1,
        };
        let mut record = Record::new(key);
        record.bins = bins;
        record.meta.generation = generation;
        set.upsert(&record).await?;
        Ok(generation)
    }

    /// Read a record, or None if it does not exist
    pub async fn get(&self, set: &str, key: &str) -> Result<Option<Record>> {
        validation::validate_set_name(set)?;
        validation::validate_record_key(key)?;
        self.set(set).get(key).await
    }

    /// Delete a record. Returns true if a record was removed.
    pub async fn delete(&self, set: &str, key: &str) -> Result<bool> {
        validation::validate_set_name(set)?;
        validation::validate_record_key(key)?;
        self.set(set).delete(key).await
    }

    /// Remove every record in a set. Returns the number removed.
    pub async fn truncate(&self, set: &str) -> Result<usize> {
        validation::validate_set_name(set)?;
        self.set(set).truncate().await
    }

    /// Run a SELECT path expression over one bin of one record
    pub async fn select_by_path(
        &self,
        set: &str,
        key: &str,
        bin: &str,
        steps: &[PathStep],
        selection: Selection,
    ) -> Result<QueryResult> {
        let (record, value) = self.fetch_bin(set, key, bin).await?;
        debug!(set = %set, key = %record.key, bin = %bin, steps = steps.len(), "Running select");
        Ok(query::select(&value, steps, selection)?)
    }

    /// Run a MODIFY path expression over one bin of one record.
    ///
    /// At every matched node, sets `set_key` to the value of `exp`. The
    /// rewritten value is written back to `bin`, or to `target_bin` when one
    /// is given, leaving the source bin untouched. Returns the number of
    /// nodes changed.
    #[allow(clippy::too_many_arguments)]
    pub async fn modify_by_path(
        &self,
        set: &str,
        key: &str,
        bin: &str,
        steps: &[PathStep],
        set_key: &str,
        exp: &Exp,
        target_bin: Option<&str>,
        no_fail: bool,
    ) -> Result<usize> {
        let (mut record, value) = self.fetch_bin(set, key, bin).await?;
        let (rewritten, changed) = query::modify(&value, steps, set_key, exp, no_fail)?;

        let destination = target_bin.unwrap_or(bin);
        validation::validate_bin_name(destination)?;
        debug!(set = %set, key = %record.key, bin = %destination, changed, "Applying modify");

        record.bins.insert(destination.to_string(), rewritten);
        record.meta.generation += 1;
        self.set(set).upsert(&record).await?;
        Ok(changed)
    }

    /// Insert a key into a map nested inside a bin, reached by Key/Index
    /// steps only
    pub async fn insert_at_path(
        &self,
        set: &str,
        key: &str,
        bin: &str,
        steps: &[PathStep],
        map_key: &str,
        value: Value,
    ) -> Result<()> {
        let (mut record, current) = self.fetch_bin(set, key, bin).await?;
        let rewritten = query::insert_at(&current, steps, map_key, value)?;
        record.bins.insert(bin.to_string(), rewritten);
        record.meta.generation += 1;
        self.set(set).upsert(&record).await?;
        Ok(())
    }

    /// Parse and run a textual PathQL statement against one record
    pub async fn execute(&self, set: &str, key: &str, statement: &str) -> Result<QueryResult> {
        let statement = pathql::parse(statement).map_err(Error::from)?;
        match statement {
            Statement::Select(stmt) => {
                self.select_by_path(set, key, &stmt.bin, &stmt.steps, stmt.selection)
                    .await
            }
            Statement::Modify(stmt) => {
                let changed = self
                    .modify_by_path(
                        set,
                        key,
                        &stmt.bin,
                        &stmt.steps,
                        &stmt.set.key,
                        &stmt.set.value,
                        stmt.target_bin.as_deref(),
                        stmt.no_fail,
                    )
                    .await?;
                Ok(QueryResult::Affected(changed))
            }
        }
    }

    fn set(&self, name: &str) -> Set {
        Set::open(&self.root, name)
    }

    async fn fetch_bin(&self, set: &str, key: &str, bin: &str) -> Result<(Record, Value)> {
        validation::validate_set_name(set)?;
        validation::validate_record_key(key)?;
        validation::validate_bin_name(bin)?;

        if !self.set(set).exists() {
            return Err(Error::SetNotFound { name: set.to_string() }.into());
        }
        let record = self
            .set(set)
            .get(key)
            .await?
            .ok_or_else(|| Error::RecordNotFound {
                set: set.to_string(),
                key: key.to_string(),
            })?;
        let value = record
            .bins
            .get(bin)
            .cloned()
            .ok_or_else(|| Error::BinNotFound { bin: bin.to_string() })?;
        Ok((record, value))
    }
}
