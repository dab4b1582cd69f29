//! Persistence gateway implementations for Muster tenant records.
//!
//! `JsonFileStore` keeps one JSON document per tenant under a root directory,
//! written atomically so readers never observe partial records. `MemoryStore`
//! is the in-process test double with failure injection for the
//! fire-and-forget write-through path.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use anyhow::{bail, Context, Result};
use muster_contract::{PersistedRecord, PersistenceGateway};
use muster_core::write_text_atomic;

/// One pretty-printed JSON file per tenant, named `<tenant_id>.json`.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn record_path(&self, tenant_id: &str) -> Result<PathBuf> {
        if tenant_id.is_empty() {
            bail!("tenant id cannot be empty");
        }
        if !tenant_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            bail!("tenant id '{tenant_id}' contains unsupported characters");
        }
        Ok(self.root.join(format!("{tenant_id}.json")))
    }
}

impl PersistenceGateway for JsonFileStore {
    fn load(&self, tenant_id: &str) -> Result<Option<PersistedRecord>> {
        let path = self.record_path(tenant_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read tenant record {}", path.display()))?;
        let record = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse tenant record {}", path.display()))?;
        Ok(Some(record))
    }

    fn save(&self, record: &PersistedRecord) -> Result<()> {
        let path = self.record_path(&record.id)?;
        let mut payload =
            serde_json::to_string_pretty(record).context("failed to serialize tenant record")?;
        payload.push('\n');
        write_text_atomic(&path, &payload)
    }
}

/// In-memory gateway for tests. Counts saves and can be told to fail the
/// write-through so callers' degraded-mode logging is exercisable.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, PersistedRecord>>,
    save_count: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Seeds a record directly, bypassing the save counter.
    pub fn seed(&self, record: PersistedRecord) {
        self.records
            .lock()
            .expect("record mutex poisoned")
            .insert(record.id.clone(), record);
    }

    pub fn record(&self, tenant_id: &str) -> Option<PersistedRecord> {
        self.records
            .lock()
            .expect("record mutex poisoned")
            .get(tenant_id)
            .cloned()
    }
}

impl PersistenceGateway for MemoryStore {
    fn load(&self, tenant_id: &str) -> Result<Option<PersistedRecord>> {
        Ok(self.record(tenant_id))
    }

    fn save(&self, record: &PersistedRecord) -> Result<()> {
        self.save_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            bail!("memory store configured to fail saves");
        }
        self.records
            .lock()
            .expect("record mutex poisoned")
            .insert(record.id.clone(), record.clone());
        Ok(())
    }
}
