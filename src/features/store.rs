use std::{
    fs, io,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use super::ledger::{Ledger, Registry};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage failed - {0}")]
    Io(#[from] io::Error),

    #[error("Document encoding failed - {0}")]
    Encode(#[from] serde_json::Error),
}

type StoreResult<T> = Result<T, StoreError>;

/// Durable home of the ledger and registry documents.
///
/// Every commit serializes the whole document to a `.tmp` sibling and renames
/// it over the canonical path, so a reader observes either the old or the new
/// snapshot, never a truncated one. A single process-wide gate spans each
/// whole load-mutate-commit sequence; serializing only the final write would
/// let two interleaved sales read the same stale inventory and both succeed.
/// The gate is scoped to the closure APIs below, so it is released on every
/// exit path. No timeout: an operation that holds the gate runs to completion.
pub struct Store {
    ledger_path: PathBuf,
    registry_path: PathBuf,
    gate: Mutex<()>,
}

impl Store {
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            ledger_path: dir.join("data.json"),
            registry_path: dir.join("config.json"),
            gate: Mutex::new(()),
        }
    }

    /// Snapshot of the ledger document; the empty default on first run.
    pub fn read_ledger(&self) -> StoreResult<Ledger> {
        let _gate = self.gate.lock();
        load_document(&self.ledger_path)
    }

    pub fn read_registry(&self) -> StoreResult<Registry> {
        let _gate = self.gate.lock();
        load_document(&self.registry_path)
    }

    /// Run one domain mutation against the latest ledger and commit the
    /// result. An `Err` from the closure aborts the commit and leaves the
    /// persisted document untouched.
    pub fn update_ledger<T, E>(
        &self,
        mutate: impl FnOnce(&mut Ledger) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let _gate = self.gate.lock();
        let mut ledger = load_document(&self.ledger_path)?;
        let outcome = mutate(&mut ledger)?;
        commit_document(&self.ledger_path, &ledger)?;
        Ok(outcome)
    }

    /// Same discipline for the companion registry document.
    pub fn update_registry<T, E>(
        &self,
        mutate: impl FnOnce(&mut Registry) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let _gate = self.gate.lock();
        let mut registry = load_document(&self.registry_path)?;
        let outcome = mutate(&mut registry)?;
        commit_document(&self.registry_path, &registry)?;
        Ok(outcome)
    }
}

fn load_document<D>(path: &Path) -> StoreResult<D>
where
    D: DeserializeOwned + Default,
{
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        // First-run bootstrap, not an error
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(D::default()),
        Err(e) => Err(e.into()),
    }
}

fn commit_document<D: Serialize>(path: &Path, document: &D) -> StoreResult<()> {
    let mut encoded = serde_json::to_vec_pretty(document)?;
    encoded.push(b'\n');

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, &encoded)?;
    fs::rename(&tmp, path)?;
    debug!("committed {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    use super::*;
    use crate::features::transaction::Transaction;

    #[test]
    fn first_load_returns_empty_defaults() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path());

        assert_eq!(store.read_ledger().unwrap(), Ledger::default());
        assert_eq!(store.read_registry().unwrap(), Registry::default());
        // Reading must not create the files
        assert!(!dir.path().join("data.json").exists());
    }

    #[test]
    fn committed_ledger_survives_reopen() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path());
        store
            .update_ledger(|ledger| -> Result<(), StoreError> {
                ledger.record_purchase("grilli", Transaction::bought(dec!(10), dec!(25), None));
                Ok(())
            })
            .unwrap();
        drop(store);

        let reopened = Store::open(dir.path());
        let ledger = reopened.read_ledger().unwrap();
        assert_eq!(ledger.inventory, dec!(10));
        assert_eq!(ledger.users["grilli"].bought.len(), 1);
        assert_eq!(ledger.users["grilli"].bought[0].price, dec!(-25));
    }

    #[test]
    fn commit_leaves_no_temporary_sibling() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path());
        store
            .update_ledger(|_| Ok::<_, StoreError>(()))
            .unwrap();

        assert!(dir.path().join("data.json").exists());
        assert!(!dir.path().join("data.json.tmp").exists());
    }

    #[test]
    fn recommitting_an_unmodified_document_is_byte_idempotent() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path());
        store
            .update_ledger(|ledger| -> Result<(), StoreError> {
                ledger.record_purchase("grilli", Transaction::bought(dec!(10.5), dec!(25), None));
                Ok(())
            })
            .unwrap();

        let first = fs::read(dir.path().join("data.json")).unwrap();
        store.update_ledger(|_| Ok::<_, StoreError>(())).unwrap();
        let second = fs::read(dir.path().join("data.json")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn failed_mutation_does_not_commit() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path());
        store
            .update_ledger(|ledger| -> Result<(), StoreError> {
                ledger.inventory = dec!(3);
                Ok(())
            })
            .unwrap();
        let before = fs::read(dir.path().join("data.json")).unwrap();

        let result = store.update_ledger(|ledger| -> Result<(), StoreError> {
            ledger.inventory = dec!(99);
            Err(io::Error::new(io::ErrorKind::Other, "rejected").into())
        });
        assert!(result.is_err());
        assert_eq!(fs::read(dir.path().join("data.json")).unwrap(), before);
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..5 {
                        store
                            .update_ledger(|ledger| -> Result<(), StoreError> {
                                ledger.inventory += dec!(1);
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.read_ledger().unwrap().inventory, dec!(40));
    }
}
