//! Access to the JSON state file shared by concurrent `peridot` processes.
//!
//! Every command holds an advisory lock on a `<state>.lock` sidecar while it
//! touches the state: shared for commands that only read, exclusive for
//! commands that save. The sidecar is never replaced, so the lock survives
//! the rename that swaps in a freshly saved state file.

use std::fs::{File, OpenOptions};

use camino::{Utf8Path, Utf8PathBuf};
use eyre::{Context, Result};
use fd_lock::RwLock;
use peridot_licenses::MemoryStore;

pub(crate) fn lock_path(state: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{state}.lock"))
}

fn open_lock(state: &Utf8Path) -> Result<RwLock<File>> {
    let path = lock_path(state);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .wrap_err_with(|| format!("failed to open lock file {path}"))?;
    Ok(RwLock::new(file))
}

fn open_store(state: &Utf8Path) -> Result<MemoryStore> {
    tracing::debug!(path = %state, "opening state file");
    MemoryStore::open(state).wrap_err_with(|| format!("failed to open state file {state}"))
}

/// Load the state under a shared lock and hand it to `read`.
pub(crate) fn read_state<T>(
    state: &Utf8Path,
    read: impl FnOnce(&MemoryStore) -> Result<T>,
) -> Result<T> {
    let lock = open_lock(state)?;
    let _guard = lock
        .read()
        .wrap_err_with(|| format!("failed to take shared lock on {state}"))?;
    read(&open_store(state)?)
}

/// Load, change and save the state under an exclusive lock.
///
/// The lock spans the whole sequence, so ids handed out by one process are
/// never reused by another. Nothing is saved when `update` fails.
pub(crate) fn update_state<T>(
    state: &Utf8Path,
    update: impl FnOnce(&mut MemoryStore) -> Result<T>,
) -> Result<T> {
    let mut lock = open_lock(state)?;
    let _guard = lock
        .write()
        .wrap_err_with(|| format!("failed to take exclusive lock on {state}"))?;
    let mut store = open_store(state)?;
    let value = update(&mut store)?;
    store
        .save(state)
        .wrap_err_with(|| format!("failed to save state file {state}"))?;
    tracing::debug!(path = %state, "saved state file");
    Ok(value)
}
