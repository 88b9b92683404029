//! File-backed durable state.
//!
//! The vertex store snapshot and the committed ledger proof live in separate
//! SBOR files under the data directory. Every write goes to a temporary file
//! that is synced and then renamed over the previous version, so a crash
//! leaves either the old or the new snapshot in place.

use quorum_node::RecoveredState;
use quorum_types::{LedgerProof, VerifiedVertexStoreState};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const VERTEX_STORE_FILE: &str = "vertex_store.sbor";
const LEDGER_PROOF_FILE: &str = "ledger_proof.sbor";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("SBOR encode error: {0}")]
    Encode(String),

    #[error("Corrupt {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Found {present} without {missing}")]
    Incomplete {
        present: &'static str,
        missing: &'static str,
    },
}

/// Durable snapshots of one validator.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Open the store, creating `dir` if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn persist_vertex_store(
        &self,
        state: &VerifiedVertexStoreState,
    ) -> Result<(), StorageError> {
        let bytes =
            sbor::basic_encode(state).map_err(|e| StorageError::Encode(format!("{:?}", e)))?;
        self.write_atomic(VERTEX_STORE_FILE, &bytes)?;
        debug!(
            root_view = state.root().view.0,
            vertices = state.vertices().len(),
            "Persisted vertex store"
        );
        Ok(())
    }

    pub fn persist_ledger_proof(&self, proof: &LedgerProof) -> Result<(), StorageError> {
        let bytes =
            sbor::basic_encode(proof).map_err(|e| StorageError::Encode(format!("{:?}", e)))?;
        self.write_atomic(LEDGER_PROOF_FILE, &bytes)?;
        debug!(state_version = proof.state_version(), "Persisted ledger proof");
        Ok(())
    }

    /// Load the persisted state, or `None` for a validator that has never
    /// written any.
    pub fn load(&self) -> Result<Option<RecoveredState>, StorageError> {
        let vertex_store = self.read(VERTEX_STORE_FILE)?;
        let ledger_proof = self.read(LEDGER_PROOF_FILE)?;

        let (vertex_store, ledger_proof) = match (vertex_store, ledger_proof) {
            (None, None) => return Ok(None),
            (Some(_), None) => {
                return Err(StorageError::Incomplete {
                    present: VERTEX_STORE_FILE,
                    missing: LEDGER_PROOF_FILE,
                })
            }
            (None, Some(_)) => {
                return Err(StorageError::Incomplete {
                    present: LEDGER_PROOF_FILE,
                    missing: VERTEX_STORE_FILE,
                })
            }
            (Some(store), Some(proof)) => (store, proof),
        };

        let vertex_store: VerifiedVertexStoreState =
            sbor::basic_decode(&vertex_store).map_err(|e| StorageError::Corrupt {
                path: self.dir.join(VERTEX_STORE_FILE),
                reason: format!("{:?}", e),
            })?;
        let ledger_proof: LedgerProof =
            sbor::basic_decode(&ledger_proof).map_err(|e| StorageError::Corrupt {
                path: self.dir.join(LEDGER_PROOF_FILE),
                reason: format!("{:?}", e),
            })?;

        info!(
            root_view = vertex_store.root().view.0,
            state_version = ledger_proof.state_version(),
            "Loaded durable state"
        );
        Ok(Some(RecoveredState {
            vertex_store,
            ledger_proof,
        }))
    }

    fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.dir.join(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| StorageError::Io { path, source }
        };

        let mut file = File::create(&tmp).map_err(io_error(&tmp))?;
        file.write_all(bytes).map_err(io_error(&tmp))?;
        file.sync_all().map_err(io_error(&tmp))?;
        fs::rename(&tmp, &path).map_err(io_error(&path))?;
        Ok(())
    }
}
