//! Persistent memory of the last digest each node was rendered from.
//!
//! Two backends:
//! - [`SumFileStore`]: one `<output>/<node>/hash.sum` per node, written as
//!   soon as the node renders, so a crashed run keeps what it finished
//! - [`JsonHashStore`]: a single `<output>/hashes.json` map, written once by
//!   [`HashStore::save`] at the end of a successful walk
//!
//! Under [`HashStrategy::Read`] neither backend writes anything.

use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, SyncError};

/// Aggregated store file name, inside the output root.
pub const HASHES_FILE: &str = "hashes.json";

/// Per-node store file name, inside each node's output directory.
pub const SUM_FILE: &str = "hash.sum";

/// Key holding the generated-file marker in the aggregated store.
pub const RESERVED_KEY: &str = "//";

pub const GENERATED_MARKER: &str = "AUTO GENERATED. DO NOT EDIT.";

// ---------------------------------------------------------------------------
// 1. Selectors
// ---------------------------------------------------------------------------

/// Whether the store records new digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashStrategy {
    #[default]
    ReadWrite,
    /// Compare only; nothing is persisted.
    Read,
}

impl HashStrategy {
    pub fn writes(self) -> bool {
        self == HashStrategy::ReadWrite
    }
}

impl FromStr for HashStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "readwrite" => Ok(HashStrategy::ReadWrite),
            "read" => Ok(HashStrategy::Read),
            other => Err(format!(
                "unknown hash strategy '{other}' (expected readwrite or read)"
            )),
        }
    }
}

impl fmt::Display for HashStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashStrategy::ReadWrite => write!(f, "readwrite"),
            HashStrategy::Read => write!(f, "read"),
        }
    }
}

/// Which backend persists digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashStoreKind {
    #[default]
    SumFile,
    Json,
}

impl FromStr for HashStoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sumfile" => Ok(HashStoreKind::SumFile),
            "json" => Ok(HashStoreKind::Json),
            other => Err(format!(
                "unknown hash store '{other}' (expected sumfile or json)"
            )),
        }
    }
}

impl fmt::Display for HashStoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashStoreKind::SumFile => write!(f, "sumfile"),
            HashStoreKind::Json => write!(f, "json"),
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Trait and factory
// ---------------------------------------------------------------------------

/// Digest memory shared by every walker task.
pub trait HashStore: Send + Sync {
    /// Record `digest` as the last rendered digest of node `name`.
    fn add(&self, name: &str, digest: &str) -> Result<(), SyncError>;

    /// Last recorded digest of node `name`, or `""` if there is none.
    fn get(&self, name: &str) -> Result<String, SyncError>;

    /// Persist anything still held in memory.
    fn save(&self) -> Result<(), SyncError>;
}

/// Open the store selected by `kind` rooted at `output`.
pub fn open_store(
    kind: HashStoreKind,
    strategy: HashStrategy,
    output: &Path,
) -> Result<Arc<dyn HashStore>, SyncError> {
    tracing::debug!(store = %kind, strategy = %strategy, output = %output.display(), "opening hash store");
    Ok(match kind {
        HashStoreKind::SumFile => Arc::new(SumFileStore::new(output, strategy)),
        HashStoreKind::Json => Arc::new(JsonHashStore::load(output, strategy)?),
    })
}

/// Node names double as directory names under the output root.
pub fn validate_node_name(name: &str) -> Result<(), SyncError> {
    if name == RESERVED_KEY {
        return Err(SyncError::ReservedKey(name.to_string()));
    }
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(SyncError::InvalidNodeName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 3. Aggregated JSON store
// ---------------------------------------------------------------------------

/// All digests in one JSON object, flushed by [`HashStore::save`].
#[derive(Debug)]
pub struct JsonHashStore {
    path: PathBuf,
    strategy: HashStrategy,
    hashes: RwLock<BTreeMap<String, String>>,
}

impl JsonHashStore {
    /// Load `<output>/hashes.json`.
    ///
    /// A missing file starts an empty store. So does a file that does not
    /// parse; the next save overwrites it.
    pub fn load(output: &Path, strategy: HashStrategy) -> Result<Self, SyncError> {
        let path = output.join(HASHES_FILE);
        let mut hashes = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
                Ok(hashes) => hashes,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "unreadable hash store; starting empty");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(io_err(&path, err)),
        };
        hashes.insert(RESERVED_KEY.to_string(), GENERATED_MARKER.to_string());

        Ok(JsonHashStore {
            path,
            strategy,
            hashes: RwLock::new(hashes),
        })
    }
}

impl HashStore for JsonHashStore {
    fn add(&self, name: &str, digest: &str) -> Result<(), SyncError> {
        validate_node_name(name)?;
        self.hashes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), digest.to_string());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<String, SyncError> {
        Ok(self
            .hashes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    /// Writes to `hashes.json.tmp` then renames over `hashes.json`.
    fn save(&self) -> Result<(), SyncError> {
        if !self.strategy.writes() {
            return Ok(());
        }
        let json = {
            let hashes = self.hashes.read().unwrap_or_else(PoisonError::into_inner);
            serde_json::to_string_pretty(&*hashes)?
        };
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 4. Per-node sum files
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct NodeHash {
    hash: String,
}

/// One `hash.sum` YAML file per node output directory.
#[derive(Debug, Clone)]
pub struct SumFileStore {
    output: PathBuf,
    strategy: HashStrategy,
}

impl SumFileStore {
    pub fn new(output: impl Into<PathBuf>, strategy: HashStrategy) -> Self {
        SumFileStore {
            output: output.into(),
            strategy,
        }
    }

    /// `<output>/<name>/hash.sum`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.output.join(name).join(SUM_FILE)
    }
}

impl HashStore for SumFileStore {
    fn add(&self, name: &str, digest: &str) -> Result<(), SyncError> {
        validate_node_name(name)?;
        if !self.strategy.writes() {
            return Ok(());
        }
        let path = self.path_for(name);
        let yaml = serde_yaml::to_string(&NodeHash {
            hash: digest.to_string(),
        })
        .map_err(|source| SyncError::SumFile {
            path: path.clone(),
            source,
        })?;

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let tmp = path.with_extension("sum.tmp");
        std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        Ok(())
    }

    fn get(&self, name: &str) -> Result<String, SyncError> {
        validate_node_name(name)?;
        let path = self.path_for(name);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(String::new()),
            Err(err) => return Err(io_err(&path, err)),
        };
        let parsed: NodeHash =
            serde_yaml::from_str(&contents).map_err(|source| SyncError::SumFile { path, source })?;
        Ok(parsed.hash)
    }

    fn save(&self) -> Result<(), SyncError> {
        Ok(())
    }
}
