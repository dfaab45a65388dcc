//! Optional persistence of terminal execution snapshots.
//!
//! When a sink is configured, the registry writes every terminal snapshot
//! as one JSON document. Sink failures are logged by the caller and never
//! affect the execution outcome. No sink ⇒ in-memory-only operation.

use std::io::Write;
use std::path::{Path, PathBuf};

use weft_domain::execution::ExecutionSnapshot;
use weft_domain::Result;

/// Destination for terminal snapshots.
pub trait SnapshotSink: Send + Sync {
    fn write(&self, snapshot: &ExecutionSnapshot) -> Result<()>;
}

/// Filesystem sink: `<dir>/<execution_id>.json`, snapshot format verbatim.
pub struct FsSink {
    dir: PathBuf,
}

impl FsSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, snapshot: &ExecutionSnapshot) -> PathBuf {
        self.dir.join(format!("{}.json", snapshot.execution_id))
    }
}

impl SnapshotSink for FsSink {
    fn write(&self, snapshot: &ExecutionSnapshot) -> Result<()> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.path_for(snapshot), &json)
    }
}

/// Write via a temp file and rename so readers never see a torn document.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(contents)?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}
