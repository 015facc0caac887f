use crate::aggregator::Aggregation;
use crate::constants::{detailed_file_name, summary_file_name};
use crate::error::{Result, ScraperError};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Destination for the summary and detailed outputs of a run.
pub trait ShowtimeSink: Send {
    fn write(&mut self, aggregation: &Aggregation) -> Result<()>;
}

/// Writes `movie_summary{shard}.json` and `detailed{shard}.json` into one date directory.
pub struct JsonFileSink {
    dir: PathBuf,
    shard_id: u32,
}

impl JsonFileSink {
    /// Sink for `{output_root}/{date_code}/`, creating the directory.
    pub fn new(output_root: &Path, date_code: &str, shard_id: u32) -> Result<Self> {
        let dir = output_root.join(date_code);
        fs::create_dir_all(&dir).map_err(|source| ScraperError::Persistence {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, shard_id })
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(summary_file_name(self.shard_id))
    }

    pub fn detailed_path(&self) -> PathBuf {
        self.dir.join(detailed_file_name(self.shard_id))
    }
}

impl ShowtimeSink for JsonFileSink {
    fn write(&mut self, aggregation: &Aggregation) -> Result<()> {
        write_json(&self.summary_path(), &aggregation.summary)?;
        write_json(&self.detailed_path(), &aggregation.detailed)?;
        info!(
            "Wrote {} movies / {} shows to {}",
            aggregation.summary.len(),
            aggregation.detailed.len(),
            self.dir.display()
        );
        Ok(())
    }
}

/// Pretty-prints `value` to `path`, replacing the file atomically.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    let persist = |source: std::io::Error| ScraperError::Persistence { path: path.to_path_buf(), source };
    fs::write(&tmp, body).map_err(persist)?;
    fs::rename(&tmp, path).map_err(persist)?;
    debug!("Wrote {}", path.display());
    Ok(())
}
