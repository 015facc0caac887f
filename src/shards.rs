//! Maintenance over shard output files: combining and pruning.

use crate::config::validate_date_code;
use crate::constants::{COMBINED_FILE_NAME, DETAILED_FILE_PREFIX, SUMMARY_FILE_PREFIX};
use crate::error::{Result, ScraperError};
use crate::sink::write_json;
use chrono::{Duration, NaiveDate};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Shard ids concatenated by [`combine_detailed`].
pub const COMBINED_SHARDS: std::ops::RangeInclusive<u32> = 1..=8;
/// Shard ids removed by [`cleanup_shards`].
pub const CLEANUP_SHARDS: std::ops::RangeInclusive<u32> = 1..=9;

/// Concatenates the detailed shard lists of `dir` into `finaldetailed.json`.
///
/// Missing, unreadable or non-list shards are skipped. Returns the output path
/// and the number of combined records.
pub fn combine_detailed(dir: &Path) -> Result<(PathBuf, usize)> {
    let mut combined: Vec<Value> = Vec::new();

    for shard in COMBINED_SHARDS {
        let path = dir.join(format!("{DETAILED_FILE_PREFIX}{shard}.json"));
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => {
                warn!("Missing: {}", path.display());
                continue;
            }
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(records)) => {
                info!("Added {} records from {}", records.len(), path.display());
                combined.extend(records);
            }
            Ok(_) => warn!("Skipped {} (not a list)", path.display()),
            Err(e) => warn!("Invalid JSON in {}: {}", path.display(), e),
        }
    }

    fs::create_dir_all(dir).map_err(|source| ScraperError::Persistence {
        path: dir.to_path_buf(),
        source,
    })?;
    let output = dir.join(COMBINED_FILE_NAME);
    write_json(&output, &combined)?;
    info!("Combined {} records into {}", combined.len(), output.display());
    Ok((output, combined.len()))
}

/// Every `YYYYMMDD` code from `start` to `end`, inclusive.
pub fn date_codes(start: &str, end: &str) -> Result<Vec<String>> {
    let start = validate_date_code(start)?;
    let end = validate_date_code(end)?;
    let mut codes = Vec::new();
    let mut current: NaiveDate = start;
    while current <= end {
        codes.push(current.format("%Y%m%d").to_string());
        current += Duration::days(1);
    }
    Ok(codes)
}

/// Deletes shard summary and detailed files in each `{base}/{date}` directory
/// for dates `start..=end`. Returns the number of files removed.
pub fn cleanup_shards(base_paths: &[PathBuf], start: &str, end: &str) -> Result<usize> {
    let mut deleted = 0;
    for date in date_codes(start, end)? {
        for base in base_paths {
            let folder = base.join(&date);
            if !folder.is_dir() {
                continue;
            }
            for shard in CLEANUP_SHARDS {
                for prefix in [DETAILED_FILE_PREFIX, SUMMARY_FILE_PREFIX] {
                    let path = folder.join(format!("{prefix}{shard}.json"));
                    if !path.exists() {
                        continue;
                    }
                    fs::remove_file(&path).map_err(|source| ScraperError::Persistence {
                        path: path.clone(),
                        source,
                    })?;
                    deleted += 1;
                    info!("Deleted: {}", path.display());
                }
            }
        }
    }
    info!("Cleanup complete. Files removed: {}", deleted);
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_combine_skips_missing_and_non_list_shards() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("detailed1.json"), json!([{"movie": "A"}, {"movie": "B"}]).to_string()).unwrap();
        fs::write(dir.path().join("detailed2.json"), json!({"movie": "not a list"}).to_string()).unwrap();
        fs::write(dir.path().join("detailed3.json"), "{ broken").unwrap();
        fs::write(dir.path().join("detailed5.json"), json!([{"movie": "C"}]).to_string()).unwrap();
        fs::write(dir.path().join("detailed9.json"), json!([{"movie": "ignored"}]).to_string()).unwrap();

        let (output, count) = combine_detailed(dir.path()).unwrap();
        assert_eq!(count, 3);
        let combined: Value = serde_json::from_str(&fs::read_to_string(output).unwrap()).unwrap();
        let movies: Vec<_> = combined
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["movie"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(movies, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_combine_with_no_shards_writes_empty_list() {
        let dir = tempdir().unwrap();
        let (output, count) = combine_detailed(dir.path()).unwrap();
        assert_eq!(count, 0);
        assert_eq!(fs::read_to_string(output).unwrap().trim(), "[]");
    }

    #[test]
    fn test_date_codes_inclusive_across_month_end() {
        let codes = date_codes("20250130", "20250202").unwrap();
        assert_eq!(codes, vec!["20250130", "20250131", "20250201", "20250202"]);
        assert!(date_codes("20250202", "20250130").unwrap().is_empty());
    }

    #[test]
    fn test_cleanup_removes_only_shard_files_in_range() {
        let base = tempdir().unwrap();
        let in_range = base.path().join("20250110");
        let out_of_range = base.path().join("20250120");
        fs::create_dir_all(&in_range).unwrap();
        fs::create_dir_all(&out_of_range).unwrap();
        for name in ["detailed1.json", "movie_summary1.json", "detailed9.json", "finaldetailed.json"] {
            fs::write(in_range.join(name), "[]").unwrap();
            fs::write(out_of_range.join(name), "[]").unwrap();
        }

        let removed = cleanup_shards(&[base.path().to_path_buf()], "20250108", "20250112").unwrap();
        assert_eq!(removed, 3);
        assert!(in_range.join("finaldetailed.json").exists());
        assert!(!in_range.join("detailed9.json").exists());
        assert!(out_of_range.join("detailed1.json").exists());
    }
}
