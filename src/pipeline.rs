use crate::aggregator::{aggregate, Aggregation};
use crate::error::{Result, ScraperError};
use crate::fetch::ShowtimeFetcher;
use crate::retrieval::{RetrievalEngine, RunReport};
use crate::sink::ShowtimeSink;
use crate::store::ResultStore;
use crate::types::{TargetCode, VenueDirectory};
use std::fs;
use std::path::Path;
use tracing::{info, instrument};

/// Result of a complete scrape run
#[derive(Debug)]
pub struct PipelineResult {
    pub report: RunReport,
    pub aggregation: Aggregation,
}

/// Reads the venue list (`{code: {"City": .., "State": ..}}`), keeping file order.
pub fn load_venues(path: &Path) -> Result<VenueDirectory> {
    let content = fs::read_to_string(path).map_err(|e| {
        ScraperError::Config(format!("Failed to read venue file '{}': {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&content)?)
}

pub struct Pipeline;

impl Pipeline {
    /// Retrieves every venue, then aggregates and hands the outputs to `sink`.
    ///
    /// Periodic snapshots go through the same sink during the first pass.
    #[instrument(skip_all, fields(venues = venues.len()))]
    pub async fn run<F: ShowtimeFetcher>(
        engine: &mut RetrievalEngine<F>,
        venues: &VenueDirectory,
        target_date: &str,
        sink: &mut dyn ShowtimeSink,
    ) -> Result<PipelineResult> {
        let codes: Vec<TargetCode> = venues.keys().cloned().collect();
        let store = ResultStore::new();

        let report = engine
            .run(&codes, &store, |store| {
                let snapshot = aggregate(&store.snapshot(), venues, target_date);
                info!("Snapshot after {} fetched venues", store.fetched_count());
                sink.write(&snapshot)
            })
            .await?;

        let aggregation = aggregate(&store.into_results(), venues, target_date);
        sink.write(&aggregation)?;

        Ok(PipelineResult { report, aggregation })
    }
}
