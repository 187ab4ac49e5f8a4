use skiff_core::{ChangeRecord, DeploymentResult, ExclusionMatcher, ItemizeDecoder, SchemaError};
use tracing::debug;

/// Accumulates the itemized output of the external transfer tool as it
/// streams in, decoding each chunk's complete lines immediately so a
/// long-running transfer can be reported on before it finishes.
#[derive(Debug, Default)]
pub struct ReportCollector {
    decoder: ItemizeDecoder,
    records: Vec<ChangeRecord>,
}

impl ReportCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of tool output; returns how many records the chunk
    /// completed.
    pub fn push(&mut self, chunk: &str) -> usize {
        let decoded = self.decoder.push(chunk);
        let count = decoded.len();
        if count > 0 {
            debug!(records = count, "decoded report chunk");
        }
        self.records.extend(decoded);
        count
    }

    /// Records decoded so far, for live progress reporting.
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    /// Flush the trailing line and validate the collected change set.
    pub fn finish(self) -> Result<DeploymentResult, SchemaError> {
        let mut records = self.records;
        records.extend(self.decoder.finish());
        DeploymentResult::new(records)
    }
}

/// Exclude arguments for the external tool, rendered from the very same
/// compiled pattern list the manifest scan filters with. Keeping one
/// source for both is what makes dry-run and real-run agree on which
/// paths participate.
pub fn exclusion_args(excludes: &ExclusionMatcher) -> Vec<String> {
    excludes
        .patterns()
        .map(|pattern| format!("--exclude={pattern}"))
        .collect()
}
