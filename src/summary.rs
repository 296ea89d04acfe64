//! Translation pass telemetry.
//!
//! The driver records lightweight counts while it works so callers (CLI,
//! tests, surrounding tooling) can inspect what a pass produced without
//! re-reading the output.  Everything here is deterministic and serialisable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::command::Command;

/// Summary emitted after a translation pass completes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationSummary {
    /// Unit names in translation order.
    pub units: Vec<String>,
    /// Commands translated, keyed by command kind.
    pub commands: BTreeMap<String, u64>,
    /// Assembly lines written to the sink, including comments and blanks.
    pub emitted_lines: u64,
    /// Comparison branch labels generated across the whole pass.
    pub comparison_labels: u64,
    /// Call sites translated across the whole pass.
    pub call_sites: u64,
    /// Whether the entry bootstrap was emitted.
    pub bootstrap: bool,
}

impl TranslationSummary {
    /// Total number of commands translated.
    pub fn total_commands(&self) -> u64 {
        self.commands.values().sum()
    }
}

/// Internal accumulator used by the driver while a pass runs.
#[derive(Debug, Default)]
pub struct SummaryCollector {
    summary: TranslationSummary,
}

impl SummaryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_unit(&mut self, name: &str) {
        self.summary.units.push(name.to_owned());
    }

    pub fn record_command(&mut self, command: &Command) {
        *self
            .summary
            .commands
            .entry(command.kind().to_owned())
            .or_default() += 1;
    }

    pub fn record_lines(&mut self, count: usize) {
        self.summary.emitted_lines += count as u64;
    }

    pub fn record_bootstrap(&mut self) {
        self.summary.bootstrap = true;
    }

    /// Fold in the emitter's final counter values and produce the summary.
    pub fn finish(mut self, comparison_labels: u64, call_sites: u64) -> TranslationSummary {
        self.summary.comparison_labels = comparison_labels;
        self.summary.call_sites = call_sites;
        self.summary
    }
}
