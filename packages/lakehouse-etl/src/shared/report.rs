//! Per-output outcomes of a silver or gold stage run

use serde::Serialize;

/// What happened to one output table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutputOutcome {
    Written { rows: usize },
    NoSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputReport {
    pub output: String,
    #[serde(flatten)]
    pub outcome: OutputOutcome,
}

/// Outcomes of one stage run, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub outputs: Vec<OutputReport>,
    /// Inputs that were requested but have no handler
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown: Vec<String>,
}

impl StageReport {
    pub fn record(&mut self, output: impl Into<String>, outcome: OutputOutcome) {
        self.outputs.push(OutputReport {
            output: output.into(),
            outcome,
        });
    }

    pub fn outcome(&self, output: &str) -> Option<OutputOutcome> {
        self.outputs
            .iter()
            .find(|o| o.output == output)
            .map(|o| o.outcome)
    }

    /// Names of outputs that were written
    pub fn written(&self) -> Vec<&str> {
        self.outputs
            .iter()
            .filter(|o| matches!(o.outcome, OutputOutcome::Written { .. }))
            .map(|o| o.output.as_str())
            .collect()
    }

    pub fn merge(&mut self, other: StageReport) {
        self.outputs.extend(other.outputs);
        self.unknown.extend(other.unknown);
    }
}
