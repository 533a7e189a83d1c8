//! Optimization report.

use std::fmt;

use serde::Serialize;

use crate::pass::{Mode, PassStats};

/// One executed pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassRecord {
    pub stage: String,
    pub name: String,
    pub stats: PassStats,
    pub duration_us: u64,
}

/// Summary of one [`crate::optimize`] call.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationReport {
    pub unit: String,
    pub mode: Mode,
    /// Passes in execution order.
    pub passes: Vec<PassRecord>,
    /// Total duration in milliseconds, including verification.
    pub duration_ms: u64,
    pub functions_before: usize,
    pub functions_after: usize,
    pub insts_before: usize,
    pub insts_after: usize,
}

impl OptimizationReport {
    /// Aggregate statistics over every pass.
    pub fn totals(&self) -> PassStats {
        let mut total = PassStats::default();
        for record in &self.passes {
            total += record.stats;
        }
        total
    }
}

impl fmt::Display for OptimizationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Optimization Report ===")?;
        writeln!(f, "Unit: {}", self.unit)?;
        writeln!(f, "Mode: {}", self.mode)?;
        writeln!(f, "Duration: {} ms", self.duration_ms)?;
        writeln!(f)?;

        writeln!(f, "--- Size ---")?;
        writeln!(
            f,
            "  Functions: {} -> {}",
            self.functions_before, self.functions_after
        )?;
        writeln!(
            f,
            "  Instructions: {} -> {}",
            self.insts_before, self.insts_after
        )?;

        if !self.passes.is_empty() {
            writeln!(f)?;
            writeln!(f, "--- Passes ({}) ---", self.passes.len())?;
            for record in &self.passes {
                let s = &record.stats;
                writeln!(
                    f,
                    "  [{}] {}: +{} insts, -{} insts, -{} blocks, -{} functions, {} attrs ({} us)",
                    record.stage,
                    record.name,
                    s.insts_added,
                    s.insts_removed,
                    s.blocks_removed,
                    s.functions_removed,
                    s.attributes_changed,
                    record.duration_us,
                )?;
            }
        }

        writeln!(f)?;
        writeln!(f, "--- Verification: PASSED ---")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, removed: usize) -> PassRecord {
        PassRecord {
            stage: "scalar".into(),
            name: name.into(),
            stats: PassStats {
                insts_removed: removed,
                ..PassStats::default()
            },
            duration_us: 3,
        }
    }

    #[test]
    fn report_display() {
        let report = OptimizationReport {
            unit: "demo".into(),
            mode: Mode::default(),
            passes: vec![record("instcombine", 2), record("dce", 1)],
            duration_ms: 1,
            functions_before: 2,
            functions_after: 1,
            insts_before: 9,
            insts_after: 6,
        };

        let output = format!("{report}");
        assert!(output.contains("Optimization Report"));
        assert!(output.contains("Unit: demo"));
        assert!(output.contains("Instructions: 9 -> 6"));
        assert!(output.contains("[scalar] instcombine: +0 insts, -2 insts"));
        assert!(output.contains("PASSED"));
        assert_eq!(report.totals().insts_removed, 3);
    }
}
