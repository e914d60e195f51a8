//! Spectrum-based fault localisation (spec.md §4.3).
//!
//! Generalises the teacher's single-formula `FaultLocalizer`
//! (`depyler-core::infrastructure::fault_localizer`, a Tarantula-only
//! ranker over transpiler decisions) into a three-formula dispatch over
//! suspicious source expressions ranked from positive/negative execution
//! traces.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{Config, DefectClass, LocalizationFormula};
use crate::data::TestId;
use crate::trace::TraceEvent;

/// Identifier of a source expression eligible for repair (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SuspiciousExpression {
    pub id: String,
    pub defect: DefectClass,
}

/// An ordered set of expressions considered jointly in one repair attempt
/// (spec.md §3). Source order within a group is preserved for
/// deterministic tie-breaking downstream.
pub type SuspiciousGroup = Vec<SuspiciousExpression>;

#[derive(Default)]
struct Spectrum {
    passed: u32,
    failed: u32,
}

/// Ranks [`SuspiciousExpression`]s from positive/negative trace pairs
/// using the configured formula, and partitions the ranking into popped
/// groups (spec.md §4.3).
pub struct Localizer<'a> {
    config: &'a Config,
}

impl<'a> Localizer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Rank every candidate expression, filter by configured defect
    /// class, then partition into at most `config.iterations` groups of
    /// at most `config.suspicious` expressions each, highest-suspicion
    /// group first.
    ///
    /// `candidates` gives every [`SuspiciousExpression`] present in the
    /// program (in source order, used for tie-breaking), and
    /// `positive_traces`/`negative_traces` are `(test, trace)` pairs from
    /// the *frontend* build (spec.md §4.3).
    pub fn localize(
        &self,
        candidates: &[SuspiciousExpression],
        positive_traces: &[(TestId, Vec<TraceEvent>)],
        negative_traces: &[(TestId, Vec<TraceEvent>)],
    ) -> Vec<SuspiciousGroup> {
        let filtered: Vec<&SuspiciousExpression> = candidates
            .iter()
            .filter(|e| self.config.defect.contains(&e.defect))
            .collect();

        let mut spectra: BTreeMap<&str, Spectrum> = BTreeMap::new();
        for expr in &filtered {
            spectra.entry(expr.id.as_str()).or_default();
        }
        for (_, trace) in positive_traces {
            for event in trace {
                if let Some(s) = spectra.get_mut(event.repair_point.as_str()) {
                    s.passed += 1;
                }
            }
        }
        for (_, trace) in negative_traces {
            for event in trace {
                if let Some(s) = spectra.get_mut(event.repair_point.as_str()) {
                    s.failed += 1;
                }
            }
        }

        let total_passed = positive_traces.len() as f64;
        let total_failed = negative_traces.len() as f64;

        let mut ranked: Vec<(usize, &SuspiciousExpression, f64)> = filtered
            .iter()
            .enumerate()
            .map(|(order, expr)| {
                let spectrum = spectra.get(expr.id.as_str()).expect("seeded above");
                let score = suspiciousness(
                    self.config.localization,
                    spectrum.failed as f64,
                    spectrum.passed as f64,
                    total_failed,
                    total_passed,
                );
                (order, *expr, score)
            })
            .collect();

        // Highest suspicion first; ties broken by source order (ascending
        // `order`), matching the teacher's `rank_decisions` convention of
        // a stable, deterministic sort.
        ranked.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        ranked
            .chunks(self.config.suspicious.max(1))
            .take(self.config.iterations)
            .map(|chunk| chunk.iter().map(|(_, expr, _)| (*expr).clone()).collect())
            .collect()
    }
}

fn suspiciousness(
    formula: LocalizationFormula,
    failed: f64,
    passed: f64,
    total_failed: f64,
    total_passed: f64,
) -> f64 {
    match formula {
        LocalizationFormula::Jaccard => {
            let denom = total_failed + passed;
            if denom <= 0.0 {
                0.0
            } else {
                failed / denom
            }
        }
        LocalizationFormula::Ochiai => {
            let denom = (total_failed * (failed + passed)).sqrt();
            if denom <= 0.0 {
                0.0
            } else {
                failed / denom
            }
        }
        LocalizationFormula::Tarantula => {
            if total_failed <= 0.0 {
                return 0.0;
            }
            let fail_ratio = failed / total_failed;
            let pass_ratio = if total_passed > 0.0 { passed / total_passed } else { 0.0 };
            fail_ratio / (fail_ratio + pass_ratio + f64::EPSILON)
        }
    }
}
