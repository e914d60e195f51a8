//! Repair-suite reduction (spec.md §4.4).
//!
//! Greedy set-cover approximation: finds a small subset of failing tests
//! whose traces, together, touch every dynamic occurrence of every
//! expression in the current [`SuspiciousGroup`]. Symbolic inference cost
//! is roughly proportional to suite size, so smaller suites are tried
//! first and grown later by counterexamples (RepairLoop invariant 4).

use std::collections::{BTreeSet, HashSet};

use crate::config::Config;
use crate::data::TestId;
use crate::localizer::SuspiciousGroup;
use crate::trace::TraceEvent;

/// A subset of failing tests currently used to constrain synthesis
/// (spec.md §3). Grows by counterexample accretion within the inner loop.
pub type RepairSuite = Vec<TestId>;

pub struct Reducer<'a> {
    config: &'a Config,
}

impl<'a> Reducer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Greedily cover every occurrence of every expression in `group`
    /// using traces from `negative_traces` (the failing tests), capped at
    /// `config.initial_tests`. `positive_traces` is accepted for
    /// signature symmetry with spec.md §4.4 but does not influence
    /// selection: a passing test can never be part of a repair suite.
    pub fn reduce(
        &self,
        _positive_traces: &[(TestId, Vec<TraceEvent>)],
        negative_traces: &[(TestId, Vec<TraceEvent>)],
        group: &SuspiciousGroup,
    ) -> RepairSuite {
        let required: BTreeSet<&str> = group.iter().map(|e| e.id.as_str()).collect();
        if required.is_empty() || negative_traces.is_empty() {
            return Vec::new();
        }

        let coverage: Vec<(&TestId, HashSet<&str>)> = negative_traces
            .iter()
            .map(|(test, trace)| {
                let covered: HashSet<&str> = trace
                    .iter()
                    .map(|e| e.repair_point.as_str())
                    .filter(|p| required.contains(p))
                    .collect();
                (test, covered)
            })
            .collect();

        let mut uncovered: BTreeSet<&str> = required.clone();
        let mut chosen: Vec<TestId> = Vec::new();
        let mut remaining = coverage;

        while !uncovered.is_empty() && chosen.len() < self.config.initial_tests {
            let best = remaining
                .iter()
                .enumerate()
                .max_by_key(|(_, (_, covered))| covered.intersection(&uncovered).count());
            let Some((idx, _)) = best else { break };
            let (test, covered) = remaining.remove(idx);
            if covered.intersection(&uncovered).next().is_none() {
                break; // no remaining test covers anything new
            }
            for id in &covered {
                uncovered.remove(id);
            }
            chosen.push(test.clone());
        }

        chosen
    }
}
