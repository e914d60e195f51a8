//! Repair driver configuration.
//!
//! A single immutable record threaded by shared reference through every
//! component, replacing the dynamically-typed dictionary the original
//! tool threads between stages (spec.md §9 "Configuration as a
//! dictionary").

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Defect class an expression must belong to for a fix to consider it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DefectClass {
    Condition,
    Assignment,
}

impl DefectClass {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "condition" => Some(Self::Condition),
            "assignment" => Some(Self::Assignment),
            _ => None,
        }
    }
}

/// Spectrum-based localisation formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalizationFormula {
    Jaccard,
    Ochiai,
    Tarantula,
}

impl Default for LocalizationFormula {
    fn default() -> Self {
        Self::Jaccard
    }
}

/// Component level used by the synthesiser's search ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisLevel {
    Alternative,
    Integer,
    Boolean,
    Comparison,
}

/// Immutable repair-run configuration.
///
/// Built once via [`ConfigBuilder`] and passed by shared reference to
/// every component, per spec.md §9.
#[derive(Debug, Clone)]
pub struct Config {
    pub initial_tests: usize,
    pub defect: BTreeSet<DefectClass>,
    pub test_timeout: Duration,
    pub suspicious: usize,
    pub iterations: usize,
    pub localization: LocalizationFormula,
    pub klee_forks: u32,
    pub klee_timeout: Duration,
    pub klee_solver_timeout: Duration,
    pub synthesis_timeout: Duration,
    pub synthesis_levels: Vec<SynthesisLevel>,
    pub verbose: bool,
    /// Defensive bound on how many times a single test may re-enter the
    /// inner loop as a counterexample, per spec.md §9's Open Question.
    pub max_counterexample_reuse: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_tests: 3,
            defect: [DefectClass::Condition, DefectClass::Assignment]
                .into_iter()
                .collect(),
            test_timeout: Duration::from_millis(10_000),
            suspicious: 5,
            iterations: 4,
            localization: LocalizationFormula::Jaccard,
            klee_forks: 1000,
            klee_timeout: Duration::from_millis(0),
            klee_solver_timeout: Duration::from_millis(0),
            synthesis_timeout: Duration::from_millis(10_000),
            synthesis_levels: vec![
                SynthesisLevel::Alternative,
                SynthesisLevel::Integer,
                SynthesisLevel::Boolean,
                SynthesisLevel::Comparison,
            ],
            verbose: false,
            max_counterexample_reuse: 3,
        }
    }
}
