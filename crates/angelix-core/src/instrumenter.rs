//! Source instrumentation (spec.md §4.2).
//!
//! Rewrites a buggy file so that, at run time, it records trace/dump
//! events (the *frontend* role) or exposes repair points as symbolic
//! holes (the *backend* role). The actual source-to-source rewrite is
//! language-specific and out of scope (spec.md §1); this module fixes the
//! contract the repair loop drives.

use crate::error::AngelixResult;
use crate::localizer::SuspiciousExpression;

/// What an instrumentation pass should target: full-program tracing
/// (every candidate expression gets a repair-point probe) or a narrowed
/// rewrite limited to one [`SuspiciousGroup`](crate::localizer::SuspiciousGroup) for inference.
pub enum InstrumentationTarget<'a> {
    AllCandidates,
    Group(&'a [SuspiciousExpression]),
}

/// Produces the instrumented file contents for a given target. Returns
/// the full new file contents (consumed by [`crate::source_tree::SourceTree::instrument`]),
/// not a diff: the rewrite can touch arbitrarily many call sites.
pub trait Instrumenter {
    fn instrument(
        &self,
        original: &str,
        target: InstrumentationTarget<'_>,
    ) -> AngelixResult<String>;

    /// Enumerate the expressions eligible for repair in `original`,
    /// restricted to `lines` when non-empty (spec.md §6 `--lines`). This
    /// is the one analysis the repair loop cannot treat as fully opaque:
    /// it needs *some* list of candidates before localisation can rank
    /// anything.
    fn discover_candidates(
        &self,
        original: &str,
        lines: &[u32],
    ) -> AngelixResult<Vec<SuspiciousExpression>>;
}

/// Deterministic [`Instrumenter`] double used in orchestration tests: it
/// appends a marker comment rather than performing a real rewrite.
#[cfg(any(test, feature = "test-support"))]
pub struct MarkerInstrumenter;

#[cfg(any(test, feature = "test-support"))]
impl Instrumenter for MarkerInstrumenter {
    fn instrument(
        &self,
        original: &str,
        target: InstrumentationTarget<'_>,
    ) -> AngelixResult<String> {
        let marker = match target {
            InstrumentationTarget::AllCandidates => "// angelix:instrumented:all".to_string(),
            InstrumentationTarget::Group(group) => {
                let ids: Vec<&str> = group.iter().map(|e| e.id.as_str()).collect();
                format!("// angelix:instrumented:{}", ids.join(","))
            }
        };
        Ok(format!("{marker}\n{original}"))
    }

    fn discover_candidates(
        &self,
        _original: &str,
        _lines: &[u32],
    ) -> AngelixResult<Vec<SuspiciousExpression>> {
        Ok(Vec::new())
    }
}
