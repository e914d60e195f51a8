//! Error kinds recognised by the repair loop.
//!
//! Mirrors the kind-enum-plus-context shape of the teacher's
//! `TranspileError`, but the variants themselves are exactly the error
//! kinds enumerated in spec.md §7.

use thiserror::Error;

use crate::data::TestId;

/// Errors the repair driver's core recognises.
///
/// Fatality follows spec.md §7's propagation policy: [`Self::Compilation`]
/// and [`Self::Inference`] are fatal and exit the process non-zero;
/// [`Self::Timeout`] is a clean non-fatal termination signal; the
/// per-group variants (`EmptyAngelicForest`, `SynthesisFailure`,
/// `RegressedRepairSuite`) are caught inside
/// [`crate::repair_loop::RepairLoop::attempt_group`] and only ever
/// surface as a `tracing::warn!` before that group is abandoned.
/// [`Self::MissingGolden`] is the one recoverable-but-unhandled case: it
/// escapes the loop entirely (no golden tree means no group can ever be
/// attempted) and is reported by the CLI as a plain failure, not a
/// crash.
#[derive(Debug, Error)]
pub enum AngelixError {
    #[error("compilation failed for {tree}: {detail}")]
    Compilation { tree: String, detail: String },

    #[error("symbolic inference engine crashed for test {test}: {detail}")]
    Inference { test: TestId, detail: String },

    #[error("global repair timeout exceeded")]
    Timeout,

    #[error("inferrer returned no angelic path for test {test}")]
    EmptyAngelicForest { test: TestId },

    #[error("synthesiser found no candidate fix within budget")]
    SynthesisFailure,

    #[error("candidate fix regressed on tests {tests:?} that were in the current repair suite")]
    RegressedRepairSuite { tests: Vec<TestId> },

    #[error("test {test} has no expected dump and no golden tree is configured")]
    MissingGolden { test: TestId },
}

impl AngelixError {
    /// True for the two error kinds that abort the whole run (spec.md §7).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Compilation { .. } | Self::Inference { .. })
    }
}

pub type AngelixResult<T> = Result<T, AngelixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compilation_and_inference_are_fatal() {
        let compile = AngelixError::Compilation {
            tree: "validation".into(),
            detail: "exit code 1".into(),
        };
        let infer = AngelixError::Inference {
            test: "t1".into(),
            detail: "klee crashed".into(),
        };
        assert!(compile.is_fatal());
        assert!(infer.is_fatal());
    }

    #[test]
    fn recoverable_kinds_are_not_fatal() {
        assert!(!AngelixError::Timeout.is_fatal());
        assert!(!AngelixError::SynthesisFailure.is_fatal());
        assert!(!AngelixError::EmptyAngelicForest { test: "t1".into() }.is_fatal());
        assert!(!AngelixError::RegressedRepairSuite { tests: vec!["t1".into()] }.is_fatal());
        assert!(!AngelixError::MissingGolden { test: "t1".into() }.is_fatal());
    }

    #[test]
    fn display_includes_identifying_detail() {
        let err = AngelixError::MissingGolden { test: "t42".into() };
        let msg = err.to_string();
        assert!(msg.contains("t42"));
    }
}
