//! Angelic-value inference (spec.md §4.5).
//!
//! The symbolic-execution engine itself is out of scope (spec.md §1): this
//! module only defines the contract and the forest data structure the
//! rest of the repair loop depends on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::TestId;
use crate::error::AngelixResult;
use crate::source_tree::SourceTree;

/// A value a suspicious expression would have had to take, at one dynamic
/// occurrence, to make a test pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AngelicValue {
    Int(i64),
    Bool(bool),
}

/// One assignment within an [`AngelicPath`]: which expression, which
/// dynamic occurrence (0-indexed, in execution order), and what value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngelicAssignment {
    pub expression: String,
    pub occurrence: usize,
    pub value: AngelicValue,
}

/// Per dynamic occurrence of each suspicious expression during one test,
/// a value that would make that test's output match `Dump[t]` (spec.md §3).
pub type AngelicPath = Vec<AngelicAssignment>;

/// Mapping `TestId` → list of [`AngelicPath`]s. An empty list for a test
/// means inference failed for it (spec.md §3, §7 `EmptyAngelicForest`).
pub type AngelicForest = BTreeMap<TestId, Vec<AngelicPath>>;

/// Drives symbolic execution of the instrumented *backend* build against
/// one test, bounded by `klee_forks`/`klee_timeout`/`klee_solver_timeout`
/// (spec.md §4.5). A genuine engine crash must return `Err`
/// ([`crate::error::AngelixError::Inference`], fatal); "no angelic
/// assignment found within bounds" is `Ok(vec![])`, non-fatal.
pub trait Inferrer {
    fn infer(
        &self,
        backend: &SourceTree,
        test: &TestId,
        expected: &str,
    ) -> AngelixResult<Vec<AngelicPath>>;
}

/// Deterministic [`Inferrer`] double keyed by [`TestId`], for driving the
/// orchestration properties of spec.md §8 without a real symbolic engine.
#[cfg(any(test, feature = "test-support"))]
pub struct ScriptedInferrer {
    pub paths: BTreeMap<TestId, Vec<AngelicPath>>,
}

#[cfg(any(test, feature = "test-support"))]
impl Inferrer for ScriptedInferrer {
    fn infer(
        &self,
        _backend: &SourceTree,
        test: &TestId,
        _expected: &str,
    ) -> AngelixResult<Vec<AngelicPath>> {
        Ok(self.paths.get(test).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_inferrer_returns_configured_paths() {
        let path = vec![AngelicAssignment {
            expression: "e1".into(),
            occurrence: 0,
            value: AngelicValue::Int(42),
        }];
        let mut paths = BTreeMap::new();
        paths.insert(TestId::from("t1"), vec![path.clone()]);
        let inferrer = ScriptedInferrer { paths };

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("buggy.c"), "x\n").unwrap();
        let tree = SourceTree::new(
            crate::source_tree::TreeRole::Backend,
            dir.path().to_path_buf(),
            std::path::PathBuf::from("buggy.c"),
            vec!["true".into()],
        )
        .unwrap();

        let result = inferrer.infer(&tree, &"t1".into(), "42").unwrap();
        assert_eq!(result, vec![path]);
    }

    #[test]
    fn scripted_inferrer_returns_empty_for_unknown_test() {
        let inferrer = ScriptedInferrer { paths: BTreeMap::new() };
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("buggy.c"), "x\n").unwrap();
        let tree = SourceTree::new(
            crate::source_tree::TreeRole::Backend,
            dir.path().to_path_buf(),
            std::path::PathBuf::from("buggy.c"),
            vec!["true".into()],
        )
        .unwrap();
        let result = inferrer.infer(&tree, &"nope".into(), "").unwrap();
        assert!(result.is_empty());
    }
}
