//! Core data model shared across every component (spec.md §3).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for a test case.
///
/// The set of `TestId`s is fixed at start; iteration order follows
/// insertion order from the tests database file (spec.md §5 "Ordering").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestId(pub String);

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for TestId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Per-test metadata read from the tests database file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Command invoked by the oracle to exercise this test.
    pub command: String,
    /// Input passed to that command, if any.
    #[serde(default)]
    pub input: Option<String>,
    /// Expected output supplied inline, distinct from a dumps file entry.
    #[serde(default)]
    pub expected: Option<String>,
}

/// The fixed mapping from [`TestId`] to its metadata, read once at startup.
///
/// Iteration preserves insertion order (spec.md §5), which is why this is
/// a `Vec` of pairs plus an index rather than a `HashMap`.
#[derive(Debug, Clone, Default)]
pub struct TestDatabase {
    order: Vec<TestId>,
    specs: BTreeMap<TestId, TestSpec>,
}

impl TestDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: TestId, spec: TestSpec) {
        if !self.specs.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.specs.insert(id, spec);
    }

    pub fn get(&self, id: &TestId) -> Option<&TestSpec> {
        self.specs.get(id)
    }

    /// All test ids, in the database's insertion order.
    pub fn ids(&self) -> &[TestId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Build a database from a raw JSON document (`TestId` → [`TestSpec`]),
    /// preserving the key order as it appears in the source text.
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let parsed: serde_json::Map<String, serde_json::Value> = serde_json::from_str(raw)?;
        let mut db = Self::new();
        for (key, value) in parsed {
            let spec: TestSpec = serde_json::from_value(value)?;
            db.insert(TestId(key), spec);
        }
        Ok(db)
    }
}

/// An opaque per-translation-unit record of compile invocations, exported
/// once from the *validation* tree and imported into the other three
/// (spec.md §3). Treated as an opaque blob by the core: only the
/// instrumenters and build command interpret its contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilationDatabase {
    pub entries: Vec<serde_json::Value>,
}

/// Partition of the test suite into tests that currently pass and tests
/// that currently fail (spec.md §3, §8 property 1).
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub positive: Vec<TestId>,
    pub negative: Vec<TestId>,
}

impl Partition {
    /// Property 1 (spec.md §8): `positive ⊎ negative = test_suite` and
    /// `positive ∩ negative = ∅`.
    pub fn is_consistent_with(&self, suite: &[TestId]) -> bool {
        use std::collections::BTreeSet;
        let pos: BTreeSet<_> = self.positive.iter().collect();
        let neg: BTreeSet<_> = self.negative.iter().collect();
        if pos.intersection(&neg).next().is_some() {
            return false;
        }
        let all: BTreeSet<_> = suite.iter().collect();
        let union: BTreeSet<_> = pos.union(&neg).copied().collect();
        union == all
    }
}
