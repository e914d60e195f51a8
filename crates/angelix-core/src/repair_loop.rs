//! The repair driver's state machine (spec.md §4.8).
//!
//! Directly modelled on the teacher's `hunt_mode::HuntEngine::run_cycle` /
//! `run_until_complete` PDCA loop: an outer loop over candidate fixes
//! (here, suspicious groups) that abandons and retries on failure, and an
//! inner loop that grows evidence (here, counterexamples) until a fix
//! survives or the evidence runs out.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::config::Config;
use crate::data::{Partition, TestDatabase, TestId};
use crate::dump::Dump;
use crate::error::{AngelixError, AngelixResult};
use crate::inferrer::{AngelicForest, Inferrer};
use crate::instrumenter::{InstrumentationTarget, Instrumenter};
use crate::localizer::{Localizer, SuspiciousExpression};
use crate::patch_applicator::PatchApplicator;
use crate::reducer::Reducer;
use crate::source_tree::SourceTree;
use crate::synthesizer::Synthesizer;
use crate::tester::Tester;
use crate::trace::{Trace, TraceEvent};

/// Result of a full repair run (spec.md §4.8 `DONE`).
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Every test in the suite already passes; there is nothing to repair.
    NothingToRepair,
    /// A candidate fix survived every counterexample; `diff` is the
    /// unified diff against the original buggy file.
    Repaired { diff: String },
    /// Every suspicious group was abandoned without finding a surviving
    /// fix (spec.md §7: not itself an error, a legitimate outcome).
    Failed,
}

/// Everything the repair loop needs to drive one run: the four working
/// trees (spec.md §4.1), the pluggable black-box collaborators (spec.md
/// §1), and the fixed test database.
pub struct RepairLoop<'a> {
    config: &'a Config,
    validation: &'a mut SourceTree,
    frontend: &'a mut SourceTree,
    backend: &'a mut SourceTree,
    golden: Option<&'a SourceTree>,
    tests: &'a TestDatabase,
    tester: &'a dyn Tester,
    inferrer: &'a dyn Inferrer,
    synthesizer: &'a dyn Synthesizer,
    instrumenter: &'a dyn Instrumenter,
    applicator: &'a dyn PatchApplicator,
    dump: Dump,
    trace: Trace,
}

impl<'a> RepairLoop<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &'a Config,
        validation: &'a mut SourceTree,
        frontend: &'a mut SourceTree,
        backend: &'a mut SourceTree,
        golden: Option<&'a SourceTree>,
        tests: &'a TestDatabase,
        tester: &'a dyn Tester,
        inferrer: &'a dyn Inferrer,
        synthesizer: &'a dyn Synthesizer,
        instrumenter: &'a dyn Instrumenter,
        applicator: &'a dyn PatchApplicator,
        working_dir: &std::path::Path,
    ) -> AngelixResult<Self> {
        let dump = Dump::new(working_dir)?;
        let trace = Trace::new(working_dir)?;
        Ok(Self {
            config,
            validation,
            frontend,
            backend,
            golden,
            tests,
            tester,
            inferrer,
            synthesizer,
            instrumenter,
            applicator,
            dump,
            trace,
        })
    }

    /// Run the full OUTER/INNER loop over `candidates` until a fix is
    /// found, every group is exhausted, the optional wall-clock `deadline`
    /// passes (spec.md §6 `--timeout`, a clean `AngelixError::Timeout`),
    /// or a fatal error occurs.
    pub fn run(
        &mut self,
        candidates: &[SuspiciousExpression],
        deadline: Option<Instant>,
    ) -> AngelixResult<Outcome> {
        self.validation.build()?;

        let partition = self.evaluate()?;
        if partition.negative.is_empty() {
            return Ok(Outcome::NothingToRepair);
        }

        let (positive_traces, negative_traces) = self.collect_traces_and_dumps(&partition)?;

        let localizer = Localizer::new(self.config);
        let groups = localizer.localize(candidates, &positive_traces, &negative_traces);

        for group in &groups {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(AngelixError::Timeout);
            }
            match self.attempt_group(group, &partition, &positive_traces, &negative_traces)? {
                Some(diff) => return Ok(Outcome::Repaired { diff }),
                None => continue,
            }
        }

        Ok(Outcome::Failed)
    }

    /// EVALUATE (spec.md §4.8): run every test against the unmodified
    /// validation tree and partition it into passing/failing.
    fn evaluate(&self) -> AngelixResult<Partition> {
        let mut partition = Partition::default();
        for test in self.tests.ids() {
            self.validation.build_test(test)?;
            if self.tester.run(self.validation, test, None, None)? {
                partition.positive.push(test.clone());
            } else {
                partition.negative.push(test.clone());
            }
        }
        debug_assert!(partition.is_consistent_with(self.tests.ids()));
        Ok(partition)
    }

    /// COLLECT_TRACES_AND_DUMPS (spec.md §4.8): instrument and rebuild
    /// the frontend, then re-run every test, recording both its trace and
    /// its expected/captured output. A golden tree, if configured, is
    /// consulted for tests that carry no inline expected output.
    #[allow(clippy::type_complexity)]
    fn collect_traces_and_dumps(
        &mut self,
        partition: &Partition,
    ) -> AngelixResult<(Vec<(TestId, Vec<TraceEvent>)>, Vec<(TestId, Vec<TraceEvent>)>)> {
        let original = self.frontend.current_contents()?;
        let rewritten = self
            .instrumenter
            .instrument(&original, InstrumentationTarget::AllCandidates)?;
        if !self.frontend.is_restored() {
            self.frontend.restore_buggy()?;
        }
        self.frontend.instrument(rewritten)?;
        self.frontend.build()?;

        for test in self.tests.ids() {
            if !self.dump.contains(test) {
                let expected = self.tests.get(test).and_then(|s| s.expected.clone());
                match expected {
                    Some(value) => self.dump.seed(test, &value)?,
                    None => {
                        if let Some(golden) = self.golden {
                            golden.build_test(test)?;
                            let handle = self.dump.handle_for(test)?;
                            self.tester.run(golden, test, Some(&handle), None)?;
                        } else {
                            return Err(AngelixError::MissingGolden { test: test.clone() });
                        }
                    }
                }
            }
            self.frontend.build_test(test)?;
            let trace_handle = self.trace.handle_for(test)?;
            self.tester.run(self.frontend, test, None, Some(&trace_handle))?;
        }

        let positive_traces = partition
            .positive
            .iter()
            .map(|t| Ok((t.clone(), self.trace.parse(t)?)))
            .collect::<AngelixResult<Vec<_>>>()?;
        let negative_traces = partition
            .negative
            .iter()
            .map(|t| Ok((t.clone(), self.trace.parse(t)?)))
            .collect::<AngelixResult<Vec<_>>>()?;

        Ok((positive_traces, negative_traces))
    }

    /// OUTER body for one suspicious group: reduce to an initial repair
    /// suite, then run the INNER loop until it succeeds or this group is
    /// abandoned. Returns `Some(diff)` on success, `None` if the group is
    /// abandoned (RepairLoop invariant 4: growth and retry, never a
    /// half-applied patch left behind).
    fn attempt_group(
        &mut self,
        group: &[SuspiciousExpression],
        partition: &Partition,
        positive_traces: &[(TestId, Vec<TraceEvent>)],
        negative_traces: &[(TestId, Vec<TraceEvent>)],
    ) -> AngelixResult<Option<String>> {
        let reducer = Reducer::new(self.config);
        let mut suite = reducer.reduce(positive_traces, negative_traces, group);
        if suite.is_empty() {
            tracing::warn!(?group, "no failing test covers this group; abandoning");
            return Ok(None);
        }

        if !self.backend.is_restored() {
            self.backend.restore_buggy()?;
        }
        let original = self.backend.current_contents()?;
        let rewritten = self
            .instrumenter
            .instrument(&original, InstrumentationTarget::Group(group))?;
        self.backend.instrument(rewritten)?;
        self.backend.build()?;

        let mut reuse_count: HashMap<TestId, u32> = HashMap::new();

        // Bounded by the finite negative-test set and `max_counterexample_reuse`
        // alone (spec.md §4.8 Termination argument (c)); `config.iterations`
        // belongs to the localiser's group count (see `Localizer::localize`),
        // not to this inner CEGIS loop.
        loop {
            let mut forest = AngelicForest::new();
            for test in &suite {
                self.backend.build_test(test)?;
                let expected = self.dump.read(test)?;
                let paths = self.inferrer.infer(self.backend, test, &expected)?;
                if paths.is_empty() {
                    tracing::warn!(
                        %test,
                        "{}",
                        AngelixError::EmptyAngelicForest { test: test.clone() }
                    );
                    return Ok(None);
                }
                forest.insert(test.clone(), paths);
            }

            let fix = match self.synthesizer.synthesize(&forest, &self.config.synthesis_levels)? {
                Some(fix) => fix,
                None => {
                    tracing::warn!("{}", AngelixError::SynthesisFailure);
                    return Ok(None);
                }
            };

            if !self.validation.is_restored() {
                self.validation.restore_buggy()?;
            }
            self.applicator.apply(self.validation, &fix)?;
            if self.validation.build().is_err() {
                self.validation.restore_buggy()?;
                return Ok(None);
            }

            // A fix that satisfies every path in the angelic forest can still
            // regress a test that was passing before the patch landed (spec.md
            // §4.8 invariant 5); that is not grounds to abandon the group, it is
            // just another counterexample to fold into the suite and retry.
            let counterexample = partition
                .negative
                .iter()
                .chain(partition.positive.iter())
                .find(|t| !self.tester.run(self.validation, t, None, None).unwrap_or(false))
                .cloned();

            match counterexample {
                None => {
                    let diff = self.validation.diff_buggy()?;
                    return Ok(Some(diff));
                }
                Some(test) => {
                    if partition.positive.contains(&test) {
                        tracing::warn!(
                            "{}",
                            AngelixError::RegressedRepairSuite { tests: vec![test.clone()] }
                        );
                    }
                    self.validation.restore_buggy()?;
                    let uses = reuse_count.entry(test.clone()).or_insert(0);
                    *uses += 1;
                    if *uses > self.config.max_counterexample_reuse || suite.contains(&test) {
                        tracing::warn!(%test, "counterexample reuse cap exceeded; abandoning group");
                        return Ok(None);
                    }
                    suite.push(test);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::data::TestSpec;
    use crate::inferrer::{AngelicAssignment, AngelicValue, ScriptedInferrer};
    use crate::instrumenter::MarkerInstrumenter;
    use crate::patch_applicator::SpliceApplicator;
    use crate::source_tree::TreeRole;
    use crate::synthesizer::{CandidateFix, ScriptedSynthesizer};
    use crate::tester::ScriptedTester;
    use std::collections::BTreeSet;

    /// A test double whose verdict for `t2` depends on the tree's current
    /// file contents, so a repair run can observe a genuine fail-then-pass
    /// transition once a patch lands (unlike [`ScriptedTester`], which
    /// ignores tree contents entirely).
    struct PatchAwareTester;

    impl Tester for PatchAwareTester {
        fn run(
            &self,
            tree: &SourceTree,
            test: &TestId,
            dump: Option<&crate::dump::DumpHandle>,
            trace: Option<&crate::trace::TraceHandle>,
        ) -> AngelixResult<bool> {
            if let Some(dump) = dump {
                dump.write("ok")?;
            }
            if let Some(trace) = trace {
                if test.0 == "t2" {
                    trace.write_events(&["e1"])?;
                } else {
                    trace.write_events(&[])?;
                }
            }
            if test.0 == "t1" {
                return Ok(true);
            }
            let contents = tree.current_contents().unwrap_or_default();
            Ok(contents.contains("fixed"))
        }
    }

    fn tree(dir: &std::path::Path, role: TreeRole, contents: &str) -> SourceTree {
        std::fs::write(dir.join("buggy"), contents).unwrap();
        SourceTree::new(role, dir.to_path_buf(), std::path::PathBuf::from("buggy"), vec![
            "true".into(),
        ])
        .unwrap()
    }

    fn test_db(ids: &[&str]) -> TestDatabase {
        let mut db = TestDatabase::new();
        for id in ids {
            db.insert(
                TestId::from(*id),
                TestSpec { command: "run".into(), input: None, expected: Some("ok".into()) },
            );
        }
        db
    }

    #[test]
    fn nothing_to_repair_when_every_test_passes() {
        let vdir = tempfile::tempdir().unwrap();
        let fdir = tempfile::tempdir().unwrap();
        let bdir = tempfile::tempdir().unwrap();
        let mut validation = tree(vdir.path(), TreeRole::Validation, "ok\n");
        let mut frontend = tree(fdir.path(), TreeRole::Frontend, "ok\n");
        let mut backend = tree(bdir.path(), TreeRole::Backend, "ok\n");

        let config = Config::default();
        let tests = test_db(&["t1"]);
        let tester = ScriptedTester { passing: BTreeSet::from([TestId::from("t1")]) };
        let inferrer = ScriptedInferrer { paths: BTreeMap::new() };
        let synthesizer = ScriptedSynthesizer {
            required_tests: BTreeSet::new(),
            fix: CandidateFix { rendered_source: String::new(), expressions_changed: vec![] },
        };
        let instrumenter = MarkerInstrumenter;
        let applicator = SpliceApplicator;

        let wdir = tempfile::tempdir().unwrap();
        let mut loop_ = RepairLoop::new(
            &config,
            &mut validation,
            &mut frontend,
            &mut backend,
            None,
            &tests,
            &tester,
            &inferrer,
            &synthesizer,
            &instrumenter,
            &applicator,
            wdir.path(),
        )
        .unwrap();

        let outcome = loop_.run(&[], None).unwrap();
        assert_eq!(outcome, Outcome::NothingToRepair);
    }

    #[test]
    fn repairs_when_synthesizer_produces_a_fix_covering_failing_test() {
        let vdir = tempfile::tempdir().unwrap();
        let fdir = tempfile::tempdir().unwrap();
        let bdir = tempfile::tempdir().unwrap();
        let mut validation = tree(vdir.path(), TreeRole::Validation, "broken\n");
        let mut frontend = tree(fdir.path(), TreeRole::Frontend, "broken\n");
        let mut backend = tree(bdir.path(), TreeRole::Backend, "broken\n");

        let mut config = Config::default();
        config.initial_tests = 3;
        config.suspicious = 2;
        config.iterations = 2;
        let tests = test_db(&["t1", "t2"]);

        // t1 always passes; t2 fails until the validation tree's buggy
        // file actually contains the synthesized fix.
        let tester = PatchAwareTester;

        let mut paths = BTreeMap::new();
        paths.insert(
            TestId::from("t2"),
            vec![vec![AngelicAssignment {
                expression: "e1".into(),
                occurrence: 0,
                value: AngelicValue::Int(1),
            }]],
        );
        let inferrer = ScriptedInferrer { paths };

        let fix = CandidateFix {
            rendered_source: "fixed\n".into(),
            expressions_changed: vec!["e1".into()],
        };
        let synthesizer = ScriptedSynthesizer {
            required_tests: BTreeSet::from([TestId::from("t2")]),
            fix,
        };
        let instrumenter = MarkerInstrumenter;
        let applicator = SpliceApplicator;

        let wdir = tempfile::tempdir().unwrap();
        let mut loop_ = RepairLoop::new(
            &config,
            &mut validation,
            &mut frontend,
            &mut backend,
            None,
            &tests,
            &tester,
            &inferrer,
            &synthesizer,
            &instrumenter,
            &applicator,
            wdir.path(),
        )
        .unwrap();

        let candidates = vec![SuspiciousExpression {
            id: "e1".into(),
            defect: crate::config::DefectClass::Condition,
        }];
        let outcome = loop_.run(&candidates, None).unwrap();
        match outcome {
            Outcome::Repaired { diff } => assert!(diff.contains("+fixed")),
            other => panic!("expected Repaired, got {other:?}"),
        }
    }
}
