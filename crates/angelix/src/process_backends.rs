//! Process-backed implementations of the black-box collaborators
//! (spec.md §1): instrumentation, symbolic inference, and component
//! synthesis are all delegated to external, conventionally-named
//! executables, the same way [`angelix_core::tester::ShellTester`]
//! delegates test execution to the user's oracle script.

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

use angelix_core::config::SynthesisLevel;
use angelix_core::data::TestId;
use angelix_core::error::{AngelixError, AngelixResult};
use angelix_core::inferrer::{AngelicForest, AngelicPath, Inferrer};
use angelix_core::instrumenter::{InstrumentationTarget, Instrumenter};
use angelix_core::localizer::SuspiciousExpression;
use angelix_core::source_tree::SourceTree;
use angelix_core::synthesizer::{CandidateFix, Synthesizer};

fn run_piped(
    program: &str,
    args: &[String],
    stdin_payload: &str,
    timeout: Duration,
    tree_role: &str,
) -> AngelixResult<String> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AngelixError::Compilation {
            tree: tree_role.to_string(),
            detail: format!("failed to spawn {program}: {e}"),
        })?;

    if let Some(stdin) = child.stdin.as_mut() {
        let _ = stdin.write_all(stdin_payload.as_bytes());
    }

    let start = std::time::Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(|e| AngelixError::Compilation {
            tree: tree_role.to_string(),
            detail: e.to_string(),
        })? {
            let output = child.wait_with_output().map_err(|e| AngelixError::Compilation {
                tree: tree_role.to_string(),
                detail: e.to_string(),
            })?;
            if !status.success() {
                return Err(AngelixError::Compilation {
                    tree: tree_role.to_string(),
                    detail: String::from_utf8_lossy(&output.stderr).into_owned(),
                });
            }
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        if !timeout.is_zero() && start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(AngelixError::Timeout);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// Shells out to `angelix-frontend` for both full-program tracing
/// instrumentation and narrowed per-group symbolic instrumentation, and
/// for enumerating repair-eligible expressions.
pub struct ProcessInstrumenter {
    pub binary: String,
}

impl Instrumenter for ProcessInstrumenter {
    fn instrument(
        &self,
        original: &str,
        target: InstrumentationTarget<'_>,
    ) -> AngelixResult<String> {
        let args = match target {
            InstrumentationTarget::AllCandidates => vec!["instrument".to_string(), "--all".to_string()],
            InstrumentationTarget::Group(group) => {
                let ids = group.iter().map(|e| e.id.clone()).collect::<Vec<_>>().join(",");
                vec!["instrument".to_string(), "--group".to_string(), ids]
            }
        };
        run_piped(&self.binary, &args, original, Duration::from_secs(30), "frontend")
    }

    fn discover_candidates(
        &self,
        original: &str,
        lines: &[u32],
    ) -> AngelixResult<Vec<SuspiciousExpression>> {
        let mut args = vec!["discover".to_string()];
        if !lines.is_empty() {
            let joined = lines.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
            args.push("--lines".to_string());
            args.push(joined);
        }
        let stdout = run_piped(&self.binary, &args, original, Duration::from_secs(30), "frontend")?;
        serde_json::from_str(&stdout).map_err(|e| AngelixError::Compilation {
            tree: "frontend".into(),
            detail: format!("malformed candidate list from {}: {e}", self.binary),
        })
    }
}

/// Shells out to `angelix-klee` (or whatever the configured backend
/// engine is) to symbolically execute one test against the instrumented
/// backend tree.
pub struct ProcessInferrer {
    pub binary: String,
    pub forks: u32,
    pub timeout: Duration,
    pub solver_timeout: Duration,
}

impl Inferrer for ProcessInferrer {
    fn infer(
        &self,
        backend: &SourceTree,
        test: &TestId,
        expected: &str,
    ) -> AngelixResult<Vec<AngelicPath>> {
        let args = vec![
            "--root".to_string(),
            backend.root().display().to_string(),
            "--test".to_string(),
            test.0.clone(),
            "--forks".to_string(),
            self.forks.to_string(),
            "--solver-timeout-ms".to_string(),
            self.solver_timeout.as_millis().to_string(),
        ];
        let stdout = match run_piped(&self.binary, &args, expected, self.timeout, "backend") {
            Ok(stdout) => stdout,
            Err(AngelixError::Compilation { detail, .. }) => {
                return Err(AngelixError::Inference { test: test.clone(), detail });
            }
            Err(e) => return Err(e),
        };
        if stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&stdout).map_err(|e| AngelixError::Inference {
            test: test.clone(),
            detail: format!("malformed angelic paths from {}: {e}", self.binary),
        })
    }
}

/// Shells out to `angelix-synthesize`, feeding it the serialised
/// [`AngelicForest`] on stdin.
pub struct ProcessSynthesizer {
    pub binary: String,
    pub timeout: Duration,
}

impl Synthesizer for ProcessSynthesizer {
    fn synthesize(
        &self,
        forest: &AngelicForest,
        levels: &[SynthesisLevel],
    ) -> AngelixResult<Option<CandidateFix>> {
        let payload = serde_json::to_string(forest).map_err(|e| AngelixError::Compilation {
            tree: "validation".into(),
            detail: format!("cannot serialise angelic forest: {e}"),
        })?;
        let level_names: Vec<&str> = levels
            .iter()
            .map(|l| match l {
                SynthesisLevel::Alternative => "alternative",
                SynthesisLevel::Integer => "integer",
                SynthesisLevel::Boolean => "boolean",
                SynthesisLevel::Comparison => "comparison",
            })
            .collect();
        let args = vec!["--levels".to_string(), level_names.join(",")];
        let stdout = run_piped(&self.binary, &args, &payload, self.timeout, "validation")?;
        if stdout.trim().is_empty() {
            return Ok(None);
        }
        let fix: CandidateFix =
            serde_json::from_str(&stdout).map_err(|e| AngelixError::Compilation {
                tree: "validation".into(),
                detail: format!("malformed candidate fix from {}: {e}", self.binary),
            })?;
        Ok(Some(fix))
    }
}
