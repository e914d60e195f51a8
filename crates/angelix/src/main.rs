//! Command-line driver for angelix-rs: wires CLI arguments into a
//! `Config`, stages the four working trees, and runs the repair loop to
//! completion, matching the real Angelix tool's `repair/main.py` exit
//! semantics (spec.md §6, §7).

mod fs_copy;
mod process_backends;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Parser;
use colored::Colorize;

use angelix_core::config::{Config, DefectClass, LocalizationFormula, SynthesisLevel};
use angelix_core::data::TestDatabase;
use angelix_core::error::AngelixError;
use angelix_core::patch_applicator::SpliceApplicator;
use angelix_core::source_tree::{SourceTree, TreeRole};
use angelix_core::tester::ShellTester;
use angelix_core::{Outcome, RepairLoop};

use process_backends::{ProcessInferrer, ProcessInstrumenter, ProcessSynthesizer};

/// Semantics-based angelic program repair.
#[derive(Parser, Debug)]
#[command(name = "angelix", version, about)]
struct Cli {
    /// Root of the input source tree.
    src: PathBuf,
    /// Path, relative to `src`, of the file containing the defect.
    buggy: PathBuf,
    /// Oracle script invoked once per test.
    oracle: PathBuf,
    /// Tests database file (TestId -> metadata, JSON).
    tests: PathBuf,

    /// Directory holding an independent correct implementation, used to
    /// generate Dumps for tests with no inline expected output.
    #[arg(long)]
    golden: Option<PathBuf>,
    /// Output dumps file (TestId -> expected observable output, JSON).
    #[arg(long)]
    output: Option<PathBuf>,
    /// Defect classes to consider; repeatable. Defaults to all.
    #[arg(long = "defect")]
    defect: Vec<String>,
    /// Restrict candidate expressions to these source lines; repeatable.
    #[arg(long = "lines")]
    lines: Vec<u32>,
    /// Build command, split on whitespace. Defaults to the conventional
    /// platform build.
    #[arg(long, default_value = "make")]
    build: String,

    #[arg(long, default_value_t = 100_000)]
    timeout: u64,
    #[arg(long = "initial-tests", default_value_t = 3)]
    initial_tests: usize,
    #[arg(long = "test-timeout", default_value_t = 10_000)]
    test_timeout: u64,
    #[arg(long, default_value_t = 5)]
    suspicious: usize,
    #[arg(long, default_value_t = 4)]
    iterations: usize,
    #[arg(long, default_value = "jaccard")]
    localization: String,
    #[arg(long = "klee-forks", default_value_t = 1000)]
    klee_forks: u32,
    #[arg(long = "klee-timeout", default_value_t = 0)]
    klee_timeout: u64,
    #[arg(long = "klee-solver-timeout", default_value_t = 0)]
    klee_solver_timeout: u64,
    #[arg(long = "synthesis-timeout", default_value_t = 10_000)]
    synthesis_timeout: u64,
    #[arg(long = "synthesis-levels")]
    synthesis_levels: Vec<String>,

    #[arg(long)]
    verbose: bool,
    #[arg(long)]
    quiet: bool,
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();
}

fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let defect: BTreeSet<DefectClass> = if cli.defect.is_empty() {
        [DefectClass::Condition, DefectClass::Assignment].into_iter().collect()
    } else {
        cli.defect
            .iter()
            .map(|tag| {
                DefectClass::parse(tag)
                    .ok_or_else(|| anyhow::anyhow!("unknown --defect tag: {tag}"))
            })
            .collect::<anyhow::Result<_>>()?
    };

    let localization = match cli.localization.as_str() {
        "jaccard" => LocalizationFormula::Jaccard,
        "ochiai" => LocalizationFormula::Ochiai,
        "tarantula" => LocalizationFormula::Tarantula,
        other => anyhow::bail!("unknown --localization formula: {other}"),
    };

    let synthesis_levels = if cli.synthesis_levels.is_empty() {
        vec![
            SynthesisLevel::Alternative,
            SynthesisLevel::Integer,
            SynthesisLevel::Boolean,
            SynthesisLevel::Comparison,
        ]
    } else {
        cli.synthesis_levels
            .iter()
            .map(|tag| match tag.as_str() {
                "alternative" => Ok(SynthesisLevel::Alternative),
                "integer" => Ok(SynthesisLevel::Integer),
                "boolean" => Ok(SynthesisLevel::Boolean),
                "comparison" => Ok(SynthesisLevel::Comparison),
                other => Err(anyhow::anyhow!("unknown --synthesis-levels tag: {other}")),
            })
            .collect::<anyhow::Result<_>>()?
    };

    Ok(Config {
        initial_tests: cli.initial_tests,
        defect,
        test_timeout: Duration::from_millis(cli.test_timeout),
        suspicious: cli.suspicious,
        iterations: cli.iterations,
        localization,
        klee_forks: cli.klee_forks,
        klee_timeout: Duration::from_millis(cli.klee_timeout),
        klee_solver_timeout: Duration::from_millis(cli.klee_solver_timeout),
        synthesis_timeout: Duration::from_millis(cli.synthesis_timeout),
        synthesis_levels,
        verbose: cli.verbose,
        ..Config::default()
    })
}

/// Create the hidden working directory, failing rather than clobbering
/// pre-existing unrelated data (spec.md §9 "Global cwd-relative working
/// directory").
fn create_working_dir() -> anyhow::Result<PathBuf> {
    let dir = PathBuf::from(".angelix");
    std::fs::create_dir(&dir).map_err(|e| {
        anyhow::anyhow!(
            "cannot create working directory {}: {e}. Remove any pre-existing .angelix first",
            dir.display()
        )
    })?;
    Ok(dir)
}

fn stage_tree(
    role: TreeRole,
    src: &Path,
    working_dir: &Path,
    buggy_file: &Path,
    build_cmd: &[String],
) -> anyhow::Result<SourceTree> {
    let root = working_dir.join(role.to_string());
    fs_copy::copy_tree(src, &root)?;
    Ok(SourceTree::new(role, root, buggy_file.to_path_buf(), build_cmd.to_vec())?)
}

fn load_tests(
    cli: &Cli,
) -> anyhow::Result<TestDatabase> {
    let raw = std::fs::read_to_string(&cli.tests)?;
    let mut tests = TestDatabase::from_json(&raw)?;

    if let Some(output) = &cli.output {
        let raw = std::fs::read_to_string(output)?;
        let dumps: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&raw)?;
        for (id, value) in dumps {
            if let Some(spec) = tests.get(&id.clone().into()).cloned() {
                let expected = value.as_str().map(str::to_string);
                tests.insert(id.into(), angelix_core::data::TestSpec { expected, ..spec });
            }
        }
    }

    Ok(tests)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;
    let build_cmd: Vec<String> = cli.build.split_whitespace().map(str::to_string).collect();
    let working_dir = create_working_dir()?;

    let mut validation = stage_tree(TreeRole::Validation, &cli.src, &working_dir, &cli.buggy, &build_cmd)?;
    let mut frontend = stage_tree(TreeRole::Frontend, &cli.src, &working_dir, &cli.buggy, &build_cmd)?;
    let mut backend = stage_tree(TreeRole::Backend, &cli.src, &working_dir, &cli.buggy, &build_cmd)?;
    let mut golden_tree = match &cli.golden {
        Some(dir) => Some(stage_tree(TreeRole::Golden, dir, &working_dir, &cli.buggy, &build_cmd)?),
        None => None,
    };

    // One logical compilation database, exported from the validation tree
    // and shared by the other three (spec.md §3).
    let compilation_db = validation.export_compilation_db()?;
    frontend.import_compilation_db(&compilation_db)?;
    backend.import_compilation_db(&compilation_db)?;
    if let Some(golden) = golden_tree.as_mut() {
        golden.import_compilation_db(&compilation_db)?;
    }

    let tests = load_tests(&cli)?;

    let tester = ShellTester::new(cli.oracle.clone(), config.test_timeout);
    let instrumenter = ProcessInstrumenter { binary: "angelix-frontend".into() };
    let inferrer = ProcessInferrer {
        binary: "angelix-klee".into(),
        forks: config.klee_forks,
        timeout: config.klee_timeout,
        solver_timeout: config.klee_solver_timeout,
    };
    let synthesizer = ProcessSynthesizer { binary: "angelix-synthesize".into(), timeout: config.synthesis_timeout };
    let applicator = SpliceApplicator;

    let original = validation.current_contents()?;
    let candidates = instrumenter.discover_candidates(&original, &cli.lines)?;

    let mut loop_ = RepairLoop::new(
        &config,
        &mut validation,
        &mut frontend,
        &mut backend,
        golden_tree.as_ref(),
        &tests,
        &tester,
        &inferrer,
        &synthesizer,
        &instrumenter,
        &applicator,
        &working_dir,
    )?;

    let deadline = Instant::now() + Duration::from_millis(cli.timeout);
    let outcome = loop_.run(&candidates, Some(deadline));

    match outcome {
        Ok(Outcome::NothingToRepair) => {
            println!("{}", "SUCCESS".green().bold());
            Ok(())
        }
        Ok(Outcome::Repaired { diff }) => {
            std::fs::write("generated.diff", &diff)?;
            println!("{}", "SUCCESS".green().bold());
            Ok(())
        }
        Ok(Outcome::Failed) => {
            println!("{}", "FAIL".red().bold());
            Ok(())
        }
        Err(AngelixError::Timeout) => {
            println!("{}", "TIMEOUT".yellow().bold());
            Ok(())
        }
        Err(e) if e.is_fatal() => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::warn!("{e}");
            println!("{}", "FAIL".red().bold());
            Ok(())
        }
    }
}
