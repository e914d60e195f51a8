//! Core engine for semantics-based angelic program repair.
//!
//! Implements the driver described by the Angelix line of repair tools:
//! spectrum-based fault localisation narrows a buggy program down to a
//! handful of suspicious expressions, symbolic-execution-based angelic
//! inference asks what values those expressions would have needed to
//! take for each failing test to pass, and component-based synthesis
//! looks for a single source-level expression consistent with every
//! inferred value. [`repair_loop::RepairLoop`] wires these stages
//! together in the CEGIS-style outer/inner loop that is the heart of the
//! whole approach.
//!
//! The symbolic engine, the component synthesiser, and the language
//! front-end that performs instrumentation are all black-box
//! collaborators here, reached through the [`inferrer::Inferrer`],
//! [`synthesizer::Synthesizer`], and [`instrumenter::Instrumenter`]
//! traits; this crate owns the orchestration, not the analyses.

pub mod config;
pub mod data;
pub mod dump;
pub mod error;
pub mod inferrer;
pub mod instrumenter;
pub mod localizer;
pub mod patch_applicator;
pub mod reducer;
pub mod repair_loop;
pub mod source_tree;
pub mod synthesizer;
pub mod tester;
pub mod trace;

pub use config::Config;
pub use error::{AngelixError, AngelixResult};
pub use repair_loop::{Outcome, RepairLoop};
