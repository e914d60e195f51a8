//! Applying a synthesised fix to the backend/frontend trees (spec.md §4.7).

use crate::error::{AngelixError, AngelixResult};
use crate::source_tree::SourceTree;
use crate::synthesizer::CandidateFix;

/// Splices a [`CandidateFix`] into a [`SourceTree`]. Requires the tree be
/// restored to its original buggy contents first: applying over an
/// instrumented or already-patched tree would mix instrumentation
/// artefacts into the patch under test.
pub trait PatchApplicator {
    fn apply(&self, tree: &mut SourceTree, fix: &CandidateFix) -> AngelixResult<()>;
}

/// Default applicator: writes `fix.rendered_source` wholesale over the
/// buggy file. The splice itself (matching repair points back to source
/// spans) is performed upstream by the synthesizer; this stage only
/// owns the restored-state precondition and the tree's patched flag.
pub struct SpliceApplicator;

impl PatchApplicator for SpliceApplicator {
    fn apply(&self, tree: &mut SourceTree, fix: &CandidateFix) -> AngelixResult<()> {
        if !tree.is_restored() {
            return Err(AngelixError::Compilation {
                tree: tree.role().to_string(),
                detail: "cannot apply a patch to a tree that is not restored".into(),
            });
        }
        tree.apply_patch_contents(fix.rendered_source.clone())
    }
}
