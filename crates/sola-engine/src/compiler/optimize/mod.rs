//! Optimisations applied while emitting
//!
//! Each pass here is an analysis over the AST; the emitter consults them and
//! decides what bytecode to produce.

pub mod bounds;
pub mod constant_fold;
pub mod cse;
pub mod inline;
pub mod licm;

pub use bounds::BoundsPattern;
pub use constant_fold::{const_condition, eval_const_expr};
pub use cse::{signature, CseCache, CseEntry};
pub use inline::{inline_candidate, is_inlinable, InlineCandidate, MAX_INLINE_BYTES};
pub use licm::{hoist_candidates, loop_effects, LoopEffects};
