//! Control-flow analysis
//!
//! Builds a CFG per function and runs reachability, definite-assignment and
//! all-paths-return over it.

pub mod cfg;
pub mod dataflow;

pub use cfg::{BasicBlock, BlockId, Cfg, CfgItem};
pub use dataflow::{
    all_paths_return, analyze_function, reachable, solve_assignments, uninitialized_uses,
    unreachable_code, FlowReport, UseDef,
};
