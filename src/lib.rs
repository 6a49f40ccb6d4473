//! Crafting recipe calculator
//!
//! Resolves a catalog of recipes into raw material totals, dependency and
//! usage trees, and tiered crafting steps. The engine in [`calculator`] is
//! pure; [`db`] is a SQLite-backed store that owns the editable catalog.

pub mod calculator;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod seed;

pub use calculator::{
    Plan, PlanDisplay, generate_ast, generate_steps, generate_uses, has_circular_dependency, plan,
    reduce, stacks, would_create_cycle,
};
pub use error::{CalcError, ParseError, StoreError};
pub use models::{
    Catalog, DependencyNode, Recipe, ResourceTotals, Step, StepItem, Steps, Symbol, TreeNode,
    UsageNode,
};
