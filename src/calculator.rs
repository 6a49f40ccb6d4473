//! Recipe graph resolution
//!
//! Pure functions over an immutable [`Catalog`] snapshot: quantity reduction,
//! dependency and usage trees, tiered crafting steps and cycle checks.

use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroU64;

use serde::Serialize;
use tracing::debug;

use crate::error::CalcError;
use crate::models::{
    Catalog, DependencyNode, Recipe, ResourceTotals, Step, StepItem, Steps, Symbol, TreeNode,
    UsageNode,
};

/// Total raw materials and crafted units needed for one craft of `recipe`.
///
/// Composite inputs are expanded recursively and scaled by the number of
/// batches required, rounding up: a sub-recipe yielding 4 per craft needs 2
/// crafts to cover 5 units.
pub fn reduce(recipe: &Recipe, catalog: &Catalog) -> Result<ResourceTotals, CalcError> {
    reduce_recursive(recipe, catalog, &mut Vec::new())
}

fn reduce_recursive<'a>(
    recipe: &'a Recipe,
    catalog: &'a Catalog,
    chain: &mut Vec<&'a str>,
) -> Result<ResourceTotals, CalcError> {
    let mut totals = ResourceTotals::new();

    for (symbol, &quantity) in &recipe.input {
        let Some(sub_recipe) = catalog.get(symbol) else {
            // Unknown symbols are raw materials
            totals.add_raw(symbol, quantity)?;
            continue;
        };

        enter(chain, symbol)?;
        let mut sub_totals = reduce_recursive(sub_recipe, catalog, chain)?;
        chain.pop();

        sub_totals.scale(batches_needed(symbol, quantity, sub_recipe.output)?)?;
        sub_totals.add_crafted(symbol, quantity)?;
        totals.merge(sub_totals)?;
    }

    Ok(totals)
}

/// Crafts of a recipe yielding `output` per craft needed to cover `quantity`
pub fn batches_needed(symbol: &str, quantity: u64, output: u64) -> Result<u64, CalcError> {
    if output == 0 {
        return Err(CalcError::InvalidOutput {
            symbol: symbol.to_string(),
        });
    }
    Ok(quantity.div_ceil(output))
}

/// Expand `recipe` into a tree whose children are its inputs.
///
/// Inputs that have their own recipe are expanded further, anything else
/// becomes a leaf. `name` labels the root node.
pub fn generate_ast(
    recipe: &Recipe,
    catalog: &Catalog,
    parent: Option<&str>,
    name: &str,
) -> Result<DependencyNode, CalcError> {
    let mut chain = vec![name];
    ast_recursive(recipe, catalog, parent, name, &mut chain)
}

fn ast_recursive<'a>(
    recipe: &'a Recipe,
    catalog: &'a Catalog,
    parent: Option<&str>,
    name: &str,
    chain: &mut Vec<&'a str>,
) -> Result<DependencyNode, CalcError> {
    let mut children = Vec::with_capacity(recipe.input.len());

    for symbol in recipe.input.keys() {
        let child = match catalog.get(symbol) {
            Some(sub_recipe) => {
                enter(chain, symbol)?;
                let node = ast_recursive(sub_recipe, catalog, Some(name), symbol, chain)?;
                chain.pop();
                node
            }
            None => TreeNode::leaf(symbol.as_str(), Some(name)),
        };
        children.push(child);
    }

    Ok(TreeNode {
        name: name.to_string(),
        parent: parent.map(str::to_string),
        children,
    })
}

/// Expand which recipes consume `symbol`, and what consumes those in turn
pub fn generate_uses(
    symbol: &str,
    catalog: &Catalog,
    parent: Option<&str>,
) -> Result<UsageNode, CalcError> {
    let mut chain = vec![symbol];
    uses_recursive(symbol, catalog, parent, &mut chain)
}

fn uses_recursive<'a>(
    symbol: &str,
    catalog: &'a Catalog,
    parent: Option<&str>,
    chain: &mut Vec<&'a str>,
) -> Result<UsageNode, CalcError> {
    let mut children = Vec::new();

    for (name, recipe) in catalog.iter() {
        if !recipe.input.contains_key(symbol) {
            continue;
        }
        enter(chain, name)?;
        children.push(uses_recursive(name, catalog, Some(symbol), chain)?);
        chain.pop();
    }

    Ok(TreeNode {
        name: symbol.to_string(),
        parent: parent.map(str::to_string),
        children,
    })
}

fn enter<'a>(chain: &mut Vec<&'a str>, name: &'a str) -> Result<(), CalcError> {
    if let Some(start) = chain.iter().position(|n| *n == name) {
        let mut path: Vec<String> = chain[start..].iter().map(|n| n.to_string()).collect();
        path.push(name.to_string());
        debug!(cycle = %path.join(" -> "), "cycle detected while expanding catalog");
        return Err(CalcError::CyclicCatalog { path });
    }
    chain.push(name);
    Ok(())
}

/// Group the crafted items of `ast` into tiers, deepest first.
///
/// Each tree level becomes one step holding the nodes with a non-zero
/// crafted-unit total, listed once per level. Raw materials never appear.
pub fn generate_steps(ast: &DependencyNode, totals: &ResourceTotals) -> Steps {
    let mut steps = Vec::new();
    let mut level = vec![ast];

    while !level.is_empty() {
        let mut step: Step = Vec::new();
        for node in &level {
            let amount = match totals.crafted_units(&node.name) {
                Some(amount) if amount > 0 => amount,
                _ => continue,
            };
            if step.iter().any(|item| item.name == node.name) {
                continue;
            }
            step.push(StepItem::new(node.name.as_str(), amount));
        }
        if !step.is_empty() {
            steps.push(step);
        }
        level = level.iter().flat_map(|node| node.children.iter()).collect();
    }

    steps.reverse();
    steps
}

/// Whether `symbol` is reachable from the inputs of `recipe`.
///
/// Only inputs flagged composite in `symbols` and present in `catalog` are
/// followed. Each recipe is visited once, so an already cyclic catalog still
/// terminates.
pub fn has_circular_dependency(
    symbol: &Symbol,
    recipe: &Recipe,
    catalog: &Catalog,
    symbols: &[Symbol],
) -> bool {
    let mut visited = BTreeSet::new();
    circular_recursive(&symbol.name, recipe, catalog, symbols, &mut visited)
}

fn circular_recursive<'a>(
    target: &str,
    recipe: &'a Recipe,
    catalog: &'a Catalog,
    symbols: &[Symbol],
    visited: &mut BTreeSet<&'a str>,
) -> bool {
    if recipe.input.contains_key(target) {
        return true;
    }

    for name in recipe.input.keys() {
        let composite = symbols.iter().any(|s| s.name == *name && s.composite);
        if !composite || !visited.insert(name.as_str()) {
            continue;
        }
        if let Some(next) = catalog.get(name) {
            if circular_recursive(target, next, catalog, symbols, visited) {
                return true;
            }
        }
    }

    false
}

/// Whether adding `candidate` as an input of `recipe_name` would close a cycle
pub fn would_create_cycle(catalog: &Catalog, recipe_name: &str, candidate: &str) -> bool {
    if candidate == recipe_name {
        return true;
    }
    let Some(candidate_recipe) = catalog.get(candidate) else {
        return false;
    };
    let symbols = catalog.symbols();
    let target = Symbol::new(recipe_name, catalog.contains(recipe_name));
    has_circular_dependency(&target, candidate_recipe, catalog, &symbols)
}

/// Everything needed to craft `quantity` units of one catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub root: String,
    pub quantity: u64,
    pub totals: ResourceTotals,
    pub tree: DependencyNode,
    pub uses: UsageNode,
    pub steps: Steps,
}

/// Build the full crafting plan for `quantity` units of `root`.
///
/// Totals come from an order for `quantity` units of `root`, so the root
/// itself shows up as the final step.
pub fn plan(catalog: &Catalog, root: &str, quantity: u64) -> Result<Plan, CalcError> {
    let recipe = catalog
        .get(root)
        .ok_or_else(|| CalcError::UnknownRecipe(root.to_string()))?;

    debug!(root, quantity, "planning");

    let totals = if quantity == 0 {
        ResourceTotals::new()
    } else {
        let order = Recipe::new(1).with_input(root, quantity);
        reduce(&order, catalog)?
    };
    let tree = generate_ast(recipe, catalog, None, root)?;
    let uses = generate_uses(root, catalog, None)?;
    let steps = generate_steps(&tree, &totals);

    Ok(Plan {
        root: root.to_string(),
        quantity,
        totals,
        tree,
        uses,
        steps,
    })
}

/// Split `amount` into whole stacks of `stack_size` and the leftover units
pub fn stacks(amount: u64, stack_size: NonZeroU64) -> (u64, u64) {
    (amount / stack_size, amount % stack_size)
}

impl Plan {
    /// Text rendering that also counts every amount in stacks of `stack_size`
    pub fn with_stacks(&self, stack_size: NonZeroU64) -> PlanDisplay<'_> {
        PlanDisplay {
            plan: self,
            stack_size: Some(stack_size),
        }
    }
}

/// Text rendering of a [`Plan`], optionally counted in stacks
pub struct PlanDisplay<'a> {
    plan: &'a Plan,
    stack_size: Option<NonZeroU64>,
}

impl PlanDisplay<'_> {
    fn amount(&self, amount: u64) -> String {
        match self.stack_size {
            Some(size) => {
                let (full, rest) = stacks(amount, size);
                format!("{}x ({} x {} + {})", amount, full, size, rest)
            }
            None => format!("{}x", amount),
        }
    }
}

impl fmt::Display for PlanDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plan = self.plan;
        writeln!(f, "=== Crafting Plan ===")?;
        writeln!(f, "Target: {}x {}", plan.quantity, plan.root)?;
        writeln!(f)?;

        writeln!(f, "Raw materials required:")?;
        for (name, amount) in &plan.totals.raw {
            writeln!(f, "  {:>7} {}", self.amount(*amount), name)?;
        }
        writeln!(f)?;

        writeln!(f, "Steps:")?;
        for (idx, step) in plan.steps.iter().enumerate() {
            let items: Vec<String> = step
                .iter()
                .map(|item| format!("{} {}", self.amount(item.amount), item.name))
                .collect();
            writeln!(f, "  {}. {}", idx + 1, items.join(", "))?;
        }

        Ok(())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let display = PlanDisplay {
            plan: self,
            stack_size: None,
        };
        fmt::Display::fmt(&display, f)
    }
}
