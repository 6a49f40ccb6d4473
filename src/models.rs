//! Data models for recipes, catalogs and calculation results

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{CalcError, StoreError};

/// Prefix used by the flat totals representation for crafted-unit counts
pub const CRAFTED_PREFIX: char = '_';

/// A named material or item, tagged with whether the catalog can craft it
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    #[serde(default)]
    pub composite: bool,
}

impl Symbol {
    pub fn new(name: impl Into<String>, composite: bool) -> Self {
        Self {
            name: name.into(),
            composite,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    /// Quantity of each symbol consumed by a single craft
    #[serde(default)]
    pub input: BTreeMap<String, u64>,
    /// Units produced per craft, always at least 1 once inside a catalog
    pub output: u64,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub labels: BTreeSet<String>,
}

impl Default for Recipe {
    fn default() -> Self {
        Self {
            input: BTreeMap::new(),
            output: 1,
            labels: BTreeSet::new(),
        }
    }
}

impl Recipe {
    pub fn new(output: u64) -> Self {
        Self {
            output,
            ..Self::default()
        }
    }

    pub fn with_input(mut self, symbol: impl Into<String>, quantity: u64) -> Self {
        self.input.insert(symbol.into(), quantity);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }
}

/// Snapshot of every known recipe, keyed by the symbol it produces
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    recipes: BTreeMap<String, Recipe>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a recipe, rejecting definitions the engine cannot resolve
    pub fn insert(&mut self, name: impl Into<String>, recipe: Recipe) -> Result<Option<Recipe>, StoreError> {
        let name = name.into();
        validate_definition(&name, &recipe)?;
        Ok(self.recipes.insert(name, recipe))
    }

    pub fn remove(&mut self, name: &str) -> Option<Recipe> {
        self.recipes.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Recipe> {
        self.recipes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.recipes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Recipe names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.recipes.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Recipe)> {
        self.recipes.iter().map(|(name, recipe)| (name.as_str(), recipe))
    }

    /// Every recipe name plus every symbol referenced as an input, sorted
    pub fn symbols(&self) -> Vec<Symbol> {
        let names: BTreeSet<&str> = self
            .recipes
            .iter()
            .flat_map(|(name, recipe)| {
                std::iter::once(name.as_str()).chain(recipe.input.keys().map(String::as_str))
            })
            .collect();

        names
            .into_iter()
            .map(|name| Symbol::new(name, self.contains(name)))
            .collect()
    }

    /// Union of all recipe labels, sorted
    pub fn labels(&self) -> Vec<String> {
        let labels: BTreeSet<&String> = self.recipes.values().flat_map(|r| r.labels.iter()).collect();
        labels.into_iter().cloned().collect()
    }

    /// Recipes carrying any of `labels`; an empty filter keeps everything
    pub fn filter_by_labels(&self, labels: &[String]) -> Catalog {
        if labels.is_empty() {
            return self.clone();
        }
        let recipes = self
            .recipes
            .iter()
            .filter(|(_, recipe)| labels.iter().any(|l| recipe.labels.contains(l)))
            .map(|(name, recipe)| (name.clone(), recipe.clone()))
            .collect();
        Catalog { recipes }
    }

    /// Merge `other` into this catalog; same-named entries are replaced
    pub fn merge(&mut self, other: Catalog) {
        self.recipes.extend(other.recipes);
    }

    /// Check every recipe definition and that no recipe can reach itself
    pub fn validate(&self) -> Result<(), StoreError> {
        for (name, recipe) in &self.recipes {
            validate_definition(name, recipe)?;
        }
        let mut finished = BTreeSet::new();
        let mut chain = Vec::new();
        for name in self.recipes.keys() {
            self.visit(name, &mut chain, &mut finished)?;
        }
        Ok(())
    }

    /// Depth-first walk over recipe inputs. Names on `chain` are still being
    /// expanded; names in `finished` are acyclic and never walked again.
    fn visit<'a>(
        &'a self,
        name: &'a str,
        chain: &mut Vec<&'a str>,
        finished: &mut BTreeSet<&'a str>,
    ) -> Result<(), CalcError> {
        if finished.contains(name) {
            return Ok(());
        }
        if let Some(start) = chain.iter().position(|n| *n == name) {
            let mut path: Vec<String> = chain[start..].iter().map(|n| n.to_string()).collect();
            path.push(name.to_string());
            return Err(CalcError::CyclicCatalog { path });
        }
        let Some(recipe) = self.recipes.get(name) else {
            return Ok(());
        };

        chain.push(name);
        for input in recipe.input.keys() {
            self.visit(input, chain, finished)?;
        }
        chain.pop();
        finished.insert(name);
        Ok(())
    }
}

impl FromIterator<(String, Recipe)> for Catalog {
    /// Builds without validation; call [`Catalog::validate`] on untrusted input
    fn from_iter<T: IntoIterator<Item = (String, Recipe)>>(iter: T) -> Self {
        Catalog {
            recipes: iter.into_iter().collect(),
        }
    }
}

fn validate_definition(name: &str, recipe: &Recipe) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidRecipe {
            name: name.to_string(),
            reason: "name must not be empty".to_string(),
        });
    }
    if recipe.output == 0 {
        return Err(StoreError::InvalidRecipe {
            name: name.to_string(),
            reason: "output must be at least 1".to_string(),
        });
    }
    Ok(())
}

/// Totals produced by reduction.
///
/// `raw` holds cumulative raw-material counts, `crafted` holds the number of
/// finished units needed of each composite item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTotals {
    pub raw: BTreeMap<String, u64>,
    pub crafted: BTreeMap<String, u64>,
}

impl ResourceTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty() && self.crafted.is_empty()
    }

    pub fn raw_amount(&self, name: &str) -> Option<u64> {
        self.raw.get(name).copied()
    }

    pub fn crafted_units(&self, name: &str) -> Option<u64> {
        self.crafted.get(name).copied()
    }

    pub fn add_raw(&mut self, name: &str, quantity: u64) -> Result<(), CalcError> {
        add_into(&mut self.raw, name, quantity)
    }

    pub fn add_crafted(&mut self, name: &str, quantity: u64) -> Result<(), CalcError> {
        add_into(&mut self.crafted, name, quantity)
    }

    /// Multiply every total by `factor`
    pub fn scale(&mut self, factor: u64) -> Result<(), CalcError> {
        for (name, value) in self.raw.iter_mut().chain(self.crafted.iter_mut()) {
            *value = value.checked_mul(factor).ok_or_else(|| CalcError::QuantityOverflow {
                symbol: name.clone(),
            })?;
        }
        Ok(())
    }

    /// Key-wise sum of both maps
    pub fn merge(&mut self, other: ResourceTotals) -> Result<(), CalcError> {
        for (name, value) in other.raw {
            self.add_raw(&name, value)?;
        }
        for (name, value) in other.crafted {
            self.add_crafted(&name, value)?;
        }
        Ok(())
    }

    /// Single-map form where crafted counts live under `_name` keys
    pub fn to_flat_map(&self) -> BTreeMap<String, u64> {
        let mut flat = self.raw.clone();
        for (name, value) in &self.crafted {
            flat.insert(format!("{CRAFTED_PREFIX}{name}"), *value);
        }
        flat
    }

    pub fn from_flat_map(flat: &BTreeMap<String, u64>) -> Self {
        let mut totals = Self::new();
        for (key, value) in flat {
            match key.strip_prefix(CRAFTED_PREFIX) {
                Some(name) => totals.crafted.insert(name.to_string(), *value),
                None => totals.raw.insert(key.clone(), *value),
            };
        }
        totals
    }
}

fn add_into(map: &mut BTreeMap<String, u64>, name: &str, quantity: u64) -> Result<(), CalcError> {
    let entry = map.entry(name.to_string()).or_default();
    *entry = entry.checked_add(quantity).ok_or_else(|| CalcError::QuantityOverflow {
        symbol: name.to_string(),
    })?;
    Ok(())
}

/// Node of a dependency tree or a usage tree.
///
/// Children are owned; `parent` is only the parent's symbol name, kept for
/// breadcrumb-style navigation by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

/// Dependency tree: children are the inputs of a node's recipe
pub type DependencyNode = TreeNode;

/// Usage tree: children are the recipes consuming a node's symbol
pub type UsageNode = TreeNode;

impl TreeNode {
    pub fn leaf(name: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            name: name.into(),
            parent: parent.map(str::to_string),
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Edges on the longest path from this node down to a leaf
    pub fn depth(&self) -> usize {
        self.children.iter().map(|c| c.depth() + 1).max().unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::node_count).sum::<usize>()
    }

    /// Node names grouped by level, root level first
    pub fn levels(&self) -> Vec<Vec<&str>> {
        let mut levels = Vec::new();
        let mut current = vec![self];
        while !current.is_empty() {
            levels.push(current.iter().map(|n| n.name.as_str()).collect());
            current = current.iter().flat_map(|n| n.children.iter()).collect();
        }
        levels
    }

    /// Indented text form, one node per line
    pub fn render(&self) -> String {
        let mut output = String::new();
        self.render_into(&mut output, 0);
        output
    }

    fn render_into(&self, output: &mut String, indent: usize) {
        output.push_str(&"  ".repeat(indent));
        output.push_str(&self.name);
        output.push('\n');
        for child in &self.children {
            child.render_into(output, indent + 1);
        }
    }
}

/// One crafting task inside a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepItem {
    pub name: String,
    pub amount: u64,
}

impl StepItem {
    pub fn new(name: impl Into<String>, amount: u64) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

/// Items craftable once every deeper tier is done
pub type Step = Vec<StepItem>;

/// Tiers ordered from the deepest dependencies to the root
pub type Steps = Vec<Step>;

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .insert("steel", Recipe::new(1).with_input("iron", 1).with_label("metal"))
            .unwrap();
        catalog
            .insert("gear", Recipe::new(1).with_input("steel", 2).with_label("parts"))
            .unwrap();
        catalog
    }

    #[test]
    fn insert_rejects_zero_output() {
        let mut catalog = Catalog::new();
        let err = catalog.insert("broken", Recipe::new(0)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecipe { .. }));
        assert!(catalog.is_empty());
    }

    #[test]
    fn insert_rejects_blank_name() {
        let mut catalog = Catalog::new();
        assert!(catalog.insert("  ", Recipe::new(1)).is_err());
    }

    #[test]
    fn symbols_include_raw_inputs() {
        let symbols = catalog().symbols();
        assert_eq!(
            symbols,
            vec![
                Symbol::new("gear", true),
                Symbol::new("iron", false),
                Symbol::new("steel", true),
            ]
        );
    }

    #[test]
    fn labels_are_sorted_and_unique() {
        let mut catalog = catalog();
        catalog
            .insert("bolt", Recipe::new(4).with_input("steel", 1).with_label("parts"))
            .unwrap();
        assert_eq!(catalog.labels(), vec!["metal".to_string(), "parts".to_string()]);
    }

    #[test]
    fn filter_by_labels_keeps_matching_recipes() {
        let filtered = catalog().filter_by_labels(&["metal".to_string()]);
        assert_eq!(filtered.names(), vec!["steel"]);
        assert_eq!(catalog().filter_by_labels(&[]).len(), 2);
    }

    #[test]
    fn merge_replaces_existing_entries() {
        let mut catalog = catalog();
        let other: Catalog = [("steel".to_string(), Recipe::new(3).with_input("ore", 2))]
            .into_iter()
            .collect();
        catalog.merge(other);
        assert_eq!(catalog.get("steel").unwrap().output, 3);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn validate_detects_cycles() {
        let cyclic: Catalog = [
            ("a".to_string(), Recipe::new(1).with_input("b", 1)),
            ("b".to_string(), Recipe::new(1).with_input("a", 1)),
        ]
        .into_iter()
        .collect();
        let err = cyclic.validate().unwrap_err();
        assert!(matches!(
            err,
            StoreError::Calc(CalcError::CyclicCatalog { ref path }) if path == &["a", "b", "a"]
        ));
        assert!(catalog().validate().is_ok());
    }

    #[test]
    fn validate_handles_deep_shared_chains() {
        // Each layer's two recipes both consume both recipes of the layer below
        let mut layered = Catalog::new();
        layered
            .insert("left_0", Recipe::new(1).with_input("ore", 1))
            .unwrap();
        layered
            .insert("right_0", Recipe::new(1).with_input("ore", 1))
            .unwrap();
        for i in 1..48 {
            for side in ["left", "right"] {
                let recipe = Recipe::new(1)
                    .with_input(format!("left_{}", i - 1), 1)
                    .with_input(format!("right_{}", i - 1), 1);
                layered.insert(format!("{side}_{i}"), recipe).unwrap();
            }
        }
        assert!(layered.validate().is_ok());

        layered
            .insert("left_0", Recipe::new(1).with_input("right_47", 1))
            .unwrap();
        assert!(matches!(
            layered.validate(),
            Err(StoreError::Calc(CalcError::CyclicCatalog { .. }))
        ));
    }

    #[test]
    fn flat_map_uses_underscore_prefix() {
        let mut totals = ResourceTotals::new();
        totals.add_raw("iron", 2).unwrap();
        totals.add_crafted("steel", 2).unwrap();

        let flat = totals.to_flat_map();
        assert_eq!(flat.get("iron"), Some(&2));
        assert_eq!(flat.get("_steel"), Some(&2));
        assert_eq!(ResourceTotals::from_flat_map(&flat), totals);
    }

    #[test]
    fn scale_reports_overflow() {
        let mut totals = ResourceTotals::new();
        totals.add_raw("iron", u64::MAX).unwrap();
        assert_eq!(
            totals.scale(2),
            Err(CalcError::QuantityOverflow {
                symbol: "iron".to_string()
            })
        );
    }

    #[test]
    fn tree_helpers() {
        let tree = TreeNode {
            name: "gear".to_string(),
            parent: None,
            children: vec![TreeNode {
                name: "steel".to_string(),
                parent: Some("gear".to_string()),
                children: vec![TreeNode::leaf("iron", Some("steel"))],
            }],
        };
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.levels(), vec![vec!["gear"], vec!["steel"], vec!["iron"]]);
        assert_eq!(tree.render(), "gear\n  steel\n    iron\n");
        assert!(tree.child("steel").is_some_and(|n| !n.is_leaf()));
    }
}
