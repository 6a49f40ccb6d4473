//! SQLite-backed recipe store
//!
//! Owns the mutable catalog and hands out consistent [`Catalog`] snapshots
//! for the calculator. Every edit that could make the catalog unresolvable
//! is checked against the current snapshot before it is written.

use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::calculator;
use crate::error::StoreError;
use crate::models::{Catalog, Recipe};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        -- One row per craftable symbol
        CREATE TABLE IF NOT EXISTS recipes (
            name TEXT PRIMARY KEY,
            output INTEGER NOT NULL CHECK (output >= 1)
        );

        -- Quantity of each symbol consumed by a single craft
        CREATE TABLE IF NOT EXISTS recipe_inputs (
            recipe TEXT NOT NULL,
            symbol TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity >= 0),
            PRIMARY KEY (recipe, symbol)
        );

        CREATE TABLE IF NOT EXISTS recipe_labels (
            recipe TEXT NOT NULL,
            label TEXT NOT NULL,
            PRIMARY KEY (recipe, label)
        );

        -- Presentation-only label metadata
        CREATE TABLE IF NOT EXISTS labels (
            name TEXT PRIMARY KEY,
            color TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_recipe_inputs_symbol ON recipe_inputs(symbol);
        "#,
    )?;
    Ok(())
}

/// Remove every recipe and label
pub fn clear_catalog(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_labels;
        DELETE FROM recipe_inputs;
        DELETE FROM recipes;
        DELETE FROM labels;
        "#,
    )?;
    Ok(())
}

/// Create an empty recipe yielding one unit; existing recipes are left alone
pub fn add_recipe(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidRecipe {
            name: name.to_string(),
            reason: "name must not be empty".to_string(),
        });
    }
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO recipes (name, output) VALUES (?1, 1)",
        [name],
    )?;
    Ok(inserted > 0)
}

/// Replace a recipe wholesale, rejecting it if the catalog would become cyclic
pub fn upsert_recipe(conn: &Connection, name: &str, recipe: &Recipe) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction()?;

    let mut catalog = read_catalog(&tx)?;
    catalog.insert(name, recipe.clone())?;
    catalog.validate()?;
    write_recipe(&tx, name, recipe)?;

    tx.commit()?;
    debug!(recipe = name, "recipe stored");
    Ok(())
}

/// Delete a recipe with its inputs and labels. Recipes consuming it keep the
/// reference, which then resolves as a raw material.
pub fn remove_recipe(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM recipe_inputs WHERE recipe = ?1", [name])?;
    tx.execute("DELETE FROM recipe_labels WHERE recipe = ?1", [name])?;
    let removed = tx.execute("DELETE FROM recipes WHERE name = ?1", [name])?;
    tx.commit()?;
    Ok(removed > 0)
}

pub fn set_output(conn: &Connection, name: &str, output: u64) -> Result<(), StoreError> {
    if output == 0 {
        return Err(StoreError::InvalidRecipe {
            name: name.to_string(),
            reason: "output must be at least 1".to_string(),
        });
    }
    let updated = conn.execute(
        "UPDATE recipes SET output = ?1 WHERE name = ?2",
        (to_db_quantity(name, output)?, name),
    )?;
    if updated == 0 {
        return Err(StoreError::UnknownRecipe(name.to_string()));
    }
    Ok(())
}

/// Add `symbol` as an input of `name`, or replace its quantity.
///
/// Rejected when `symbol` already depends on `name`, directly or transitively.
pub fn add_input(conn: &Connection, name: &str, symbol: &str, quantity: u64) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction()?;

    let catalog = read_catalog(&tx)?;
    if !catalog.contains(name) {
        return Err(StoreError::UnknownRecipe(name.to_string()));
    }
    if calculator::would_create_cycle(&catalog, name, symbol) {
        return Err(StoreError::CircularDependency {
            recipe: name.to_string(),
            candidate: symbol.to_string(),
        });
    }

    tx.execute(
        "INSERT OR REPLACE INTO recipe_inputs (recipe, symbol, quantity) VALUES (?1, ?2, ?3)",
        (name, symbol, to_db_quantity(symbol, quantity)?),
    )?;
    tx.commit()?;

    info!(recipe = name, symbol, quantity, "input added");
    Ok(())
}

/// Change the quantity of an existing input
pub fn set_input_quantity(conn: &Connection, name: &str, symbol: &str, quantity: u64) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE recipe_inputs SET quantity = ?1 WHERE recipe = ?2 AND symbol = ?3",
        (to_db_quantity(symbol, quantity)?, name, symbol),
    )?;
    if updated == 0 {
        return Err(StoreError::InvalidRecipe {
            name: name.to_string(),
            reason: format!("'{symbol}' is not an input"),
        });
    }
    Ok(())
}

pub fn remove_input(conn: &Connection, name: &str, symbol: &str) -> Result<bool, StoreError> {
    let removed = conn.execute(
        "DELETE FROM recipe_inputs WHERE recipe = ?1 AND symbol = ?2",
        [name, symbol],
    )?;
    Ok(removed > 0)
}

pub fn add_label(conn: &Connection, name: &str, label: &str) -> Result<(), StoreError> {
    let exists: Option<String> = conn
        .query_row("SELECT name FROM recipes WHERE name = ?1", [name], |row| row.get(0))
        .optional()?;
    if exists.is_none() {
        return Err(StoreError::UnknownRecipe(name.to_string()));
    }
    conn.execute(
        "INSERT OR IGNORE INTO recipe_labels (recipe, label) VALUES (?1, ?2)",
        [name, label],
    )?;
    conn.execute("INSERT OR IGNORE INTO labels (name) VALUES (?1)", [label])?;
    Ok(())
}

/// Detach a label from a recipe. The label's color is a setting and stays in
/// `labels` even once no recipe carries it.
pub fn remove_label(conn: &Connection, name: &str, label: &str) -> Result<bool, StoreError> {
    let removed = conn.execute(
        "DELETE FROM recipe_labels WHERE recipe = ?1 AND label = ?2",
        [name, label],
    )?;
    Ok(removed > 0)
}

pub fn set_label_color(conn: &Connection, label: &str, color: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO labels (name, color) VALUES (?1, ?2)",
        [label, color],
    )?;
    Ok(())
}

/// Colors assigned to labels, keyed by label name
pub fn label_colors(conn: &Connection) -> Result<BTreeMap<String, String>, StoreError> {
    let mut stmt = conn.prepare("SELECT name, color FROM labels WHERE color IS NOT NULL ORDER BY name")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

    let mut results = BTreeMap::new();
    for row in rows {
        let (name, color) = row?;
        results.insert(name, color);
    }
    Ok(results)
}

/// Consistent snapshot of the whole catalog
pub fn load_catalog(conn: &Connection) -> Result<Catalog, StoreError> {
    let tx = conn.unchecked_transaction()?;
    let catalog = read_catalog(&tx)?;
    tx.commit()?;
    Ok(catalog)
}

/// Merge `catalog` and label colors into the store in one transaction.
///
/// Same-named recipes are replaced. Nothing is written if the merged
/// catalog fails validation.
pub fn import_catalog(
    conn: &Connection,
    catalog: &Catalog,
    colors: &BTreeMap<String, String>,
) -> Result<usize, StoreError> {
    let tx = conn.unchecked_transaction()?;

    let mut merged = read_catalog(&tx)?;
    merged.merge(catalog.clone());
    merged.validate()?;

    for (name, recipe) in catalog.iter() {
        write_recipe(&tx, name, recipe)?;
    }
    for (label, color) in colors {
        set_label_color(&tx, label, color)?;
    }

    tx.commit()?;
    info!(recipes = catalog.len(), "catalog imported");
    Ok(catalog.len())
}

fn read_catalog(conn: &Connection) -> Result<Catalog, StoreError> {
    let mut recipes: BTreeMap<String, Recipe> = BTreeMap::new();

    let mut stmt = conn.prepare("SELECT name, output FROM recipes")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    for row in rows {
        let (name, output) = row?;
        let output = from_db_quantity(&name, output)?;
        recipes.insert(name, Recipe::new(output));
    }

    let mut stmt = conn.prepare("SELECT recipe, symbol, quantity FROM recipe_inputs")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;
    for row in rows {
        let (recipe, symbol, quantity) = row?;
        let quantity = from_db_quantity(&symbol, quantity)?;
        if let Some(entry) = recipes.get_mut(&recipe) {
            entry.input.insert(symbol, quantity);
        }
    }

    let mut stmt = conn.prepare("SELECT recipe, label FROM recipe_labels")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (recipe, label) = row?;
        if let Some(entry) = recipes.get_mut(&recipe) {
            entry.labels.insert(label);
        }
    }

    Ok(recipes.into_iter().collect())
}

fn write_recipe(conn: &Connection, name: &str, recipe: &Recipe) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO recipes (name, output) VALUES (?1, ?2)",
        (name, to_db_quantity(name, recipe.output)?),
    )?;

    conn.execute("DELETE FROM recipe_inputs WHERE recipe = ?1", [name])?;
    for (symbol, quantity) in &recipe.input {
        conn.execute(
            "INSERT INTO recipe_inputs (recipe, symbol, quantity) VALUES (?1, ?2, ?3)",
            (name, symbol, to_db_quantity(symbol, *quantity)?),
        )?;
    }

    conn.execute("DELETE FROM recipe_labels WHERE recipe = ?1", [name])?;
    for label in &recipe.labels {
        conn.execute(
            "INSERT INTO recipe_labels (recipe, label) VALUES (?1, ?2)",
            [name, label.as_str()],
        )?;
        conn.execute("INSERT OR IGNORE INTO labels (name) VALUES (?1)", [label])?;
    }
    Ok(())
}

fn to_db_quantity(symbol: &str, quantity: u64) -> Result<i64, StoreError> {
    i64::try_from(quantity).map_err(|_| StoreError::InvalidRecipe {
        name: symbol.to_string(),
        reason: format!("quantity {quantity} is too large"),
    })
}

fn from_db_quantity(symbol: &str, quantity: i64) -> Result<u64, StoreError> {
    u64::try_from(quantity).map_err(|_| StoreError::InvalidRecipe {
        name: symbol.to_string(),
        reason: format!("stored quantity {quantity} is negative"),
    })
}
