//! Recipe Calculator
//!
//! Command-line front end for editing a recipe catalog and planning crafts.

use std::fs;
use std::num::NonZeroU64;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::info;
use tracing_subscriber::EnvFilter;

use recipe_calculator::{calculator, db, import, seed};

#[derive(Parser)]
#[command(name = "recipe-calculator")]
#[command(about = "Crafting recipe calculator: raw totals, dependency trees and crafting steps")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, env = "RECIPE_DB", default_value = "recipes.db")]
    database: PathBuf,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Replace the catalog with the built-in sample recipes
    LoadSample,

    /// List all recipes
    List,

    /// List every known symbol, raw and craftable
    Symbols,

    /// List all labels
    Labels,

    /// Show details for a single recipe
    Show {
        name: String,
    },

    /// Create an empty recipe yielding one unit
    Add {
        name: String,
    },

    /// Delete a recipe
    Remove {
        name: String,
    },

    /// Set how many units one craft yields
    SetOutput {
        name: String,
        output: u64,
    },

    /// Add an input to a recipe, or change its quantity
    AddInput {
        name: String,
        symbol: String,
        quantity: u64,
    },

    /// Remove an input from a recipe
    RemoveInput {
        name: String,
        symbol: String,
    },

    /// Attach a label to a recipe
    Label {
        name: String,
        label: String,

        /// Display color for the label
        #[arg(long)]
        color: Option<String>,
    },

    /// Detach a label from a recipe
    Unlabel {
        name: String,
        label: String,
    },

    /// Calculate raw materials and crafting steps for a recipe
    Calc {
        /// Recipe to craft
        name: String,

        /// Number of finished units wanted
        #[arg(short, long, default_value = "1")]
        quantity: u64,

        /// Show the dependency tree
        #[arg(long)]
        tree: bool,

        /// Show which recipes use this one
        #[arg(long)]
        uses: bool,

        /// Print the full plan as JSON
        #[arg(long)]
        json: bool,

        /// Also count amounts in stacks of this size
        #[arg(long)]
        stack_size: Option<NonZeroU64>,
    },

    /// Check whether adding an input would create a circular dependency
    Check {
        name: String,
        candidate: String,
    },

    /// Import recipes from a JSON export, a text recipe list, or a directory of them
    Import {
        path: PathBuf,
    },

    /// Export recipes as JSON
    Export {
        path: PathBuf,

        /// Only export recipes carrying one of these labels
        #[arg(short, long = "label")]
        labels: Vec<String>,
    },

    /// Delete every recipe and label
    Reset,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;
    db::init_schema(&conn)?;
    info!(database = %cli.database.display(), "store opened");

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            db::clear_catalog(&conn)?;
            let count = db::import_catalog(&conn, &seed::sample_catalog(), &Default::default())?;
            println!("Loaded {} sample recipes", count);
        }

        Commands::List => {
            let catalog = db::load_catalog(&conn)?;
            if catalog.is_empty() {
                println!("No recipes in database. Run 'import' or 'load-sample' first.");
            } else {
                println!("{:<30} {:>8} {:>8}", "Recipe", "Output", "Inputs");
                println!("{}", "-".repeat(48));
                for (name, recipe) in catalog.iter() {
                    println!("{:<30} {:>8} {:>8}", name, recipe.output, recipe.input.len());
                }
            }
        }

        Commands::Symbols => {
            for symbol in db::load_catalog(&conn)?.symbols() {
                let kind = if symbol.composite { "craftable" } else { "raw" };
                println!("  {:<30} {}", symbol.name, kind);
            }
        }

        Commands::Labels => {
            let catalog = db::load_catalog(&conn)?;
            let colors = db::label_colors(&conn)?;
            for label in catalog.labels() {
                match colors.get(&label) {
                    Some(color) => println!("  {} ({})", label, color),
                    None => println!("  {}", label),
                }
            }
        }

        Commands::Show { name } => {
            let catalog = db::load_catalog(&conn)?;
            let Some(recipe) = catalog.get(&name) else {
                bail!("Recipe '{}' not found", name);
            };

            println!("Recipe: {}", name);
            println!("  Output: {} per craft", recipe.output);
            if !recipe.labels.is_empty() {
                let labels: Vec<&str> = recipe.labels.iter().map(String::as_str).collect();
                println!("  Labels: {}", labels.join(", "));
            }
            if !recipe.input.is_empty() {
                println!("  Inputs:");
                for (symbol, quantity) in &recipe.input {
                    let kind = if catalog.contains(symbol) { "" } else { " (raw)" };
                    println!("    {}x {}{}", quantity, symbol, kind);
                }
            }

            let users: Vec<&str> = catalog
                .iter()
                .filter(|(_, r)| r.input.contains_key(&name))
                .map(|(n, _)| n)
                .collect();
            if !users.is_empty() {
                println!("  Used by: {}", users.join(", "));
            }
        }

        Commands::Add { name } => {
            if db::add_recipe(&conn, &name)? {
                println!("Added recipe '{}'", name);
            } else {
                println!("Recipe '{}' already exists", name);
            }
        }

        Commands::Remove { name } => {
            if !db::remove_recipe(&conn, &name)? {
                bail!("Recipe '{}' not found", name);
            }
            println!("Removed recipe '{}'", name);
        }

        Commands::SetOutput { name, output } => {
            db::set_output(&conn, &name, output)?;
            println!("'{}' now yields {} per craft", name, output);
        }

        Commands::AddInput {
            name,
            symbol,
            quantity,
        } => {
            db::add_input(&conn, &name, &symbol, quantity)?;
            println!("'{}' now needs {}x {}", name, quantity, symbol);
        }

        Commands::RemoveInput { name, symbol } => {
            if !db::remove_input(&conn, &name, &symbol)? {
                bail!("'{}' is not an input of '{}'", symbol, name);
            }
            println!("Removed {} from '{}'", symbol, name);
        }

        Commands::Label { name, label, color } => {
            db::add_label(&conn, &name, &label)?;
            if let Some(color) = color {
                db::set_label_color(&conn, &label, &color)?;
            }
            println!("Labelled '{}' with {}", name, label);
        }

        Commands::Unlabel { name, label } => {
            if !db::remove_label(&conn, &name, &label)? {
                bail!("'{}' is not labelled {}", name, label);
            }
            println!("Removed label {} from '{}'", label, name);
        }

        Commands::Calc {
            name,
            quantity,
            tree,
            uses,
            json,
            stack_size,
        } => {
            let catalog = db::load_catalog(&conn)?;
            let plan = calculator::plan(&catalog, &name, quantity)
                .with_context(|| format!("Failed to plan '{}'", name))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
                return Ok(());
            }

            if tree {
                println!("Dependency tree:\n");
                println!("{}", plan.tree.render());
            }
            if uses {
                println!("Used by:\n");
                println!("{}", plan.uses.render());
            }
            match stack_size {
                Some(size) => println!("{}", plan.with_stacks(size)),
                None => println!("{}", plan),
            }
        }

        Commands::Check { name, candidate } => {
            let catalog = db::load_catalog(&conn)?;
            if calculator::would_create_cycle(&catalog, &name, &candidate) {
                println!("Adding '{}' to '{}' would create a circular dependency", candidate, name);
            } else {
                println!("'{}' can be added to '{}'", candidate, name);
            }
        }

        Commands::Import { path } => {
            let stats = import::import_path(&conn, &path)
                .with_context(|| format!("Failed to import {}", path.display()))?;
            println!("{}", stats);
        }

        Commands::Export { path, labels } => {
            let catalog = db::load_catalog(&conn)?;
            let colors = db::label_colors(&conn)?;
            let document = import::export_json(&catalog, &colors, &labels)?;
            fs::write(&path, document).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }

        Commands::Reset => {
            db::clear_catalog(&conn)?;
            println!("Catalog cleared");
        }
    }

    Ok(())
}
