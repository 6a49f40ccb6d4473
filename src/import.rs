//! Catalog import and export
//!
//! Reads JSON export documents and plain-text recipe lists, either from a
//! single file or from every matching file under a directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::db;
use crate::error::{ParseError, StoreError};
use crate::models::{Catalog, Recipe};

/// Shape of an exported catalog file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    #[serde(default)]
    pub recipes: Catalog,
    /// Label name to display color
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Parse an export document, or a bare `{ name: recipe }` map
pub fn parse_json(content: &str) -> Result<ExportDocument, StoreError> {
    let value: serde_json::Value = serde_json::from_str(content)?;

    // A recipe literally named "recipes" carries an `output` field
    let is_document = value
        .get("recipes")
        .is_some_and(|recipes| recipes.get("output").is_none());

    if is_document {
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(ExportDocument {
            recipes: serde_json::from_value(value)?,
            labels: BTreeMap::new(),
        })
    }
}

/// Pretty-printed export document, restricted to recipes carrying one of
/// `filter`'s labels when it is non-empty
pub fn export_json(
    catalog: &Catalog,
    colors: &BTreeMap<String, String>,
    filter: &[String],
) -> Result<String, StoreError> {
    let labels = colors
        .iter()
        .filter(|(label, _)| filter.is_empty() || filter.contains(*label))
        .map(|(label, color)| (label.clone(), color.clone()))
        .collect();

    let document = ExportDocument {
        recipes: catalog.filter_by_labels(filter),
        labels,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Parse a plain-text recipe list, one recipe per line:
///
/// ```text
/// # comment
/// 2 iron, 1 coal => 1 steel
/// ```
pub fn parse_recipe_list(content: &str) -> Result<Catalog, ParseError> {
    let term_re = Regex::new(r"^(\d+)\s+(\S.*)$")?;
    let mut recipes: BTreeMap<String, Recipe> = BTreeMap::new();

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let (inputs, output) = line
            .split_once("=>")
            .ok_or(ParseError::MissingArrow { line: line_no })?;

        let (output, name) = parse_term(&term_re, output, line_no)?;
        if output == 0 {
            return Err(ParseError::ZeroOutput { line: line_no, name });
        }
        if recipes.contains_key(&name) {
            return Err(ParseError::Duplicate { line: line_no, name });
        }

        let mut recipe = Recipe::new(output);
        for term in inputs.split(',').filter(|t| !t.trim().is_empty()) {
            let (quantity, symbol) = parse_term(&term_re, term, line_no)?;
            let total = recipe.input.get(&symbol).copied().unwrap_or(0);
            let total = total.checked_add(quantity).ok_or_else(|| ParseError::Overflow {
                line: line_no,
                term: symbol.clone(),
            })?;
            recipe.input.insert(symbol, total);
        }
        recipes.insert(name, recipe);
    }

    Ok(recipes.into_iter().collect())
}

/// Cut a `#` comment that starts the line or follows whitespace, so symbol
/// names like `c#sharp` survive
fn strip_comment(line: &str) -> &str {
    let start = line.char_indices().find(|&(i, c)| {
        c == '#' && (i == 0 || line[..i].ends_with(char::is_whitespace))
    });
    match start {
        Some((i, _)) => &line[..i],
        None => line,
    }
}

fn parse_term(term_re: &Regex, term: &str, line: usize) -> Result<(u64, String), ParseError> {
    let malformed = || ParseError::Term {
        line,
        term: term.trim().to_string(),
    };
    let cap = term_re.captures(term.trim()).ok_or_else(malformed)?;
    let quantity = cap[1].parse::<u64>().map_err(|_| malformed())?;
    Ok((quantity, cap[2].trim().to_string()))
}

/// Read one catalog file, picking the parser by extension
pub fn load_file(path: &Path) -> Result<ExportDocument, StoreError> {
    let content = fs::read_to_string(path)?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("txt") => Ok(ExportDocument {
            recipes: parse_recipe_list(&content)?,
            labels: BTreeMap::new(),
        }),
        _ => parse_json(&content),
    }
}

fn is_catalog_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("json") | Some("txt")
    )
}

/// Find catalog files under `root`, or `root` itself when it is a file
pub fn find_catalog_files(root: &Path) -> Result<(Vec<PathBuf>, usize), StoreError> {
    if fs::metadata(root)?.is_file() {
        return Ok(if is_catalog_file(root) {
            (vec![root.to_path_buf()], 0)
        } else {
            (Vec::new(), 1)
        });
    }

    let mut files = Vec::new();
    let mut skipped = 0;
    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        if is_catalog_file(entry.path()) {
            files.push(entry.into_path());
        } else {
            skipped += 1;
        }
    }
    Ok((files, skipped))
}

/// Import every catalog file found at `root` into the store.
///
/// Each file is merged in its own transaction; a file that fails to parse or
/// validate is counted and skipped.
pub fn import_path(conn: &Connection, root: &Path) -> Result<ImportStats, StoreError> {
    let (files, skipped) = find_catalog_files(root)?;
    let mut stats = ImportStats {
        skipped,
        ..ImportStats::default()
    };

    info!(files = files.len(), root = %root.display(), "importing catalog files");

    for path in &files {
        let imported = load_file(path)
            .and_then(|document| db::import_catalog(conn, &document.recipes, &document.labels));
        match imported {
            Ok(count) => {
                stats.files += 1;
                stats.recipes += count;
                info!(path = %path.display(), recipes = count, "imported");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "import failed");
                stats.errors += 1;
            }
        }
    }

    Ok(stats)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportStats {
    pub files: usize,
    pub recipes: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} recipes from {} files. Skipped: {}, Errors: {}",
            self.recipes, self.files, self.skipped, self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    fn store() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn parse_recipe_list_lines() {
        let catalog = parse_recipe_list(
            "# metals\n\
             1 iron => 1 steel\n\
             \n\
             2 steel, 1 iron, 1 iron => 4 gear  # trailing comment\n\
             => 1 wood\n",
        )
        .unwrap();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("steel"), Some(&Recipe::new(1).with_input("iron", 1)));
        assert_eq!(
            catalog.get("gear"),
            Some(&Recipe::new(4).with_input("steel", 2).with_input("iron", 2))
        );
        assert!(catalog.get("wood").unwrap().input.is_empty());
    }

    #[test]
    fn parse_recipe_list_reports_line_numbers() {
        assert_eq!(
            parse_recipe_list("1 iron => 1 steel\n1 iron -> 1 gear"),
            Err(ParseError::MissingArrow { line: 2 })
        );
        assert_eq!(
            parse_recipe_list("iron => 1 steel"),
            Err(ParseError::Term {
                line: 1,
                term: "iron".to_string()
            })
        );
        assert_eq!(
            parse_recipe_list("1 iron => 0 steel"),
            Err(ParseError::ZeroOutput {
                line: 1,
                name: "steel".to_string()
            })
        );
        assert_eq!(
            parse_recipe_list("1 iron => 1 steel\n2 ore => 1 steel"),
            Err(ParseError::Duplicate {
                line: 2,
                name: "steel".to_string()
            })
        );
    }

    #[test]
    fn parse_recipe_list_reports_quantity_overflow() {
        assert_eq!(
            parse_recipe_list("18446744073709551615 iron, 1 iron => 1 steel"),
            Err(ParseError::Overflow {
                line: 1,
                term: "iron".to_string()
            })
        );
    }

    #[test]
    fn hash_inside_a_name_is_not_a_comment() {
        let catalog = parse_recipe_list(
            "#header\n\
             1 iron => 1 c#sharp\n\
             2 c#sharp => 1 f#minor\t# tab comment\n",
        )
        .unwrap();

        assert_eq!(catalog.names(), vec!["c#sharp", "f#minor"]);
        assert_eq!(catalog.get("f#minor"), Some(&Recipe::new(1).with_input("c#sharp", 2)));
    }

    #[test]
    fn json_export_round_trip_keeps_labels() {
        let mut catalog = seed::sample_catalog();
        catalog
            .insert("gear", Recipe::new(1).with_input("steel", 2).with_label("parts"))
            .unwrap();
        let colors = BTreeMap::from([
            ("parts".to_string(), "#f80".to_string()),
            ("other".to_string(), "#000".to_string()),
        ]);

        let full = parse_json(&export_json(&catalog, &colors, &[]).unwrap()).unwrap();
        assert_eq!(full.recipes, catalog);
        assert_eq!(full.labels, colors);

        let filtered = parse_json(&export_json(&catalog, &colors, &["parts".to_string()]).unwrap()).unwrap();
        assert_eq!(filtered.recipes.names(), vec!["gear"]);
        assert_eq!(filtered.labels.len(), 1);
    }

    #[test]
    fn parse_json_accepts_bare_maps() {
        let document = parse_json(r#"{"steel": {"input": {"iron": 1}, "output": 1}}"#).unwrap();
        assert_eq!(document.recipes.get("steel"), Some(&Recipe::new(1).with_input("iron", 1)));
        assert!(document.labels.is_empty());

        let named = parse_json(r#"{"recipes": {"input": {"paper": 3}, "output": 1}}"#).unwrap();
        assert!(named.recipes.contains("recipes"));
    }

    #[test]
    fn import_directory_counts_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("metals.txt"), "1 iron => 1 steel\n").unwrap();
        fs::write(
            dir.path().join("parts.json"),
            r#"{"recipes": {"gear": {"input": {"steel": 2}, "output": 1, "labels": ["parts"]}}, "labels": {"parts": "red"}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let conn = store();
        let stats = import_path(&conn, dir.path()).unwrap();

        assert_eq!(
            stats,
            ImportStats {
                files: 2,
                recipes: 2,
                skipped: 1,
                errors: 1,
            }
        );
        let catalog = db::load_catalog(&conn).unwrap();
        assert_eq!(catalog.names(), vec!["gear", "steel"]);
        assert_eq!(db::label_colors(&conn).unwrap().get("parts").map(String::as_str), Some("red"));
    }

    #[test]
    fn import_rejects_invalid_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"gear": {"input": {"steel": 2}, "output": 0}}"#).unwrap();

        let conn = store();
        let stats = import_path(&conn, &path).unwrap();
        assert_eq!(stats.errors, 1);
        assert!(db::load_catalog(&conn).unwrap().is_empty());
    }

    #[test]
    fn import_missing_path_is_an_error() {
        let conn = store();
        assert!(matches!(
            import_path(&conn, Path::new("/definitely/not/here")),
            Err(StoreError::Io(_))
        ));
    }

    #[test]
    fn stats_display() {
        let stats = ImportStats {
            files: 2,
            recipes: 5,
            skipped: 1,
            errors: 0,
        };
        assert_eq!(
            stats.to_string(),
            "Imported 5 recipes from 2 files. Skipped: 1, Errors: 0"
        );
    }
}
