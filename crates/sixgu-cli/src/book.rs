//! JSON book files
//!
//! ```json
//! { "sheets": [ { "name": "s1", "items": [
//!     { "cell": "a", "formula": "1 + 2" },
//!     { "array": "xs", "elements": ["1", "a * 2"] },
//!     { "table": "t", "columns": [ { "name": "age", "cells": ["3", "4"] } ] }
//! ] } ] }
//! ```
//!
//! Items are laid out top to bottom in the first column of their sheet.

use anyhow::{Context, Result};
use serde::Deserialize;
use sixgu::{Document, EngineOptions, Placement, RefId, Selection};
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Book {
    pub sheets: Vec<SheetSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SheetSpec {
    /// Defaults to the first free `s<n>`
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Item {
    Cell {
        cell: String,
        formula: String,
    },
    Array {
        array: String,
        elements: Vec<String>,
    },
    Table {
        table: String,
        columns: Vec<ColumnSpec>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default)]
    pub cells: Vec<String>,
}

impl Book {
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse book '{}'", path.display()))
    }

    /// Build a document from the book.
    ///
    /// Formulas may refer to items defined later; names are re-resolved as
    /// each item is added.
    pub fn into_document(self, options: EngineOptions) -> Result<Document> {
        let mut doc = Document::with_options(options);
        let first = doc.sheet("s1");

        for (i, spec) in self.sheets.into_iter().enumerate() {
            let sheet = match (i, first) {
                (0, Some(first)) => {
                    if let Some(name) = &spec.name {
                        doc.rename(first, name)
                            .with_context(|| format!("Bad sheet name {:?}", name))?;
                    }
                    first
                }
                _ => doc
                    .create_sheet(spec.name.as_deref())
                    .with_context(|| format!("Failed to create sheet {:?}", spec.name))?,
            };
            let mut row = 0;
            for item in spec.items {
                row += add_item(&mut doc, sheet, row, item)?;
            }
        }
        Ok(doc)
    }
}

/// Add one item at `row`; returns the number of rows it takes up
fn add_item(doc: &mut Document, sheet: RefId, row: u32, item: Item) -> Result<u32> {
    match item {
        Item::Cell { cell, formula } => {
            let id = doc
                .create_cell(sheet, Some(&cell), Placement::at(row, 0))
                .with_context(|| format!("Failed to create cell {:?}", cell))?;
            set(doc, id, &formula)?;
            Ok(1)
        }
        Item::Array { array, elements } => {
            let height = elements.len().max(1) as u32;
            let placement = Placement::at(row, 0).resized(height, 1);
            let id = doc
                .create_array(sheet, Some(&array), placement, elements.len())
                .with_context(|| format!("Failed to create array {:?}", array))?;
            let children = doc.workbook().children(id).to_vec();
            for (child, formula) in children.into_iter().zip(&elements) {
                set(doc, child, formula)?;
            }
            Ok(height)
        }
        Item::Table { table, columns } => {
            let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
            let rows = columns.iter().map(|c| c.cells.len()).max().unwrap_or(0) as u32;
            let placement = Placement::at(row, 0).resized(rows + 1, names.len().max(1) as u32);
            let id = doc
                .create_table(sheet, Some(&table), placement, &names)
                .with_context(|| format!("Failed to create table {:?}", table))?;
            let column_ids = doc.workbook().children(id).to_vec();
            for (column, spec) in column_ids.into_iter().zip(&columns) {
                for (index, formula) in spec.cells.iter().enumerate() {
                    doc.set_formula(Selection::at(column, index as u32, 0), formula)
                        .with_context(|| {
                            format!("Failed to set {}.{}[{}]", table, spec.name, index)
                        })?;
                }
            }
            Ok(rows + 1)
        }
    }
}

fn set(doc: &mut Document, id: RefId, formula: &str) -> Result<()> {
    doc.set_formula(Selection::Existing(id), formula)
        .with_context(|| format!("Failed to set formula {:?}", formula))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const BOOK: &str = r#"{
        "sheets": [
            { "name": "main", "items": [
                { "cell": "total", "formula": "sum.xs[0] + data.ages[1] + data.t[name: \"b\"].age" },
                { "cell": "twice", "formula": "total * 2" }
            ] },
            { "name": "sum", "items": [
                { "array": "xs", "elements": ["1", "xs[0] + 1"] }
            ] },
            { "name": "data", "items": [
                { "array": "ages", "elements": ["10", "20"] },
                { "table": "t", "columns": [
                    { "name": "name", "cells": ["\"a\"", "\"b\""] },
                    { "name": "age", "cells": ["30", "40"] }
                ] }
            ] }
        ]
    }"#;

    #[test]
    fn test_load_book() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BOOK.as_bytes()).unwrap();

        let book = Book::read(file.path()).unwrap();
        let doc = book.into_document(EngineOptions::default()).unwrap();
        let main = doc.sheet("main").unwrap();
        let total = doc.workbook().child_by_name(main, "total").unwrap();
        let twice = doc.workbook().child_by_name(main, "twice").unwrap();

        assert_eq!(doc.value(total).unwrap().to_string(), "61");
        assert_eq!(doc.value(twice).unwrap().to_string(), "122");
        assert_eq!(
            doc.string_formula(total).unwrap(),
            "total: sum.xs[0] + data.ages[1] + data.t[name: \"b\"].age"
        );
    }

    #[test]
    fn test_bad_books() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{ "sheets": [ { "items": [ { "cell": "a" } ] } ] }"#)
            .unwrap();
        assert!(Book::read(file.path()).is_err());

        let book: Book = serde_json::from_str(
            r#"{ "sheets": [ { "items": [
                { "cell": "a", "formula": "1" },
                { "cell": "a", "formula": "2" }
            ] } ] }"#,
        )
        .unwrap();
        let err = book.into_document(EngineOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "Failed to create cell \"a\"");
    }
}
