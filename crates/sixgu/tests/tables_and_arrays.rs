//! Tables and arrays built through the document API

use pretty_assertions::assert_eq;
use sixgu::prelude::*;

struct People {
    doc: Document,
    s1: RefId,
    table: RefId,
}

/// A `people` table with two rows
fn people() -> People {
    let mut doc = Document::new();
    let s1 = doc.sheet("s1").unwrap();
    let table = doc
        .create_table(s1, Some("people"), Placement::at(0, 4), &["name", "age"])
        .unwrap();
    for (row, (name, age)) in [("\"Ann\"", "31"), ("\"Bob\"", "42")].into_iter().enumerate() {
        doc.set_formula(Selection::at(table, row as u32, 0), name).unwrap();
        doc.set_formula(Selection::at(table, row as u32, 1), age).unwrap();
    }
    People { doc, s1, table }
}

fn cell(doc: &mut Document, sheet: RefId, row: u32, text: &str) -> RefId {
    doc.set_formula(Selection::at(sheet, row, 0), text)
        .unwrap()
        .unwrap()
}

fn shown(doc: &Document, id: RefId) -> String {
    doc.value(id).unwrap().to_string()
}

#[test]
fn test_table_values() {
    let People { mut doc, s1, table } = people();
    assert_eq!(
        shown(&doc, table),
        "{ name: [\"Ann\", \"Bob\"], age: [31, 42] }"
    );

    let ages = cell(&mut doc, s1, 0, "ages: people.age");
    let row = cell(&mut doc, s1, 1, "row: people[1]");
    let bob = cell(&mut doc, s1, 2, "bob: people[name: \"Bob\"].age");
    let whole = cell(&mut doc, s1, 3, "whole: people[name: \"Ann\"]");
    let count = cell(&mut doc, s1, 4, "count: people.name.length");

    assert_eq!(shown(&doc, ages), "[31, 42]");
    assert_eq!(shown(&doc, row), "{ name: \"Bob\", age: 42 }");
    assert_eq!(shown(&doc, bob), "42");
    assert_eq!(shown(&doc, whole), "{ name: \"Ann\", age: 31 }");
    assert_eq!(shown(&doc, count), "2");
}

#[test]
fn test_table_lookup_text() {
    let People { mut doc, s1, table } = people();
    let bob = cell(&mut doc, s1, 0, "bob: people[name:\"Bob\"].age");
    assert_eq!(doc.string_formula(bob).unwrap(), "bob: people[name: \"Bob\"].age");

    // Inside the table the columns are plain names
    let bonus = doc.add_column(table, "bonus").unwrap();
    let inner = doc
        .set_formula(Selection::at(bonus, 0, 0), "age[name: \"Ann\"] + 1")
        .unwrap()
        .unwrap();
    assert_eq!(doc.string_formula(inner).unwrap(), ": age[name: \"Ann\"] + 1");
    assert_eq!(shown(&doc, inner), "32");
}

#[test]
fn test_missing_rows_and_columns() {
    let People { mut doc, s1, .. } = people();
    let nobody = cell(&mut doc, s1, 0, "nobody: people[name: \"Cy\"].age");
    let column = cell(&mut doc, s1, 1, "column: people.height");
    let row = cell(&mut doc, s1, 2, "row: people[5]");

    assert_eq!(
        doc.value(nobody).unwrap(),
        Evaluated::Error("No row where name is string \"Cy\"".into())
    );
    assert_eq!(
        doc.value(column).unwrap(),
        Evaluated::Error("\"people.height\" does not exist.".into())
    );
    assert_eq!(
        doc.value(row).unwrap(),
        Evaluated::Error("Row 5 out of range (2 rows)".into())
    );

    // Adding the column makes the formula resolve
    let table = doc.workbook().child_by_name(s1, "people").unwrap();
    doc.add_column(table, "height").unwrap();
    assert_eq!(shown(&doc, column), "[]");
}

#[test]
fn test_array_of_objects() {
    let mut doc = Document::new();
    let s1 = doc.sheet("s1").unwrap();
    let rows = cell(
        &mut doc,
        s1,
        0,
        "rows: [{ id: 1, label: \"one\" }, { id: 2, label: \"two\" }]",
    );
    assert_eq!(doc.workbook().children(rows).len(), 2);

    let two = doc
        .set_formula(Selection::at(s1, 0, 2), "two: rows[id: 2].label")
        .unwrap()
        .unwrap();
    assert_eq!(shown(&doc, two), "two");
    assert_eq!(doc.string_formula(two).unwrap(), "two: rows[id: 2].label");
}

#[test]
fn test_array_elements_see_each_other() {
    let mut doc = Document::new();
    let s1 = doc.sheet("s1").unwrap();
    let xs = cell(&mut doc, s1, 0, "xs: [1, 2]");
    let third = doc
        .set_formula(Selection::at(xs, 2, 0), "xs[0] + xs[1]")
        .unwrap()
        .unwrap();
    assert_eq!(doc.workbook().get(third).unwrap().kind, EntityKind::ArrayCell);
    assert_eq!(shown(&doc, xs), "[1, 2, 3]");
    assert_eq!(doc.string_formula(third).unwrap(), ": xs[0] + xs[1]");

    let sum = doc
        .set_formula(Selection::at(s1, 0, 2), "sum: xs[0] + xs[1] + xs[2]")
        .unwrap()
        .unwrap();
    assert_eq!(shown(&doc, sum), "6");

    // Only cells can be overridden, not whole arrays
    let what_if = doc
        .set_formula(Selection::at(s1, 1, 2), "what_if: sum(xs: [10])")
        .unwrap()
        .unwrap();
    match doc.value(what_if).unwrap() {
        Evaluated::Error(message) => assert!(message.starts_with("Call error: "), "{}", message),
        other => panic!("expected a call error, got {}", other),
    }
}
