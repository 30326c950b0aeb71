//! End-to-end scenarios: typing formulas into a document and reading back
//! values and text

use pretty_assertions::assert_eq;
use sixgu::prelude::*;
use sixgu::Term;
use sixgu_formula::parse_text;

fn setup() -> (Document, RefId) {
    let doc = Document::new();
    let s1 = doc.sheet("s1").unwrap();
    (doc, s1)
}

fn put(doc: &mut Document, sheet: RefId, row: u32, text: &str) -> RefId {
    doc.set_formula(Selection::at(sheet, row, 0), text)
        .unwrap()
        .unwrap()
}

/// Test a literal expression
#[test]
fn test_literal_sum() {
    let (mut doc, s1) = setup();
    let a = put(&mut doc, s1, 0, "A: 1 + 2");
    assert_eq!(doc.value(a).unwrap(), Evaluated::Value(Value::Number(3.0)));
}

/// Test a reference to another cell
#[test]
fn test_reference() {
    let (mut doc, s1) = setup();
    put(&mut doc, s1, 0, "A: 1 + 2");
    let b = put(&mut doc, s1, 1, "B: A + 1");
    assert_eq!(doc.value(b).unwrap(), Evaluated::Value(Value::Number(4.0)));
}

/// Test two cells referring to each other
#[test]
fn test_mutual_reference() {
    let (mut doc, s1) = setup();
    let a = put(&mut doc, s1, 0, "A: B");
    let b = put(&mut doc, s1, 1, "B: A");
    let circular = Evaluated::Error("Circular reference (or depends on one)".into());
    assert_eq!(doc.value(a).unwrap(), circular);
    assert_eq!(doc.value(b).unwrap(), circular);
}

/// Test a what-if call leaves its argument alone
#[test]
fn test_what_if_call() {
    let (mut doc, s1) = setup();
    let x = put(&mut doc, s1, 0, "x: 1");
    put(&mut doc, s1, 1, "f: x * 2");
    let call = put(&mut doc, s1, 2, "g: f(x: 5)");

    let values = doc.evaluated_values();
    assert_eq!(values.get(call), Some(&Evaluated::Value(Value::Number(10.0))));
    assert_eq!(values.get(x), Some(&Evaluated::Value(Value::Number(1.0))));
    assert_eq!(doc.string_formula(call).unwrap(), "g: f(x: 5)");
}

/// Test a lookup into another sheet
#[test]
fn test_sheet_lookup() {
    let (mut doc, s1) = setup();
    let foo = doc.create_sheet(Some("Foo")).unwrap();
    put(&mut doc, foo, 0, "bar: 7");

    assert_eq!(
        parse_text("Foo.bar").formula,
        Some(Term::lookup(Term::name("Foo"), "bar"))
    );
    // The sheet resolves; the member stays a lookup by name
    assert_eq!(
        doc.parse_formula("Foo.bar", Some(s1)).formula,
        Some(Term::lookup(Term::Ref(foo), "bar"))
    );

    let c = put(&mut doc, s1, 0, "c: Foo.bar");
    assert_eq!(doc.string_formula(c).unwrap(), "c: Foo.bar");
    assert_eq!(doc.value(c).unwrap(), Evaluated::Value(Value::Number(7.0)));
}

/// Test object shorthand is used only when the key matches
#[test]
fn test_object_shorthand() {
    let (mut doc, s1) = setup();
    let foo = doc.create_sheet(Some("Foo")).unwrap();
    put(&mut doc, foo, 0, "name: \"Foo\"");
    put(&mut doc, foo, 1, "title: \"Dr\"");

    let short = put(&mut doc, s1, 0, "o: {name: Foo.name}");
    assert_eq!(doc.string_formula(short).unwrap(), "o: { Foo.name }");

    let long = put(&mut doc, s1, 1, "p: {name: Foo.title}");
    assert_eq!(doc.string_formula(long).unwrap(), "p: { name: Foo.title }");

    assert_eq!(doc.value(short).unwrap().to_string(), "{ name: \"Foo\" }");
    assert_eq!(doc.value(long).unwrap().to_string(), "{ name: \"Dr\" }");
}
