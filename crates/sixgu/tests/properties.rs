//! Whole-document properties: idempotent evaluation, cycles, schedule
//! order, what-if purity, deletion rewrites and text round trips

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use sixgu::prelude::*;
use sixgu::Term;
use sixgu_formula::{circular_ids, formula_refs, DependencyGraph, Schedule};

fn put(doc: &mut Document, sheet: RefId, row: u32, text: &str) -> RefId {
    doc.set_formula(Selection::at(sheet, row, 0), text)
        .unwrap()
        .unwrap()
}

fn snapshot(doc: &Document) -> Vec<(RefId, Evaluated)> {
    doc.evaluated_values()
        .iter()
        .map(|(id, value)| (id, value.clone()))
        .collect()
}

fn contains_ref(term: &Term, id: RefId) -> bool {
    term.as_ref_id() == Some(id) || term.children().into_iter().any(|t| contains_ref(t, id))
}

/// A small budget spreadsheet with a cycle off to one side
fn budget() -> (Document, RefId) {
    let mut doc = Document::new();
    let s1 = doc.sheet("s1").unwrap();
    for (row, text) in [
        "rent: 1200",
        "food: 400",
        "fun: 150",
        "spend: rent + food + fun",
        "income: 2500",
        "saved: income - spend",
        "ratio: saved / income",
        "loop_a: loop_b + 1",
        "loop_b: loop_a + 1",
        "after_loop: loop_a * 2",
        "lean: saved(fun: 0, food: 300)",
    ]
    .into_iter()
    .enumerate()
    {
        put(&mut doc, s1, row as u32, text);
    }
    (doc, s1)
}

#[test]
fn test_evaluation_is_idempotent() {
    let (doc, _) = budget();
    assert_eq!(snapshot(&doc), snapshot(&doc));
}

#[test]
fn test_cycle_members_get_the_circular_error() {
    let (doc, s1) = budget();
    let wb = doc.workbook();
    let values = doc.evaluated_values();
    let circular = Evaluated::Error("Circular reference (or depends on one)".into());

    for name in ["loop_a", "loop_b"] {
        let id = wb.child_by_name(s1, name).unwrap();
        assert_eq!(values.get(id), Some(&circular), "{}", name);
        assert!(values.circular().contains(&id));
    }
    // Dependents are not on the cycle; they just see the error
    let after = wb.child_by_name(s1, "after_loop").unwrap();
    assert!(!values.circular().contains(&after));
    assert!(values.get(after).unwrap().is_error());

    for id in wb.formula_ids() {
        if !values.circular().contains(&id) {
            assert_ne!(values.get(id), Some(&circular));
        }
    }
}

#[test]
fn test_schedule_respects_dependencies() {
    let (doc, _) = budget();
    let wb = doc.workbook();
    let graph = DependencyGraph::build(wb);
    let schedule = Schedule::new(&graph, circular_ids(wb, &graph));

    for &id in graph.nodes() {
        let Some(position) = schedule.position(id) else {
            continue;
        };
        for &dependency in graph.dependencies(id) {
            if schedule.is_circular(dependency) {
                continue;
            }
            let before = schedule.position(dependency).unwrap();
            assert!(before < position, "{} runs before {}", dependency, id);
        }
    }
}

#[test]
fn test_what_if_calls_are_pure() {
    let (mut doc, s1) = budget();
    let lean = doc.workbook().child_by_name(s1, "lean").unwrap();
    // Sheet records grow with the new cells below, so compare formulas only
    let before: Vec<(RefId, Evaluated)> = snapshot(&doc)
        .into_iter()
        .filter(|(id, _)| doc.workbook().get(*id).map_or(false, |e| e.has_formula()))
        .collect();

    // 2500 - (1200 + 300 + 0)
    assert_eq!(doc.value(lean).unwrap(), Evaluated::Value(Value::Number(1000.0)));

    let twice = put(
        &mut doc,
        s1,
        20,
        "twice: [saved(fun: 0, food: 300), saved(fun: 0, food: 300)]",
    );
    let values = doc.evaluated_values();
    assert_eq!(values.get(twice).unwrap().to_string(), "[1000, 1000]");

    // Everything that was there before is unchanged
    for (id, value) in before {
        assert_eq!(values.get(id), Some(&value));
    }
}

#[test]
fn test_deleting_a_cell_rewrites_references() {
    let mut doc = Document::new();
    let s1 = doc.sheet("s1").unwrap();
    let foo = doc.create_sheet(Some("Foo")).unwrap();
    let bar = put(&mut doc, foo, 0, "bar: 41");
    let c = put(&mut doc, s1, 0, "c: Foo.bar + 1");
    assert_eq!(doc.value(c).unwrap(), Evaluated::Value(Value::Number(42.0)));

    let removed = doc.delete_entity(bar).unwrap();
    assert_eq!(removed, vec![bar]);

    let formula = doc.workbook().get(c).unwrap().formula.clone().unwrap();
    assert!(!contains_ref(&formula, bar));
    assert_eq!(doc.string_formula(c).unwrap(), "c: Foo.bar + 1");
    assert_eq!(
        doc.value(c).unwrap(),
        Evaluated::Error("\"Foo.bar\" does not exist.".into())
    );

    // The name comes back and the formula picks it up
    let bar = put(&mut doc, foo, 3, "bar: 9");
    let formula = doc.workbook().get(c).unwrap().formula.clone().unwrap();
    assert_eq!(formula_refs(doc.workbook(), &formula), vec![bar]);
    assert_eq!(doc.value(c).unwrap(), Evaluated::Value(Value::Number(10.0)));
}

#[test]
fn test_deleting_a_sheet_rewrites_to_its_name() {
    let mut doc = Document::new();
    let s1 = doc.sheet("s1").unwrap();
    let foo = doc.create_sheet(Some("Foo")).unwrap();
    let bar = put(&mut doc, foo, 0, "bar: 1");
    let c = put(&mut doc, s1, 0, "c: Foo.bar");

    let removed = doc.delete_entity(foo).unwrap();
    assert_eq!(removed, vec![foo, bar]);
    assert_eq!(doc.string_formula(c).unwrap(), "c: Foo.bar");
    assert_eq!(
        doc.value(c).unwrap(),
        Evaluated::Error("\"Foo\" does not exist.".into())
    );
}

#[test]
fn test_deleting_an_array_element_shifts_the_rest() {
    let mut doc = Document::new();
    let s1 = doc.sheet("s1").unwrap();
    let xs = put(&mut doc, s1, 0, "xs: [10, 20, 30]");
    let first = doc.workbook().child_at(xs, 0).unwrap();
    let last = doc.workbook().child_at(xs, 2).unwrap();
    let total = doc
        .set_formula(Selection::at(s1, 0, 2), "total: xs[0] + xs[2]")
        .unwrap()
        .unwrap();
    assert_eq!(doc.value(total).unwrap(), Evaluated::Value(Value::Number(40.0)));

    doc.delete_location(xs, 1).unwrap();
    let wb = doc.workbook();
    assert_eq!(wb.children(xs), &[first, last]);
    assert_eq!(wb.get(last).unwrap().index, Some(1));
    // Refs follow the element, so the text changes but the value does not
    assert_eq!(doc.string_formula(total).unwrap(), "total: xs[0] + xs[1]");
    assert_eq!(doc.value(total).unwrap(), Evaluated::Value(Value::Number(40.0)));
    assert_eq!(doc.value(xs).unwrap().to_string(), "[10, 30]");
}

#[test]
fn test_deleted_element_reference_becomes_an_index_lookup() {
    let mut doc = Document::new();
    let s1 = doc.sheet("s1").unwrap();
    let xs = put(&mut doc, s1, 0, "xs: [10, 20]");
    let second = doc.workbook().child_at(xs, 1).unwrap();
    let pick = doc
        .set_formula(Selection::at(s1, 0, 2), "pick: xs[1]")
        .unwrap()
        .unwrap();

    doc.delete_location(xs, 1).unwrap();
    let formula = doc.workbook().get(pick).unwrap().formula.clone().unwrap();
    assert!(!contains_ref(&formula, second));
    assert_eq!(doc.string_formula(pick).unwrap(), "pick: xs[1]");
    assert_eq!(
        doc.value(pick).unwrap(),
        Evaluated::Error("\"xs[1]\" does not exist.".into())
    );
}

#[test]
fn test_deleting_an_element_entity_keeps_text_and_value() {
    let mut doc = Document::new();
    let s1 = doc.sheet("s1").unwrap();
    let xs = put(&mut doc, s1, 0, "xs: [1, 2, 3]");
    let first = doc.workbook().child_at(xs, 0).unwrap();
    let last = doc.workbook().child_at(xs, 2).unwrap();
    let y = doc
        .set_formula(Selection::at(s1, 0, 2), "y: xs[2] * 10")
        .unwrap()
        .unwrap();

    doc.delete_entity(first).unwrap();
    assert_eq!(doc.workbook().get(last).unwrap().index, Some(1));
    assert_eq!(doc.value(xs).unwrap().to_string(), "[2, 3]");
    let text = doc.string_formula(y).unwrap();
    assert_eq!(text, "y: xs[1] * 10");
    assert_eq!(doc.value(y).unwrap(), Evaluated::Value(Value::Number(30.0)));

    // Typing the displayed text back in changes nothing
    doc.set_formula(Selection::Existing(y), &text).unwrap();
    assert_eq!(doc.string_formula(y).unwrap(), text);
    assert_eq!(doc.value(y).unwrap(), Evaluated::Value(Value::Number(30.0)));
}

#[test]
fn test_deleting_a_column_keeps_references_readable() {
    let mut doc = Document::new();
    let s1 = doc.sheet("s1").unwrap();
    let people = doc
        .create_table(s1, Some("people"), Placement::at(0, 0), &["name", "age"])
        .unwrap();
    doc.set_formula(Selection::at(people, 0, 0), "\"Ann\"").unwrap();
    doc.set_formula(Selection::at(people, 0, 1), "31").unwrap();
    let age = doc.workbook().child_by_name(people, "age").unwrap();
    let first = doc
        .set_formula(Selection::at(s1, 0, 4), "first: people.age[0]")
        .unwrap()
        .unwrap();
    assert_eq!(doc.value(first).unwrap(), Evaluated::Value(Value::Number(31.0)));

    let removed = doc.delete_entity(age).unwrap();
    assert_eq!(removed.len(), 2);
    let missing = Evaluated::Error("\"people.age\" does not exist.".into());
    let text = doc.string_formula(first).unwrap();
    assert_eq!(text, "first: people.age[0]");
    assert_eq!(doc.value(first).unwrap(), missing);

    doc.set_formula(Selection::Existing(first), &text).unwrap();
    assert_eq!(doc.string_formula(first).unwrap(), text);
    assert_eq!(doc.value(first).unwrap(), missing);

    // A new column with that name is picked up
    doc.add_column(people, "age").unwrap();
    doc.set_formula(Selection::at(people, 0, 1), "77").unwrap();
    assert_eq!(doc.string_formula(first).unwrap(), text);
    assert_eq!(doc.value(first).unwrap(), Evaluated::Value(Value::Number(77.0)));
}

#[test]
fn test_moving_to_another_sheet_keeps_references() {
    let mut doc = Document::new();
    let s1 = doc.sheet("s1").unwrap();
    let s2 = doc.create_sheet(None).unwrap();
    let x = put(&mut doc, s1, 0, "x: 3");
    let y = put(&mut doc, s1, 1, "y: x * x");

    doc.move_entity(x, s2, Placement::at(4, 4)).unwrap();
    assert_eq!(doc.string_formula(y).unwrap(), "y: s2.x * s2.x");
    assert_eq!(doc.value(y).unwrap(), Evaluated::Value(Value::Number(9.0)));
}

#[test]
fn test_formulas_round_trip() {
    let mut doc = Document::new();
    let s1 = doc.sheet("s1").unwrap();
    let other = doc.create_sheet(Some("Other")).unwrap();
    put(&mut doc, other, 0, "z: 1");
    put(&mut doc, s1, 0, "x: 1");
    put(&mut doc, s1, 1, "f: x + 1");
    doc.create_table(s1, Some("people"), Placement::at(0, 3), &["name", "age"])
        .unwrap();

    let texts = [
        "a: 1 + 2 * 3",
        "a: (1 + 2) * 3",
        "a: -x ** 2",
        "a: !x && x || \"no\"",
        "a: x << 2 | 1 ^ 3 & 7",
        "a: { list: [1, [2, 3]], o: { x, y: \"s\" } }",
        "a: Other.z",
        "a: f(x: Other.z)",
        "a: people[name: \"Fred\"].age",
        "a: people.age[0]",
        "a: people[0].name",
        "a: x.length",
        "a: unknown + 1",
        "a: 1 + + ]",
        "weird\\ name: 1",
    ];
    for (row, text) in texts.iter().enumerate() {
        // Distinct names, one cell per formula
        let text = text.replacen("a:", &format!("a{}:", row), 1);
        let id = put(&mut doc, s1, 10 + row as u32, &text);
        assert_eq!(doc.string_formula(id).unwrap(), text);
    }
}

proptest! {
    #[test]
    fn arithmetic_text_round_trips(
        numbers in prop::collection::vec(0u32..1000, 1..6),
        ops in prop::collection::vec(
            prop::sample::select(vec!["+", "-", "*", "/", "%", "**", "==", "<"]),
            5,
        ),
    ) {
        let mut text = numbers[0].to_string();
        for (n, op) in numbers[1..].iter().zip(&ops) {
            text.push_str(&format!(" {} {}", op, n));
        }
        let mut doc = Document::new();
        let s1 = doc.sheet("s1").unwrap();
        let id = put(&mut doc, s1, 0, &format!("x: {}", text));
        prop_assert_eq!(doc.string_formula(id).unwrap(), format!("x: {}", text));
    }
}
