//! Formula unparser
//!
//! Renders stored term trees back to text. Refs are shown by name when the
//! name resolves back to the same entity from the formula's context, and as
//! a lookup chain (`Other.x`, `arr[2]`) otherwise, so reparsing the text in
//! the same context gives back the same tree.

use crate::error::FormulaResult;
use crate::lexer::{can_start_name, is_name_char, Token};
use crate::resolve::lookup_expression;
use crate::translate::translate;
use crate::value::format_number;
use sixgu_core::{Literal, ObjectEntry, RefId, Term, Workbook};

/// Render a term as formula text, as seen from `context`
///
/// # Example
/// ```rust
/// use sixgu_core::{EntityKind, Placement, Workbook};
/// use sixgu_formula::{parse_formula, unparse};
///
/// let mut wb = Workbook::new();
/// let s1 = wb.sheet_by_name("s1").unwrap().id;
/// let other = wb.add_sheet(Some("Other")).unwrap();
/// wb.add_to_sheet(other, EntityKind::Cell, Some("x"), Placement::at(0, 0)).unwrap();
///
/// let term = parse_formula(&wb, "Other.x*2", Some(s1)).formula.unwrap();
/// assert_eq!(unparse(&wb, &term, Some(s1)), "Other.x * 2");
/// ```
pub fn unparse(workbook: &Workbook, term: &Term, context: Option<RefId>) -> String {
    tokens_to_string(workbook, &unparse_tokens(workbook, term, context))
}

/// Render a term as display tokens, including whitespace
pub fn unparse_tokens(workbook: &Workbook, term: &Term, context: Option<RefId>) -> Vec<Token> {
    // Refs that cannot be named from here become lookup chains...
    let expanded = translate(workbook, term, context, &mut |t, ctx| match t {
        Term::Ref(id) => lookup_expression(workbook, ctx, id),
        other => other,
    });
    // ...and column-level index lookups go back to the table-level form.
    let folded = translate(workbook, &expanded, context, &mut |t, _| {
        fold_index_lookup(workbook, t)
    });

    let mut tokens = Vec::new();
    render(workbook, &folded, &mut tokens);
    tokens
}

/// Tokens of an entity's whole formula: `name: expression`, or
/// `: expression` when the entity has no name
pub fn formula_tokens(workbook: &Workbook, id: RefId) -> FormulaResult<Vec<Token>> {
    let entity = workbook.get(id)?;
    let mut tokens = Vec::new();
    if let Some(name) = entity.name() {
        tokens.push(Token::Name(name.to_string()));
    }
    tokens.push(Token::Assignment);
    if let Some(formula) = &entity.formula {
        tokens.push(Token::Whitespace);
        tokens.extend(unparse_tokens(
            workbook,
            formula,
            workbook.formula_context(id),
        ));
    }
    Ok(tokens)
}

/// An entity's whole formula as text
pub fn string_formula(workbook: &Workbook, id: RefId) -> FormulaResult<String> {
    Ok(tokens_to_string(workbook, &formula_tokens(workbook, id)?))
}

pub fn tokens_to_string(workbook: &Workbook, tokens: &[Token]) -> String {
    tokens.iter().map(|t| unlex_token(workbook, t)).collect()
}

/// Text of a single token
pub fn unlex_token(workbook: &Workbook, token: &Token) -> String {
    match token {
        Token::Name(name) => unlex_name(name),
        Token::Ref(id) => match workbook.entity(*id).and_then(|e| e.name()) {
            Some(name) => unlex_name(name),
            None => {
                log::warn!("Rendering a reference to {}, which has no name", id);
                id.to_string()
            }
        },
        Token::Value(Literal::Number(n)) => format_number(*n),
        Token::Value(Literal::String(s)) => {
            serde_json::to_string(s).unwrap_or_else(|_| format!("{:?}", s))
        }
        Token::Value(Literal::Boolean(b)) => b.to_string(),
        Token::Op(symbol) => symbol.to_string(),
        Token::OpenParen => "(".into(),
        Token::CloseParen => ")".into(),
        Token::OpenBracket => "[".into(),
        Token::CloseBracket => "]".into(),
        Token::OpenBrace => "{".into(),
        Token::CloseBrace => "}".into(),
        Token::Lookup => ".".into(),
        Token::Comma => ",".into(),
        Token::Assignment => ":".into(),
        Token::Whitespace => " ".into(),
        Token::BadFormula(text) => text.clone(),
    }
}

/// Escape a name so it lexes back to itself
pub fn unlex_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    if name == "true" || name == "false" {
        out.push('\\');
    }
    for (i, c) in name.chars().enumerate() {
        let plain = if i == 0 {
            can_start_name(c)
        } else {
            is_name_char(c)
        };
        if !plain {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `Column[key: v]` seen through a lookup chain is `Table[key: v].column`
fn fold_index_lookup(workbook: &Workbook, term: Term) -> Term {
    match term {
        Term::IndexLookup { on, key_col, index } if !matches!(*key_col, Term::Name(_)) => {
            let key_col = Box::new(Term::Name(key_name(workbook, &key_col)));
            match *on {
                Term::Lookup { on: table, name } => Term::lookup(
                    Term::IndexLookup {
                        on: table,
                        key_col,
                        index,
                    },
                    name,
                ),
                on => Term::IndexLookup {
                    on: Box::new(on),
                    key_col,
                    index,
                },
            }
        }
        other => other,
    }
}

fn key_name(workbook: &Workbook, key_col: &Term) -> String {
    match key_col {
        Term::Name(name) | Term::Lookup { name, .. } => name.clone(),
        Term::Ref(id) => workbook
            .entity(*id)
            .and_then(|e| e.name())
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

fn render(workbook: &Workbook, term: &Term, out: &mut Vec<Token>) {
    match term {
        Term::Name(name) => out.push(Token::Name(name.clone())),
        Term::Ref(id) => out.push(Token::Ref(*id)),
        Term::Value(literal) => out.push(Token::Value(literal.clone())),
        Term::Unary { op, on } => {
            out.push(Token::Op(op.symbol()));
            render(workbook, on, out);
        }
        Term::Binary { op, left, right } => {
            render(workbook, left, out);
            out.push(Token::Whitespace);
            out.push(Token::Op(op.symbol()));
            out.push(Token::Whitespace);
            render(workbook, right, out);
        }
        Term::Lookup { on, name } => {
            render(workbook, on, out);
            out.push(Token::Lookup);
            out.push(Token::Name(name.clone()));
        }
        Term::LookupIndex { on, index } => {
            render(workbook, on, out);
            out.push(Token::OpenBracket);
            render(workbook, index, out);
            out.push(Token::CloseBracket);
        }
        Term::IndexLookup { on, key_col, index } => {
            render(workbook, on, out);
            out.push(Token::OpenBracket);
            out.push(Token::Name(key_name(workbook, key_col)));
            out.push(Token::Assignment);
            out.push(Token::Whitespace);
            render(workbook, index, out);
            out.push(Token::CloseBracket);
        }
        Term::Call {
            callee,
            args,
            kwargs,
        } => {
            render(workbook, callee, out);
            out.push(Token::OpenParen);
            let mut first = true;
            for arg in args {
                separate(&mut first, out);
                render(workbook, arg, out);
            }
            for kwarg in kwargs {
                separate(&mut first, out);
                render(workbook, &kwarg.param, out);
                out.push(Token::Assignment);
                out.push(Token::Whitespace);
                render(workbook, &kwarg.expr, out);
            }
            out.push(Token::CloseParen);
        }
        Term::Array(elements) => {
            out.push(Token::OpenBracket);
            let mut first = true;
            for element in elements {
                separate(&mut first, out);
                render(workbook, element, out);
            }
            out.push(Token::CloseBracket);
        }
        Term::Object(entries) => {
            out.push(Token::OpenBrace);
            if !entries.is_empty() {
                out.push(Token::Whitespace);
                let mut first = true;
                for entry in entries {
                    separate(&mut first, out);
                    render_entry(workbook, entry, out);
                }
                out.push(Token::Whitespace);
            }
            out.push(Token::CloseBrace);
        }
        Term::Expression(inner) => {
            out.push(Token::OpenParen);
            render(workbook, inner, out);
            out.push(Token::CloseParen);
        }
        Term::BadFormula { text, .. } => out.push(Token::BadFormula(text.clone())),
    }
}

fn separate(first: &mut bool, out: &mut Vec<Token>) {
    if !*first {
        out.push(Token::Comma);
        out.push(Token::Whitespace);
    }
    *first = false;
}

/// `key: value`, or just `value` when the parser would derive the same key
/// from it (`{ a }`, `{ x.a }`)
fn render_entry(workbook: &Workbook, entry: &ObjectEntry, out: &mut Vec<Token>) {
    let mut value = Vec::new();
    render(workbook, &entry.value, &mut value);

    let shorthand = matches!(
        entry.value,
        Term::Name(_) | Term::Ref(_) | Term::Lookup { .. }
    ) && {
        let text = tokens_to_string(workbook, &value);
        let key = unlex_name(&entry.key);
        text == key || ends_with_lookup_of(&text, &key)
    };

    if !shorthand {
        out.push(Token::Name(entry.key.clone()));
        out.push(Token::Assignment);
        out.push(Token::Whitespace);
    }
    out.extend(value);
}

/// Whether `text` ends in `.key` with an unescaped dot
fn ends_with_lookup_of(text: &str, key: &str) -> bool {
    let Some(prefix) = text.strip_suffix(key) else {
        return false;
    };
    let Some(before_dot) = prefix.strip_suffix('.') else {
        return false;
    };
    let backslashes = before_dot.chars().rev().take_while(|c| *c == '\\').count();
    backslashes % 2 == 0
}
