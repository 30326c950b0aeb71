//! Formula term tree types

use crate::id::RefId;
use std::fmt;

/// One node of a parsed formula.
///
/// A stored formula is a single root term. Resolution replaces `Name`s with
/// `Ref`s; everything else keeps the shape the parser produced, so the tree
/// can be rendered back to the text it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    // === Leaves ===
    /// Identifier that has not been resolved to an entity
    Name(String),
    /// Resolved entity
    Ref(RefId),
    /// Literal value
    Value(Literal),

    // === Operators ===
    Unary {
        op: UnaryOperator,
        on: Box<Term>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Term>,
        right: Box<Term>,
    },

    // === Postfix ===
    /// `on.name`
    Lookup { on: Box<Term>, name: String },
    /// `on[index]`
    LookupIndex { on: Box<Term>, index: Box<Term> },
    /// `on[key_col: index]`: the row of `on` whose `key_col` equals `index`.
    ///
    /// After resolution `on` may be a column and `key_col` a sibling column,
    /// standing for `Table[key_col: index].column`.
    IndexLookup {
        on: Box<Term>,
        key_col: Box<Term>,
        index: Box<Term>,
    },
    /// `callee(args, param: expr, ...)`
    Call {
        callee: Box<Term>,
        args: Vec<Term>,
        kwargs: Vec<KeywordArg>,
    },

    // === Literals with structure ===
    /// `[a, b, ...]`
    Array(Vec<Term>),
    /// `{key: value, ...}` in source order
    Object(Vec<ObjectEntry>),
    /// `(inner)`
    Expression(Box<Term>),

    /// Text that failed to lex, parse or compile
    BadFormula { text: String, reason: String },
}

/// Named argument of a what-if call
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordArg {
    /// Parameter being overridden, resolved in the callee's context
    pub param: Term,
    /// Value expression, resolved in the caller's context
    pub expr: Term,
}

/// Entry of an object literal
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectEntry {
    pub key: String,
    pub value: Term,
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    // Logical
    Or,
    And,

    // Bitwise
    BitOr,
    BitXor,
    BitAnd,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Shifts
    ShiftLeft,
    ShiftRight,

    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Power,
}

impl BinaryOperator {
    /// Binding strength, higher binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::BitOr => 3,
            BinaryOperator::BitXor => 4,
            BinaryOperator::BitAnd => 5,
            BinaryOperator::Equal | BinaryOperator::NotEqual => 6,
            BinaryOperator::LessThan
            | BinaryOperator::LessEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterEqual => 7,
            BinaryOperator::ShiftLeft | BinaryOperator::ShiftRight => 8,
            BinaryOperator::Add | BinaryOperator::Subtract => 9,
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Remainder => 10,
            BinaryOperator::Power => 11,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Or => "||",
            BinaryOperator::And => "&&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::ShiftLeft => "<<",
            BinaryOperator::ShiftRight => ">>",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Remainder => "%",
            BinaryOperator::Power => "**",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "||" => BinaryOperator::Or,
            "&&" => BinaryOperator::And,
            "|" => BinaryOperator::BitOr,
            "^" => BinaryOperator::BitXor,
            "&" => BinaryOperator::BitAnd,
            "==" => BinaryOperator::Equal,
            "!=" => BinaryOperator::NotEqual,
            "<" => BinaryOperator::LessThan,
            "<=" => BinaryOperator::LessEqual,
            ">" => BinaryOperator::GreaterThan,
            ">=" => BinaryOperator::GreaterEqual,
            "<<" => BinaryOperator::ShiftLeft,
            ">>" => BinaryOperator::ShiftRight,
            "+" => BinaryOperator::Add,
            "-" => BinaryOperator::Subtract,
            "*" => BinaryOperator::Multiply,
            "/" => BinaryOperator::Divide,
            "%" => BinaryOperator::Remainder,
            "**" => BinaryOperator::Power,
            _ => return None,
        })
    }
}

/// Prefix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Not,
    BitNot,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::Not => "!",
            UnaryOperator::BitNot => "~",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "-" => UnaryOperator::Negate,
            "+" => UnaryOperator::Plus,
            "!" => UnaryOperator::Not,
            "~" => UnaryOperator::BitNot,
            _ => return None,
        })
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl Term {
    pub fn name(name: impl Into<String>) -> Self {
        Term::Name(name.into())
    }

    pub fn number(n: f64) -> Self {
        Term::Value(Literal::Number(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Term::Value(Literal::String(s.into()))
    }

    pub fn lookup(on: Term, name: impl Into<String>) -> Self {
        Term::Lookup {
            on: Box::new(on),
            name: name.into(),
        }
    }

    pub fn lookup_index(on: Term, index: Term) -> Self {
        Term::LookupIndex {
            on: Box::new(on),
            index: Box::new(index),
        }
    }

    pub fn bad(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Term::BadFormula {
            text: text.into(),
            reason: reason.into(),
        }
    }

    /// The referenced id, if this is a `Ref`
    pub fn as_ref_id(&self) -> Option<RefId> {
        match self {
            Term::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Direct sub-terms, in source order
    pub fn children(&self) -> Vec<&Term> {
        match self {
            Term::Name(_) | Term::Ref(_) | Term::Value(_) | Term::BadFormula { .. } => Vec::new(),
            Term::Unary { on, .. } => vec![on],
            Term::Binary { left, right, .. } => vec![left, right],
            Term::Lookup { on, .. } => vec![on],
            Term::LookupIndex { on, index } => vec![on, index],
            Term::IndexLookup { on, key_col, index } => vec![on, key_col, index],
            Term::Call {
                callee,
                args,
                kwargs,
            } => {
                let mut children: Vec<&Term> = vec![callee];
                children.extend(args.iter());
                for kwarg in kwargs {
                    children.push(&kwarg.param);
                    children.push(&kwarg.expr);
                }
                children
            }
            Term::Array(elements) => elements.iter().collect(),
            Term::Object(entries) => entries.iter().map(|e| &e.value).collect(),
            Term::Expression(inner) => vec![inner],
        }
    }
}
