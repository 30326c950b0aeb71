//! Formula parser
//!
//! A recursive descent parser over the lexer's tokens. Binary operators use
//! precedence climbing; prefix operators bind looser than `**`, so `-a ** 2`
//! is `-(a ** 2)`.

use crate::error::{FormulaError, FormulaResult};
use crate::lexer::{lex_spanned, Token};
use crate::resolve::resolve;
use sixgu_core::{
    BinaryOperator, KeywordArg, ObjectEntry, RefId, Term, UnaryOperator, Workbook,
};

/// The two optional parts of formula text: `name: expression`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedFormula {
    /// Name given before the `:`, if any
    pub name: Option<String>,
    /// Expression after the `:` (or the whole text), if any
    pub formula: Option<Term>,
}

/// Parse formula text and resolve its names as seen from `context`.
///
/// Never fails: text that does not lex or parse comes back as a
/// [`Term::BadFormula`] holding the expression text.
///
/// # Example
/// ```rust
/// use sixgu_core::{EntityKind, Placement, Term, Workbook};
/// use sixgu_formula::parse_formula;
///
/// let mut wb = Workbook::new();
/// let s1 = wb.sheet_by_name("s1").unwrap().id;
/// let x = wb.add_to_sheet(s1, EntityKind::Cell, Some("x"), Placement::at(0, 0)).unwrap();
///
/// let parsed = parse_formula(&wb, "y: x", Some(s1));
/// assert_eq!(parsed.name.as_deref(), Some("y"));
/// assert_eq!(parsed.formula, Some(Term::Ref(x)));
/// ```
pub fn parse_formula(workbook: &Workbook, text: &str, context: Option<RefId>) -> ParsedFormula {
    let parsed = parse_text(text);
    ParsedFormula {
        name: parsed.name,
        formula: parsed
            .formula
            .map(|term| resolve(workbook, &term, context)),
    }
}

/// Parse formula text without resolving names
pub fn parse_text(text: &str) -> ParsedFormula {
    let (spanned, lex_error) = lex_spanned(text);

    // `name:` and `:` prefixes are recognised even when the rest fails to lex.
    let (name, skip) = match spanned.as_slice() {
        [(Token::Assignment, _), ..] => (None, 1),
        [(Token::Name(name), _), (Token::Assignment, _), ..] => (Some(name.clone()), 2),
        _ => (None, 0),
    };
    let rest = &spanned[skip..];
    let expression_start = rest
        .first()
        .map(|(_, start)| *start)
        .or_else(|| lex_error.as_ref().map(|(_, start)| *start));
    let expression_text = expression_start.map_or("", |start| text[start..].trim());

    if let Some((e, _)) = lex_error {
        log::debug!("Formula {:?} does not lex: {}", text, e);
        return ParsedFormula {
            name,
            formula: Some(Term::bad(expression_text, e.to_string())),
        };
    }

    if rest.is_empty() {
        return ParsedFormula {
            name,
            formula: None,
        };
    }

    let tokens: Vec<Token> = rest.iter().map(|(t, _)| t.clone()).collect();
    let formula = match parse_tokens(&tokens) {
        Ok(term) => term,
        Err(e) => {
            log::debug!("Formula {:?} does not parse: {}", text, e);
            Term::bad(expression_text, e.to_string())
        }
    };
    ParsedFormula {
        name,
        formula: Some(formula),
    }
}

/// Parse a complete expression from tokens
pub fn parse_tokens(tokens: &[Token]) -> FormulaResult<Term> {
    let mut parser = Parser::new(tokens);
    let term = parser.parse_expression()?;

    // Make sure we consumed all input
    if let Some(token) = parser.current_token() {
        return Err(FormulaError::Parse(format!(
            "Unexpected {} after expression",
            describe(token)
        )));
    }
    Ok(term)
}

/// Formula parser
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    // === Helper methods ===

    fn current_token(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset)
    }

    fn consume(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        match self.current_token() {
            Some(token) if token == expected => {
                self.consume();
                Ok(())
            }
            Some(token) => Err(FormulaError::Parse(format!(
                "Expected {}, got {}",
                describe(expected),
                describe(token)
            ))),
            None => Err(FormulaError::Parse(format!(
                "Expected {}, got end of formula",
                describe(expected)
            ))),
        }
    }

    /// `name:` at the cursor, consumed if present
    fn take_assignment(&mut self) -> Option<String> {
        match (self.current_token(), self.peek_token(1)) {
            (Some(Token::Name(name)), Some(Token::Assignment)) => {
                self.pos += 2;
                Some(name.clone())
            }
            _ => None,
        }
    }

    // === Expression parsing with precedence ===
    // Binary operators (lowest to highest):
    //  1 ||   2 &&   3 |   4 ^   5 &   6 == !=   7 < <= > >=
    //  8 << >>   9 + -   10 * / %
    // then prefix - + ! ~, then ** (right associative), then postfix
    // lookups, indexing and calls.

    fn parse_expression(&mut self) -> FormulaResult<Term> {
        self.parse_binary(1)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> FormulaResult<Term> {
        let mut left = self.parse_unary()?;

        while let Some(op) = self.current_binary_op() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.consume();
            let right = self.parse_binary(precedence + 1)?;
            left = Term::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Binary operator at the cursor, other than `**`
    fn current_binary_op(&self) -> Option<BinaryOperator> {
        match self.current_token() {
            Some(Token::Op(symbol)) => BinaryOperator::from_symbol(symbol)
                .filter(|op| *op != BinaryOperator::Power),
            _ => None,
        }
    }

    fn parse_unary(&mut self) -> FormulaResult<Term> {
        if let Some(Token::Op(symbol)) = self.current_token() {
            if let Some(op) = UnaryOperator::from_symbol(symbol) {
                self.consume();
                let on = self.parse_unary()?;
                return Ok(Term::Unary {
                    op,
                    on: Box::new(on),
                });
            }
        }
        self.parse_exponent()
    }

    fn parse_exponent(&mut self) -> FormulaResult<Term> {
        let left = self.parse_postfix()?;

        if matches!(self.current_token(), Some(Token::Op("**"))) {
            self.consume();
            // Right associative, and allows `2 ** -1`
            let right = self.parse_unary()?;
            return Ok(Term::Binary {
                op: BinaryOperator::Power,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_postfix(&mut self) -> FormulaResult<Term> {
        let mut term = self.parse_primary()?;

        loop {
            match self.current_token() {
                Some(Token::Lookup) => {
                    self.consume();
                    match self.consume() {
                        Some(Token::Name(name)) => term = Term::lookup(term, name.clone()),
                        Some(token) => {
                            return Err(FormulaError::Parse(format!(
                                "Expected a name after '.', got {}",
                                describe(token)
                            )))
                        }
                        None => {
                            return Err(FormulaError::Parse(
                                "Expected a name after '.', got end of formula".into(),
                            ))
                        }
                    }
                }
                Some(Token::OpenBracket) => {
                    self.consume();
                    term = match self.take_assignment() {
                        Some(key) => {
                            let index = self.parse_expression()?;
                            Term::IndexLookup {
                                on: Box::new(term),
                                key_col: Box::new(Term::Name(key)),
                                index: Box::new(index),
                            }
                        }
                        None => Term::lookup_index(term, self.parse_expression()?),
                    };
                    self.expect(&Token::CloseBracket)?;
                }
                Some(Token::OpenParen) => {
                    self.consume();
                    term = self.parse_call(term)?;
                }
                _ => break,
            }
        }

        Ok(term)
    }

    fn parse_primary(&mut self) -> FormulaResult<Term> {
        match self.consume() {
            Some(Token::Value(literal)) => Ok(Term::Value(literal.clone())),
            Some(Token::Name(name)) => Ok(Term::Name(name.clone())),
            Some(Token::OpenParen) => {
                let inner = self.parse_expression()?;
                self.expect(&Token::CloseParen)?;
                Ok(Term::Expression(Box::new(inner)))
            }
            Some(Token::OpenBracket) => self.parse_array(),
            Some(Token::OpenBrace) => self.parse_object(),
            Some(token) => Err(FormulaError::Parse(format!(
                "Unexpected {}",
                describe(token)
            ))),
            None => Err(FormulaError::Parse("Unexpected end of formula".into())),
        }
    }

    /// Elements up to the closing bracket; `[` already consumed
    fn parse_array(&mut self) -> FormulaResult<Term> {
        let mut elements = Vec::new();

        if matches!(self.current_token(), Some(Token::CloseBracket)) {
            self.consume();
            return Ok(Term::Array(elements));
        }

        loop {
            elements.push(self.parse_expression()?);
            if matches!(self.current_token(), Some(Token::Comma)) {
                self.consume();
            } else {
                break;
            }
        }
        self.expect(&Token::CloseBracket)?;

        Ok(Term::Array(elements))
    }

    /// Entries up to the closing brace; `{` already consumed
    fn parse_object(&mut self) -> FormulaResult<Term> {
        let mut entries = Vec::new();

        if matches!(self.current_token(), Some(Token::CloseBrace)) {
            self.consume();
            return Ok(Term::Object(entries));
        }

        loop {
            let entry = match self.take_assignment() {
                Some(key) => ObjectEntry {
                    key,
                    value: self.parse_expression()?,
                },
                None => {
                    // `{ a, b.c }` is `{ a: a, c: b.c }`
                    let value = self.parse_expression()?;
                    let key = match &value {
                        Term::Name(name) | Term::Lookup { name, .. } => name.clone(),
                        _ => {
                            return Err(FormulaError::Parse(
                                "Object entries need a key".into(),
                            ))
                        }
                    };
                    ObjectEntry { key, value }
                }
            };
            entries.push(entry);
            if matches!(self.current_token(), Some(Token::Comma)) {
                self.consume();
            } else {
                break;
            }
        }
        self.expect(&Token::CloseBrace)?;

        Ok(Term::Object(entries))
    }

    /// Arguments up to the closing paren; `(` already consumed
    fn parse_call(&mut self, callee: Term) -> FormulaResult<Term> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();

        if !matches!(self.current_token(), Some(Token::CloseParen)) {
            loop {
                match self.take_assignment() {
                    Some(param) => kwargs.push(KeywordArg {
                        param: Term::Name(param),
                        expr: self.parse_expression()?,
                    }),
                    None => args.push(self.parse_expression()?),
                }
                if matches!(self.current_token(), Some(Token::Comma)) {
                    self.consume();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::CloseParen)?;

        Ok(Term::Call {
            callee: Box::new(callee),
            args,
            kwargs,
        })
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Name(name) => format!("name '{}'", name),
        Token::Value(literal) => format!("value {:?}", literal),
        Token::Op(symbol) => format!("'{}'", symbol),
        Token::OpenParen => "'('".into(),
        Token::CloseParen => "')'".into(),
        Token::OpenBracket => "'['".into(),
        Token::CloseBracket => "']'".into(),
        Token::OpenBrace => "'{'".into(),
        Token::CloseBrace => "'}'".into(),
        Token::Lookup => "'.'".into(),
        Token::Comma => "','".into(),
        Token::Assignment => "':'".into(),
        Token::Ref(id) => format!("reference {}", id),
        Token::Whitespace => "whitespace".into(),
        Token::BadFormula(text) => format!("bad formula {:?}", text),
    }
}
