//! Formula lexer
//!
//! Turns formula text into a flat token sequence. Whitespace separates tokens
//! but is not emitted; the unparser emits [`Token::Whitespace`] itself when
//! rendering for display.

use crate::error::{FormulaError, FormulaResult};
use sixgu_core::{Literal, RefId};

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier, with escapes already removed
    Name(String),
    /// `true`, `false`, numbers and strings
    Value(Literal),
    /// Operator symbol, e.g. `+` or `**`
    Op(&'static str),
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
    /// `.`
    Lookup,
    /// `,`
    Comma,
    /// `:`
    Assignment,

    // Only produced by the unparser
    /// Resolved reference, rendered as the entity's name
    Ref(RefId),
    /// Single space between tokens
    Whitespace,
    /// Source text of a formula that did not parse
    BadFormula(String),
}

const TWO_CHAR_OPS: [&str; 9] = ["**", ">=", "<=", ">>", "<<", "&&", "||", "==", "!="];
const ONE_CHAR_OPS: [&str; 12] = ["<", ">", "+", "-", "*", "/", "%", "&", "|", "^", "!", "~"];

/// Characters that may start a bare name
pub fn can_start_name(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Characters that may continue a bare name
pub fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Lex a whole formula
///
/// # Example
/// ```rust
/// use sixgu_formula::lexer::{lex, Token};
/// use sixgu_core::Literal;
///
/// let tokens = lex("a ** 2").unwrap();
/// assert_eq!(
///     tokens,
///     vec![
///         Token::Name("a".into()),
///         Token::Op("**"),
///         Token::Value(Literal::Number(2.0)),
///     ]
/// );
/// ```
pub fn lex(input: &str) -> FormulaResult<Vec<Token>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

/// Lex as far as possible, keeping each token's starting byte offset.
///
/// Returns the tokens read before the first error, and that error with the
/// offset of the token it stopped in.
pub(crate) fn lex_spanned(input: &str) -> (Vec<(Token, usize)>, Option<(FormulaError, usize)>) {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        lexer.skip_whitespace();
        let start = lexer.pos;
        match lexer.next_token() {
            Ok(Some(token)) => tokens.push((token, start)),
            Ok(None) => return (tokens, None),
            Err(e) => return (tokens, Some((e, start))),
        }
    }
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    /// Character position (not byte offset) of the cursor
    fn position(&self) -> usize {
        self.input[..self.pos].chars().count()
    }

    // === Token scanning ===

    fn next_token(&mut self) -> FormulaResult<Option<Token>> {
        self.skip_whitespace();

        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(None),
        };

        let token = match c {
            '(' => self.single(Token::OpenParen),
            ')' => self.single(Token::CloseParen),
            '[' => self.single(Token::OpenBracket),
            ']' => self.single(Token::CloseBracket),
            '{' => self.single(Token::OpenBrace),
            '}' => self.single(Token::CloseBrace),
            '.' => self.single(Token::Lookup),
            ',' => self.single(Token::Comma),
            ':' => self.single(Token::Assignment),
            '"' => self.scan_string()?,
            c if c.is_ascii_digit() => self.scan_number(),
            c if can_start_name(c) || c == '\\' => self.scan_name()?,
            _ => self.scan_op(c)?,
        };
        Ok(Some(token))
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn scan_op(&mut self, c: char) -> FormulaResult<Token> {
        if let Some(next) = self.peek_char_at(1) {
            let pair: String = [c, next].iter().collect();
            if let Some(op) = TWO_CHAR_OPS.iter().copied().find(|op| *op == pair) {
                self.advance();
                self.advance();
                return Ok(Token::Op(op));
            }
        }
        let single = c.to_string();
        match ONE_CHAR_OPS.iter().copied().find(|op| *op == single) {
            Some(op) => {
                self.advance();
                Ok(Token::Op(op))
            }
            None => Err(FormulaError::Lex {
                character: c,
                position: self.position(),
            }),
        }
    }

    fn scan_name(&mut self) -> FormulaResult<Token> {
        let mut name = String::new();
        let mut escaped = false;
        while let Some(c) = self.peek_char() {
            if c == '\\' {
                let position = self.position();
                self.advance();
                match self.peek_char() {
                    Some(next) => {
                        name.push(next);
                        escaped = true;
                        self.advance();
                    }
                    None => {
                        return Err(FormulaError::Lex {
                            character: '\\',
                            position,
                        })
                    }
                }
            } else if is_name_char(c) {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }

        // Escaped spellings of the keywords stay names.
        if !escaped {
            match name.as_str() {
                "true" => return Ok(Token::Value(Literal::Boolean(true))),
                "false" => return Ok(Token::Value(Literal::Boolean(false))),
                _ => {}
            }
        }
        Ok(Token::Name(name))
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part (no exponent form)
        if self.peek_char() == Some('.')
            && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit())
        {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let num_str = &self.input[start..self.pos];
        // Digits with at most one interior point always parse.
        let num: f64 = num_str.parse().unwrap_or(0.0);
        Token::Value(Literal::Number(num))
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        let position = self.position();
        self.advance(); // Skip opening quote

        loop {
            match self.peek_char() {
                None => return Err(FormulaError::UnterminatedString { position }),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    self.advance();
                }
                Some(_) => self.advance(),
            }
        }

        // String literals use JSON escaping in both directions.
        let raw = &self.input[start..self.pos];
        let s: String = serde_json::from_str(raw).map_err(|e| FormulaError::BadString {
            position,
            message: e.to_string(),
        })?;
        Ok(Token::Value(Literal::String(s)))
    }
}
