//! The hand-written tokenizer.
//!
//! Source text is scanned character by character and translated into
//! [`Token`]s. Layout tokens (`Newline`, `Indent`, `Dedent`, `EndMarker`)
//! are synthesized from significant whitespace: indentation must be a
//! multiple of four spaces, and newlines inside parentheses are implicit
//! line continuations.

use smallvec::{SmallVec, smallvec};
use unicode_ident::{is_xid_continue, is_xid_start};

use crate::{
    errors::{Error, ErrorKind, EvalResult},
    token::{CodeLoc, CodeRange, Token, TokenKind, is_forbidden_keyword, keyword_kind},
};

/// Tokenizes a complete source string.
///
/// All tokenizer faults are fatal: the first error aborts the scan.
pub fn tokenize(source: &str) -> EvalResult<Vec<Token>> {
    Tokenizer::new(source).run()
}

struct Tokenizer<'src> {
    source: &'src str,
    /// Byte offset of the next unread character.
    pos: usize,
    line: u32,
    column: u32,
    /// Location where the current token started.
    start: CodeLoc,
    tokens: Vec<Token>,
    /// Indentation levels in spaces; the root level 0 is never popped.
    indents: SmallVec<[u32; 8]>,
    /// Depth of unclosed `(`; newlines are insignificant when positive.
    nesting: u32,
    /// True when the scanner sits at the start of a logical line.
    at_line_start: bool,
    /// True once the current line has produced a non-layout token.
    line_has_content: bool,
}

impl<'src> Tokenizer<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 0,
            start: CodeLoc::new(1, 0, 0),
            tokens: Vec::new(),
            indents: smallvec![0],
            nesting: 0,
            at_line_start: true,
            line_has_content: false,
        }
    }

    fn run(mut self) -> EvalResult<Vec<Token>> {
        loop {
            if self.nesting == 0 && self.at_line_start {
                self.handle_line_start()?;
            }
            self.skip_spaces();

            self.begin_token();
            let Some(c) = self.peek() else { break };
            match c {
                '\n' => {
                    self.bump();
                    if self.nesting == 0 {
                        if self.line_has_content {
                            self.push_layout(TokenKind::Newline);
                            self.line_has_content = false;
                        }
                        self.at_line_start = true;
                    }
                }
                '\r' => {
                    self.bump();
                }
                '#' => self.skip_comment(),
                '\\' if self.peek_at(1) == Some('\n') || self.peek_at(1) == Some('\r') => {
                    // Explicit line join: swallow the backslash and newline.
                    self.bump();
                    if self.peek() == Some('\r') {
                        self.bump();
                    }
                    if self.peek() == Some('\n') {
                        self.bump();
                    }
                }
                '0'..='9' => self.lex_number()?,
                '\'' | '"' => self.lex_string()?,
                c if is_identifier_start(c) => self.lex_identifier()?,
                _ => self.lex_operator()?,
            }
        }

        // A last line without a trailing newline still terminates a
        // logical line.
        self.begin_token();
        if self.line_has_content {
            self.push_layout(TokenKind::Newline);
        }
        // Close every open block.
        while self.indents.len() > 1 {
            let old = self.indents.pop().unwrap_or(0);
            let lower = self.indents.last().copied().unwrap_or(0);
            for _ in 0..(old - lower) / 4 {
                self.push_layout(TokenKind::Dedent);
            }
        }
        self.push_layout(TokenKind::EndMarker);
        Ok(self.tokens)
    }

    /// Consumes blank lines and comment-only lines, then compares the
    /// indentation of the first content line against the indent stack.
    fn handle_line_start(&mut self) -> EvalResult<()> {
        loop {
            self.begin_token();
            let mut count: u32 = 0;
            loop {
                match self.peek() {
                    Some(' ') => {
                        self.bump();
                        count += 1;
                    }
                    Some('\t') => {
                        return Err(self.error_here(
                            ErrorKind::IndentationError,
                            "tabs are not allowed in indentation",
                        ));
                    }
                    _ => break,
                }
            }
            match self.peek() {
                // Blank line: no layout significance.
                Some('\n' | '\r') => {
                    self.bump();
                }
                Some('#') => self.skip_comment(),
                None => return Ok(()),
                Some(_) => {
                    self.at_line_start = false;
                    return self.apply_indentation(count);
                }
            }
        }
    }

    fn apply_indentation(&mut self, count: u32) -> EvalResult<()> {
        if count % 4 != 0 {
            return Err(self.error_here(
                ErrorKind::IndentationError,
                "indentation must be a multiple of 4 spaces",
            ));
        }
        let top = self.indents.last().copied().unwrap_or(0);
        if count > top {
            self.begin_token();
            for _ in 0..(count - top) / 4 {
                self.push_layout(TokenKind::Indent);
            }
            self.indents.push(count);
        } else if count < top {
            self.begin_token();
            while self.indents.last().copied().unwrap_or(0) > count {
                let old = self.indents.pop().unwrap_or(0);
                let lower = self.indents.last().copied().unwrap_or(0).max(count);
                for _ in 0..(old - lower) / 4 {
                    self.push_layout(TokenKind::Dedent);
                }
            }
            if self.indents.last().copied().unwrap_or(0) != count {
                return Err(self.error_here(
                    ErrorKind::IndentationError,
                    "unindent does not match any outer indentation level",
                ));
            }
        }
        Ok(())
    }

    // === numbers ===

    /// Lexes a numeric literal starting at an ASCII digit.
    ///
    /// `0x`/`0o`/`0b` prefixes always produce `BigInt`. A decimal literal
    /// stays `BigInt` unless it contains `.` or an exponent (`Number`) or
    /// ends with `j`/`J` (`Complex`).
    fn lex_number(&mut self) -> EvalResult<()> {
        let first = self.bump().unwrap_or('0');
        if first == '0'
            && let Some(radix) = match self.peek() {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            }
        {
            self.bump();
            if !self.eat_digit_run(radix)? {
                return Err(self.error_token(
                    ErrorKind::InvalidNumberError,
                    "at least one digit is required after the number prefix",
                ));
            }
            self.push_token(TokenKind::BigInt);
            return Ok(());
        }

        let mut is_float = false;
        self.eat_digit_run(10)?;
        if self.peek() == Some('.') {
            self.bump();
            if self.peek() == Some('_') {
                return Err(self.error_token(
                    ErrorKind::InvalidNumberError,
                    "underscores in numbers must sit between digits",
                ));
            }
            self.eat_digit_run(10)?;
            is_float = true;
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign_offset = usize::from(matches!(self.peek_at(1), Some('+' | '-')));
            if matches!(self.peek_at(1 + sign_offset), Some('0'..='9')) {
                self.bump();
                for _ in 0..sign_offset {
                    self.bump();
                }
                self.eat_digit_run(10)?;
                is_float = true;
            } else {
                return Err(self.error_token(ErrorKind::InvalidNumberError, "invalid decimal literal"));
            }
        }
        if matches!(self.peek(), Some('j' | 'J')) {
            self.bump();
            self.push_token(TokenKind::Complex);
        } else if is_float {
            self.push_token(TokenKind::Number);
        } else {
            self.push_token(TokenKind::BigInt);
        }
        Ok(())
    }

    /// Consumes a run of digits in `radix`, allowing single underscores
    /// between digits. Returns whether any digit was consumed.
    fn eat_digit_run(&mut self, radix: u32) -> EvalResult<bool> {
        let mut any = false;
        loop {
            match self.peek() {
                Some(c) if c.is_digit(radix) => {
                    self.bump();
                    any = true;
                }
                Some('_') => {
                    if !any || !self.peek_at(1).is_some_and(|c| c.is_digit(radix)) {
                        return Err(self.error_token(
                            ErrorKind::InvalidNumberError,
                            "underscores in numbers must sit between digits",
                        ));
                    }
                    self.bump();
                }
                _ => return Ok(any),
            }
        }
    }

    // === strings ===

    /// Lexes a string literal, single-line or triple-quoted.
    ///
    /// The token keeps the raw source slice; escape sequences are checked
    /// here and decoded later by [`string_value`].
    fn lex_string(&mut self) -> EvalResult<()> {
        let quote = self.bump().unwrap_or('"');
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error_token(
                    ErrorKind::UnterminatedStringError,
                    "string literal is not terminated",
                ));
            };
            match c {
                c if c == quote => {
                    if !triple {
                        break;
                    }
                    if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                        self.bump();
                        self.bump();
                        break;
                    }
                }
                '\n' if !triple => {
                    return Err(self.error_token(
                        ErrorKind::UnterminatedStringError,
                        "string literal is not terminated before the end of the line",
                    ));
                }
                '\\' => {
                    let Some(escape) = self.bump() else {
                        return Err(self.error_token(
                            ErrorKind::UnterminatedStringError,
                            "string literal is not terminated",
                        ));
                    };
                    match escape {
                        '\\' | '\'' | '"' | 'a' | 'b' | 'f' | 'n' | 'r' | 't' | 'v' | '\n' => {}
                        '\r' => {
                            // Treat `\<CR><LF>` like `\<LF>`.
                            if self.peek() == Some('\n') {
                                self.bump();
                            }
                        }
                        _ => {
                            return Err(self.error_token(
                                ErrorKind::UnsupportedEscapeError,
                                format!("unsupported escape sequence '\\{escape}'"),
                            ));
                        }
                    }
                }
                _ => {}
            }
        }
        self.push_token(TokenKind::String);
        Ok(())
    }

    // === identifiers and keywords ===

    fn lex_identifier(&mut self) -> EvalResult<()> {
        self.bump();
        while self.peek().is_some_and(is_identifier_continue) {
            self.bump();
        }
        let lexeme = self.token_lexeme();
        if is_forbidden_keyword(lexeme) {
            return Err(self.error_token(
                ErrorKind::ForbiddenIdentifierError,
                format!("keyword '{lexeme}' is not part of the language"),
            ));
        }
        match keyword_kind(lexeme) {
            Some(TokenKind::Not) if self.last_kind() == Some(TokenKind::Is) => self.fuse(TokenKind::IsNot),
            Some(TokenKind::In) if self.last_kind() == Some(TokenKind::Not) => self.fuse(TokenKind::NotIn),
            Some(kind) => self.push_token(kind),
            None => self.push_token(TokenKind::Name),
        }
        Ok(())
    }

    /// Rewrites the previous token into a fused two-word keyword
    /// (`is not`, `not in`) covering both source words.
    fn fuse(&mut self, kind: TokenKind) {
        let end = self.here();
        if let Some(prev) = self.tokens.last_mut() {
            prev.kind = kind;
            prev.range = prev.range.with_end(end);
            let start = prev.range.start().index as usize;
            prev.lexeme = self.source[start..end.index as usize].to_owned();
        }
    }

    // === operators ===

    fn lex_operator(&mut self) -> EvalResult<()> {
        let c = self.bump().unwrap_or('\0');
        let kind = match c {
            '(' => {
                self.nesting += 1;
                TokenKind::LeftParen
            }
            ')' => {
                if self.nesting == 0 {
                    return Err(self.error_token(ErrorKind::MatchingBracketError, "unmatched ')'"));
                }
                self.nesting -= 1;
                TokenKind::RightParen
            }
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '=' => {
                if self.eat('=') {
                    TokenKind::EqEqual
                } else {
                    TokenKind::Equal
                }
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::NotEqual
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.eat('<') {
                    self.eat('=');
                    return Err(self.forbidden_operator());
                }
                if self.eat('=') { TokenKind::LessEqual } else { TokenKind::Less }
            }
            '>' => {
                if self.eat('>') {
                    self.eat('=');
                    return Err(self.forbidden_operator());
                }
                if self.eat('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            '+' => {
                if self.eat('=') {
                    return Err(self.forbidden_operator());
                }
                TokenKind::Plus
            }
            '-' => {
                if self.eat('=') {
                    return Err(self.forbidden_operator());
                }
                TokenKind::Minus
            }
            '*' => {
                if self.eat('*') {
                    if self.eat('=') {
                        return Err(self.forbidden_operator());
                    }
                    TokenKind::DoubleStar
                } else if self.eat('=') {
                    return Err(self.forbidden_operator());
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.eat('/') {
                    if self.eat('=') {
                        return Err(self.forbidden_operator());
                    }
                    TokenKind::DoubleSlash
                } else if self.eat('=') {
                    return Err(self.forbidden_operator());
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    return Err(self.forbidden_operator());
                }
                TokenKind::Percent
            }
            '@' | '|' | '&' | '~' | '^' => {
                self.eat('=');
                return Err(self.forbidden_operator());
            }
            _ => {
                return Err(self.error_token(
                    ErrorKind::UnknownTokenError,
                    format!("unrecognized token '{c}'"),
                ));
            }
        };
        self.push_token(kind);
        Ok(())
    }

    fn forbidden_operator(&self) -> Error {
        let lexeme = self.token_lexeme();
        self.error_token(
            ErrorKind::ForbiddenOperatorError,
            format!("operator '{lexeme}' is not part of the language"),
        )
    }

    // === cursor primitives ===

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }
    }

    fn skip_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.bump();
        }
    }

    fn here(&self) -> CodeLoc {
        let index = u32::try_from(self.pos).unwrap_or(u32::MAX);
        CodeLoc::new(self.line, self.column, index)
    }

    fn begin_token(&mut self) {
        self.start = self.here();
    }

    fn token_lexeme(&self) -> &'src str {
        &self.source[self.start.index as usize..self.pos]
    }

    fn token_range(&self) -> CodeRange {
        CodeRange::new(self.start, self.here())
    }

    fn last_kind(&self) -> Option<TokenKind> {
        self.tokens.last().map(|t| t.kind)
    }

    fn push_token(&mut self, kind: TokenKind) {
        let token = Token::new(kind, self.token_lexeme(), self.token_range());
        self.tokens.push(token);
        self.line_has_content = true;
    }

    /// Pushes a zero-lexeme layout token at the current position.
    fn push_layout(&mut self, kind: TokenKind) {
        let loc = self.here();
        self.tokens.push(Token::new(kind, "", CodeRange::new(self.start, loc)));
    }

    fn error_here(&self, kind: ErrorKind, message: impl Into<String>) -> Error {
        Error::new(kind, message, CodeRange::new(self.start, self.here()))
    }

    fn error_token(&self, kind: ErrorKind, message: impl Into<String>) -> Error {
        Error::new(kind, message, self.token_range())
    }
}

fn is_identifier_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic() || (!c.is_ascii() && is_xid_start(c))
}

fn is_identifier_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric() || (!c.is_ascii() && is_xid_continue(c))
}

/// Decodes a string token's lexeme into its value.
///
/// The tokenizer has already validated every escape, so decoding cannot
/// fail. Handles both single and triple quoting.
#[must_use]
pub(crate) fn string_value(lexeme: &str) -> String {
    let bytes = lexeme.as_bytes();
    let triple = bytes.len() >= 6 && bytes[0] == bytes[1] && bytes[1] == bytes[2];
    let quote_len = if triple { 3 } else { 1 };
    let body = &lexeme[quote_len..lexeme.len() - quote_len];

    let mut value = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => value.push('\\'),
            Some('\'') => value.push('\''),
            Some('"') => value.push('"'),
            Some('a') => value.push('\x07'),
            Some('b') => value.push('\x08'),
            Some('f') => value.push('\x0c'),
            Some('n') => value.push('\n'),
            Some('r') => value.push('\r'),
            Some('t') => value.push('\t'),
            Some('v') => value.push('\x0b'),
            // Line continuation inside the literal: drop the newline.
            Some('\n') | None => {}
            Some('\r') => {
                let mut rest = chars.clone();
                if rest.next() == Some('\n') {
                    chars = rest;
                }
            }
            Some(other) => {
                value.push('\\');
                value.push(other);
            }
        }
    }
    value
}
