//! Character cursor with push-back, and the tokenizer built on it.
//!
//! The tokenizer never backtracks by index: multi-character markers are
//! recognised by consuming characters speculatively and pushing them all
//! back.  [`Cursor`] keeps the line counter in step with both directions.

use std::rc::Rc;

use unicode_general_category::{get_general_category, GeneralCategory as Gc};

use crate::error::{Error, Location, Result};
use crate::token::{Token, TokenKind, TokenStream};

/// Opens an embedded script block.
pub const BLOCK_START: &str = "<?lua";
/// Closes an embedded script block.
pub const BLOCK_END: &str = "lua?>";

/// Characters that always form a one-character [`TokenKind::Special`] token.
const SPECIAL_CHARS: &[char] = &[
    '(', ')', '*', '+', '|', '-', ',', '.', '^', '\'', '"', '\\', '/', ':', ';', '#', '&', '=',
    '<', '>', '?', '!', '%', '$',
];

// ── Cursor ────────────────────────────────────────────────────────────────────

/// Character cursor over one file's text with an unbounded push-back stack.
#[derive(Debug)]
pub struct Cursor {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    pushed: Vec<char>,
}

impl Cursor {
    pub fn new(text: &str) -> Self {
        Self { chars: text.chars().collect(), pos: 0, line: 0, pushed: Vec::new() }
    }

    /// Current 0-based line.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn at_end(&self) -> bool {
        self.pushed.is_empty() && self.pos >= self.chars.len()
    }

    /// The next character, without consuming it.
    pub fn peek(&self) -> Option<char> {
        match self.pushed.last() {
            Some(&c) => Some(c),
            None => self.chars.get(self.pos).copied(),
        }
    }

    /// Consume the next character.
    pub fn advance(&mut self) -> Option<char> {
        let c = match self.pushed.pop() {
            Some(c) => c,
            None => {
                let c = *self.chars.get(self.pos)?;
                self.pos += 1;
                c
            }
        };
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    /// Return `c` to the input.
    pub fn push_back(&mut self, c: char) {
        if c == '\n' {
            self.line -= 1;
        }
        self.pushed.push(c);
    }

    /// `true` if the upcoming input starts with `marker`.  Never consumes.
    pub fn matches_ahead(&mut self, marker: &str) -> bool {
        let mut taken = Vec::with_capacity(marker.len());
        let mut matched = true;
        for expected in marker.chars() {
            match self.advance() {
                Some(c) => {
                    taken.push(c);
                    if c != expected {
                        matched = false;
                        break;
                    }
                }
                None => {
                    matched = false;
                    break;
                }
            }
        }
        while let Some(c) = taken.pop() {
            self.push_back(c);
        }
        matched
    }

    fn skip(&mut self, count: usize) {
        for _ in 0..count {
            self.advance();
        }
    }
}

// ── Character classes ─────────────────────────────────────────────────────────

/// Unicode general category L*.
fn is_letter(c: char) -> bool {
    matches!(
        get_general_category(c),
        Gc::UppercaseLetter
            | Gc::LowercaseLetter
            | Gc::TitlecaseLetter
            | Gc::ModifierLetter
            | Gc::OtherLetter
    )
}

/// Unicode general category P*.
fn is_punctuation(c: char) -> bool {
    matches!(
        get_general_category(c),
        Gc::ConnectorPunctuation
            | Gc::DashPunctuation
            | Gc::OpenPunctuation
            | Gc::ClosePunctuation
            | Gc::InitialPunctuation
            | Gc::FinalPunctuation
            | Gc::OtherPunctuation
    )
}

fn is_symbol_char(c: char) -> bool {
    is_letter(c) || c.is_numeric() || c == '_'
}

// ── Tokenizer ─────────────────────────────────────────────────────────────────

/// Splits one file's text into tokens.
pub struct Tokenizer {
    cursor: Cursor,
    file: Rc<str>,
}

impl Tokenizer {
    pub fn new(text: &str, file: Rc<str>) -> Self {
        Self { cursor: Cursor::new(text), file }
    }

    pub fn at_end(&self) -> bool {
        self.cursor.at_end()
    }

    fn token(&self, kind: TokenKind, text: impl Into<String>, line: usize) -> Token {
        Token::new(kind, text, line, Rc::clone(&self.file))
    }

    /// Read the next group of tokens.  Usually one token; a script block
    /// yields four.  At end of input a single [`TokenKind::Eof`] is returned.
    pub fn next_token_group(&mut self) -> Result<Vec<Token>> {
        let line = self.cursor.line();
        let Some(c) = self.cursor.peek() else {
            return Ok(vec![self.token(TokenKind::Eof, "", line)]);
        };

        if c.is_whitespace() {
            return Ok(vec![self.read_while(TokenKind::Whitespace, char::is_whitespace)]);
        }
        if c.is_numeric() {
            return Ok(vec![self.read_while(TokenKind::Number, |c| c.is_numeric() || c == '.')]);
        }
        if c == '<' && self.cursor.matches_ahead(BLOCK_START) {
            return self.read_script_block();
        }
        if SPECIAL_CHARS.contains(&c) {
            self.cursor.advance();
            return Ok(vec![self.token(TokenKind::Special, c, self.cursor.line())]);
        }
        if is_punctuation(c) {
            return Ok(vec![self.read_while(TokenKind::Special, is_punctuation)]);
        }
        if is_letter(c) {
            return Ok(vec![self.read_while(TokenKind::Symbol, is_symbol_char)]);
        }

        self.cursor.advance();
        Ok(vec![self.token(TokenKind::Unknown, c, line)])
    }

    fn read_while(&mut self, kind: TokenKind, pred: impl Fn(char) -> bool) -> Token {
        let line = self.cursor.line();
        let mut text = String::new();
        while let Some(c) = self.cursor.advance() {
            if pred(c) {
                text.push(c);
            } else {
                self.cursor.push_back(c);
                break;
            }
        }
        self.token(kind, text, line)
    }

    /// Read text up to `marker`, leaving the marker unconsumed.  The flag is
    /// `false` if input ended before the marker was seen.
    fn read_until(&mut self, marker: &str) -> (String, bool) {
        let first = marker.chars().next();
        let mut text = String::new();
        while let Some(c) = self.cursor.peek() {
            if Some(c) == first && self.cursor.matches_ahead(marker) {
                return (text, true);
            }
            self.cursor.advance();
            text.push(c);
        }
        (text, false)
    }

    fn read_script_block(&mut self) -> Result<Vec<Token>> {
        let start = self.token(TokenKind::ScriptBlockStart, BLOCK_START, self.cursor.line());
        self.cursor.skip(BLOCK_START.chars().count());

        let body_line = self.cursor.line();
        let (body, found) = self.read_until(BLOCK_END);
        if !found {
            return Err(Error::UnterminatedBlock {
                location: Location::new(&*self.file, self.cursor.line()),
                marker: BLOCK_END,
                found: body,
            });
        }

        let end_line = self.cursor.line();
        let block = self.token(TokenKind::ScriptBlock, body, body_line);
        // Output slot for whatever the block prints.
        let slot = self.token(TokenKind::Symbol, "", end_line);
        self.cursor.skip(BLOCK_END.chars().count());
        let end = self.token(TokenKind::ScriptBlockEnd, BLOCK_END, end_line);
        Ok(vec![start, block, slot, end])
    }
}

/// Tokenize a whole file into a [`TokenStream`].
pub fn tokenize(text: &str, file: Rc<str>) -> Result<TokenStream> {
    let mut tokenizer = Tokenizer::new(text, file);
    let mut stream = TokenStream::new();
    while !tokenizer.at_end() {
        let group = tokenizer.next_token_group()?;
        if group.first().map_or(true, |t| t.kind == TokenKind::Eof) {
            break;
        }
        for tok in group {
            stream.push_back(tok);
        }
    }
    Ok(stream)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
