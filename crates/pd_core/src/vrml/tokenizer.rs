//! Lexer for PROTO headers and bodies.
//!
//! The whole input is lexed once up front; the resulting stream can be
//! walked, peeked and rewound (`position`/`seek`) as often as needed.
//!
//! # Lexical rules
//!
//! - `#` starts a comment running to the end of the line
//! - commas count as whitespace
//! - `{ } [ ]` are single-character punctuation tokens
//! - `"..."` is a string literal, `\"` and `\\` are the only escapes
//! - any other run of characters is a word: keyword, number or identifier

use crate::error::{ProtoError, ProtoResult};
use crate::vrml::FieldType;

/// Lexical category of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Punctuation,
    String,
    Number,
    /// Terminal sentinel, always the last token of a stream.
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The lexeme; string literals are stored unquoted and unescaped.
    pub word: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn is_end(&self) -> bool {
        self.kind == TokenKind::End
    }

    pub fn is_punctuation(&self, symbol: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.word == symbol
    }

    /// True for a keyword, identifier or number with this exact text.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(
            self.kind,
            TokenKind::Keyword | TokenKind::Identifier | TokenKind::Number
        ) && self.word == word
    }

    /// Build a syntax error positioned at this token.
    pub fn error(&self, message: impl Into<String>) -> ProtoError {
        ProtoError::Syntax {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self.kind {
            TokenKind::End => "end of input".to_string(),
            TokenKind::String => format!("string \"{}\"", self.word),
            _ => format!("'{}'", self.word),
        }
    }
}

const FIELD_KINDS: [&str; 6] = [
    "field",
    "vrmlField",
    "hiddenField",
    "deprecatedField",
    "unconnectedField",
    "exposedField",
];

const RESERVED: [&str; 8] = ["PROTO", "EXTERNPROTO", "IS", "DEF", "USE", "TRUE", "FALSE", "NULL"];

/// True if `word` is a field-kind keyword (`field`, `vrmlField`, ...).
pub fn is_field_kind(word: &str) -> bool {
    FIELD_KINDS.contains(&word)
}

fn is_keyword(word: &str) -> bool {
    RESERVED.contains(&word) || is_field_kind(word) || FieldType::from_keyword(word).is_some()
}

fn is_number(word: &str) -> bool {
    let unsigned = word.trim_start_matches(['+', '-']);
    if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') && word.parse::<f64>().is_ok()
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '{' | '}' | '[' | ']' | '"' | '#' | ',')
}

/// A replayable token stream.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    tokens: Vec<Token>,
    index: usize,
}

impl Tokenizer {
    /// Lex `text` into a stream positioned at its first token.
    pub fn tokenize(text: &str) -> ProtoResult<Self> {
        let mut tokens = Vec::new();
        let mut chars = text.chars().peekable();
        let mut line = 1;
        let mut column = 1;

        while let Some(&c) = chars.peek() {
            if c == '\n' {
                chars.next();
                line += 1;
                column = 1;
                continue;
            }
            if c.is_whitespace() || c == ',' {
                chars.next();
                column += 1;
                continue;
            }
            if c == '#' {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
                continue;
            }

            let (start_line, start_column) = (line, column);
            if matches!(c, '{' | '}' | '[' | ']') {
                chars.next();
                column += 1;
                tokens.push(Token {
                    kind: TokenKind::Punctuation,
                    word: c.to_string(),
                    line: start_line,
                    column: start_column,
                });
            } else if c == '"' {
                chars.next();
                column += 1;
                let mut word = String::new();
                let mut terminated = false;
                while let Some(c) = chars.next() {
                    column += 1;
                    match c {
                        '"' => {
                            terminated = true;
                            break;
                        }
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                column += 1;
                                word.push(escaped);
                            }
                        }
                        '\n' => {
                            line += 1;
                            column = 1;
                            word.push(c);
                        }
                        _ => word.push(c),
                    }
                }
                if !terminated {
                    return Err(ProtoError::Syntax {
                        line: start_line,
                        column: start_column,
                        message: "Unterminated string literal".to_string(),
                    });
                }
                tokens.push(Token {
                    kind: TokenKind::String,
                    word,
                    line: start_line,
                    column: start_column,
                });
            } else {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if is_delimiter(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                    column += 1;
                }
                let kind = if is_keyword(&word) {
                    TokenKind::Keyword
                } else if is_number(&word) {
                    TokenKind::Number
                } else {
                    TokenKind::Identifier
                };
                tokens.push(Token {
                    kind,
                    word,
                    line: start_line,
                    column: start_column,
                });
            }
        }

        tokens.push(Token {
            kind: TokenKind::End,
            word: String::new(),
            line,
            column,
        });

        Ok(Self { tokens, index: 0 })
    }

    /// All tokens including the end sentinel.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn position(&self) -> usize {
        self.index
    }

    /// Rewind or fast-forward to a position returned by [`Tokenizer::position`].
    pub fn seek(&mut self, index: usize) {
        self.index = index.min(self.tokens.len() - 1);
    }

    pub fn has_more_tokens(&self) -> bool {
        !self.peek_token().is_end()
    }

    pub fn peek_token(&self) -> &Token {
        &self.tokens[self.index]
    }

    pub fn peek_word(&self) -> &str {
        &self.peek_token().word
    }

    /// Return the current token and advance. The end sentinel is never passed.
    pub fn next_token(&mut self) -> Token {
        let token = self.tokens[self.index].clone();
        if !token.is_end() {
            self.index += 1;
        }
        token
    }

    pub fn next_word(&mut self) -> String {
        self.next_token().word
    }

    /// Consume the next token, which must be the keyword, identifier or
    /// punctuation `expected`.
    pub fn skip_token(&mut self, expected: &str) -> ProtoResult<()> {
        let token = self.peek_token();
        let matches = match token.kind {
            TokenKind::Punctuation => token.word == expected,
            TokenKind::String | TokenKind::End => false,
            _ => token.is_word(expected),
        };
        if !matches {
            return Err(token.error(format!(
                "Expected '{}', found {}",
                expected,
                token.describe()
            )));
        }
        self.next_token();
        Ok(())
    }

    /// Skip one whole value of `field_type` without interpreting it.
    ///
    /// For node kinds a bare `{ ... }` group is skipped whole, which is how
    /// field restriction lists are passed over.
    pub fn consume_tokens_by_type(&mut self, field_type: FieldType) -> ProtoResult<()> {
        if field_type.is_multiple() && self.peek_token().is_punctuation("[") {
            return self.skip_group("[", "]");
        }

        if field_type.is_node() && self.peek_token().is_punctuation("{") {
            return self.skip_group("{", "}");
        }

        if field_type.is_node() {
            return self.consume_node();
        }

        for _ in 0..field_type.token_count() {
            let token = self.next_token();
            if token.is_end() {
                return Err(token.error(format!("Unexpected end of input in {} value", field_type)));
            }
        }
        Ok(())
    }

    /// Skip a balanced `open ... close` group starting at the current token.
    pub fn skip_group(&mut self, open: &str, close: &str) -> ProtoResult<()> {
        let first = self.peek_token().clone();
        self.skip_token(open)?;
        let mut depth = 1;
        while depth > 0 {
            let token = self.next_token();
            if token.is_end() {
                return Err(first.error(format!("Unbalanced '{}'", open)));
            }
            if token.is_punctuation(open) {
                depth += 1;
            } else if token.is_punctuation(close) {
                depth -= 1;
            }
        }
        Ok(())
    }

    fn consume_node(&mut self) -> ProtoResult<()> {
        match self.peek_word() {
            "NULL" => {
                self.next_token();
                Ok(())
            }
            "USE" => {
                self.next_token();
                self.next_token();
                Ok(())
            }
            _ => {
                if self.peek_token().is_word("DEF") {
                    self.next_token();
                    self.next_token();
                }
                let name = self.next_token();
                if name.kind != TokenKind::Identifier {
                    return Err(name.error(format!("Expected node type, found {}", name.describe())));
                }
                self.skip_group("{", "}")
            }
        }
    }
}
