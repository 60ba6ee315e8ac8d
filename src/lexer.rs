//! Lexical analysis of shell source text.
//!
//! The lexer is a single-pass byte state machine. Besides splitting the
//! input into identifiers and operators it performs variable expansion
//! (`$NAME`), command substitution (`$(...)`, which re-enters the executor
//! against a subshell provider), quoting, escapes, and here-documents.

use std::env;
use std::fmt;
use std::sync::Arc;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::executor;
use crate::provider::IoProvider;

/// The kind of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Program name, argument, or any other word.
    Identifier,
    /// `;` or newline.
    Stop,
    /// `&`
    Background,
    /// `|`
    Pipe,
    /// `>`
    RedirOut,
    /// `>>`
    RedirAppendOut,
    /// `2>`
    RedirErr,
    /// `2>>`
    RedirAppendErr,
    /// `&>`
    RedirBoth,
    /// `&>>`
    RedirAppendBoth,
    /// `2>&1`
    ErrToOut,
    /// `1>&2`
    OutToErr,
    /// `<`
    RedirIn,
    /// `<<`
    HereDoc,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Stop => ";",
            TokenKind::Background => "&",
            TokenKind::Pipe => "|",
            TokenKind::RedirOut => ">",
            TokenKind::RedirAppendOut => ">>",
            TokenKind::RedirErr => "2>",
            TokenKind::RedirAppendErr => "2>>",
            TokenKind::RedirBoth => "&>",
            TokenKind::RedirAppendBoth => "&>>",
            TokenKind::ErrToOut => "2>&1",
            TokenKind::OutToErr => "1>&2",
            TokenKind::RedirIn => "<",
            TokenKind::HereDoc => "<<",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
        };
        f.write_str(s)
    }
}

/// A lexed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token kind.
    pub kind: TokenKind,
    /// Identifier or here-document content; empty for operators.
    pub content: String,
    /// Byte offset of the token's first character in the source. Quotation
    /// and expansion make this approximate; it is only used for error
    /// messages.
    pub index: usize,
}

impl Token {
    fn operator(kind: TokenKind, index: usize) -> Token {
        Token {
            kind,
            content: String::new(),
            index,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token {{ content: {:?}, index: {}, kind: {} }}",
            self.content, self.index, self.kind
        )
    }
}

// The token under construction. Present as soon as any byte or synthetic
// content has been appended, even if the content is still empty (quoted
// empty strings produce empty identifier tokens).
struct TokenBuilder {
    content: Vec<u8>,
    index: Option<usize>,
    kind: TokenKind,
}

impl TokenBuilder {
    fn new() -> TokenBuilder {
        TokenBuilder {
            content: Vec::new(),
            index: None,
            kind: TokenKind::Identifier,
        }
    }

    fn is_present(&self) -> bool {
        self.index.is_some()
    }

    fn set_index_if_empty(&mut self, index: usize) {
        self.index.get_or_insert(index);
    }

    fn set_kind(&mut self, kind: TokenKind) {
        self.kind = kind;
    }

    fn push_byte(&mut self, c: u8, index: usize) {
        self.content.push(c);
        self.index.get_or_insert(index);
    }

    fn push_str(&mut self, s: &str, index: usize) {
        self.content.extend_from_slice(s.as_bytes());
        self.index.get_or_insert(index);
    }

    fn build(&mut self) -> Token {
        let token = Token {
            kind: self.kind,
            content: String::from_utf8_lossy(&self.content).into_owned(),
            index: self.index.unwrap_or(0),
        };
        self.content.clear();
        self.index = None;
        self.kind = TokenKind::Identifier;
        token
    }
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum Quote {
    None,
    Single,
    Double,
}

// Characters ending a $NAME reference; the terminator itself is pushed
// back and re-processed.
fn is_var_terminator(c: u8) -> bool {
    matches!(
        c,
        b' ' | b';'
            | b'\t'
            | 0x0b
            | 0x0c
            | b'\n'
            | b'\r'
            | b'.'
            | b','
            | b'/'
            | b'>'
            | b'<'
            | b'&'
            | b'|'
    )
}

/// Tokenize `text`, expanding variables and command substitutions against
/// `iop`. Returns the token sequence with trailing stops trimmed.
pub fn lex(text: &str, iop: &Arc<IoProvider>) -> Result<Vec<Token>> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut tokens: Vec<Token> = Vec::new();
    let mut quote = Quote::None;
    let mut tb = TokenBuilder::new();

    let mut i = 0;
    while i < len {
        let c = bytes[i];
        match c {
            b'\n' => {
                if quote != Quote::None {
                    return Err(Error::lexical(
                        i,
                        text,
                        "quotation not closed at the end of the line",
                    ));
                }
                if tb.is_present() {
                    tokens.push(tb.build());
                }
                tokens.push(Token::operator(TokenKind::Stop, i));
            }

            b'\r' => {
                if quote != Quote::None {
                    tb.push_byte(c, i);
                }
            }

            b' ' | b'\t' | 0x0b | 0x0c | 0x14 => {
                if quote == Quote::None {
                    if tb.is_present() {
                        tokens.push(tb.build());
                    }
                } else {
                    tb.push_byte(c, i);
                }
            }

            b'$' => {
                if i + 1 < len && bytes[i + 1] == b'(' {
                    // command substitution
                    tb.set_index_if_empty(i);
                    let start = i + 2;
                    let mut j = start;
                    let mut depth = 1usize;
                    while j < len {
                        match bytes[j] {
                            b'(' => depth += 1,
                            b')' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                        j += 1;
                    }
                    let script = &text[start..j.min(len)];
                    let (sub_iop, captured) = IoProvider::subshell(iop);
                    let run = executor::execute_with(script, &sub_iop).map(|handle| handle.wait());
                    sub_iop.close();
                    if let Err(err) = run {
                        return Err(Error::lexical(
                            j.min(len.saturating_sub(1)),
                            text,
                            format!("failed to execute subshell: {err}"),
                        ));
                    }
                    tb.push_str(captured.string().trim(), j);
                    i = j;
                } else {
                    // variable reference
                    tb.set_index_if_empty(i);
                    let start = i + 1;
                    let mut j = start;
                    while j < len && !is_var_terminator(bytes[j]) {
                        j += 1;
                    }
                    let name = String::from_utf8_lossy(&bytes[start..j]);
                    let value = env::var(name.as_ref()).unwrap_or_default();
                    tb.push_str(&value, j);
                    i = j;
                    // the terminator is re-processed by the main loop
                    continue;
                }
            }

            b'"' => {
                tb.set_index_if_empty(i);
                match quote {
                    Quote::None => quote = Quote::Double,
                    Quote::Double => quote = Quote::None,
                    Quote::Single => tb.push_byte(c, i),
                }
            }

            b'\'' => {
                tb.set_index_if_empty(i);
                match quote {
                    Quote::None => quote = Quote::Single,
                    Quote::Single => quote = Quote::None,
                    Quote::Double => tb.push_byte(c, i),
                }
            }

            b'\\' => {
                if quote == Quote::None {
                    if i == len - 1 {
                        return Err(Error::lexical(
                            i,
                            text,
                            "escape character at the end of the text",
                        ));
                    }
                    // the backslash is dropped; the next byte is handled by
                    // the main loop
                } else if i + 1 < len {
                    match bytes[i + 1] {
                        b'a' => tb.push_str("\x07", i),
                        b'b' => tb.push_str("\x08", i),
                        b'$' => tb.push_str("$", i),
                        b'n' | b'\n' => tb.push_str("\n", i),
                        b'r' | b'\r' => tb.push_str("\r", i),
                        b't' => tb.push_str("\t", i),
                        b'v' => tb.push_str("\x0b", i),
                        b'f' => tb.push_str("\x0c", i),
                        b'\\' => tb.push_str("\\", i),
                        b'"' => tb.push_str("\"", i),
                        b'\'' => tb.push_str("'", i),
                        b'0' => tb.push_str("\0", i),
                        b';' => tb.push_str(";", i),
                        b'&' => tb.push_str("&", i),
                        b'|' => tb.push_str("|", i),
                        b'>' => tb.push_str(">", i),
                        b'<' => tb.push_str("<", i),
                        other => {
                            tb.push_byte(b'\\', i);
                            tb.push_byte(other, i);
                        }
                    }
                    i += 1;
                } else {
                    return Err(Error::lexical(
                        i,
                        text,
                        "escape character at the end of the text",
                    ));
                }
            }

            b';' => {
                if quote == Quote::None {
                    if tb.is_present() {
                        tokens.push(tb.build());
                    }
                    tokens.push(Token::operator(TokenKind::Stop, i));
                } else {
                    tb.push_byte(c, i);
                }
            }

            b'&' => {
                if quote == Quote::None {
                    if tb.is_present() {
                        tokens.push(tb.build());
                    }
                    if i + 1 < len && bytes[i + 1] == b'&' {
                        tokens.push(Token::operator(TokenKind::And, i));
                        i += 1;
                    } else if i + 1 < len && bytes[i + 1] == b'>' {
                        if i + 2 < len && bytes[i + 2] == b'>' {
                            tokens.push(Token::operator(TokenKind::RedirAppendBoth, i));
                            i += 2;
                        } else {
                            tokens.push(Token::operator(TokenKind::RedirBoth, i));
                            i += 1;
                        }
                    } else {
                        tokens.push(Token::operator(TokenKind::Background, i));
                    }
                } else {
                    tb.push_byte(c, i);
                }
            }

            b'|' => {
                if quote == Quote::None {
                    if tb.is_present() {
                        tokens.push(tb.build());
                    }
                    if i + 1 < len && bytes[i + 1] == b'|' {
                        tokens.push(Token::operator(TokenKind::Or, i));
                        i += 1;
                    } else {
                        tokens.push(Token::operator(TokenKind::Pipe, i));
                    }
                } else {
                    tb.push_byte(c, i);
                }
            }

            b'>' => {
                if quote == Quote::None {
                    if tb.is_present() {
                        tokens.push(tb.build());
                    }
                    if i + 1 < len && bytes[i + 1] == b'>' {
                        tokens.push(Token::operator(TokenKind::RedirAppendOut, i));
                        i += 1;
                    } else {
                        tokens.push(Token::operator(TokenKind::RedirOut, i));
                    }
                } else {
                    tb.push_byte(c, i);
                }
            }

            b'<' => {
                if quote == Quote::None {
                    if tb.is_present() {
                        tokens.push(tb.build());
                    }
                    if i + 1 < len && bytes[i + 1] == b'<' {
                        i = lex_here_document(text, bytes, i, &mut tb, &mut tokens)?;
                    } else {
                        tokens.push(Token::operator(TokenKind::RedirIn, i));
                    }
                } else {
                    tb.push_byte(c, i);
                }
            }

            b'1' => {
                if !tb.is_present()
                    && i + 3 < len
                    && bytes[i + 1] == b'>'
                    && bytes[i + 2] == b'&'
                    && bytes[i + 3] == b'2'
                {
                    tokens.push(Token::operator(TokenKind::OutToErr, i));
                    i += 3;
                } else {
                    tb.push_byte(c, i);
                }
            }

            b'2' => {
                if tb.is_present() {
                    tb.push_byte(c, i);
                } else if i + 1 < len && bytes[i + 1] == b'>' {
                    if i + 2 < len && bytes[i + 2] == b'&' {
                        if i + 3 < len && bytes[i + 3] == b'1' {
                            tokens.push(Token::operator(TokenKind::ErrToOut, i));
                            i += 3;
                        } else {
                            tb.push_byte(c, i);
                        }
                    } else if i + 2 < len && bytes[i + 2] == b'>' {
                        tokens.push(Token::operator(TokenKind::RedirAppendErr, i));
                        i += 2;
                    } else {
                        tokens.push(Token::operator(TokenKind::RedirErr, i));
                        i += 1;
                    }
                } else {
                    tb.push_byte(c, i);
                }
            }

            _ => tb.push_byte(c, i),
        }
        i += 1;
    }

    if quote != Quote::None {
        return Err(Error::lexical(
            len.saturating_sub(1),
            text,
            "quotation not closed",
        ));
    }
    if tb.is_present() {
        tokens.push(tb.build());
    }
    while tokens.last().is_some_and(|t| t.kind == TokenKind::Stop) {
        tokens.pop();
    }
    for token in &tokens {
        trace!("lexed {token}");
    }
    debug!("lexical analysis produced {} tokens", tokens.len());
    Ok(tokens)
}

// Lex a here-document starting at the `<<` operator at byte `i`. Returns
// the index of the last consumed byte; the sentinel line's newline is
// pushed back so the main loop emits a stop for it.
fn lex_here_document(
    text: &str,
    bytes: &[u8],
    i: usize,
    tb: &mut TokenBuilder,
    tokens: &mut Vec<Token>,
) -> Result<usize> {
    let len = bytes.len();
    tb.set_index_if_empty(i);
    tb.set_kind(TokenKind::HereDoc);

    // sentinel runs to the end of the line
    let mut j = i + 2;
    let mut sentinel_raw: Vec<u8> = Vec::new();
    while j < len && bytes[j] != b'\n' {
        sentinel_raw.push(bytes[j]);
        j += 1;
    }
    let sentinel = String::from_utf8_lossy(&sentinel_raw).trim().to_string();

    let mut line: Vec<u8> = Vec::new();
    let mut closed = false;
    while j + 1 < len {
        j += 1;
        match bytes[j] {
            b'\n' => {
                let content = String::from_utf8_lossy(&line).into_owned();
                if content.trim() == sentinel {
                    // push the newline back so it produces a stop
                    j -= 1;
                    closed = true;
                    break;
                }
                tb.content.extend_from_slice(&line);
                tb.content.push(b'\n');
                line.clear();
            }
            b'\r' => {}
            other => line.push(other),
        }
    }
    if !closed {
        j = len;
        let content = String::from_utf8_lossy(&line).into_owned();
        if content.trim() != sentinel {
            return Err(Error::lexical(
                tb.index.unwrap_or(i),
                text,
                "here document not closed",
            ));
        }
    }

    let mut token = tb.build();
    token.content = format!("{}\n", token.content.trim_matches('\n'));
    tokens.push(token);
    Ok(j)
}
