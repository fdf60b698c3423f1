//! Lexer for the `null` language.
//!
//! Produces a finite sequence of [`Token`]s from source text, tracking
//! 1-indexed line/column as it goes and building a [`LineIndex`] the parser
//! later uses to render diagnostics.
//!
//! # Two Bounded Lookahead
//!
//! The lexer needs only a single current character plus one character of
//! peek-ahead to disambiguate every multi-character token (`==`, `<=`, `|>`,
//! `::`, `..`, `--`, `---`). Every multi-character match bounds-checks before
//! indexing — the three-dash block comment delimiter in particular, since a
//! naive `bytes[i+1] == b'-' && bytes[i+2] == b'-'` without first checking
//! `i + 2 < bytes.len()` is a buffer over-read on a two-character tail.
//!
//! # Comments
//!
//! `-- to end of line` and `--- spanning lines ---` are both skipped outside
//! string literals; neither produces a token.
//!
//! # Strings
//!
//! A backslash escapes the next byte during scanning (so `\"` does not
//! terminate the string). Escape translation (`\n`, `\t`, `\r`, `\\`, `\"`,
//! `\0`) happens once, when the token's lexeme is extracted, not while
//! scanning for the closing quote.

use nullc_base::{Interner, Position, Span};

use crate::token::{Directive, Keyword, Token, TokenKind};

/// Maps a 1-indexed line number to the byte span of that line's text
/// (excluding the terminating `\n`).
///
/// Built incrementally as the lexer scans, so it costs nothing beyond what
/// lexing already pays for. Used by the parser's diagnostic renderer to pull
/// up the offending source line for a caret-underline.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    lines: Vec<Span>,
}

impl LineIndex {
    fn push_line(&mut self, span: Span) {
        self.lines.push(span);
    }

    /// Returns the byte span of 1-indexed line `line`, or `None` if out of
    /// range.
    pub fn line_span(&self, line: u32) -> Option<Span> {
        if line == 0 {
            return None;
        }
        self.lines.get(line as usize - 1).copied()
    }

    /// Returns the source text of 1-indexed line `line`.
    pub fn line_text<'s>(&self, source: &'s str, line: u32) -> Option<&'s str> {
        self.line_span(line).map(|span| &source[span.start..span.end])
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// Scans `source` into a token stream and a [`LineIndex`].
///
/// Identifiers are interned into `interner` as they are scanned, so the
/// caller's interner ends up owning every identifier/keyword-adjacent name
/// seen across the whole translation unit.
pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    position: Position,
    line_start: usize,
    interner: &'a mut Interner,
    line_index: LineIndex,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, interner: &'a mut Interner) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            position: Position::new(1, 1),
            line_start: 0,
            interner,
            line_index: LineIndex::default(),
        }
    }

    /// Tokenizes the entire source, returning the token stream (always
    /// terminated by `Eof`, per the lexer-totality invariant) and the line
    /// index built along the way.
    pub fn tokenize(mut self) -> (Vec<Token>, LineIndex) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.is_eof();
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.line_index)
    }

    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn current(&self) -> Option<u8> {
        self.byte_at(0)
    }

    fn peek(&self) -> Option<u8> {
        self.byte_at(1)
    }

    /// Advances one byte, updating line/column and closing out the current
    /// line in the line index on a newline.
    fn bump(&mut self) -> Option<u8> {
        let b = self.current()?;
        self.pos += 1;
        if b == b'\n' {
            self.line_index
                .push_line(Span::new(self.line_start, self.pos - 1));
            self.line_start = self.pos;
            self.position = self.position.advance_line();
        } else {
            self.position = self.position.advance_column();
        }
        Some(b)
    }

    /// Pushes the final (possibly empty) line into the index once scanning
    /// reaches EOF, since a line only otherwise gets closed out by the
    /// newline that ends it.
    fn close_final_line(&mut self) {
        if self.line_index.line_count() < self.position.line as usize {
            self.line_index
                .push_line(Span::new(self.line_start, self.source.len()));
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current() {
                Some(b' ') | Some(b'\t') | Some(b'\r') => {
                    self.bump();
                }
                Some(b'-') if self.peek() == Some(b'-') => {
                    // `---` block comment, else `--` line comment.
                    if self.byte_at(2) == Some(b'-') {
                        self.bump();
                        self.bump();
                        self.bump();
                        self.skip_block_comment();
                    } else {
                        self.bump();
                        self.bump();
                        while let Some(b) = self.current() {
                            if b == b'\n' {
                                break;
                            }
                            self.bump();
                        }
                    }
                }
                _ => break,
            }
        }
    }

    /// Consumes up to and including the closing `---`, or to EOF if
    /// unterminated (an unterminated block comment is not itself a lex
    /// error — only unterminated strings are).
    fn skip_block_comment(&mut self) {
        loop {
            match self.current() {
                None => return,
                Some(b'-') if self.peek() == Some(b'-') && self.byte_at(2) == Some(b'-') => {
                    self.bump();
                    self.bump();
                    self.bump();
                    return;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn make(&self, kind: TokenKind, start: usize, start_pos: Position) -> Token {
        Token::new(kind, Span::new(start, self.pos), start_pos)
    }

    fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start = self.pos;
        let start_pos = self.position;

        let Some(b) = self.current() else {
            self.close_final_line();
            return self.make(TokenKind::Eof, start, start_pos);
        };

        match b {
            b'\n' => {
                self.bump();
                self.make(TokenKind::Newline, start, start_pos)
            }
            b'0'..=b'9' => self.scan_number(start, start_pos),
            b'"' => self.scan_string(start, start_pos),
            b'@' => self.scan_directive(start, start_pos),
            b'_' | b'a'..=b'z' | b'A'..=b'Z' => self.scan_identifier(start, start_pos),
            _ => self.scan_operator(start, start_pos),
        }
    }

    fn scan_number(&mut self, start: usize, start_pos: Position) -> Token {
        while matches!(self.current(), Some(b'0'..=b'9')) {
            self.bump();
        }
        let mut is_float = false;
        if self.current() == Some(b'.') && matches!(self.peek(), Some(b'0'..=b'9')) {
            is_float = true;
            self.bump(); // '.'
            while matches!(self.current(), Some(b'0'..=b'9')) {
                self.bump();
            }
        }
        let text = &self.source[start..self.pos];
        if is_float {
            match text.parse::<f64>() {
                Ok(v) => self.make(TokenKind::Float(v), start, start_pos),
                Err(_) => self.make(
                    TokenKind::Error(format!("invalid float literal '{}'", text)),
                    start,
                    start_pos,
                ),
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => self.make(TokenKind::Int(v), start, start_pos),
                // `9223372036854775808` (2^63) is i64::MIN's magnitude and
                // doesn't fit a positive i64; only a preceding unary `-`
                // makes it representable. Its bit pattern is exactly
                // i64::MIN, so emitting that value here lets `-9223372036854775808`
                // round-trip via wrapping negation in the back ends instead
                // of bottoming out as a lex error on the one literal whose
                // magnitude legitimately needs the full signed range.
                Err(_) if text.parse::<u64>() == Ok(9223372036854775808u64) => {
                    self.make(TokenKind::Int(i64::MIN), start, start_pos)
                }
                Err(_) => self.make(
                    TokenKind::Error(format!("integer literal '{}' out of range", text)),
                    start,
                    start_pos,
                ),
            }
        }
    }

    fn scan_string(&mut self, start: usize, start_pos: Position) -> Token {
        self.bump(); // opening quote
        let mut terminated = false;
        loop {
            match self.current() {
                None => break,
                Some(b'"') => {
                    self.bump();
                    terminated = true;
                    break;
                }
                Some(b'\\') => {
                    self.bump();
                    if self.current().is_some() {
                        self.bump();
                    }
                }
                Some(b'\n') => break,
                _ => {
                    self.bump();
                }
            }
        }
        if !terminated {
            return self.make(
                TokenKind::Error("unterminated string literal".to_string()),
                start,
                start_pos,
            );
        }
        let raw = &self.source[start + 1..self.pos - 1];
        self.make(TokenKind::Str(translate_escapes(raw)), start, start_pos)
    }

    fn scan_directive(&mut self, start: usize, start_pos: Position) -> Token {
        self.bump(); // '@'
        let word_start = self.pos;
        while matches!(self.current(), Some(b'_') | Some(b'a'..=b'z') | Some(b'A'..=b'Z') | Some(b'0'..=b'9'))
        {
            self.bump();
        }
        let word = &self.source[word_start..self.pos];
        match Directive::lookup(word) {
            Some(d) => self.make(TokenKind::Directive(d), start, start_pos),
            None => self.make(
                TokenKind::Error(format!("unknown directive '@{}'", word)),
                start,
                start_pos,
            ),
        }
    }

    fn scan_identifier(&mut self, start: usize, start_pos: Position) -> Token {
        while matches!(self.current(), Some(b'_') | Some(b'a'..=b'z') | Some(b'A'..=b'Z') | Some(b'0'..=b'9'))
        {
            self.bump();
        }
        let word = &self.source[start..self.pos];
        if let Some(kw) = Keyword::lookup(word) {
            return self.make(TokenKind::Keyword(kw), start, start_pos);
        }
        match word {
            "true" => self.make(TokenKind::Bool(true), start, start_pos),
            "false" => self.make(TokenKind::Bool(false), start, start_pos),
            _ => {
                let sym = self.interner.intern(word);
                self.make(TokenKind::Ident(sym), start, start_pos)
            }
        }
    }

    fn scan_operator(&mut self, start: usize, start_pos: Position) -> Token {
        let b = self.bump().expect("checked by caller");
        let kind = match b {
            b'=' => {
                if self.current() == Some(b'=') {
                    self.bump();
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }
            b'!' => {
                if self.current() == Some(b'=') {
                    self.bump();
                    TokenKind::NotEq
                } else {
                    return self.make(
                        TokenKind::Error("'!' not followed by '='".to_string()),
                        start,
                        start_pos,
                    );
                }
            }
            b'<' => {
                if self.current() == Some(b'=') {
                    self.bump();
                    TokenKind::Le
                } else if self.current() == Some(b'<') {
                    self.bump();
                    TokenKind::Shl
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => {
                if self.current() == Some(b'=') {
                    self.bump();
                    TokenKind::Ge
                } else if self.current() == Some(b'>') {
                    self.bump();
                    TokenKind::Shr
                } else {
                    TokenKind::Gt
                }
            }
            b'|' => {
                if self.current() == Some(b'>') {
                    self.bump();
                    TokenKind::PipeGt
                } else {
                    TokenKind::Pipe
                }
            }
            b'^' => TokenKind::Caret,
            b'&' => TokenKind::Amp,
            b'+' => TokenKind::Plus,
            b'-' => {
                if self.current() == Some(b'>') {
                    self.bump();
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'~' => TokenKind::Tilde,
            b':' => {
                if self.current() == Some(b':') {
                    self.bump();
                    TokenKind::ColonColon
                } else {
                    TokenKind::Colon
                }
            }
            b',' => TokenKind::Comma,
            b'.' => {
                if self.current() == Some(b'.') {
                    self.bump();
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            other => TokenKind::Error(format!(
                "unexpected character '{}'",
                other as char
            )),
        };
        self.make(kind, start, start_pos)
    }
}

/// Translates the recognized escape sequences (`\n \t \r \\ \" \0`); any
/// other escape passes through literally (the backslash and the following
/// character are both kept).
fn translate_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('0') => out.push('\0'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> (Vec<TokenKind>, LineIndex) {
        let mut interner = Interner::new();
        let (tokens, idx) = Lexer::new(src, &mut interner).tokenize();
        (tokens.into_iter().map(|t| t.kind).collect(), idx)
    }

    #[test]
    fn empty_source_is_just_eof() {
        let (kinds, _) = lex("");
        assert_eq!(kinds, vec![TokenKind::Eof]);
    }

    #[test]
    fn totality_on_arbitrary_bytes() {
        // Lexer totality: any input yields a finite stream ending in EOF.
        for src in ["\u{0}", "@@@", "\"", "!!!!", "---", "\\"] {
            let (kinds, _) = lex(src);
            assert_eq!(kinds.last(), Some(&TokenKind::Eof));
        }
    }

    #[test]
    fn integers_and_floats() {
        let (kinds, _) = lex("42 3.5");
        assert_eq!(
            kinds,
            vec![TokenKind::Int(42), TokenKind::Float(3.5), TokenKind::Eof]
        );
    }

    #[test]
    fn int64_min_and_max_round_trip() {
        let src = format!("{} {}", i64::MIN, i64::MAX);
        // i64::MIN's '-' is lexed as a separate Minus token (unary minus);
        // the digit run "9223372036854775808" overflows a positive i64 but
        // is still lexed as a single Int token via the i64::MIN special case.
        let (kinds, _) = lex(&src);
        assert!(kinds.contains(&TokenKind::Int(i64::MAX)));
        assert!(kinds.contains(&TokenKind::Int(i64::MIN)));
    }

    #[test]
    fn int_literal_out_of_range_is_an_error_token() {
        let (kinds, _) = lex("99999999999999999999999");
        assert!(matches!(kinds[0], TokenKind::Error(_)));
    }

    #[test]
    fn keywords_vs_identifiers() {
        let (kinds, _) = lex("fn foo");
        assert_eq!(kinds[0], TokenKind::Keyword(Keyword::Fn));
        assert!(matches!(kinds[1], TokenKind::Ident(_)));
    }

    #[test]
    fn true_false_are_bool_literals() {
        let (kinds, _) = lex("true false");
        assert_eq!(
            kinds,
            vec![TokenKind::Bool(true), TokenKind::Bool(false), TokenKind::Eof]
        );
    }

    #[test]
    fn directives() {
        let (kinds, _) = lex("@use @extern @alloc @free @bogus");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Directive(Directive::Use),
                TokenKind::Directive(Directive::Extern),
                TokenKind::Directive(Directive::Alloc),
                TokenKind::Directive(Directive::Free),
                TokenKind::Error("unknown directive '@bogus'".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn line_comment_produces_no_tokens() {
        let (kinds, _) = lex("-- comment\n42");
        assert_eq!(kinds, vec![TokenKind::Newline, TokenKind::Int(42), TokenKind::Eof]);
    }

    #[test]
    fn block_comment_spans_lines() {
        let (kinds, _) = lex("--- a\nb\nc ---\n42");
        assert_eq!(kinds, vec![TokenKind::Newline, TokenKind::Int(42), TokenKind::Eof]);
    }

    #[test]
    fn unterminated_block_comment_does_not_hang() {
        let (kinds, _) = lex("--- never closes");
        assert_eq!(kinds, vec![TokenKind::Eof]);
    }

    #[test]
    fn comment_closure_no_tokens_escape_single_line_comment() {
        let (kinds, _) = lex("-- fn struct 42 \"x\"\n1");
        assert_eq!(kinds, vec![TokenKind::Newline, TokenKind::Int(1), TokenKind::Eof]);
    }

    #[test]
    fn string_escapes_translate() {
        let (kinds, _) = lex(r#""a\nb\tc\\d\"e""#);
        assert_eq!(
            kinds,
            vec![TokenKind::Str("a\nb\tc\\d\"e".to_string()), TokenKind::Eof]
        );
        assert_eq!("a\nb\tc\\d\"e".chars().count(), 7);
    }

    #[test]
    fn unterminated_string_is_error_token() {
        let (kinds, _) = lex("\"abc");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Error("unterminated string literal".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn backslash_escapes_quote_inside_string() {
        let (kinds, _) = lex(r#""a\"b""#);
        assert_eq!(kinds, vec![TokenKind::Str("a\"b".to_string()), TokenKind::Eof]);
    }

    #[test]
    fn bang_without_eq_is_error() {
        let (kinds, _) = lex("!");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Error("'!' not followed by '='".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn multi_char_operators() {
        let (kinds, _) = lex("== != <= >= << >> |> -> ::");
        assert_eq!(
            kinds,
            vec![
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Shl,
                TokenKind::Shr,
                TokenKind::PipeGt,
                TokenKind::Arrow,
                TokenKind::ColonColon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn newline_advances_line_and_resets_column() {
        let mut interner = Interner::new();
        let (tokens, _) = Lexer::new("a\nb", &mut interner).tokenize();
        assert_eq!(tokens[0].pos.line, 1);
        // tokens[1] is the Newline token; tokens[2] is `b` on line 2.
        let b_tok = tokens.iter().find(|t| matches!(t.kind, TokenKind::Ident(_)) && t.pos.line == 2);
        assert!(b_tok.is_some());
        assert_eq!(b_tok.unwrap().pos.column, 1);
    }

    #[test]
    fn line_index_consistency() {
        let mut interner = Interner::new();
        let src = "let x = 1\nlet y = 2\n";
        let (tokens, index) = Lexer::new(src, &mut interner).tokenize();
        for tok in &tokens {
            if tok.is_eof() {
                continue;
            }
            if let Some(span) = index.line_span(tok.pos.line) {
                assert!(
                    tok.span.start >= span.start && tok.span.start <= span.end,
                    "token {:?} at line {} not contained in line span {:?}",
                    tok.kind,
                    tok.pos.line,
                    span
                );
            }
        }
    }

    #[test]
    fn deeply_nested_parens_do_not_overflow_the_lexer() {
        let src = "(".repeat(2000) + &")".repeat(2000);
        let (kinds, _) = lex(&src);
        assert_eq!(kinds.len(), 4001);
    }
}
