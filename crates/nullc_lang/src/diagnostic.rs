//! Shared diagnostic rendering.
//!
//! Every stage — lexer (via the parser), parser, analyzer, IR builder,
//! evaluator — ends up needing to print the same shape of message:
//!
//! ```text
//! Error at line L, column C near 'lexeme'
//!   NNNN | <source line>
//!        |      ^~~~~
//! <message>
//! Hint: <hint, when applicable>
//! ```
//!
//! Factoring it once here means the line-number gutter width, the tab
//! expansion, and the caret placement can't drift between stages the way
//! four independently hand-rolled printers would.

use nullc_base::Position;

use crate::lexer::LineIndex;

/// Everything needed to render one diagnostic line.
pub struct Diagnostic<'a> {
    pub pos: Position,
    /// The offending token's source text, shown after "near".
    pub lexeme: &'a str,
    pub message: &'a str,
    pub hint: Option<&'a str>,
    /// Length of the token in characters, for the caret underline width.
    pub underline_len: usize,
}

/// Expands tabs to four spaces, tracking how the caret column shifts as a
/// result.
fn expand_tabs(line: &str, column: u32) -> (String, usize) {
    const TAB_WIDTH: usize = 4;
    let mut out = String::with_capacity(line.len());
    let mut caret_col = 0usize;
    for (i, ch) in line.chars().enumerate() {
        if i + 1 == column as usize {
            caret_col = out.chars().count();
        }
        if ch == '\t' {
            out.push_str(&" ".repeat(TAB_WIDTH));
        } else {
            out.push(ch);
        }
    }
    if column as usize > line.chars().count() {
        caret_col = out.chars().count();
    }
    (out, caret_col)
}

/// Renders a full diagnostic block: the error line, a source-line gutter
/// with a caret underline, the message, and an optional hint.
///
/// `source` and `line_index` are used to pull up the offending source line;
/// if the line is out of range (can happen for a span past EOF) the gutter
/// line is simply omitted.
pub fn render(source: &str, line_index: &LineIndex, diag: &Diagnostic) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Error at line {}, column {} near '{}'\n",
        diag.pos.line, diag.pos.column, diag.lexeme
    ));

    if let Some(text) = line_index.line_text(source, diag.pos.line) {
        let (expanded, caret_col) = expand_tabs(text, diag.pos.column);
        let gutter = format!("{:>4} | ", diag.pos.line);
        out.push_str(&gutter);
        out.push_str(&expanded);
        out.push('\n');
        out.push_str(&" ".repeat(gutter.len() - 2));
        out.push_str("| ");
        out.push_str(&" ".repeat(caret_col));
        out.push('^');
        out.push_str(&"~".repeat(diag.underline_len.saturating_sub(1)));
        out.push('\n');
    }

    out.push_str(diag.message);
    out.push('\n');
    if let Some(hint) = diag.hint {
        out.push_str("Hint: ");
        out.push_str(hint);
        out.push('\n');
    }
    out
}

/// Picks a hint string by pattern-matching the message text: missing `end`,
/// missing closing bracket, missing type, missing `do`.
pub fn infer_hint(message: &str) -> Option<&'static str> {
    if message.contains("'end'") {
        Some("every 'do' must be closed with a matching 'end'")
    } else if message.contains("closing") || message.contains("']'") || message.contains("')'") {
        Some("check for a missing closing bracket or parenthesis")
    } else if message.contains("type") {
        Some("expected a type here, e.g. 'i64', 'bool', or a struct/enum name")
    } else if message.contains("'do'") {
        Some("blocks open with 'do'")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullc_base::Interner;

    fn index_for(src: &str) -> LineIndex {
        let mut interner = Interner::new();
        crate::lexer::Lexer::new(src, &mut interner).tokenize().1
    }

    #[test]
    fn renders_caret_under_offending_token() {
        let src = "let x = 1\nx = 2\n";
        let idx = index_for(src);
        let diag = Diagnostic {
            pos: Position::new(2, 1),
            lexeme: "x",
            message: "cannot assign to immutable variable 'x'",
            hint: None,
            underline_len: 1,
        };
        let rendered = render(src, &idx, &diag);
        assert!(rendered.contains("Error at line 2, column 1 near 'x'"));
        assert!(rendered.contains("x = 2"));
        assert!(rendered.contains("^"));
        assert!(rendered.contains("immutable"));
    }

    #[test]
    fn includes_hint_when_present() {
        let src = "fn main() do\n";
        let idx = index_for(src);
        let diag = Diagnostic {
            pos: Position::new(2, 1),
            lexeme: "EOF",
            message: "expected 'end' to close block",
            hint: infer_hint("expected 'end' to close block"),
            underline_len: 3,
        };
        let rendered = render(src, &idx, &diag);
        assert!(rendered.contains("Hint: every 'do' must be closed"));
    }

    #[test]
    fn tabs_expand_to_four_spaces() {
        let src = "\tlet x = 1\n";
        let idx = index_for(src);
        let diag = Diagnostic {
            pos: Position::new(1, 2),
            lexeme: "let",
            message: "test",
            hint: None,
            underline_len: 3,
        };
        let rendered = render(src, &idx, &diag);
        assert!(rendered.contains("    let x = 1"));
    }

    #[test]
    fn missing_type_hint() {
        assert_eq!(
            infer_hint("expected a type after ':'"),
            Some("expected a type here, e.g. 'i64', 'bool', or a struct/enum name")
        );
    }
}
