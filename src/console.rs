//! Multi-line input accumulation for the interactive console.
//!
//! Lines are appended to a buffer until the buffered text forms a complete
//! expression. Completeness is judged from the token stream, so brackets
//! inside strings, heredocs and comments do not count:
//!
//! - any bracket kind with a negative running total is malformed; the buffer
//!   is discarded,
//! - an open bracket, heredoc or block comment keeps accumulating,
//! - a trailing unescaped `\` keeps accumulating and is removed from the text,
//! - otherwise the buffer is handed back for evaluation.
//!
//! While a bracket is open the continuation marker is redundant: it is
//! stripped, and the bracket state alone decides when to execute.
use crate::hcl::{tokenize, TokenKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// The accumulated input is complete.
    Execute(String),
    /// More lines are needed.
    Continue,
    /// A closing bracket had no opener. The buffer was reset.
    Malformed(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Nesting {
    braces: i64,
    brackets: i64,
    parens: i64,
}

impl Nesting {
    fn open(&self) -> bool {
        self.braces > 0 || self.brackets > 0 || self.parens > 0
    }
}

#[derive(Clone, Debug, Default)]
pub struct BracketState {
    buffer: String,
}

/// True when `line` ends with an odd number of backslashes.
fn has_continuation(line: &str) -> bool {
    let trailing = line.chars().rev().take_while(|&c| c == '\\').count();
    trailing % 2 == 1
}

impl BracketState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if previous lines are waiting for completion.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Feed one line of input (with or without its trailing newline).
    pub fn update(&mut self, line: &str) -> Readiness {
        let mut line = line.trim_end_matches(['\n', '\r']);
        let continued = has_continuation(line);
        if continued {
            line = &line[..line.len() - 1];
        }
        self.buffer.push_str(line);
        self.buffer.push('\n');

        let mut nest = Nesting::default();
        let mut open_block = false;
        for tok in tokenize(&self.buffer) {
            let slot = match tok.kind {
                TokenKind::OBrace => Some((&mut nest.braces, 1)),
                TokenKind::CBrace => Some((&mut nest.braces, -1)),
                TokenKind::OBrack => Some((&mut nest.brackets, 1)),
                TokenKind::CBrack => Some((&mut nest.brackets, -1)),
                TokenKind::OParen => Some((&mut nest.parens, 1)),
                TokenKind::CParen => Some((&mut nest.parens, -1)),
                TokenKind::Heredoc | TokenKind::Comment if !tok.terminated => {
                    open_block = true;
                    None
                }
                _ => None,
            };
            if let Some((counter, delta)) = slot {
                *counter += delta;
                if *counter < 0 {
                    self.reset();
                    return Readiness::Malformed(format!(
                        "unexpected closing {:?} on line {}, column {}",
                        tok.text, tok.line, tok.col
                    ));
                }
            }
        }

        if nest.open() || open_block || continued {
            return Readiness::Continue;
        }
        let out = self.buffer.trim_end().to_string();
        self.reset();
        Readiness::Execute(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(lines: &[&str]) -> Vec<Readiness> {
        let mut st = BracketState::new();
        lines.iter().map(|l| st.update(l)).collect()
    }

    fn last_exec(lines: &[&str]) -> String {
        match feed(lines).pop() {
            Some(Readiness::Execute(s)) => s,
            other => panic!("expected execute, got {other:?}"),
        }
    }

    #[test]
    fn single_line() {
        assert_eq!(last_exec(&["var.name"]), "var.name");
    }

    #[test]
    fn basic_multi_line() {
        let r = feed(&["{", "  a = 1", "}"]);
        assert_eq!(r[0], Readiness::Continue);
        assert_eq!(r[1], Readiness::Continue);
        assert_eq!(r[2], Readiness::Execute("{\n  a = 1\n}".into()));
    }

    #[test]
    fn brackets_multi_line() {
        let out = last_exec(&["split(", "\",\",", "\"a,b\"", ")"]);
        assert!(out.starts_with("split("));
        assert!(out.ends_with(')'));
    }

    #[test]
    fn braces_multi_line() {
        let r = feed(&["{", "  x = [", "    1,", "  ]", "}"]);
        assert!(r[..4].iter().all(|x| *x == Readiness::Continue));
        assert!(matches!(r[4], Readiness::Execute(_)));
    }

    #[test]
    fn escaped_new_line() {
        let r = feed(&["5 + 4 \\", ""]);
        assert_eq!(r[0], Readiness::Continue);
        assert_eq!(r[1], Readiness::Execute("5 + 4".into()));
    }

    #[test]
    fn escaped_backslash_is_not_continuation() {
        assert_eq!(feed(&["\"a\\\\\""])[0], Readiness::Execute("\"a\\\\\"".into()));
        assert!(!has_continuation("x \\\\"));
        assert!(has_continuation("x \\\\\\"));
    }

    #[test]
    fn heredoc_inside_braces() {
        let r = feed(&["{", "  a = <<-EOT", "  }", "  EOT", "}"]);
        assert!(r[..4].iter().all(|x| *x == Readiness::Continue));
        assert!(matches!(r[4], Readiness::Execute(_)));
    }

    #[test]
    fn quoted_braces_do_not_count() {
        assert!(matches!(feed(&["\"{\""])[0], Readiness::Execute(_)));
        assert!(matches!(feed(&["\"${ {} }\""])[0], Readiness::Execute(_)));
    }

    #[test]
    fn negative_nesting_is_malformed_and_resets() {
        let mut st = BracketState::new();
        assert!(matches!(st.update(")"), Readiness::Malformed(_)));
        assert!(!st.is_pending());
        assert_eq!(st.update("1"), Readiness::Execute("1".into()));
    }

    #[test]
    fn open_bracket_wins_over_continuation() {
        let r = feed(&["[ \\", "1,", "2", "]"]);
        assert_eq!(&r[..3], &[Readiness::Continue, Readiness::Continue, Readiness::Continue]);
        assert_eq!(r[3], Readiness::Execute("[ \n1,\n2\n]".into()));
    }

    #[test]
    fn unterminated_string_is_handed_to_evaluator() {
        assert!(matches!(feed(&["\"abc"])[0], Readiness::Execute(_)));
    }

    #[test]
    fn open_block_comment_continues() {
        let r = feed(&["/* note", "*/ 1"]);
        assert_eq!(r[0], Readiness::Continue);
        assert!(matches!(r[1], Readiness::Execute(_)));
    }
}
