//! Configuration-language lexing shared by the lock file parser and the console.
pub mod lexer;

pub use lexer::{tokenize, Token, TokenKind};

/// Quote `s` as a configuration-language string literal.
#[must_use]
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    // Literal template introducers must be doubled.
    let out = out.replace("${", "$${").replace("%{", "%%{");
    out + "\""
}
