//! Tokenizer for the configuration language subset used by the dependency
//! lock file and the console input accumulator.
//!
//! Quoted strings are lexed as a single token, including any `${ ... }` or
//! `%{ ... }` template sequences they contain, so brackets inside strings
//! never count towards nesting. Unterminated strings, heredocs and block
//! comments are still returned as tokens with `terminated = false`.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    OBrace,
    CBrace,
    OBrack,
    CBrack,
    OParen,
    CParen,
    Ident,
    Number,
    QuotedString,
    Heredoc,
    Comment,
    Equal,
    Comma,
    Colon,
    Dot,
    Operator,
    Newline,
    /// Characters that cannot start any token, including a bare `\`.
    Invalid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw source text of the token.
    pub text: String,
    /// Decoded literal value for quoted strings and heredocs; raw text otherwise.
    pub value: String,
    pub terminated: bool,
    pub line: usize,
    pub col: usize,
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    line: usize,
    col: usize,
}

/// Tokenize `src`. Never fails; malformed input shows up as `Invalid` tokens
/// or tokens with `terminated = false`.
#[must_use]
pub fn tokenize(src: &str) -> Vec<Token> {
    let mut lx = Lexer {
        src,
        chars: src.char_indices().collect(),
        pos: 0,
        line: 1,
        col: 1,
    };
    let mut out = Vec::new();
    while let Some(tok) = lx.next_token() {
        out.push(tok);
    }
    out
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_at(&self, off: usize) -> Option<char> {
        self.chars.get(self.pos + off).map(|&(_, c)| c)
    }

    fn offset(&self, idx: usize) -> usize {
        self.chars.get(idx).map_or(self.src.len(), |&(o, _)| o)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.offset(self.pos)..].starts_with(s)
    }

    fn token(&self, kind: TokenKind, start: usize, line: usize, col: usize) -> Token {
        let text = self.src[self.offset(start)..self.offset(self.pos)].to_string();
        Token {
            kind,
            value: text.clone(),
            text,
            terminated: true,
            line,
            col,
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        // Horizontal whitespace is insignificant.
        while matches!(self.peek(), Some(' ' | '\t' | '\r')) {
            self.bump();
        }
        let c = self.peek()?;
        let (start, line, col) = (self.pos, self.line, self.col);
        let simple = |lx: &mut Self, kind: TokenKind, n: usize| {
            for _ in 0..n {
                lx.bump();
            }
            lx.token(kind, start, line, col)
        };
        let tok = match c {
            '\n' => simple(self, TokenKind::Newline, 1),
            '{' => simple(self, TokenKind::OBrace, 1),
            '}' => simple(self, TokenKind::CBrace, 1),
            '[' => simple(self, TokenKind::OBrack, 1),
            ']' => simple(self, TokenKind::CBrack, 1),
            '(' => simple(self, TokenKind::OParen, 1),
            ')' => simple(self, TokenKind::CParen, 1),
            ',' => simple(self, TokenKind::Comma, 1),
            ':' => simple(self, TokenKind::Colon, 1),
            '#' => self.line_comment(start, line, col),
            '/' if self.peek_at(1) == Some('/') => self.line_comment(start, line, col),
            '/' if self.peek_at(1) == Some('*') => self.block_comment(start, line, col),
            '"' => self.quoted(start, line, col),
            '<' if self.starts_with("<<") && self.heredoc_ahead() => self.heredoc(start, line, col),
            '.' if self.starts_with("...") => simple(self, TokenKind::Operator, 3),
            '.' if !self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => simple(self, TokenKind::Dot, 1),
            '=' if self.peek_at(1) == Some('=') || self.peek_at(1) == Some('>') => {
                simple(self, TokenKind::Operator, 2)
            }
            '=' => simple(self, TokenKind::Equal, 1),
            '!' | '<' | '>' if self.peek_at(1) == Some('=') => simple(self, TokenKind::Operator, 2),
            '&' if self.peek_at(1) == Some('&') => simple(self, TokenKind::Operator, 2),
            '|' if self.peek_at(1) == Some('|') => simple(self, TokenKind::Operator, 2),
            '!' | '<' | '>' | '+' | '-' | '*' | '/' | '%' | '?' => simple(self, TokenKind::Operator, 1),
            d if d.is_ascii_digit() || d == '.' => self.number(start, line, col),
            a if a.is_alphabetic() || a == '_' => {
                while self
                    .peek()
                    .is_some_and(|x| x.is_alphanumeric() || x == '_' || x == '-')
                {
                    self.bump();
                }
                self.token(TokenKind::Ident, start, line, col)
            }
            _ => simple(self, TokenKind::Invalid, 1),
        };
        Some(tok)
    }

    fn line_comment(&mut self, start: usize, line: usize, col: usize) -> Token {
        while self.peek().is_some_and(|c| c != '\n') {
            self.bump();
        }
        self.token(TokenKind::Comment, start, line, col)
    }

    fn block_comment(&mut self, start: usize, line: usize, col: usize) -> Token {
        self.bump();
        self.bump();
        let mut terminated = false;
        while self.peek().is_some() {
            if self.starts_with("*/") {
                self.bump();
                self.bump();
                terminated = true;
                break;
            }
            self.bump();
        }
        let mut t = self.token(TokenKind::Comment, start, line, col);
        t.terminated = terminated;
        t
    }

    fn number(&mut self, start: usize, line: usize, col: usize) -> Token {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        self.token(TokenKind::Number, start, line, col)
    }

    /// Scan a quoted string starting at the opening quote. Template
    /// sequences are skipped with their own brace nesting, and may contain
    /// nested quoted strings.
    fn quoted(&mut self, start: usize, line: usize, col: usize) -> Token {
        self.bump();
        let mut value = String::new();
        let mut terminated = false;
        while let Some(c) = self.peek() {
            match c {
                '"' => {
                    self.bump();
                    terminated = true;
                    break;
                }
                '\n' => break,
                '\\' => {
                    self.bump();
                    match self.bump() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        Some('u') => {
                            let mut hex = String::new();
                            while hex.len() < 4 && self.peek().is_some_and(|h| h.is_ascii_hexdigit()) {
                                hex.extend(self.bump());
                            }
                            match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                                Some(ch) => value.push(ch),
                                None => {
                                    value.push_str("\\u");
                                    value.push_str(&hex);
                                }
                            }
                        }
                        Some(other) => {
                            value.push('\\');
                            value.push(other);
                        }
                        None => break,
                    }
                }
                '$' | '%' if self.starts_with("$${") || self.starts_with("%%{") => {
                    self.bump();
                    value.extend(self.bump());
                    value.extend(self.bump());
                }
                '$' | '%' if self.peek_at(1) == Some('{') => {
                    let from = self.offset(self.pos);
                    if !self.template_sequence() {
                        value.push_str(&self.src[from..self.offset(self.pos)]);
                        break;
                    }
                    value.push_str(&self.src[from..self.offset(self.pos)]);
                }
                _ => {
                    self.bump();
                    value.push(c);
                }
            }
        }
        let mut t = self.token(TokenKind::QuotedString, start, line, col);
        t.value = value;
        t.terminated = terminated;
        t
    }

    /// Consume `${ ... }`; returns false if input ends first.
    fn template_sequence(&mut self) -> bool {
        self.bump();
        self.bump();
        let mut depth = 1usize;
        while let Some(c) = self.peek() {
            match c {
                '{' => {
                    depth += 1;
                    self.bump();
                }
                '}' => {
                    depth -= 1;
                    self.bump();
                    if depth == 0 {
                        return true;
                    }
                }
                '"' => {
                    let (s, l, c) = (self.pos, self.line, self.col);
                    if !self.quoted(s, l, c).terminated {
                        return false;
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }
        false
    }

    fn heredoc_ahead(&self) -> bool {
        let mut i = 2;
        if self.peek_at(i) == Some('-') {
            i += 1;
        }
        self.peek_at(i).is_some_and(|c| c.is_alphabetic() || c == '_')
    }

    fn heredoc(&mut self, start: usize, line: usize, col: usize) -> Token {
        self.bump();
        self.bump();
        let flush = self.peek() == Some('-');
        if flush {
            self.bump();
        }
        let mut marker = String::new();
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-') {
            marker.extend(self.bump());
        }
        // Rest of the opening line is ignored.
        while self.peek().is_some_and(|c| c != '\n') {
            self.bump();
        }
        let mut lines: Vec<String> = Vec::new();
        let mut terminated = false;
        while self.peek().is_some() {
            self.bump();
            let from = self.offset(self.pos);
            while self.peek().is_some_and(|c| c != '\n') {
                self.bump();
            }
            let body_line = &self.src[from..self.offset(self.pos)];
            if body_line.trim() == marker {
                terminated = true;
                break;
            }
            lines.push(body_line.trim_end_matches('\r').to_string());
        }
        if flush {
            let indent = lines
                .iter()
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.len() - l.trim_start().len())
                .min()
                .unwrap_or(0);
            for l in &mut lines {
                *l = l.get(indent..).unwrap_or("").to_string();
            }
        }
        let mut t = self.token(TokenKind::Heredoc, start, line, col);
        t.value = lines.iter().map(|l| format!("{l}\n")).collect();
        t.terminated = terminated;
        t
    }
}
