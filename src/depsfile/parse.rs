//! Parser for the dependency lock file.
//!
//! Only `provider "<addr>" { ... }` blocks are interpreted. Unknown top-level
//! blocks, unknown attributes and nested blocks are skipped so files written
//! by newer versions still load.
use std::collections::BTreeMap;

use crate::hcl::{tokenize, Token, TokenKind};
use crate::types::addrs::Provider;
use crate::types::errors::{Error, ErrorKind, Result};

use super::locks::{Hash, Locks, Version};

struct Parser<'a> {
    toks: Vec<Token>,
    pos: usize,
    filename: &'a str,
}

#[derive(Default)]
struct ProviderBody {
    version: Option<(Version, usize)>,
    constraints: Option<String>,
    hashes: Option<Vec<Hash>>,
}

/// Parse lock file source. `filename` is used in error messages only.
///
/// # Errors
/// Returns `ErrorKind::Parse` naming the file and position of the first problem.
pub fn parse_locks(src: &str, filename: &str) -> Result<Locks> {
    let toks = tokenize(src)
        .into_iter()
        .filter(|t| t.kind != TokenKind::Comment)
        .collect();
    let mut p = Parser { toks, pos: 0, filename };
    p.file()
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn err_at(&self, tok: Option<&Token>, msg: impl AsRef<str>) -> Error {
        let (line, col) = tok
            .or_else(|| self.toks.last())
            .map_or((1, 1), |t| (t.line, t.col));
        Error::new(
            ErrorKind::Parse,
            format!("{}:{line},{col}: {}", self.filename, msg.as_ref()),
        )
    }

    fn skip_newlines(&mut self) {
        while self.peek().is_some_and(|t| t.kind == TokenKind::Newline) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        match self.next() {
            Some(t) if t.kind == kind => Ok(t),
            other => Err(self.err_at(other.as_ref(), format!("expected {what}"))),
        }
    }

    fn string(&mut self, what: &str) -> Result<String> {
        let t = self.expect(TokenKind::QuotedString, what)?;
        if !t.terminated {
            return Err(self.err_at(Some(&t), "unterminated string"));
        }
        if t.value.contains("${") || t.value.contains("%{") {
            return Err(self.err_at(Some(&t), format!("{what} must be a literal string, not a template")));
        }
        Ok(t.value)
    }

    fn duplicate(&self, tok: &Token) -> Error {
        self.err_at(Some(tok), format!("duplicate argument {:?}", tok.value))
    }

    fn end_of_attribute(&mut self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(t) if t.kind == TokenKind::Newline => {
                self.pos += 1;
                Ok(())
            }
            Some(t) if t.kind == TokenKind::CBrace => Ok(()),
            Some(t) => Err(self.err_at(Some(t), "expected a newline after the argument value")),
        }
    }

    fn file(&mut self) -> Result<Locks> {
        let mut locks = Locks::new();
        let mut seen: BTreeMap<Provider, usize> = BTreeMap::new();
        loop {
            self.skip_newlines();
            let Some(name) = self.next() else { break };
            if name.kind != TokenKind::Ident {
                return Err(self.err_at(Some(&name), "expected a block or argument name"));
            }
            if self.peek().is_some_and(|t| t.kind == TokenKind::Equal) {
                self.pos += 1;
                self.skip_expression()?;
                self.end_of_attribute()?;
                continue;
            }
            if name.value != "provider" {
                self.skip_block_header()?;
                self.skip_block_body()?;
                continue;
            }
            let label = self.expect(TokenKind::QuotedString, "a provider source address label")?;
            let addr = Provider::parse(&label.value)
                .map_err(|e| self.err_at(Some(&label), format!("invalid provider block label: {}", e.msg)))?;
            if addr.to_string() != label.value {
                return Err(self.err_at(
                    Some(&label),
                    format!("provider source address must be fully qualified, such as {:?}", addr.to_string()),
                ));
            }
            if let Some(first) = seen.get(&addr) {
                return Err(self.err_at(
                    Some(&label),
                    format!("duplicate provider lock for {addr}; the first was declared at line {first}"),
                ));
            }
            seen.insert(addr.clone(), name.line);
            self.expect(TokenKind::OBrace, "an opening brace")?;
            let body = self.provider_body()?;
            let Some((version, _)) = body.version else {
                return Err(self.err_at(Some(&name), format!("provider {addr}: missing required argument \"version\"")));
            };
            locks.set_provider(addr, version, body.constraints, body.hashes.unwrap_or_default());
        }
        Ok(locks)
    }

    fn provider_body(&mut self) -> Result<ProviderBody> {
        let mut body = ProviderBody::default();
        loop {
            self.skip_newlines();
            let Some(tok) = self.next() else {
                return Err(self.err_at(None, "unclosed provider block"));
            };
            match tok.kind {
                TokenKind::CBrace => return Ok(body),
                TokenKind::Ident => {}
                _ => return Err(self.err_at(Some(&tok), "expected an argument name")),
            }
            if !self.peek().is_some_and(|t| t.kind == TokenKind::Equal) {
                self.skip_block_header()?;
                self.skip_block_body()?;
                continue;
            }
            self.pos += 1;
            match tok.value.as_str() {
                "version" => {
                    if body.version.is_some() {
                        return Err(self.duplicate(&tok));
                    }
                    let s = self.string("version")?;
                    let v: Version = s.parse().map_err(|e: Error| self.err_at(Some(&tok), e.msg))?;
                    body.version = Some((v, tok.line));
                }
                "constraints" => {
                    if body.constraints.is_some() {
                        return Err(self.duplicate(&tok));
                    }
                    body.constraints = Some(self.string("constraints")?);
                }
                "hashes" => {
                    if body.hashes.is_some() {
                        return Err(self.duplicate(&tok));
                    }
                    body.hashes = Some(self.hash_list()?);
                }
                _ => self.skip_expression()?,
            }
            self.end_of_attribute()?;
        }
    }

    fn hash_list(&mut self) -> Result<Vec<Hash>> {
        self.expect(TokenKind::OBrack, "a list of hashes")?;
        let mut out = Vec::new();
        loop {
            self.skip_newlines();
            match self.peek() {
                Some(t) if t.kind == TokenKind::CBrack => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(t) if t.kind == TokenKind::QuotedString => {
                    let tok = t.clone();
                    let s = self.string("hash")?;
                    out.push(Hash::parse(&s).map_err(|e| self.err_at(Some(&tok), e.msg))?);
                }
                other => {
                    let other = other.cloned();
                    return Err(self.err_at(other.as_ref(), "expected a hash string or closing bracket"));
                }
            }
            self.skip_newlines();
            match self.peek() {
                Some(t) if t.kind == TokenKind::Comma => self.pos += 1,
                Some(t) if t.kind == TokenKind::CBrack => {}
                other => {
                    let other = other.cloned();
                    return Err(self.err_at(other.as_ref(), "expected a comma between hashes"));
                }
            }
        }
    }

    /// Skip block labels up to and including the opening brace.
    fn skip_block_header(&mut self) -> Result<()> {
        loop {
            match self.next() {
                Some(t) if t.kind == TokenKind::OBrace => return Ok(()),
                Some(t) if matches!(t.kind, TokenKind::QuotedString | TokenKind::Ident) => {}
                other => return Err(self.err_at(other.as_ref(), "expected a block label or opening brace")),
            }
        }
    }

    /// Skip to the brace closing the current block.
    fn skip_block_body(&mut self) -> Result<()> {
        let mut depth = 1usize;
        while let Some(t) = self.next() {
            match t.kind {
                TokenKind::OBrace => depth += 1,
                TokenKind::CBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
        Err(self.err_at(None, "unclosed block"))
    }

    /// Skip an argument value. Stops before the newline or closing brace that
    /// ends it; newlines inside brackets are part of the value.
    fn skip_expression(&mut self) -> Result<()> {
        let mut depth = 0usize;
        let mut consumed = false;
        while let Some(t) = self.peek() {
            match t.kind {
                TokenKind::Newline | TokenKind::CBrace if depth == 0 => break,
                TokenKind::OBrace | TokenKind::OBrack | TokenKind::OParen => depth += 1,
                TokenKind::CBrace | TokenKind::CBrack | TokenKind::CParen => {
                    if depth == 0 {
                        let t = t.clone();
                        return Err(self.err_at(Some(&t), "unbalanced closing bracket"));
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.pos += 1;
            consumed = true;
        }
        if depth > 0 {
            return Err(self.err_at(None, "unclosed bracket in argument value"));
        }
        if !consumed {
            let t = self.peek().cloned();
            return Err(self.err_at(t.as_ref(), "missing argument value"));
        }
        Ok(())
    }
}
