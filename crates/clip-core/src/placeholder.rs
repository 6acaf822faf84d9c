//! `{{token}}` discovery over a document.
//!
//! A token is `{{`, one or more characters other than `}`, then `}}`.
//! Surrounding whitespace inside the braces is not part of the token.
//! Everything else that looks like brace markup is reported as a
//! [`BraceIssue`] so it never disappears silently.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::document::{walk, Document, JsonPath, PathSegment};

/// One occurrence of a placeholder token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub token: String,
    pub path: JsonPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BraceProblem {
    /// `{{}}`
    Empty,
    /// `{field}`
    SingleBraces,
    /// `{{field` or `{{field}`
    Unterminated,
    /// A `{` with nothing closing it.
    UnmatchedOpen,
    /// `}` or `}}` with nothing opening it.
    UnmatchedClose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BraceIssue {
    pub problem: BraceProblem,
    /// The offending slice of the string.
    pub text: String,
    pub path: JsonPath,
}

/// Result of scanning one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    /// Occurrences in document order.
    pub placeholders: Vec<Placeholder>,
    pub issues: Vec<BraceIssue>,
}

impl Scan {
    /// Unique tokens, each with every path it occurs at, in first-seen order.
    pub fn grouped(&self) -> Vec<(&str, Vec<&JsonPath>)> {
        let mut out: Vec<(&str, Vec<&JsonPath>)> = Vec::new();
        for p in &self.placeholders {
            match out.iter_mut().find(|(t, _)| *t == p.token) {
                Some((_, paths)) => paths.push(&p.path),
                None => out.push((&p.token, vec![&p.path])),
            }
        }
        out
    }

    pub fn tokens(&self) -> BTreeSet<String> {
        self.placeholders.iter().map(|p| p.token.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Piece<'s> {
    Token(&'s str),
    Problem(BraceProblem, &'s str),
}

/// Split a string into placeholder tokens and brace problems.
pub(crate) fn tokenize(s: &str) -> Vec<Piece<'_>> {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                let inner_start = i + 2;
                let Some(offset) = s[inner_start..].find('}') else {
                    out.push(Piece::Problem(BraceProblem::Unterminated, &s[i..]));
                    break;
                };
                let close = inner_start + offset;
                if bytes.get(close + 1) == Some(&b'}') {
                    let inner = s[inner_start..close].trim();
                    if inner.is_empty() {
                        out.push(Piece::Problem(BraceProblem::Empty, &s[i..close + 2]));
                    } else {
                        out.push(Piece::Token(inner));
                    }
                    i = close + 2;
                } else {
                    out.push(Piece::Problem(BraceProblem::Unterminated, &s[i..=close]));
                    i = close + 1;
                }
            }
            b'{' => {
                let next = s[i + 1..].find(['{', '}']).map(|o| i + 1 + o);
                match next {
                    Some(close) if bytes[close] == b'}' => {
                        let end = if bytes.get(close + 1) == Some(&b'}') {
                            close + 2
                        } else {
                            close + 1
                        };
                        out.push(Piece::Problem(BraceProblem::SingleBraces, &s[i..end]));
                        i = end;
                    }
                    _ => {
                        out.push(Piece::Problem(BraceProblem::UnmatchedOpen, &s[i..i + 1]));
                        i += 1;
                    }
                }
            }
            b'}' => {
                let end = if bytes.get(i + 1) == Some(&b'}') { i + 2 } else { i + 1 };
                out.push(Piece::Problem(BraceProblem::UnmatchedClose, &s[i..end]));
                i = end;
            }
            _ => i += 1,
        }
    }

    out
}

/// The token when `s` is exactly one placeholder and nothing else.
pub fn whole_token(s: &str) -> Option<&str> {
    let inner = s.strip_prefix("{{")?.strip_suffix("}}")?;
    let token = inner.trim();
    if token.is_empty() || inner.contains('}') {
        return None;
    }
    Some(token)
}

pub fn contains_placeholder(s: &str) -> bool {
    tokenize(s).iter().any(|p| matches!(p, Piece::Token(_)))
}

fn scan_value(value: &Value, path: &mut JsonPath, scan: &mut Scan) {
    walk(value, path, &mut |path: &JsonPath, s: &str| {
        if !s.contains(['{', '}']) {
            return;
        }
        let lenient = path.last_key() == Some("css");
        for piece in tokenize(s) {
            match piece {
                Piece::Token(token) => scan.placeholders.push(Placeholder {
                    token: token.to_string(),
                    path: path.clone(),
                }),
                Piece::Problem(problem, text) => {
                    if lenient && problem != BraceProblem::Empty {
                        continue;
                    }
                    scan.issues.push(BraceIssue {
                        problem,
                        text: text.to_string(),
                        path: path.clone(),
                    });
                }
            }
        }
    });
}

/// Scan every string in the document except the merge array itself.
pub fn scan_document(doc: &Document<'_>) -> Scan {
    let mut scan = Scan::default();
    let mut path = JsonPath::root();

    for (key, value) in doc.root() {
        if key == "merge" {
            continue;
        }
        path.push(PathSegment::Key(key.clone()));
        match value {
            Value::Object(template) if key == "template" => {
                for (inner_key, inner) in template {
                    if inner_key == "merge" {
                        continue;
                    }
                    path.push(PathSegment::Key(inner_key.clone()));
                    scan_value(inner, &mut path, &mut scan);
                    path.pop();
                }
            }
            _ => scan_value(value, &mut path, &mut scan),
        }
        path.pop();
    }

    scan
}

/// Unique placeholder tokens in the document.
pub fn scan(doc: &Document<'_>) -> BTreeSet<String> {
    scan_document(doc).tokens()
}

/// Every placeholder occurrence with its path, in document order.
pub fn locate(doc: &Document<'_>) -> Vec<Placeholder> {
    scan_document(doc).placeholders
}
