//! The selector language.
//!
//! ```text
//! selector    := term ( "&&" term )*
//! term        := [ "!" ] alternative ( "||" alternative )*
//! alternative := "ALL" | ".*" | keyword | pattern
//! ```
//!
//! A selector matches when every term matches; a term matches when any of
//! its alternatives does (inverted by `!`). Patterns use Emacs syntax and
//! must match the whole text: bare `(`, `)`, `|`, `{`, `}`, `$` and `[]` are
//! literal, while `\(`, `\)` and `\|` group and alternate. Keywords are only
//! recognized in the operation dimension.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use weft_core::{Operation, TypeInfo};

use crate::error::{PointcutError, PointcutResult};
use crate::keyword::KeywordTerm;

/// The universal sentinel.
pub const ALL: &str = "ALL";

/// What a selector is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorDimension {
    /// Logical object names.
    Name,
    /// Type names (a type matches through any of its supertypes).
    Type,
    /// Operation signatures and categories.
    Operation,
    /// Host identities.
    Host,
}

impl fmt::Display for SelectorDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Name => "name",
            Self::Type => "type",
            Self::Operation => "operation",
            Self::Host => "host",
        })
    }
}

#[derive(Debug, Clone)]
enum Atom {
    Any,
    Pattern(Regex),
    Keyword(KeywordTerm),
}

#[derive(Debug, Clone)]
struct Term {
    negated: bool,
    alternatives: Vec<Atom>,
}

impl Term {
    fn matches<F>(&self, atom_matches: F) -> bool
    where
        F: Fn(&Atom) -> bool,
    {
        self.alternatives.iter().any(atom_matches) != self.negated
    }
}

/// A parsed selector of one dimension.
#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    dimension: SelectorDimension,
    terms: Vec<Term>,
}

impl Selector {
    /// The selector matching everything.
    #[must_use]
    pub fn all(dimension: SelectorDimension) -> Self {
        Self {
            source: ALL.to_string(),
            dimension,
            terms: vec![Term {
                negated: false,
                alternatives: vec![Atom::Any],
            }],
        }
    }

    /// Parse a selector.
    ///
    /// # Errors
    ///
    /// Returns [`PointcutError`] for empty terms, patterns that do not
    /// compile and malformed or unknown keywords.
    pub fn parse(text: &str, dimension: SelectorDimension) -> PointcutResult<Self> {
        let empty = || PointcutError::EmptyTerm {
            dimension,
            selector: text.to_string(),
        };

        let mut terms = Vec::new();
        for raw in text.split("&&") {
            let raw = raw.trim();
            let (negated, body) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, raw),
            };
            if body.is_empty() {
                return Err(empty());
            }

            let mut alternatives = Vec::new();
            for alternative in body.split("||") {
                let alternative = alternative.trim();
                if alternative.is_empty() {
                    return Err(empty());
                }
                alternatives.push(parse_atom(alternative, dimension)?);
            }
            terms.push(Term {
                negated,
                alternatives,
            });
        }

        Ok(Self {
            source: text.trim().to_string(),
            dimension,
            terms,
        })
    }

    /// The text this selector was parsed from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The selector's dimension.
    #[must_use]
    pub fn dimension(&self) -> SelectorDimension {
        self.dimension
    }

    /// Whether this is exactly the universal sentinel.
    #[must_use]
    pub fn is_universal(&self) -> bool {
        matches!(
            self.terms.as_slice(),
            [Term { negated: false, alternatives }] if matches!(alternatives.as_slice(), [Atom::Any])
        )
    }

    /// Match a single text (a name or host id).
    #[must_use]
    pub fn matches_text(&self, text: &str) -> bool {
        self.matches_any_text(&[text])
    }

    /// Match a set of texts: an alternative holds if it matches any of them.
    ///
    /// Used for type lineages, where a subtype matches its supertypes'
    /// patterns.
    #[must_use]
    pub fn matches_any_text(&self, texts: &[&str]) -> bool {
        self.terms.iter().all(|term| {
            term.matches(|atom| match atom {
                Atom::Any => true,
                Atom::Pattern(re) => texts.iter().any(|t| re.is_match(t)),
                Atom::Keyword(_) => false,
            })
        })
    }

    /// Whether the type, or any supertype, matches.
    #[must_use]
    pub fn matches_type(&self, ty: &TypeInfo) -> bool {
        let lineage: Vec<&str> = ty.lineage().collect();
        self.matches_any_text(&lineage)
    }

    /// Match an operation of `ty` by signature or category.
    #[must_use]
    pub fn matches_operation(&self, ty: &TypeInfo, op: &Operation) -> bool {
        self.terms.iter().all(|term| {
            term.matches(|atom| match atom {
                Atom::Any => true,
                Atom::Pattern(re) => re.is_match(op.signature()),
                Atom::Keyword(keyword) => keyword.matches(ty, op),
            })
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_atom(text: &str, dimension: SelectorDimension) -> PointcutResult<Atom> {
    if text == ALL || text == ".*" {
        return Ok(Atom::Any);
    }
    if dimension == SelectorDimension::Operation {
        if let Some(keyword) = KeywordTerm::parse(text)? {
            return Ok(Atom::Keyword(keyword));
        }
    }
    let translated = translate_emacs(text).map_err(|message| PointcutError::InvalidPattern {
        dimension,
        pattern: text.to_string(),
        message,
    })?;
    Regex::new(&format!("^(?:{translated})$"))
        .map(Atom::Pattern)
        .map_err(|e| PointcutError::InvalidPattern {
            dimension,
            pattern: text.to_string(),
            message: e.to_string(),
        })
}

/// Rewrite an Emacs-syntax pattern into `regex` crate syntax.
fn translate_emacs(pattern: &str) -> Result<String, String> {
    let mut out = String::with_capacity(pattern.len().saturating_mul(2));
    let mut chars = pattern.chars().peekable();
    let mut at_start = true;

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('(') => out.push_str("(?:"),
                Some(')') => out.push(')'),
                Some('|') => out.push('|'),
                Some(w @ ('w' | 'W')) => {
                    out.push('\\');
                    out.push(w);
                },
                Some(other) => push_literal(&mut out, other),
                None => return Err("trailing backslash".to_string()),
            },
            '[' if chars.peek() == Some(&']') => {
                chars.next();
                out.push_str(r"\[\]");
            },
            '[' => translate_class(&mut chars, &mut out)?,
            '^' if at_start => {},
            '.' | '*' | '+' | '?' => out.push(c),
            _ => push_literal(&mut out, c),
        }
        at_start = false;
    }
    Ok(out)
}

fn translate_class<I>(chars: &mut std::iter::Peekable<I>, out: &mut String) -> Result<(), String>
where
    I: Iterator<Item = char>,
{
    out.push('[');
    if chars.peek() == Some(&'^') {
        chars.next();
        out.push('^');
    }
    // A leading ']' is a member, not the terminator.
    if chars.peek() == Some(&']') {
        chars.next();
        out.push_str(r"\]");
    }
    for c in chars.by_ref() {
        match c {
            ']' => {
                out.push(']');
                return Ok(());
            },
            '\\' | '[' | '&' | '~' => {
                out.push('\\');
                out.push(c);
            },
            _ => out.push(c),
        }
    }
    Err("unterminated character class".to_string())
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}
