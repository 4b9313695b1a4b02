//! Category keywords of the operation dimension.
//!
//! A keyword selects operations by what they structurally do (set a field,
//! add to a collection, ...) rather than by name. Matching is a pure
//! function of the metadata recorded by the preparation pass.

use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;

use weft_core::{AccessInfo, FieldInfo, FieldKind, Operation, TypeInfo};

use crate::error::{PointcutError, PointcutResult};

/// Operation categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    /// Every candidate operation.
    All,
    /// Static operations.
    Statics,
    /// Constructors.
    Constructors,
    /// Writers, adders, removers and collection modifiers.
    Modifiers,
    /// Operations reading any field.
    Accessors,
    /// Operations reading a reference field.
    RefAccessors,
    /// Operations reading a collection field.
    ColAccessors,
    /// Setters of any field.
    Setters,
    /// Setters of primitive fields.
    FieldSetters,
    /// Setters of reference fields.
    RefSetters,
    /// Setters of collection fields.
    ColSetters,
    /// Getters of any field.
    Getters,
    /// Getters of primitive fields.
    FieldGetters,
    /// Getters of reference fields.
    RefGetters,
    /// Getters of collection fields.
    ColGetters,
    /// Operations writing a field.
    Writers,
    /// Operations adding to a collection.
    Adders,
    /// Operations removing from a collection.
    Removers,
}

impl Keyword {
    const CATALOGUE: [Self; 18] = [
        Self::All,
        Self::Statics,
        Self::Constructors,
        Self::Modifiers,
        Self::Accessors,
        Self::RefAccessors,
        Self::ColAccessors,
        Self::Setters,
        Self::FieldSetters,
        Self::RefSetters,
        Self::ColSetters,
        Self::Getters,
        Self::FieldGetters,
        Self::RefGetters,
        Self::ColGetters,
        Self::Writers,
        Self::Adders,
        Self::Removers,
    ];

    /// Keyword as written in selectors.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Statics => "STATICS",
            Self::Constructors => "CONSTRUCTORS",
            Self::Modifiers => "MODIFIERS",
            Self::Accessors => "ACCESSORS",
            Self::RefAccessors => "REFACCESSORS",
            Self::ColAccessors => "COLACCESSORS",
            Self::Setters => "SETTERS",
            Self::FieldSetters => "FIELDSETTERS",
            Self::RefSetters => "REFSETTERS",
            Self::ColSetters => "COLSETTERS",
            Self::Getters => "GETTERS",
            Self::FieldGetters => "FIELDGETTERS",
            Self::RefGetters => "REFGETTERS",
            Self::ColGetters => "COLGETTERS",
            Self::Writers => "WRITERS",
            Self::Adders => "ADDERS",
            Self::Removers => "REMOVERS",
        }
    }

    /// Look a keyword up by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::CATALOGUE.into_iter().find(|k| k.name() == name)
    }

    /// Whether the keyword takes a field/collection parameter list.
    #[must_use]
    pub fn accepts_params(self) -> bool {
        matches!(
            self,
            Self::Modifiers
                | Self::RefAccessors
                | Self::ColAccessors
                | Self::Setters
                | Self::Getters
                | Self::Writers
                | Self::Adders
                | Self::Removers
        )
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of a keyword parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordParam {
    /// A field or collection by name.
    Member(String),
    /// `<tag>` / `<!tag>`: fields carrying (or lacking) an attribute.
    Tagged {
        /// Attribute name.
        tag: String,
        /// Select fields *without* the attribute.
        negated: bool,
    },
    /// `{modifier}` / `{!modifier}`: fields with (or without) a modifier.
    Modified {
        /// Modifier name.
        modifier: String,
        /// Select fields *without* the modifier.
        negated: bool,
    },
}

impl KeywordParam {
    fn parse(keyword: Keyword, raw: &str) -> PointcutResult<Self> {
        let invalid = |message: String| PointcutError::InvalidKeywordParameters {
            keyword: keyword.name().to_string(),
            message,
        };

        let (inner, tagged) = if let Some(rest) = raw.strip_prefix('<') {
            let inner = rest
                .strip_suffix('>')
                .ok_or_else(|| invalid(format!("unterminated tag {raw:?}")))?;
            (inner, true)
        } else if let Some(rest) = raw.strip_prefix('{') {
            let inner = rest
                .strip_suffix('}')
                .ok_or_else(|| invalid(format!("unterminated modifier filter {raw:?}")))?;
            (inner, false)
        } else {
            if !is_identifier(raw) {
                return Err(invalid(format!("{raw:?} is not a field name")));
            }
            return Ok(Self::Member(raw.to_string()));
        };

        let (negated, name) = match inner.strip_prefix('!') {
            Some(name) => (true, name.trim()),
            None => (false, inner.trim()),
        };
        if !is_identifier(name) {
            return Err(invalid(format!("{raw:?} does not name an attribute")));
        }
        Ok(if tagged {
            Self::Tagged {
                tag: name.to_string(),
                negated,
            }
        } else {
            Self::Modified {
                modifier: name.to_string(),
                negated,
            }
        })
    }

    fn resolve_into<'a>(&self, ty: &'a TypeInfo, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::Member(name) => match ty.field(name) {
                Some(field) => {
                    out.insert(field.name.as_str());
                },
                None => warn!(
                    target: "weft::pointcut",
                    field = %name,
                    type_name = %ty.name(),
                    "keyword parameter names no field of the type"
                ),
            },
            Self::Tagged { tag, negated } => out.extend(
                ty.fields()
                    .iter()
                    .filter(|f| f.has_attribute(tag) != *negated)
                    .map(|f| f.name.as_str()),
            ),
            Self::Modified { modifier, negated } => out.extend(
                ty.fields()
                    .iter()
                    .filter(|f| f.has_modifier(modifier) != *negated)
                    .map(|f| f.name.as_str()),
            ),
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// A keyword with its optional parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTerm {
    keyword: Keyword,
    params: Option<Vec<KeywordParam>>,
}

impl KeywordTerm {
    /// Try to read `text` as a keyword term.
    ///
    /// Returns `Ok(None)` when `text` is not keyword-shaped (so it should be
    /// treated as a pattern) and an error when it is keyword-shaped but
    /// unknown or malformed.
    pub(crate) fn parse(text: &str) -> PointcutResult<Option<Self>> {
        let head_len = text
            .find(|c: char| !c.is_ascii_uppercase())
            .unwrap_or(text.len());
        if head_len == 0 {
            return Ok(None);
        }
        let (head, rest) = text.split_at(head_len);

        if rest.is_empty() {
            return Ok(Keyword::from_name(head).map(|keyword| Self {
                keyword,
                params: None,
            }));
        }

        let Some(list) = rest.strip_prefix('(') else {
            return Ok(None);
        };
        let keyword = Keyword::from_name(head).ok_or_else(|| PointcutError::UnknownKeyword {
            keyword: head.to_string(),
        })?;
        let invalid = |message: &str| PointcutError::InvalidKeywordParameters {
            keyword: keyword.name().to_string(),
            message: message.to_string(),
        };

        let list = list
            .strip_suffix(')')
            .ok_or_else(|| invalid("missing closing parenthesis"))?;
        if !keyword.accepts_params() {
            return Err(invalid("keyword takes no parameters"));
        }
        if list.trim().is_empty() {
            return Err(invalid("empty parameter list"));
        }
        let params = list
            .split(',')
            .map(|raw| KeywordParam::parse(keyword, raw.trim()))
            .collect::<PointcutResult<Vec<_>>>()?;

        Ok(Some(Self {
            keyword,
            params: Some(params),
        }))
    }

    /// The keyword.
    #[must_use]
    pub fn keyword(&self) -> Keyword {
        self.keyword
    }

    /// The parameter list, if one was given.
    #[must_use]
    pub fn params(&self) -> Option<&[KeywordParam]> {
        self.params.as_deref()
    }

    /// Field names the parameters denote on `ty`; `None` means "any".
    fn resolve<'a>(&self, ty: &'a TypeInfo) -> Option<BTreeSet<&'a str>> {
        self.params.as_ref().map(|params| {
            let mut names = BTreeSet::new();
            for param in params {
                param.resolve_into(ty, &mut names);
            }
            names
        })
    }

    /// Whether `op` of `ty` falls in this category.
    #[must_use]
    pub fn matches(&self, ty: &TypeInfo, op: &Operation) -> bool {
        let access = op.access();
        let allowed = self.resolve(ty);
        let allowed = allowed.as_ref();
        let kind_of = |name: &str| ty.field(name).map(|f: &FieldInfo| f.kind);

        match self.keyword {
            Keyword::All => true,
            Keyword::Statics => op.is_static(),
            Keyword::Constructors => op.is_constructor(),
            Keyword::Modifiers => {
                any_allowed(&access.written_fields, allowed)
                    || any_allowed(&access.added_collections, allowed)
                    || any_allowed(&access.removed_collections, allowed)
                    || any_allowed(&access.modified_collections, allowed)
            },
            Keyword::Accessors => !access.accessed_fields.is_empty(),
            Keyword::RefAccessors => access
                .accessed_fields
                .iter()
                .filter(|f| kind_of(f.as_str()) == Some(FieldKind::Reference))
                .any(|f| is_allowed(f.as_str(), allowed)),
            Keyword::ColAccessors => access
                .accessed_fields
                .iter()
                .filter(|f| kind_of(f.as_str()) == Some(FieldKind::Collection))
                .any(|f| is_allowed(f.as_str(), allowed)),
            Keyword::Setters => access.set_field.as_deref().is_some_and(|f| is_allowed(f, allowed)),
            Keyword::FieldSetters => setter_kind(access, &kind_of) == Some(FieldKind::Primitive),
            Keyword::RefSetters => setter_kind(access, &kind_of) == Some(FieldKind::Reference),
            Keyword::ColSetters => setter_kind(access, &kind_of) == Some(FieldKind::Collection),
            Keyword::Getters => access
                .returned_field
                .as_deref()
                .is_some_and(|f| is_allowed(f, allowed)),
            Keyword::FieldGetters => getter_kind(access, &kind_of) == Some(FieldKind::Primitive),
            Keyword::RefGetters => getter_kind(access, &kind_of) == Some(FieldKind::Reference),
            Keyword::ColGetters => getter_kind(access, &kind_of) == Some(FieldKind::Collection),
            Keyword::Writers => any_allowed(&access.written_fields, allowed),
            Keyword::Adders => any_allowed(&access.added_collections, allowed),
            Keyword::Removers => any_allowed(&access.removed_collections, allowed),
        }
    }
}

fn is_allowed(field: &str, allowed: Option<&BTreeSet<&str>>) -> bool {
    allowed.is_none_or(|names| names.contains(field))
}

fn any_allowed(fields: &BTreeSet<String>, allowed: Option<&BTreeSet<&str>>) -> bool {
    fields.iter().any(|f| is_allowed(f.as_str(), allowed))
}

fn setter_kind(access: &AccessInfo, kind_of: &dyn Fn(&str) -> Option<FieldKind>) -> Option<FieldKind> {
    access.set_field.as_deref().and_then(kind_of)
}

fn getter_kind(access: &AccessInfo, kind_of: &dyn Fn(&str) -> Option<FieldKind>) -> Option<FieldKind> {
    access.returned_field.as_deref().and_then(kind_of)
}

impl fmt::Display for KeywordTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword)?;
        if let Some(params) = &self.params {
            let rendered: Vec<String> = params
                .iter()
                .map(|p| match p {
                    KeywordParam::Member(name) => name.clone(),
                    KeywordParam::Tagged { tag, negated } => {
                        format!("<{}{tag}>", if *negated { "!" } else { "" })
                    },
                    KeywordParam::Modified { modifier, negated } => {
                        format!("{{{}{modifier}}}", if *negated { "!" } else { "" })
                    },
                })
                .collect();
            write!(f, "({})", rendered.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_test::{test_account_type, test_ledger_type};

    fn matching(term: &str, ty: &TypeInfo) -> Vec<String> {
        let term = KeywordTerm::parse(term).unwrap().unwrap();
        ty.operations()
            .iter()
            .filter(|op| term.matches(ty, op))
            .map(|op| op.signature().to_string())
            .collect()
    }

    #[test]
    fn test_not_keyword_shaped() {
        assert_eq!(KeywordTerm::parse("deposit.*").unwrap(), None);
        assert_eq!(KeywordTerm::parse("GET.*").unwrap(), None);
        assert_eq!(KeywordTerm::parse("UNKNOWN").unwrap(), None);
    }

    #[test]
    fn test_unknown_parameterized_keyword() {
        let err = KeywordTerm::parse("FROBNICATORS(x)").unwrap_err();
        assert_eq!(
            err,
            PointcutError::UnknownKeyword {
                keyword: "FROBNICATORS".into()
            }
        );
    }

    #[test]
    fn test_malformed_parameters() {
        assert!(KeywordTerm::parse("SETTERS(").is_err());
        assert!(KeywordTerm::parse("SETTERS()").is_err());
        assert!(KeywordTerm::parse("SETTERS(<persistent)").is_err());
        assert!(KeywordTerm::parse("SETTERS(a b)").is_err());
        assert!(KeywordTerm::parse("STATICS(x)").is_err());
    }

    #[test]
    fn test_parse_params() {
        let term = KeywordTerm::parse("WRITERS(balance, <persistent>, {!transient})")
            .unwrap()
            .unwrap();
        assert_eq!(term.keyword(), Keyword::Writers);
        assert_eq!(
            term.params().unwrap(),
            &[
                KeywordParam::Member("balance".into()),
                KeywordParam::Tagged {
                    tag: "persistent".into(),
                    negated: false
                },
                KeywordParam::Modified {
                    modifier: "transient".into(),
                    negated: true
                },
            ]
        );
        assert_eq!(term.to_string(), "WRITERS(balance,<persistent>,{!transient})");
    }

    #[test]
    fn test_structural_keywords() {
        let ty = test_account_type();
        assert_eq!(matching("STATICS", &ty), vec!["create()", "count()"]);
        assert_eq!(matching("CONSTRUCTORS", &ty), vec!["<init>()"]);
        assert_eq!(matching("SETTERS", &ty), vec!["setBalance(i64)", "setOwner(bank.Person)"]);
        assert_eq!(matching("FIELDSETTERS", &ty), vec!["setBalance(i64)"]);
        assert_eq!(matching("REFSETTERS", &ty), vec!["setOwner(bank.Person)"]);
        assert_eq!(matching("REFGETTERS", &ty), vec!["getOwner()"]);
        assert_eq!(matching("COLGETTERS", &ty), vec!["getHistory()"]);
        assert_eq!(
            matching("GETTERS", &ty),
            vec!["getBalance()", "getOwner()", "getHistory()"]
        );
        assert_eq!(
            matching("ADDERS", &ty),
            vec!["deposit(i64)", "withdraw(i64)"]
        );
        assert_eq!(matching("REMOVERS", &ty), vec!["clearHistory()"]);
        assert_eq!(matching("REFACCESSORS", &ty), vec!["getOwner()"]);
        assert_eq!(matching("COLACCESSORS", &ty), vec!["getHistory()"]);
    }

    #[test]
    fn test_parameterized_keywords() {
        let ty = test_account_type();
        assert_eq!(matching("SETTERS(owner)", &ty), vec!["setOwner(bank.Person)"]);
        assert_eq!(
            matching("GETTERS(<persistent>)", &ty),
            vec!["getBalance()", "getOwner()"]
        );
        assert_eq!(matching("GETTERS(<!persistent>)", &ty), vec!["getHistory()"]);
        assert_eq!(
            matching("WRITERS({transient})", &ty),
            Vec::<String>::new()
        );
        assert_eq!(
            matching("MODIFIERS({transient})", &ty),
            vec!["<init>()", "deposit(i64)", "withdraw(i64)", "clearHistory()"]
        );
        // Unknown field names select nothing.
        assert!(matching("SETTERS(nosuchfield)", &ty).is_empty());
    }

    #[test]
    fn test_collection_keywords_on_ledger() {
        let ty = test_ledger_type();
        assert_eq!(matching("ADDERS(entries)", &ty), vec!["addEntry(String)"]);
        assert_eq!(matching("REMOVERS(<indexed>)", &ty), vec!["removeEntry(String)"]);
        assert_eq!(
            matching("COLACCESSORS", &ty),
            vec!["size()"]
        );
        assert_eq!(matching("FIELDGETTERS", &ty), vec!["getTotal()"]);
    }
}
