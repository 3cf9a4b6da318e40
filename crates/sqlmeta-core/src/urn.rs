//! Path addressing.
//!
//! A URN names an object's position in the whole graph, e.g.
//! `Server[@Name='s']/Database[@Name='db']/Table[@Name='t' and @Schema='dbo']`.
//! Resolution into segments is a consumed service ([`PathResolver`]);
//! [`UrnParser`] is the in-repo default for the grammar above.

use crate::{
    comparer::KeyComparer,
    error::{BoxError, Error, ErrorClass, ErrorOrigin},
    key::{ObjectKey, escape_literal},
    kind::ObjectKind,
};
use derive_more::{Deref, Display};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap, fmt};
use thiserror::Error as ThisError;

///
/// PathError
///

#[derive(Debug, ThisError)]
#[remain::sorted]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("malformed path '{urn}' at byte {position}: {reason}")]
    Malformed {
        urn: String,
        position: usize,
        reason: &'static str,
    },

    #[error("unknown object type '{type_name}' in path '{urn}'")]
    UnknownType { urn: String, type_name: String },
}

impl PathError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Empty | Self::Malformed { .. } => ErrorClass::Identity,
            Self::UnknownType { .. } => ErrorClass::Unsupported,
        }
    }

    #[must_use]
    pub const fn origin(&self) -> ErrorOrigin {
        ErrorOrigin::Path
    }
}

///
/// Urn
///

#[derive(Clone, Debug, Deref, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Urn(String);

impl Urn {
    #[must_use]
    pub fn new(urn: impl Into<String>) -> Self {
        Self(urn.into())
    }

    /// Root address for a single top-level object.
    #[must_use]
    pub fn root(kind: ObjectKind, key: &ObjectKey) -> Self {
        Self(format!("{}[{}]", kind.type_name(), key.filter_expression()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn child(&self, type_name: &str, filter: &str) -> Self {
        Self(format!("{}/{type_name}[{filter}]", self.0))
    }

    #[must_use]
    pub fn child_key(&self, kind: ObjectKind, key: &ObjectKey) -> Self {
        self.child(kind.type_name(), &key.filter_expression())
    }

    /// Address of the enclosing object, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        separators(&self.0)
            .last()
            .map(|&at| Self(self.0[..at].to_string()))
    }

    /// Type name of the addressed object.
    #[must_use]
    pub fn last_type(&self) -> &str {
        let start = separators(&self.0).last().map_or(0, |at| at + 1);
        let tail = &self.0[start..];

        tail.find('[').map_or(tail, |end| &tail[..end])
    }
}

impl From<&str> for Urn {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// byte offsets of '/' outside quotes and predicates
fn separators(urn: &str) -> Vec<usize> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;

    for (i, c) in urn.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '[' if !quoted => depth += 1,
            ']' if !quoted => depth = depth.saturating_sub(1),
            '/' if !quoted && depth == 0 => out.push(i),
            _ => {}
        }
    }

    out
}

///
/// UrnSegment
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct UrnSegment {
    pub type_name: String,
    pub attributes: BTreeMap<String, String>,
}

impl UrnSegment {
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

impl fmt::Display for UrnSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name)?;
        if self.attributes.is_empty() {
            return Ok(());
        }

        f.write_str("[")?;
        for (i, (name, value)) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(" and ")?;
            }
            write!(f, "@{name}='{}'", escape_literal(value))?;
        }
        f.write_str("]")
    }
}

///
/// PathResolver
///
/// Turns a path expression into its attribute-qualified segments.
///

pub trait PathResolver {
    fn resolve(&self, urn: &Urn) -> Result<Vec<UrnSegment>, BoxError>;
}

///
/// UrnParser
///

#[derive(Clone, Copy, Debug, Default)]
pub struct UrnParser;

impl UrnParser {
    pub fn parse(urn: &str) -> Result<Vec<UrnSegment>, PathError> {
        if urn.trim().is_empty() {
            return Err(PathError::Empty);
        }

        let mut cursor = Cursor {
            src: urn,
            pos: 0,
        };
        let mut segments = Vec::new();

        loop {
            segments.push(cursor.segment()?);

            match cursor.peek() {
                None => break,
                Some('/') => cursor.pos += 1,
                Some(_) => return Err(cursor.error("expected '/'")),
            }
        }

        Ok(segments)
    }
}

impl PathResolver for UrnParser {
    fn resolve(&self, urn: &Urn) -> Result<Vec<UrnSegment>, BoxError> {
        Self::parse(urn.as_str()).map_err(Into::into)
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek().filter(|&c| pred(c)) {
            self.pos += c.len_utf8();
        }
    }

    fn skip_ws(&mut self) {
        self.advance_while(char::is_whitespace);
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.src[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn error(&self, reason: &'static str) -> PathError {
        PathError::Malformed {
            urn: self.src.to_string(),
            position: self.pos,
            reason,
        }
    }

    fn ident(&mut self) -> Result<String, PathError> {
        let start = self.pos;
        self.advance_while(|c| c.is_alphanumeric() || c == '_');

        if self.pos == start {
            return Err(self.error("expected identifier"));
        }

        Ok(self.src[start..self.pos].to_string())
    }

    fn segment(&mut self) -> Result<UrnSegment, PathError> {
        let mut segment = UrnSegment::new(self.ident()?);
        if !self.eat("[") {
            return Ok(segment);
        }

        loop {
            self.skip_ws();
            if !self.eat("@") {
                return Err(self.error("expected '@'"));
            }
            let name = self.ident()?;
            self.skip_ws();
            if !self.eat("=") {
                return Err(self.error("expected '='"));
            }
            self.skip_ws();
            let value = self.value()?;
            segment.attributes.insert(name, value);
            self.skip_ws();

            if self.eat("]") {
                return Ok(segment);
            }
            if !self.eat("and") {
                return Err(self.error("expected 'and' or ']'"));
            }
        }
    }

    // quoted literal with '' escapes, or a bare token up to whitespace / ']'
    fn value(&mut self) -> Result<String, PathError> {
        if !self.eat("'") {
            let start = self.pos;
            self.advance_while(|c| !c.is_whitespace() && c != ']');
            if self.pos == start {
                return Err(self.error("expected value"));
            }
            return Ok(self.src[start..self.pos].to_string());
        }

        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated literal")),
                Some('\'') if self.eat("'") => out.push('\''),
                Some('\'') => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }
}

///
/// ResolvedAddress
///
/// A URN resolved into typed `(kind, key)` steps. Two addresses name the
/// same object iff every step compares equal under the active comparer.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedAddress {
    steps: Vec<(ObjectKind, ObjectKey)>,
}

impl ResolvedAddress {
    pub fn resolve(resolver: &dyn PathResolver, urn: &Urn) -> Result<Self, Error> {
        let segments = resolver
            .resolve(urn)
            .map_err(|source| Error::external(ErrorOrigin::Resolver, "resolve", urn.as_str(), source))?;

        Self::from_segments(urn, &segments)
    }

    pub fn from_segments(urn: &Urn, segments: &[UrnSegment]) -> Result<Self, Error> {
        if segments.is_empty() {
            return Err(PathError::Empty.into());
        }

        let steps = segments
            .iter()
            .map(|segment| {
                let kind = ObjectKind::from_type_name(&segment.type_name).ok_or_else(|| {
                    PathError::UnknownType {
                        urn: urn.to_string(),
                        type_name: segment.type_name.clone(),
                    }
                })?;
                let key = ObjectKey::from_segment(kind, segment)?;

                Ok((kind, key))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self { steps })
    }

    #[must_use]
    pub fn steps(&self) -> &[(ObjectKind, ObjectKey)] {
        &self.steps
    }

    /// Kind of the addressed object.
    #[must_use]
    pub fn kind(&self) -> Option<ObjectKind> {
        self.steps.last().map(|(kind, _)| *kind)
    }

    /// Name of the server step, if the address starts at one.
    #[must_use]
    pub fn server_name(&self) -> Option<&str> {
        match self.steps.first() {
            Some((ObjectKind::Server, key)) => key.name(),
            _ => None,
        }
    }

    #[must_use]
    pub fn compare(&self, other: &Self, comparer: &KeyComparer) -> Ordering {
        for ((ka, a), (kb, b)) in self.steps.iter().zip(&other.steps) {
            let ord = ka.cmp(kb).then_with(|| comparer.compare(a, b));
            if ord != Ordering::Equal {
                return ord;
            }
        }

        self.steps.len().cmp(&other.steps.len())
    }
}
