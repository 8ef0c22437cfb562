use crate::constants::{
    DIRECTIVE_SEPARATOR, QUOTE, QUOTED_KEYWORDS, REPORT_URI, SOURCE_SEPARATOR,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::{borrow::Cow, fmt};

pub type SourceList = SmallVec<[Cow<'static, str>; 4]>;

/// Value of a fetch directive: a single token or an ordered token list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DirectiveValue {
    Single(Cow<'static, str>),
    List(SourceList),
}

impl DirectiveValue {
    #[inline]
    pub fn single(token: impl Into<Cow<'static, str>>) -> Self {
        Self::Single(token.into())
    }

    pub fn list<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Cow<'static, str>>,
    {
        Self::List(tokens.into_iter().map(Into::into).collect())
    }

    /// An empty list renders nothing, not even the directive name.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::List(tokens) if tokens.is_empty())
    }

    #[inline]
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        let tokens: &[Cow<'static, str>] = match self {
            Self::Single(token) => std::slice::from_ref(token),
            Self::List(tokens) => tokens.as_slice(),
        };
        tokens.iter().map(|token| token.as_ref())
    }

    #[inline]
    pub fn first(&self) -> Option<&str> {
        self.sources().next()
    }

    #[inline]
    pub fn estimated_size(&self) -> usize {
        self.sources().map(|token| token.len() + 3).sum()
    }
}

impl From<&'static str> for DirectiveValue {
    fn from(token: &'static str) -> Self {
        Self::single(token)
    }
}

impl From<String> for DirectiveValue {
    fn from(token: String) -> Self {
        Self::single(token)
    }
}

impl From<Vec<&'static str>> for DirectiveValue {
    fn from(tokens: Vec<&'static str>) -> Self {
        Self::list(tokens)
    }
}

impl From<Vec<String>> for DirectiveValue {
    fn from(tokens: Vec<String>) -> Self {
        Self::list(tokens)
    }
}

impl<const N: usize> From<[&'static str; N]> for DirectiveValue {
    fn from(tokens: [&'static str; N]) -> Self {
        Self::list(tokens)
    }
}

#[inline]
pub fn is_quoted_keyword(token: &str) -> bool {
    QUOTED_KEYWORDS.contains(&token)
}

/// Wraps CSP keywords in single quotes; hosts, URLs and schemes stay bare.
pub fn quote_source(token: &str) -> Cow<'_, str> {
    if is_quoted_keyword(token) {
        Cow::Owned(format!("{QUOTE}{token}{QUOTE}"))
    } else {
        Cow::Borrowed(token)
    }
}

fn write_source(f: &mut fmt::Formatter<'_>, token: &str) -> fmt::Result {
    if is_quoted_keyword(token) {
        write!(f, "{QUOTE}{token}{QUOTE}")
    } else {
        f.write_str(token)
    }
}

/// Ordered directive name to value map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FetchDirectives {
    directives: IndexMap<Cow<'static, str>, DirectiveValue>,
}

impl FetchDirectives {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a directive. A replaced directive keeps its position.
    pub fn insert(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        value: impl Into<DirectiveValue>,
    ) -> &mut Self {
        self.directives.insert(name.into(), value.into());
        self
    }

    #[inline]
    pub fn with(
        mut self,
        name: impl Into<Cow<'static, str>>,
        value: impl Into<DirectiveValue>,
    ) -> Self {
        self.insert(name, value);
        self
    }

    #[inline]
    pub fn remove(&mut self, name: &str) -> Option<DirectiveValue> {
        self.directives.shift_remove(name)
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&DirectiveValue> {
        self.directives.get(name)
    }

    #[inline]
    pub fn report_uri(&self) -> Option<&str> {
        self.get(REPORT_URI)
            .and_then(DirectiveValue::first)
            .filter(|uri| !uri.is_empty())
    }

    /// Overlays `other` on top of `self`: existing names are replaced in place,
    /// new names are appended.
    pub fn merge(&mut self, other: FetchDirectives) -> &mut Self {
        for (name, value) in other.directives {
            self.directives.insert(name, value);
        }
        self
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DirectiveValue)> {
        self.directives
            .iter()
            .map(|(name, value)| (name.as_ref(), value))
    }

    /// Directives that will actually appear in the rendered policy.
    #[inline]
    pub fn rendered(&self) -> impl Iterator<Item = (&str, &DirectiveValue)> {
        self.iter().filter(|(_, value)| !value.is_empty())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn estimated_size(&self) -> usize {
        self.rendered()
            .map(|(name, value)| name.len() + 1 + value.estimated_size())
            .sum()
    }
}

impl<N, V> FromIterator<(N, V)> for FetchDirectives
where
    N: Into<Cow<'static, str>>,
    V: Into<DirectiveValue>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut directives = Self::new();
        for (name, value) in iter {
            directives.insert(name, value);
        }
        directives
    }
}

impl fmt::Display for FetchDirectives {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in self.rendered() {
            if !first {
                write!(f, "{DIRECTIVE_SEPARATOR}")?;
            }
            f.write_str(name)?;
            for source in value.sources() {
                write!(f, "{SOURCE_SEPARATOR}")?;
                write_source(f, source)?;
            }
            first = false;
        }
        Ok(())
    }
}
