use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, str::FromStr};

/// Kind of content a response carries.
///
/// Handlers can tag a response explicitly by inserting a `Variety` into the
/// response extensions (see [`CspExtensions`](crate::middleware::CspExtensions)).
/// Untagged responses are classified by content type: `text/html` is a
/// [`Variety::View`], everything else is [`Variety::Plain`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Variety {
    #[default]
    Plain,
    View,
    File,
    Stream,
    Custom(Cow<'static, str>),
}

impl Variety {
    #[inline]
    pub fn as_str(&self) -> &str {
        match self {
            Variety::Plain => "plain",
            Variety::View => "view",
            Variety::File => "file",
            Variety::Stream => "stream",
            Variety::Custom(name) => name,
        }
    }

    /// Classifies a response from its `Content-Type` header value.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let is_html = content_type
            .and_then(|value| value.split(';').next())
            .map(|mime| mime.trim().eq_ignore_ascii_case("text/html"))
            .unwrap_or(false);

        if is_html {
            Variety::View
        } else {
            Variety::Plain
        }
    }
}

impl From<&str> for Variety {
    fn from(value: &str) -> Self {
        match value {
            "plain" => Variety::Plain,
            "view" => Variety::View,
            "file" => Variety::File,
            "stream" => Variety::Stream,
            other => Variety::Custom(Cow::Owned(other.to_owned())),
        }
    }
}

impl From<String> for Variety {
    fn from(value: String) -> Self {
        match value.as_str() {
            "plain" | "view" | "file" | "stream" => Variety::from(value.as_str()),
            _ => Variety::Custom(Cow::Owned(value)),
        }
    }
}

impl From<Variety> for String {
    fn from(variety: Variety) -> Self {
        match variety {
            Variety::Custom(name) => name.into_owned(),
            known => known.as_str().to_owned(),
        }
    }
}

impl FromStr for Variety {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Variety::from(s))
    }
}

impl fmt::Display for Variety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
