use serde::{Deserialize, Serialize};
use std::fmt;

/// A wiki page title in its canonical, underscore-separated form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageTitle(String);

impl PageTitle {
    /// Canonicalizes a raw title. Never fails: input that cannot be decoded
    /// is kept as written.
    pub fn normalize(raw: &str) -> Self {
        let decoded = match urlencoding::decode(raw) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => raw.to_string(),
        };

        let spaced = decoded.replace('_', " ");
        let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");

        let mut chars = collapsed.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };

        Self(capitalized.replace(' ', "_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable form, with spaces.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders the page's URL path from an article path such as `/w/$1`.
    pub fn url_path(&self, article_path: &str) -> String {
        let encoded = urlencoding::encode(&self.0)
            .replace("%3A", ":")
            .replace("%2F", "/");
        article_path.replace("$1", &encoded)
    }
}

impl fmt::Display for PageTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
