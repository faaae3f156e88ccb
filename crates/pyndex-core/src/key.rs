//! Object-key resolution for index pages and distribution files
//!
//! Layout:
//! ```text
//! [prefix/]                          # root index (index_compat off)
//! [prefix/]index.html                # root index (index_compat on)
//! [prefix/]{directory}/              # package index (index_compat off)
//! [prefix/]{directory}/index.html    # package index (index_compat on)
//! [prefix/]{directory}/{filename}    # distribution file
//! ```

use std::borrow::Cow;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Directory name addressing the root index.
pub const ROOT: &str = "/";

/// Explicit index object name used by static-website endpoints.
pub const INDEX_HTML: &str = "index.html";

/// Characters left unescaped in hrefs and URL paths: unreserved plus `/`.
const KEY_UNESCAPED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Percent-escape a filename or key for use in an href or URL path.
pub fn quote_key(s: &str) -> Cow<'_, str> {
    utf8_percent_encode(s, KEY_UNESCAPED).into()
}

/// Resolve the object key for `filename` inside `directory`.
///
/// An empty `filename` addresses the directory marker object itself.
pub fn key(directory: &str, filename: &str, prefix: Option<&str>, index_compat: bool) -> String {
    let prefix = prefix.filter(|p| !p.is_empty());
    let index_name = if index_compat { INDEX_HTML } else { "" };

    if directory == ROOT && filename == index_name {
        return match (prefix, index_compat) {
            (Some(p), false) => format!("{p}/"),
            (None, false) => ROOT.to_string(),
            (Some(p), true) => format!("{p}/{INDEX_HTML}"),
            (None, true) => INDEX_HTML.to_string(),
        };
    }

    let mut parts: Vec<&str> = Vec::with_capacity(2);
    parts.extend(prefix);
    if !directory.is_empty() && directory != ROOT {
        parts.push(directory);
    }

    let mut key = parts.join("/");
    if filename.is_empty() {
        key.push('/');
    } else {
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(filename);
    }
    key
}

/// Key resolution bound to one bucket configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyResolver {
    prefix: Option<String>,
    index_compat: bool,
}

impl KeyResolver {
    /// Create a resolver. Surrounding slashes are stripped from `prefix`;
    /// an empty prefix means none.
    pub fn new(prefix: Option<&str>, index_compat: bool) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        Self {
            prefix,
            index_compat,
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn index_compat(&self) -> bool {
        self.index_compat
    }

    /// Filename under which a directory's index object is stored.
    pub fn index_name(&self) -> &'static str {
        if self.index_compat { INDEX_HTML } else { "" }
    }

    pub fn key(&self, directory: &str, filename: &str) -> String {
        key(directory, filename, self.prefix(), self.index_compat)
    }

    /// Key of the index object for `directory` (or the root index for [`ROOT`]).
    pub fn index_key(&self, directory: &str) -> String {
        self.key(directory, self.index_name())
    }

    /// Listing prefix under which package directories live (`prefix/` or empty).
    pub fn list_prefix(&self) -> String {
        match self.prefix() {
            Some(p) => format!("{p}/"),
            None => String::new(),
        }
    }
}
