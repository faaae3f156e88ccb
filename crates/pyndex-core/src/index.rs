//! Directory listing model and its HTML page encoding
//!
//! Pages follow the simple repository format scraped by installers: one
//! anchor per file, `href` is the escaped filename, and an optional
//! `#<algorithm>=<digest>` fragment carries the content hash.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::hash::{HASH_ALGORITHM, sha256_file};
use crate::key::quote_key;

/// Matches the `href` of an anchor, wherever it sits among the attributes
/// and whichever quotes it uses. Group 1 is a double-quoted value, group 2 a
/// single-quoted one.
static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r##"(?i)<a\s+(?:[^>]*?\s)?href\s*=\s*(?:"([^"]*)"|'([^']*)')"##)
        .expect("anchor regex is valid")
});

/// Matches a `algo=digest` link fragment.
static FRAGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)=(\w+)$").expect("fragment regex is valid"));

/// Content hash attached to an index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hash {
    pub algorithm: String,
    pub digest: String,
}

impl Hash {
    pub fn new(algorithm: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            digest: digest.into(),
        }
    }

    /// SHA-256 hash of a local file.
    pub fn of_file(path: &Path) -> io::Result<Self> {
        Ok(Self::new(HASH_ALGORITHM, sha256_file(path)?))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.algorithm, self.digest)
    }
}

/// Files published in one directory, each with an optional hash.
///
/// Entries without a hash come from listings this tool did not write and
/// are kept as-is. An empty index is never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    filenames: BTreeMap<String, Option<Hash>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an index page. Anything that is not a recognizable anchor is
    /// ignored, so foreign or hand-edited pages degrade to hash-less entries.
    pub fn parse(html: &str) -> Self {
        let filenames = ANCHOR_RE
            .captures_iter(html)
            .filter_map(|caps| {
                let value = caps.get(1).or_else(|| caps.get(2))?.as_str();
                let (target, fragment) = match value.split_once('#') {
                    Some((target, fragment)) => (target, Some(fragment)),
                    None => (value, None),
                };
                let href = percent_decode_str(target).decode_utf8_lossy().into_owned();
                if href.is_empty() {
                    return None;
                }
                let hash = fragment
                    .and_then(|f| FRAGMENT_RE.captures(f))
                    .map(|f| Hash::new(&f[1], &f[2]));
                Some((href, hash))
            })
            .collect();
        Self { filenames }
    }

    /// Render the index page, links sorted by filename.
    pub fn to_html(&self) -> String {
        let links: Vec<String> = self
            .filenames
            .iter()
            .map(|(filename, hash)| {
                let fragment = hash.as_ref().map(|h| format!("#{h}")).unwrap_or_default();
                format!(
                    "    <a href=\"{}{fragment}\">{}</a>",
                    quote_key(filename),
                    filename.trim_end_matches('/')
                )
            })
            .collect();

        format!(
            "<!DOCTYPE html>\n\
             <html>\n  \
             <head>\n    \
             <meta charset=\"UTF-8\">\n    \
             <title>Package Index</title>\n  \
             </head>\n  \
             <body>\n\
             {}\n  \
             </body>\n\
             </html>",
            links.join("<br>\n")
        )
    }

    /// Insert or replace an entry.
    pub fn put(&mut self, filename: impl Into<String>, hash: Option<Hash>) {
        self.filenames.insert(filename.into(), hash);
    }

    /// Remove an entry, returning whether it was present.
    pub fn remove(&mut self, filename: &str) -> bool {
        self.filenames.remove(filename).is_some()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.filenames.contains_key(filename)
    }

    /// Hash recorded for `filename`, if the entry exists and has one.
    pub fn hash(&self, filename: &str) -> Option<&Hash> {
        self.filenames.get(filename).and_then(Option::as_ref)
    }

    /// Filenames in ascending order.
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.filenames.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Option<Hash>)> for Index {
    fn from_iter<I: IntoIterator<Item = (S, Option<Hash>)>>(iter: I) -> Self {
        Self {
            filenames: iter.into_iter().map(|(f, h)| (f.into(), h)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hash() -> Hash {
        Hash::new("sha256", "1234".repeat(16))
    }

    /// Mirrors a listing with a mix of hashed and hash-less entries.
    fn sample_index() -> Index {
        let versions = [
            "0", "0!0", "0+local", "0.0", "0.1.1", "0.1.2", "0.dev0", "0.post0", "0a0", "0rc0",
        ];
        let mut index = Index::new();
        let mut i = 0;
        for version in versions {
            for suffix in [".tar.gz", "-py2-none-any.whl"] {
                let hash = (i % 3 == 0).then(sample_hash);
                index.put(format!("s3pypi-{version}{suffix}"), hash);
                i += 1;
            }
        }
        index
    }

    #[test]
    fn parse_render_roundtrip() {
        let index = sample_index();
        assert_eq!(Index::parse(&index.to_html()), index);
    }

    #[test]
    fn render_sorted_with_fragment() {
        let mut index = Index::new();
        index.put("b-1.0.tar.gz", None);
        index.put("a-1.0.tar.gz", Some(Hash::new("sha256", "ab12")));
        let html = index.to_html();

        let a = html.find("a-1.0.tar.gz").unwrap();
        let b = html.find("b-1.0.tar.gz").unwrap();
        assert!(a < b);
        assert!(html.contains(r#"<a href="a-1.0.tar.gz#sha256=ab12">a-1.0.tar.gz</a><br>"#));
        assert!(html.contains(r#"<a href="b-1.0.tar.gz">b-1.0.tar.gz</a>"#));
    }

    #[test]
    fn render_escapes_href_only() {
        let mut index = Index::new();
        index.put("pkg-0+local.tar.gz", None);
        let html = index.to_html();
        assert!(html.contains(r#"<a href="pkg-0%2Blocal.tar.gz">pkg-0+local.tar.gz</a>"#));
    }

    #[test]
    fn render_directory_entry_text_without_slash() {
        let index: Index = [("hello-world/", None::<Hash>)].into_iter().collect();
        let html = index.to_html();
        assert!(html.contains(r#"<a href="hello-world/">hello-world</a>"#));
        assert_eq!(Index::parse(&html), index);
    }

    #[test]
    fn render_empty_page() {
        let html = Index::new().to_html();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.ends_with("</html>"));
        assert!(!html.contains("<a "));
    }

    #[test]
    fn parse_ignores_unrelated_markup() {
        let html = r#"<html><body><h1>Links</h1>
            <a name="top"></a>
            <a href="pkg-1.0.tar.gz">pkg</a>
            <p>garbage <b>here</b></p>
            <a href="">empty</a>
            </body></html>"#;
        let index = Index::parse(html);
        assert_eq!(index.len(), 1);
        assert!(index.contains("pkg-1.0.tar.gz"));
        assert_eq!(index.hash("pkg-1.0.tar.gz"), None);
    }

    #[test]
    fn parse_any_attribute_order_and_quoting() {
        let html = r#"<html><body>
            <a data-requires-python="&gt;=3.8" href="legacy-0.9.tar.gz#sha256=abcd">legacy</a><br>
            <a href='single-1.0.tar.gz'>single</a><br>
            <A class="x" HREF = "upper-2.0.tar.gz">upper</A><br>
            <a data-href="ignored.tar.gz">no href</a><br>
            <a href="plain-1.0.tar.gz">plain</a>
            </body></html>"#;
        let index = Index::parse(html);
        let names: Vec<&str> = index.filenames().collect();
        assert_eq!(
            names,
            [
                "legacy-0.9.tar.gz",
                "plain-1.0.tar.gz",
                "single-1.0.tar.gz",
                "upper-2.0.tar.gz"
            ]
        );
        assert_eq!(
            index.hash("legacy-0.9.tar.gz"),
            Some(&Hash::new("sha256", "abcd"))
        );
        assert_eq!(index.hash("single-1.0.tar.gz"), None);
    }

    #[test]
    fn parse_keeps_unrecognized_fragment_as_hashless() {
        let index = Index::parse(r#"<a href="pkg-1.0.tar.gz#egg=pkg-1.0&x=1">pkg</a>"#);
        assert!(index.contains("pkg-1.0.tar.gz"));
        assert_eq!(index.hash("pkg-1.0.tar.gz"), None);
    }

    #[test]
    fn parse_garbage_is_empty() {
        assert!(Index::parse("not html at all").is_empty());
    }

    #[test]
    fn put_replaces_hash() {
        let mut index = Index::new();
        index.put("a.whl", None);
        index.put("a.whl", Some(sample_hash()));
        assert_eq!(index.len(), 1);
        assert_eq!(index.hash("a.whl"), Some(&sample_hash()));
    }

    #[test]
    fn remove_reports_presence() {
        let mut index = Index::new();
        index.put("a.whl", None);
        assert!(index.remove("a.whl"));
        assert!(!index.remove("a.whl"));
        assert!(index.is_empty());
    }

    #[test]
    fn hash_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.tar.gz");
        std::fs::write(&path, b"abc").unwrap();
        let hash = Hash::of_file(&path).unwrap();
        assert_eq!(hash.algorithm, "sha256");
        assert_eq!(hash.digest, crate::hash::sha256_bytes(b"abc"));
    }
}
