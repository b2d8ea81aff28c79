//! Combined `source` fields such as `CRAN (R 4.3.1)` or `Github (owner/repo@ref)`.
//!
//! Grammar: a keyword, optional free text, and an optional parenthesized payload.

use envcast_schema::{GitHubRemote, Provenance};
use regex::Regex;
use std::sync::LazyLock;

static SOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<keyword>[A-Za-z][A-Za-z0-9.+-]*)[^(]*(?:\((?P<payload>[^)]*)\))?\s*$")
        .expect("valid source pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceField<'a> {
    pub keyword: &'a str,
    pub payload: Option<&'a str>,
}

impl SourceField<'_> {
    /// Provenance named by the keyword, case-insensitively.
    pub fn provenance(&self) -> Option<Provenance> {
        Provenance::from_keyword(self.keyword)
    }

    /// The `owner/repo@ref` payload of a GitHub source.
    pub fn github_remote(&self) -> Option<GitHubRemote> {
        if self.provenance() != Some(Provenance::GitHub) {
            return None;
        }
        GitHubRemote::parse(self.payload?)
    }
}

pub fn parse(input: &str) -> Option<SourceField<'_>> {
    let caps = SOURCE_RE.captures(input)?;
    let keyword = caps.name("keyword")?.as_str();
    let payload = caps
        .name("payload")
        .map(|m| m.as_str().trim())
        .filter(|p| !p.is_empty());
    Some(SourceField { keyword, payload })
}
