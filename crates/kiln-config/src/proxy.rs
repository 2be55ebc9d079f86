//! Dev-server proxy table.
//!
//! Entries are kept in declaration order and scanned linearly; the first
//! rule whose context matches a request path owns that request.

use std::fmt;
use std::sync::Arc;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ProxyConfigError;

/// Settings-file form of a proxy entry: a bare target or an options object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProxyEntry {
    Target(String),
    Options(ProxyOptions),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyOptions {
    pub target: Option<String>,
    pub filter: Option<ProxyFilter>,
    pub change_origin: bool,
    pub path_rewrite: IndexMap<String, String>,
    pub headers: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProxyFilter {
    One(String),
    Many(Vec<String>),
}

impl ProxyFilter {
    fn patterns(&self) -> Vec<String> {
        match self {
            ProxyFilter::One(pattern) => vec![pattern.clone()],
            ProxyFilter::Many(patterns) => patterns.clone(),
        }
    }
}

pub type PathPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Which request paths a rule claims.
#[derive(Clone)]
pub enum ProxyContext {
    /// Plain string prefix of the request path
    Prefix(String),
    /// Glob patterns; `!`-prefixed patterns exclude
    Glob { include: GlobSet, exclude: GlobSet },
    Predicate(PathPredicate),
}

impl fmt::Debug for ProxyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyContext::Prefix(prefix) => f.debug_tuple("Prefix").field(prefix).finish(),
            ProxyContext::Glob { include, exclude } => f
                .debug_struct("Glob")
                .field("include", &include.len())
                .field("exclude", &exclude.len())
                .finish(),
            ProxyContext::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl ProxyContext {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            ProxyContext::Prefix(prefix) => path.starts_with(prefix.as_str()),
            ProxyContext::Glob { include, exclude } => {
                (include.is_empty() || include.is_match(path)) && !exclude.is_match(path)
            }
            ProxyContext::Predicate(predicate) => predicate(path),
        }
    }

    fn from_patterns(patterns: &[String]) -> Result<Self, String> {
        if let [single] = patterns {
            if !is_glob(single) {
                return Ok(ProxyContext::Prefix(single.clone()));
            }
        }

        let mut include = GlobSetBuilder::new();
        let mut exclude = GlobSetBuilder::new();
        for pattern in patterns {
            let (target, source) = match pattern.strip_prefix('!') {
                Some(negated) => (&mut exclude, negated),
                None => (&mut include, pattern.as_str()),
            };
            let glob = GlobBuilder::new(source)
                .literal_separator(true)
                .build()
                .map_err(|e| format!("invalid filter pattern '{pattern}': {e}"))?;
            target.add(glob);
        }

        Ok(ProxyContext::Glob {
            include: include.build().map_err(|e| e.to_string())?,
            exclude: exclude.build().map_err(|e| e.to_string())?,
        })
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.starts_with('!') || pattern.contains(['*', '?', '[', '{'])
}

#[derive(Debug, Clone)]
pub struct ProxyRule {
    /// Key the rule was declared under, used in logs
    pub label: String,
    pub context: ProxyContext,
    pub target: Url,
    pub change_origin: bool,
    pub path_rewrite: Vec<(Regex, String)>,
    pub headers: IndexMap<String, String>,
}

impl ProxyRule {
    pub fn new(label: impl Into<String>, context: ProxyContext, target: Url) -> Self {
        Self {
            label: label.into(),
            context,
            target,
            change_origin: false,
            path_rewrite: Vec::new(),
            headers: IndexMap::new(),
        }
    }

    pub fn from_entry(label: &str, entry: &ProxyEntry) -> Result<Self, ProxyConfigError> {
        let skipped = |reason: String| ProxyConfigError {
            context: label.to_string(),
            reason,
        };

        let options = match entry {
            ProxyEntry::Target(target) => ProxyOptions {
                target: Some(target.clone()),
                ..ProxyOptions::default()
            },
            ProxyEntry::Options(options) => options.clone(),
        };

        let raw_target = options
            .target
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| skipped("missing target".to_string()))?;
        let target = parse_target(raw_target).map_err(skipped)?;

        let patterns = match &options.filter {
            Some(filter) => filter.patterns(),
            None => vec![label.to_string()],
        };
        let context = ProxyContext::from_patterns(&patterns).map_err(skipped)?;

        let path_rewrite = options
            .path_rewrite
            .iter()
            .map(|(pattern, replacement)| {
                Regex::new(pattern)
                    .map(|re| (re, replacement.clone()))
                    .map_err(|e| skipped(format!("invalid pathRewrite '{pattern}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            label: label.to_string(),
            context,
            target,
            change_origin: options.change_origin,
            path_rewrite,
            headers: options.headers,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.context.matches(path)
    }

    /// Apply the first matching rewrite, if any.
    pub fn rewrite_path(&self, path: &str) -> String {
        self.path_rewrite
            .iter()
            .find(|(re, _)| re.is_match(path))
            .map(|(re, replacement)| re.replace(path, replacement.as_str()).into_owned())
            .unwrap_or_else(|| path.to_string())
    }

    /// Upstream URL for a request path and optional query string.
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> Url {
        let rewritten = self.rewrite_path(path);
        let base = self.target.path().trim_end_matches('/');
        let joined = if rewritten.starts_with('/') {
            format!("{base}{rewritten}")
        } else {
            format!("{base}/{rewritten}")
        };

        let mut url = self.target.clone();
        url.set_path(&joined);
        url.set_query(query.filter(|q| !q.is_empty()));
        url
    }

    /// `host[:port]` of the target, for `changeOrigin`.
    pub fn target_authority(&self) -> String {
        let host = self.target.host_str().unwrap_or_default();
        match self.target.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }
}

fn parse_target(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid target '{raw}': {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported target scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err(format!("target '{raw}' has no host"));
    }
    Ok(url)
}

#[derive(Debug, Clone, Default)]
pub struct ProxyTable {
    rules: Vec<ProxyRule>,
}

impl ProxyTable {
    /// Build rules in declaration order. Malformed entries are returned
    /// separately and left out of the table.
    pub fn build(entries: &IndexMap<String, ProxyEntry>) -> (Self, Vec<ProxyConfigError>) {
        let mut rules = Vec::with_capacity(entries.len());
        let mut skipped = Vec::new();

        for (label, entry) in entries {
            match ProxyRule::from_entry(label, entry) {
                Ok(rule) => rules.push(rule),
                Err(err) => {
                    tracing::warn!("{err}");
                    skipped.push(err);
                }
            }
        }

        (Self { rules }, skipped)
    }

    pub fn from_rules(rules: Vec<ProxyRule>) -> Self {
        Self { rules }
    }

    pub fn push(&mut self, rule: ProxyRule) {
        self.rules.push(rule);
    }

    pub fn first_match(&self, path: &str) -> Option<&ProxyRule> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    pub fn rules(&self) -> &[ProxyRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
