//! File-transform rules and their ordered, first-match-wins evaluation.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};

/// Whether processed style content becomes its own artifact or is injected
/// at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleOutput {
    Extract,
    Inline,
}

impl StyleOutput {
    pub fn from_extract(extract: bool) -> Self {
        if extract {
            StyleOutput::Extract
        } else {
            StyleOutput::Inline
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum TransformKind {
    NormalizeCss,
    Preprocess { lang: String },
    ExtractOrInline { mode: StyleOutput },
    EmitAssetUrl,
    Lint,
    Transpile,
    SingleFileComponent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStep {
    pub kind: TransformKind,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub options: IndexMap<String, Value>,
}

impl TransformStep {
    pub fn new(kind: TransformKind) -> Self {
        Self {
            kind,
            options: IndexMap::new(),
        }
    }

    pub fn with_option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforce {
    Pre,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRule {
    /// Regular expression matched against the asset path
    pub test: String,

    pub steps: Vec<TransformStep>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce: Option<Enforce>,
}

impl PipelineRule {
    pub fn new(test: impl Into<String>, steps: Vec<TransformStep>) -> Self {
        Self {
            test: test.into(),
            steps,
            include: Vec::new(),
            exclude: Vec::new(),
            enforce: None,
        }
    }

    pub fn include(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.include.extend(paths);
        self
    }

    pub fn exclude(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.exclude.extend(paths);
        self
    }

    pub fn enforce_pre(mut self) -> Self {
        self.enforce = Some(Enforce::Pre);
        self
    }

    /// The extract-or-inline mode this rule ends with, if it is a style rule.
    pub fn style_output(&self) -> Option<StyleOutput> {
        match self.steps.last().map(|step| &step.kind) {
            Some(TransformKind::ExtractOrInline { mode }) => Some(*mode),
            _ => None,
        }
    }

    fn in_scope(&self, path: &Path) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| path.starts_with(p));
        included && !self.exclude.iter().any(|p| path.starts_with(p))
    }
}

/// A rule list with its patterns compiled, scanned in declaration order.
#[derive(Debug)]
pub struct RuleSet<'a> {
    rules: Vec<(&'a PipelineRule, Regex)>,
}

impl<'a> RuleSet<'a> {
    pub fn compile(rules: &'a [PipelineRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| {
                Regex::new(&rule.test)
                    .map(|re| (rule, re))
                    .map_err(|e| ConfigError::InvalidRulePattern {
                        pattern: rule.test.clone(),
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    fn matching(&self, path: &Path) -> impl Iterator<Item = &'a PipelineRule> + '_ {
        let subject = path.to_string_lossy().replace('\\', "/");
        let path = path.to_path_buf();
        self.rules
            .iter()
            .filter(move |(rule, re)| re.is_match(&subject) && rule.in_scope(&path))
            .map(|(rule, _)| *rule)
    }

    /// First non-pre rule matching `path`. `None` means pass through unmodified.
    pub fn first_match(&self, path: &Path) -> Option<&'a PipelineRule> {
        self.matching(path).find(|rule| rule.enforce.is_none())
    }

    /// Pre-phase rules (lint) that apply to `path`, in declaration order.
    pub fn pre_rules(&self, path: &Path) -> Vec<&'a PipelineRule> {
        self.matching(path)
            .filter(|rule| rule.enforce == Some(Enforce::Pre))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
