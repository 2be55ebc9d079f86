//! Toolchain version gate.
//!
//! Before `start` or `build` does anything, the installed `node` and `npm`
//! are compared against the `engines` field of `package.json`. Every
//! violation is collected and reported at once.
//!
//! Ranges use npm syntax, which is looser than what the `semver` crate
//! accepts, so they are rewritten first:
//!
//! - `a || b` alternatives
//! - hyphen ranges (`1.0.0 - 2.0.0`)
//! - x-ranges and partial versions (`1.x`, `1.2`, `*`)
//! - space-separated comparators (`>= 2.1.2 < 3.0.0`)
//! - bare versions, which npm treats as exact

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use owo_colors::OwoColorize;
use semver::{Version, VersionReq};
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::{PreconditionError, Result, ResultExt, VersionViolation};

const PACKAGE_JSON: &str = "package.json";
const OPERATOR_CHARS: &str = "<>=~^";

/// Shown as the current version of a required tool that isn't installed.
pub const NOT_INSTALLED: &str = "not installed";

/// One `engines` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequirement {
    pub tool: String,
    pub range: String,
    /// Tools that may be absent without failing the gate
    pub optional: bool,
}

/// Reports the installed version of a tool.
#[async_trait]
pub trait VersionProbe: Send + Sync {
    /// `None` when the tool is not installed.
    async fn version(&self, tool: &str) -> Option<String>;
}

/// Runs `<tool> --version`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandProbe;

#[async_trait]
impl VersionProbe for CommandProbe {
    async fn version(&self, tool: &str) -> Option<String> {
        let output = Command::new(tool).arg("--version").output().await.ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let version = clean_version(text.lines().next()?);
        (!version.is_empty()).then(|| version.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
    #[serde(default)]
    engines: Engines,
}

#[derive(Debug, Default, Deserialize)]
struct Engines {
    node: Option<String>,
    npm: Option<String>,
}

pub struct VersionGate<P = CommandProbe> {
    root: PathBuf,
    probe: P,
}

impl VersionGate<CommandProbe> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_probe(root, CommandProbe)
    }
}

impl<P: VersionProbe> VersionGate<P> {
    pub fn with_probe(root: impl Into<PathBuf>, probe: P) -> Self {
        Self {
            root: root.into(),
            probe,
        }
    }

    /// Requirements declared in `package.json`. A missing file or field
    /// means there is nothing to check.
    pub fn requirements(&self) -> Result<Vec<ToolRequirement>> {
        read_requirements(&self.root.join(PACKAGE_JSON))
    }

    /// Every requirement the installed tools violate.
    pub async fn violations(&self) -> Result<Vec<VersionViolation>> {
        let mut violations = Vec::new();

        for requirement in self.requirements()? {
            let current = match self.probe.version(&requirement.tool).await {
                Some(version) => version,
                None if requirement.optional => {
                    debug!(tool = %requirement.tool, "not installed, skipping version check");
                    continue;
                }
                None => NOT_INSTALLED.to_string(),
            };

            debug!(tool = %requirement.tool, %current, required = %requirement.range, "checking version");
            if !satisfies(&current, &requirement.range) {
                violations.push(VersionViolation {
                    tool: requirement.tool,
                    current,
                    required: requirement.range,
                });
            }
        }

        Ok(violations)
    }

    /// Fail with every violation listed, after printing them.
    pub async fn check(&self) -> Result<()> {
        let violations = self.violations().await?;
        if violations.is_empty() {
            return Ok(());
        }
        print_violations(&violations);
        Err(PreconditionError { violations }.into())
    }
}

fn read_requirements(path: &Path) -> Result<Vec<ToolRequirement>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).context(format!("Failed to read {}", path.display())),
    };
    let manifest: PackageManifest = serde_json::from_str(&content)
        .with_hint(format!("{} is not valid JSON", path.display()))?;

    let mut requirements = Vec::new();
    if let Some(range) = manifest.engines.node {
        requirements.push(ToolRequirement {
            tool: "node".to_string(),
            range,
            optional: false,
        });
    }
    if let Some(range) = manifest.engines.npm {
        requirements.push(ToolRequirement {
            tool: "npm".to_string(),
            range,
            optional: true,
        });
    }
    Ok(requirements)
}

fn print_violations(violations: &[VersionViolation]) {
    eprintln!();
    eprintln!(
        "{}",
        "To use this project, update the following tools:".yellow()
    );
    eprintln!();
    for violation in violations {
        eprintln!(
            "  {}: {} should be {}",
            violation.tool,
            violation.current.red(),
            violation.required.green()
        );
    }
    eprintln!();
}

/// Whether `version` satisfies the npm-style `range`. Unparseable input
/// never satisfies.
pub fn satisfies(version: &str, range: &str) -> bool {
    let Ok(version) = Version::parse(clean_version(version)) else {
        return false;
    };
    match parse_range(range) {
        Ok(alternatives) => alternatives.iter().any(|req| req.matches(&version)),
        Err(_) => false,
    }
}

/// Parse an npm range into its `||` alternatives.
pub fn parse_range(range: &str) -> std::result::Result<Vec<VersionReq>, semver::Error> {
    range
        .split("||")
        .map(|alternative| VersionReq::parse(&to_cargo_range(alternative)))
        .collect()
}

fn clean_version(version: &str) -> &str {
    version.trim().trim_start_matches('=').trim_start_matches('v')
}

fn to_cargo_range(range: &str) -> String {
    let range = range.trim();
    if range.is_empty() {
        return "*".to_string();
    }

    if let Some((low, high)) = range.split_once(" - ") {
        return format!(">={}, <={}", clean_version(low), clean_version(high));
    }

    comparators(range)
        .iter()
        .map(|comparator| convert_comparator(comparator))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Split on whitespace, gluing a bare operator onto the version after it.
fn comparators(range: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut pending = String::new();
    for token in range.split_whitespace() {
        if token.chars().all(|c| OPERATOR_CHARS.contains(c)) {
            pending.push_str(token);
        } else {
            out.push(format!("{pending}{token}"));
            pending.clear();
        }
    }
    if !pending.is_empty() {
        out.push(pending);
    }
    out
}

fn convert_comparator(comparator: &str) -> String {
    let split = comparator
        .find(|c: char| !OPERATOR_CHARS.contains(c))
        .unwrap_or(comparator.len());
    let (op, version) = comparator.split_at(split);
    let version = version.trim_start_matches('v');

    if op.is_empty() || op == "=" {
        return x_range(version);
    }
    if version.split('.').any(is_wildcard) {
        // A partial version after an operator already covers the dropped parts
        let parts: Vec<&str> = version
            .split('.')
            .take_while(|part| !is_wildcard(part))
            .collect();
        if parts.is_empty() {
            return "*".to_string();
        }
        return format!("{op}{}", parts.join("."));
    }
    format!("{op}{version}")
}

/// `1.x` and `1` cover a major, `1.2.x` and `1.2` a minor; a full version
/// is exact.
fn x_range(version: &str) -> String {
    let parts: Vec<&str> = version
        .split('.')
        .take_while(|part| !is_wildcard(part))
        .collect();

    match parts.as_slice() {
        [] => "*".to_string(),
        [major] => match major.parse::<u64>() {
            Ok(m) => format!(">={m}.0.0, <{}.0.0", m + 1),
            Err(_) => version.to_string(),
        },
        [major, minor] => match (major.parse::<u64>(), minor.parse::<u64>()) {
            (Ok(m), Ok(n)) => format!(">={m}.{n}.0, <{m}.{}.0", n + 1),
            _ => version.to_string(),
        },
        _ => format!("={version}"),
    }
}

fn is_wildcard(part: &str) -> bool {
    matches!(part, "x" | "X" | "*")
}
