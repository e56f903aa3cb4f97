//! Rule API: severities, findings and the [`Rule`] trait, plus the
//! suppression parser and the engine that runs rules over a graph.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BoxError;

pub mod context;
pub mod engine;
pub mod suppression;

pub use context::RuleContext;
pub use engine::{RuleEngine, RunOptions, RunResult, RunStats};
pub use suppression::{Directive, DirectiveKind, SuppressionParser};

/// Finding severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|sev| sev.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown severity `{s}`"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RuleCategory {
    Architecture,
    Complexity,
    Correctness,
    Style,
    Security,
    Performance,
}

/// One problem a rule reports. `rule` and `severity` are stamped by the engine
/// when the rule leaves them unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub message: String,
    pub file: String,
    /// 1-based.
    pub line: usize,
    /// 1-based.
    pub column: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl Finding {
    pub fn new(file: impl Into<String>, line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: file.into(),
            line,
            column,
            rule: None,
            severity: None,
            fix: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    /// Severity after engine stamping; findings without one count as warnings.
    pub fn effective_severity(&self) -> Severity {
        self.severity.unwrap_or(Severity::Warning)
    }
}

/// An analysis rule. Names are `plugin/rule` and globally unique.
#[async_trait]
pub trait Rule: Send + Sync {
    fn name(&self) -> &str;

    fn severity(&self) -> Severity;

    fn description(&self) -> &str {
        ""
    }

    fn category(&self) -> RuleCategory;

    /// Inspect one file. An `Err` becomes a single warning finding naming the rule.
    async fn check(&self, ctx: &RuleContext<'_>) -> Result<Vec<Finding>, BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order_and_parsing() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Error < Severity::Critical);
        assert_eq!("CRITICAL".parse::<Severity>(), Ok(Severity::Critical));
        assert!("fatal".parse::<Severity>().is_err());
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"warning\"");
    }

    #[test]
    fn finding_serialization_skips_unset_fields() {
        let finding = Finding::new("src/a.ts", 3, 7, "too deep");
        let json = serde_json::to_string(&finding).unwrap();
        assert_eq!(json, r#"{"message":"too deep","file":"src/a.ts","line":3,"column":7}"#);

        let stamped = finding.with_rule("core/x").with_severity(Severity::Error).with_fix("flatten");
        let json = serde_json::to_string(&stamped).unwrap();
        assert!(json.contains(r#""rule":"core/x""#));
        assert!(json.contains(r#""severity":"error""#));
        assert!(json.contains(r#""fix":"flatten""#));
    }
}
