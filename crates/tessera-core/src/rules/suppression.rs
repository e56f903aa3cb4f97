//! Inline suppression comments.
//!
//! ```text
//! // tessera-disable-next-line core/max-complexity
//! // tessera-disable core/no-import-cycles, core/other -- legacy module
//! // tessera-enable core/no-import-cycles
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub const DEFAULT_PREFIX: &str = "tessera";

static DEFAULT_PATTERN: LazyLock<Regex> = LazyLock::new(|| directive_pattern(DEFAULT_PREFIX));

static REASON_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)--(?:\s|$)").expect("Invalid reason separator regex")
});

fn directive_pattern(prefix: &str) -> Regex {
    let pattern = format!(
        r"//\s*{}-(disable-next-line|disable|enable)(?:\s+(.*))?$",
        regex::escape(prefix)
    );
    Regex::new(&pattern).expect("Invalid suppression directive regex")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectiveKind {
    DisableNextLine,
    Disable,
    Enable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub rules: Vec<String>,
    pub reason: Option<String>,
    /// 1-based line of the comment itself.
    pub line: usize,
}

/// Line scanner for suppression directives.
#[derive(Debug, Clone)]
pub struct SuppressionParser {
    pattern: Regex,
}

impl Default for SuppressionParser {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.clone(),
        }
    }
}

impl SuppressionParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser for `// <prefix>-disable ...` comments.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            pattern: directive_pattern(prefix),
        }
    }

    /// Every directive in `text`, in file order. Directives naming no rule are dropped.
    pub fn parse(&self, text: &str) -> Vec<Directive> {
        text.lines()
            .enumerate()
            .filter_map(|(idx, line)| {
                let caps = self.pattern.captures(line)?;
                let kind = match caps.get(1)?.as_str() {
                    "disable-next-line" => DirectiveKind::DisableNextLine,
                    "disable" => DirectiveKind::Disable,
                    _ => DirectiveKind::Enable,
                };
                let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                let (names, reason) = match REASON_SEPARATOR.find(rest) {
                    Some(sep) => {
                        let reason = rest[sep.end()..].trim();
                        (
                            &rest[..sep.start()],
                            (!reason.is_empty()).then(|| reason.to_string()),
                        )
                    }
                    None => (rest, None),
                };
                let rules: Vec<String> = names
                    .split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
                if rules.is_empty() {
                    return None;
                }
                Some(Directive {
                    kind,
                    rules,
                    reason,
                    line: idx + 1,
                })
            })
            .collect()
    }
}

/// Whether `rule` is muted at 1-based `line`.
///
/// `disable-next-line` covers only the line after the comment; `disable` and
/// `enable` switch the rule off and on from their own line onward, the last
/// applicable one winning.
pub fn is_suppressed(directives: &[Directive], rule: &str, line: usize) -> bool {
    let mut region_active = false;
    for directive in directives {
        if !directive.rules.iter().any(|name| name == rule) {
            continue;
        }
        match directive.kind {
            DirectiveKind::DisableNextLine => {
                if line == directive.line + 1 {
                    return true;
                }
            }
            DirectiveKind::Disable if directive.line <= line => region_active = true,
            DirectiveKind::Enable if directive.line <= line => region_active = false,
            _ => {}
        }
    }
    region_active
}
