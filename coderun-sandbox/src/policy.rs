//! Advisory security policy for staged code
//!
//! This is not an isolation boundary. The scan flags references to disallowed
//! modules so callers and logs can see them; execution still proceeds.

use crate::config::ExecutionConfig;
use crate::resolver::Language;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One disallowed module reference found in source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyViolation {
    pub module: String,
    /// 1-based line number
    pub line: usize,
    pub snippet: String,
}

/// Disallowed-module policy derived from [`ExecutionConfig`]
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    enabled: bool,
    patterns: Vec<(String, Regex)>,
}

impl SecurityPolicy {
    pub fn new(enabled: bool, disallowed_modules: &[String]) -> Self {
        let patterns = disallowed_modules
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .filter_map(|module| {
                let escaped = regex::escape(module);
                // `import os`, `from os import x`, `import os.path`, and
                // dotted uses such as `os.system(`
                let pattern = format!(
                    r"(?:^|[^\w.])(?:import\s+|from\s+)?{}(?:$|[^\w])",
                    escaped
                );
                Regex::new(&pattern)
                    .ok()
                    .map(|re| (module.to_string(), re))
            })
            .collect();
        Self { enabled, patterns }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(config.security_mode, &config.disallowed_modules)
    }

    /// Disabled policy that never reports anything
    pub fn permissive() -> Self {
        Self {
            enabled: false,
            patterns: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Scan source for disallowed module references.
    ///
    /// Only Python sources are scanned; module names have no meaning for the
    /// other languages.
    pub fn scan(&self, language: Language, code: &str) -> Vec<PolicyViolation> {
        if !self.enabled || language != Language::Python {
            return Vec::new();
        }

        let mut violations = Vec::new();
        for (index, line) in code.lines().enumerate() {
            let code_part = line.split('#').next().unwrap_or("");
            for (module, re) in &self.patterns {
                if re.is_match(code_part) {
                    violations.push(PolicyViolation {
                        module: module.clone(),
                        line: index + 1,
                        snippet: line.trim().to_string(),
                    });
                }
            }
        }
        violations
    }
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self::from_config(&ExecutionConfig::default())
    }
}
