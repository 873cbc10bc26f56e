//! Language tag to OS command resolution

use crate::error::SandboxError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported source languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Shell,
    Bash,
    PowerShell,
    Java,
}

impl Language {
    /// Parse a language tag. Tags are trimmed and lower-cased; aliases map
    /// many-to-one.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match normalize_tag(tag).as_str() {
            "python" | "py" => Some(Language::Python),
            "javascript" | "js" => Some(Language::JavaScript),
            "sh" | "shell" => Some(Language::Shell),
            "bash" => Some(Language::Bash),
            "ps1" | "powershell" => Some(Language::PowerShell),
            "java" => Some(Language::Java),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Shell => "shell",
            Language::Bash => "bash",
            Language::PowerShell => "powershell",
            Language::Java => "java",
        }
    }

    /// Source file extension (without dot)
    pub fn extension(self, platform: Platform) -> &'static str {
        match self {
            Language::Python => "py",
            Language::JavaScript => "js",
            Language::Shell | Language::Bash if platform == Platform::Windows => "bat",
            Language::Shell | Language::Bash => "sh",
            Language::PowerShell => "ps1",
            Language::Java => "java",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lower-case and trim a language tag
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Operating system family commands are resolved for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    /// Other Unix-like systems
    Unix,
}

impl Platform {
    /// Platform this binary was compiled for
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Unix
        }
    }

    /// Conventional Python launcher name
    pub fn default_python(self) -> &'static str {
        match self {
            Platform::Windows => "python",
            _ => "python3",
        }
    }
}

/// macOS architecture selection for `arch(1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    Arm64,
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Arch {
    fn arch_flag(self) -> &'static str {
        match self {
            Arch::Arm64 => "-arm64",
            Arch::X86_64 => "-x86_64",
        }
    }
}

/// Outcome of resolving a language tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub language: Language,
    /// Ordered command prefixes; the staged file path is appended to one
    pub candidates: Vec<Vec<String>>,
    /// File extension (without dot)
    pub extension: String,
}

impl ResolvedCommand {
    /// Preferred command prefix
    pub fn primary(&self) -> &[String] {
        &self.candidates[0]
    }

    /// First candidate whose program is found on PATH, or the primary one
    pub fn select_available(&self) -> &[String] {
        self.candidates
            .iter()
            .find(|candidate| {
                candidate
                    .first()
                    .map(|program| which::which(program).is_ok())
                    .unwrap_or(false)
            })
            .map(|c| c.as_slice())
            .unwrap_or_else(|| self.primary())
    }

    /// Full command line for a staged file using the given prefix
    pub fn command_for(prefix: &[String], file: &str) -> Vec<String> {
        let mut tokens = prefix.to_vec();
        tokens.push(file.to_string());
        tokens
    }
}

/// Resolves language tags to concrete commands for one platform
#[derive(Debug, Clone)]
pub struct CommandResolver {
    platform: Platform,
    arch: Option<Arch>,
    python: Option<String>,
}

impl CommandResolver {
    pub fn new(platform: Platform, arch: Option<Arch>) -> Self {
        Self {
            platform,
            arch,
            python: None,
        }
    }

    /// Resolver for the host platform
    pub fn host() -> Self {
        Self::new(Platform::current(), None)
    }

    /// Override the primary Python interpreter
    pub fn with_python(mut self, interpreter: impl Into<String>) -> Self {
        self.python = Some(interpreter.into());
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn resolve(&self, tag: &str) -> Result<ResolvedCommand, SandboxError> {
        let language = Language::from_tag(tag)
            .ok_or_else(|| SandboxError::UnsupportedLanguage(normalize_tag(tag)))?;

        let windows = self.platform == Platform::Windows;
        let mut candidates: Vec<Vec<&str>> = match language {
            Language::Python => {
                let default = self.platform.default_python();
                let primary = self.python.as_deref().unwrap_or(default);
                let fallback = if windows { "python3" } else { "python" };
                vec![vec![primary], vec![fallback]]
            }
            Language::JavaScript => vec![vec!["node"]],
            Language::Shell | Language::Bash if windows => vec![vec!["cmd", "/C"]],
            Language::Shell => vec![vec!["sh"]],
            Language::Bash => vec![vec!["bash"], vec!["sh"]],
            Language::PowerShell if windows => {
                vec![vec!["powershell", "-File"], vec!["pwsh", "-File"]]
            }
            Language::PowerShell => vec![vec!["pwsh", "-File"]],
            Language::Java => {
                return Err(SandboxError::UnsupportedOperation(
                    "java requires a compile step and cannot be executed directly".to_string(),
                ))
            }
        };
        candidates.dedup();

        let wrapper: Vec<&str> = match (self.platform, self.arch) {
            (Platform::MacOs, Some(arch)) => vec!["arch", arch.arch_flag()],
            _ => Vec::new(),
        };

        let candidates: Vec<Vec<String>> = candidates
            .into_iter()
            .map(|c| {
                wrapper
                    .iter()
                    .chain(c.iter())
                    .map(|s| s.to_string())
                    .collect::<Vec<String>>()
            })
            .collect();

        Ok(ResolvedCommand {
            language,
            candidates,
            extension: language.extension(self.platform).to_string(),
        })
    }
}

/// Resolve a tag for an explicit platform and architecture hint
pub fn resolve(
    tag: &str,
    platform: Platform,
    arch: Option<Arch>,
) -> Result<ResolvedCommand, SandboxError> {
    CommandResolver::new(platform, arch).resolve(tag)
}
