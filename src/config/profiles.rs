//! Profile documents and the live configuration snapshot
//!
//! A profile document lists quality profiles, shared regex configs and naming
//! configurations as tagged entries:
//!
//! ```yaml
//! default_profile: HD
//! entries:
//!   - type: quality
//!     name: HD
//!     resolution: [{ name: 1080p, priority: 3 }]
//!   - type: regex
//!     name: no-cam
//!     rejected: ["\\bcam\\b"]
//!   - type: naming
//!     name: movies
//!     kind: movie
//!     template: "{{.Dbmovie.Title}} ({{.Dbmovie.Year}})/{{.Dbmovie.Title}}"
//! ```
//!
//! Documents compile into an immutable [ConfigSnapshot]. The [ConfigStore]
//! swaps whole snapshots, so readers always see one consistent version.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::PatternCompileError;
use crate::services::naming::{NamingTemplate, SchemaType, verify};
use crate::services::quality_profiles::{CompiledProfile, QualityProfile, RegexConfig};
use crate::services::release_parser::MediaKind;

/// A naming configuration as stored in a profile document.
///
/// Either `folder` + `file` or a combined `template` split at its last `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConfig {
    pub name: String,
    #[serde(default)]
    pub kind: MediaKind,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
}

impl NamingConfig {
    pub fn naming_template(&self) -> Option<NamingTemplate> {
        match (&self.folder, &self.file, &self.template) {
            (folder, Some(file), _) => Some(NamingTemplate::new(
                folder.clone().unwrap_or_default(),
                file.clone(),
            )),
            (_, None, Some(combined)) => Some(NamingTemplate::split(combined)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConfigEntry {
    Quality(QualityProfile),
    Regex(RegexConfig),
    Naming(NamingConfig),
}

impl ConfigEntry {
    fn kind(&self) -> &'static str {
        match self {
            ConfigEntry::Quality(_) => "quality",
            ConfigEntry::Regex(_) => "regex",
            ConfigEntry::Naming(_) => "naming",
        }
    }

    fn name(&self) -> &str {
        match self {
            ConfigEntry::Quality(p) => &p.name,
            ConfigEntry::Regex(r) => &r.name,
            ConfigEntry::Naming(n) => &n.name,
        }
    }
}

/// A whole profile document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub default_profile: Option<String>,
    #[serde(default)]
    pub entries: Vec<ConfigEntry>,
}

impl ConfigDocument {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Invalid YAML profile document")
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Invalid JSON profile document")
    }

    /// Read a document; `.json` files are JSON, everything else YAML
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile document {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let document = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_yaml(&content)
        };
        document.with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// A problem found while compiling a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ConfigIssue {
    #[error("duplicate {kind} entry '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("profile '{profile}' references unknown regex config '{regex_config}'")]
    UnknownRegexConfig {
        profile: String,
        regex_config: String,
    },

    #[error("profile '{profile}': {error}")]
    InvalidPattern {
        profile: String,
        error: PatternCompileError,
    },

    #[error("naming '{name}' needs a file template or a combined template")]
    IncompleteNaming { name: String },

    #[error("naming '{name}' is invalid: {}", .errors.join("; "))]
    InvalidNamingTemplate { name: String, errors: Vec<String> },

    #[error("default profile '{name}' is not defined")]
    UnknownDefaultProfile { name: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration rejected with {} issue(s): {}", .0.len(), join_issues(.0))]
    Invalid(Vec<ConfigIssue>),

    #[error("no profile document path configured")]
    NoSource,

    #[error(transparent)]
    Load(#[from] anyhow::Error),
}

fn join_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A compiled naming configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamingEntry {
    pub name: String,
    pub kind: MediaKind,
    pub template: NamingTemplate,
}

/// Immutable, compiled view of one profile document
#[derive(Debug, Default)]
pub struct ConfigSnapshot {
    profiles: BTreeMap<String, CompiledProfile>,
    regex_configs: BTreeMap<String, RegexConfig>,
    naming: BTreeMap<String, NamingEntry>,
    default_profile: Option<String>,
    issues: Vec<ConfigIssue>,
}

impl ConfigSnapshot {
    /// Compile everything usable from `document`, recording what is not.
    ///
    /// Duplicate names keep the first entry. Broken patterns stay in their
    /// profile (reported per evaluation); broken naming templates are left out.
    pub fn from_document(document: &ConfigDocument) -> Self {
        let mut snapshot = Self::default();
        let mut seen: BTreeSet<(&'static str, &str)> = BTreeSet::new();
        let mut profiles = Vec::new();

        for entry in &document.entries {
            if !seen.insert((entry.kind(), entry.name())) {
                snapshot.issues.push(ConfigIssue::DuplicateName {
                    kind: entry.kind(),
                    name: entry.name().to_string(),
                });
                continue;
            }
            match entry {
                ConfigEntry::Quality(profile) => profiles.push(profile),
                ConfigEntry::Regex(regex) => {
                    snapshot.regex_configs.insert(regex.name.clone(), regex.clone());
                }
                ConfigEntry::Naming(naming) => snapshot.add_naming(naming),
            }
        }

        // Profiles last, so regex configs may be declared after the profile using them
        for profile in profiles {
            let shared = match &profile.regex_config {
                Some(name) => match snapshot.regex_configs.get(name) {
                    Some(regex) => Some(regex),
                    None => {
                        snapshot.issues.push(ConfigIssue::UnknownRegexConfig {
                            profile: profile.name.clone(),
                            regex_config: name.clone(),
                        });
                        None
                    }
                },
                None => None,
            };
            let compiled = CompiledProfile::compile(profile, shared);
            for error in compiled.compile_errors() {
                snapshot.issues.push(ConfigIssue::InvalidPattern {
                    profile: profile.name.clone(),
                    error: error.clone(),
                });
            }
            snapshot.profiles.insert(profile.name.clone(), compiled);
        }

        snapshot.default_profile = document.default_profile.clone();
        if let Some(ref name) = snapshot.default_profile {
            if !snapshot.profiles.contains_key(name) {
                snapshot
                    .issues
                    .push(ConfigIssue::UnknownDefaultProfile { name: name.clone() });
            }
        }

        snapshot
    }

    fn add_naming(&mut self, naming: &NamingConfig) {
        let Some(template) = naming.naming_template() else {
            self.issues.push(ConfigIssue::IncompleteNaming {
                name: naming.name.clone(),
            });
            return;
        };

        let mut errors = Vec::new();
        for part in [&template.folder, &template.file] {
            // A fixed folder such as "Movies" is fine; syntax is left to the parser
            if !part.contains("{{") && !part.contains("}}") {
                continue;
            }
            errors.extend(verify(part, SchemaType::Parser).errors);
        }
        if let Err(e) = template.parse() {
            errors.push(e.to_string());
        }
        if !errors.is_empty() {
            self.issues.push(ConfigIssue::InvalidNamingTemplate {
                name: naming.name.clone(),
                errors,
            });
            return;
        }

        self.naming.insert(
            naming.name.clone(),
            NamingEntry {
                name: naming.name.clone(),
                kind: naming.kind,
                template,
            },
        );
    }

    /// Strict compile: any issue rejects the document
    pub fn validated(document: &ConfigDocument) -> Result<Self, ConfigError> {
        let snapshot = Self::from_document(document);
        if snapshot.issues.is_empty() {
            Ok(snapshot)
        } else {
            Err(ConfigError::Invalid(snapshot.issues))
        }
    }

    pub fn issues(&self) -> &[ConfigIssue] {
        &self.issues
    }

    pub fn profile(&self, name: &str) -> Option<&CompiledProfile> {
        self.profiles.get(name)
    }

    /// The named profile, or the document's default when `name` is `None`
    pub fn profile_or_default(&self, name: Option<&str>) -> Option<&CompiledProfile> {
        name.or(self.default_profile.as_deref())
            .and_then(|n| self.profile(n))
    }

    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn regex_config(&self, name: &str) -> Option<&RegexConfig> {
        self.regex_configs.get(name)
    }

    pub fn naming(&self, name: &str) -> Option<&NamingEntry> {
        self.naming.get(name)
    }

    pub fn naming_names(&self) -> impl Iterator<Item = &str> {
        self.naming.keys().map(String::as_str)
    }

    /// First naming configuration (by name) for `kind`
    pub fn naming_for_kind(&self, kind: MediaKind) -> Option<&NamingEntry> {
        self.naming.values().find(|n| n.kind == kind)
    }

    pub fn default_profile(&self) -> Option<&str> {
        self.default_profile.as_deref()
    }
}

/// Holds the current snapshot and replaces it atomically on reload
#[derive(Debug)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    default_override: Option<String>,
    current: RwLock<Arc<ConfigSnapshot>>,
}

impl ConfigStore {
    pub fn new(snapshot: ConfigSnapshot) -> Self {
        Self {
            path: None,
            default_override: None,
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Load the document at `path`; a missing file starts with an empty snapshot
    pub fn open(path: impl Into<PathBuf>, default_override: Option<String>) -> Result<Self, ConfigError> {
        let path = path.into();
        let snapshot = if path.exists() {
            Self::load_strict(&path, default_override.clone())?
        } else {
            warn!(path = %path.display(), "Profile document not found, starting without profiles");
            ConfigSnapshot::default()
        };
        Ok(Self {
            path: Some(path),
            default_override,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    fn load_strict(path: &Path, default_override: Option<String>) -> Result<ConfigSnapshot, ConfigError> {
        let mut document = ConfigDocument::load(path)?;
        if default_override.is_some() {
            document.default_profile = default_override;
        }
        ConfigSnapshot::validated(&document)
    }

    /// The snapshot in effect right now
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current.read().clone()
    }

    /// Swap in a new snapshot
    pub fn install(&self, snapshot: ConfigSnapshot) -> Arc<ConfigSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write() = snapshot.clone();
        snapshot
    }

    /// Re-read the document. On any issue the current snapshot stays in effect.
    pub fn reload(&self) -> Result<Arc<ConfigSnapshot>, ConfigError> {
        let path = self.path.as_deref().ok_or(ConfigError::NoSource)?;
        match Self::load_strict(path, self.default_override.clone()) {
            Ok(snapshot) => {
                info!(
                    path = %path.display(),
                    profiles = snapshot.profile_count(),
                    "Reloaded profile document"
                );
                Ok(self.install(snapshot))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Rejected profile document reload");
                Err(e)
            }
        }
    }
}
