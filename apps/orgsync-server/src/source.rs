//! Declared-state and live-state providers.
//!
//! The declared state is one YAML document in the checked-out reference
//! repository; a fresh copy is loaded for every reconciliation. The live
//! state normally comes from the platform API behind the [`LiveSource`]
//! seam; the shipped YAML implementation feeds plan and demo runs.
//! Fetching the reference repository itself (clone/fetch) happens outside
//! the daemon.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use orgsync_engine::{
    DeclaredOrg, DeclaredRepo, DeclaredRuleSet, DeclaredTeam, DeclaredUser, LiveSnapshot,
    OrgConfig,
};

/// Errors raised while loading declared or live state.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The document could not be read.
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML for the expected shape.
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// The declared organization together with its engine configuration.
#[derive(Debug, Clone, Default)]
pub struct SourceBundle {
    pub org: DeclaredOrg,
    pub config: OrgConfig,
}

/// Produces a fresh declared state per reconciliation.
pub trait DeclaredSource: Send + Sync {
    fn load(&self) -> Result<SourceBundle, SourceError>;
}

/// Produces a fresh live snapshot when the cache is cold or flushed.
pub trait LiveSource: Send + Sync {
    fn fetch(&self) -> Result<LiveSnapshot, SourceError>;
}

/// On-disk shape of the declared-state document.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct OrgDocument {
    users: BTreeMap<String, DeclaredUser>,
    external_users: BTreeMap<String, DeclaredUser>,
    teams: BTreeMap<String, DeclaredTeam>,
    repositories: BTreeMap<String, DeclaredRepo>,
    rulesets: BTreeMap<String, DeclaredRuleSet>,
    config: OrgConfig,
}

/// Parse a declared-state document.
///
/// Rulesets may omit their `name` field; the map key fills it in.
fn parse_declared(text: &str) -> Result<SourceBundle, serde_yaml::Error> {
    let document: OrgDocument = serde_yaml::from_str(text)?;

    let mut rulesets: BTreeMap<String, DeclaredRuleSet> = BTreeMap::new();
    for (name, mut ruleset) in document.rulesets {
        if ruleset.name.is_empty() {
            ruleset.name = name.clone();
        }
        rulesets.insert(name, ruleset);
    }

    Ok(SourceBundle {
        org: DeclaredOrg {
            users: document.users,
            external_users: document.external_users,
            teams: document.teams,
            repositories: document.repositories,
            rulesets,
        },
        config: document.config,
    })
}

/// Declared state read from one YAML file.
pub struct YamlSource {
    path: PathBuf,
}

impl YamlSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DeclaredSource for YamlSource {
    fn load(&self) -> Result<SourceBundle, SourceError> {
        let text = read_document(&self.path)?;
        parse_declared(&text).map_err(|source| SourceError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

/// Live snapshot read from one YAML file.
pub struct YamlLiveSource {
    path: PathBuf,
}

impl YamlLiveSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LiveSource for YamlLiveSource {
    fn fetch(&self) -> Result<LiveSnapshot, SourceError> {
        let text = read_document(&self.path)?;
        serde_yaml::from_str(&text).map_err(|source| SourceError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

fn read_document(path: &Path) -> Result<String, SourceError> {
    fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })
}
