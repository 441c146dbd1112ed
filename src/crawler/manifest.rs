// src/crawler/manifest.rs

//! Parsing of `package.json` manifests
//!
//! Manifests in the wild are loosely shaped: `license` may be a string, a
//! `{ "type": ... }` object or a legacy array, `author` may be a string or
//! an object, and so on. Every polymorphic field is read leniently so that
//! one odd manifest does not abort an audit that only needs its name and
//! version.

use crate::error::{Error, Result};
use crate::record::{DependencyRecord, License};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use url::Url;

/// File name of a module manifest
pub const MANIFEST_FILE: &str = "package.json";

/// Maximum number of contributors listed when there is no author
const MAX_CONTRIBUTORS: usize = 3;

/// A parsed `package.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub version: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,

    #[serde(default)]
    pub license: Option<LicenseField>,

    /// Pre-SPDX manifests list licenses under `licenses`
    #[serde(default)]
    pub licenses: Option<LicenseField>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub homepage: Option<String>,

    #[serde(default)]
    pub author: Option<PersonField>,

    #[serde(default, deserialize_with = "lenient_people")]
    pub contributors: Vec<PersonField>,

    #[serde(default)]
    pub repository: Option<RepositoryField>,

    /// Tarball the package manager fetched this module from
    #[serde(default, rename = "_resolved", deserialize_with = "lenient_string")]
    pub resolved: Option<String>,

    #[serde(default, deserialize_with = "lenient_map")]
    pub dependencies: BTreeMap<String, String>,

    #[serde(default, rename = "devDependencies", deserialize_with = "lenient_map")]
    pub dev_dependencies: BTreeMap<String, String>,

    #[serde(default, rename = "optionalDependencies", deserialize_with = "lenient_map")]
    pub optional_dependencies: BTreeMap<String, String>,
}

/// The `license` field in its three historical shapes
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LicenseField {
    Text(String),
    Typed {
        #[serde(rename = "type")]
        kind: String,
    },
    Legacy(Vec<LicenseField>),
    Other(Value),
}

impl LicenseField {
    /// Flatten to a single expression; legacy arrays are joined with `, `
    pub fn normalize(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Typed { kind } => kind.clone(),
            Self::Legacy(entries) => entries
                .iter()
                .map(LicenseField::normalize)
                .filter(|lic| !lic.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
            Self::Other(_) => String::new(),
        }
    }
}

/// An `author` or contributor entry
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PersonField {
    /// `"Name <email> (url)"`
    Text(String),
    Object {
        #[serde(default, deserialize_with = "lenient_string")]
        name: Option<String>,
    },
    Other(Value),
}

impl PersonField {
    pub fn name(&self) -> Option<String> {
        let name = match self {
            Self::Text(text) => text
                .split(['<', '('])
                .next()
                .unwrap_or_default()
                .trim()
                .to_string(),
            Self::Object { name } => name.as_deref().unwrap_or_default().trim().to_string(),
            Self::Other(_) => String::new(),
        };
        (!name.is_empty()).then_some(name)
    }
}

/// The `repository` field: a URL, a shorthand, or `{ type, url }`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RepositoryField {
    Text(String),
    Object {
        #[serde(default, deserialize_with = "lenient_string")]
        url: Option<String>,
    },
    Other(Value),
}

impl RepositoryField {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Object { url } => url.as_deref(),
            Self::Other(_) => None,
        }
    }

    /// GitHub owner, accepting the bare `owner/repo` shorthand as well
    pub fn owner(&self) -> Option<String> {
        let reference = self.url()?.trim();
        github_owner(reference).or_else(|| {
            let (owner, repo) = reference.split_once('/')?;
            let plain = |s: &str| {
                !s.is_empty() && !s.contains(['/', ':', ' ', '@'])
            };
            (plain(owner) && plain(repo)).then(|| owner.to_string())
        })
    }
}

impl PackageManifest {
    /// Read and parse a manifest file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| Error::json(path, e))
    }

    /// The manifest's license, preferring `license` over legacy `licenses`
    pub fn license_expression(&self) -> String {
        self.license
            .as_ref()
            .map(LicenseField::normalize)
            .filter(|lic| !lic.is_empty())
            .or_else(|| self.licenses.as_ref().map(LicenseField::normalize))
            .unwrap_or_default()
    }

    /// Resolve the author through the fallback chain: explicit author,
    /// first contributors, then the GitHub owner of the homepage, the
    /// repository and finally the resolved tarball
    pub fn resolve_author(&self) -> String {
        if let Some(name) = self.author.as_ref().and_then(PersonField::name) {
            return name;
        }

        let contributors: Vec<String> = self
            .contributors
            .iter()
            .filter_map(PersonField::name)
            .take(MAX_CONTRIBUTORS)
            .collect();
        if !contributors.is_empty() {
            return contributors.join(", ");
        }

        self.homepage
            .as_deref()
            .and_then(github_owner)
            .or_else(|| self.repository.as_ref().and_then(RepositoryField::owner))
            .or_else(|| self.resolved.as_deref().and_then(github_owner))
            .unwrap_or_default()
    }

    /// Build a record for the module installed at `path`
    ///
    /// `module` is the directory handle the manifest was found under and is
    /// only used for error reporting.
    pub fn into_record(self, module: &str, path: &Path) -> Result<DependencyRecord> {
        let author = self.resolve_author();
        let license = License::Expression(self.license_expression());
        let repository = self
            .repository
            .as_ref()
            .and_then(RepositoryField::url)
            .unwrap_or_default()
            .to_string();

        let name = self
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| Error::MissingManifestName {
                module: module.to_string(),
                path: path.to_path_buf(),
            })?;

        let mut record = DependencyRecord::new(name, self.version.unwrap_or_default());
        record.description = self.description.unwrap_or_default();
        record.license = license;
        record.homepage = self.homepage.unwrap_or_default();
        record.author = author;
        record.repository = repository;
        record.path = path.to_path_buf();
        Ok(record)
    }
}

/// Owner segment of a GitHub reference
///
/// Understands `github:owner/repo`, `git@github.com:owner/repo.git` and any
/// URL on a `github.com` host, including `git+` prefixed and codeload
/// tarball URLs.
pub fn github_owner(reference: &str) -> Option<String> {
    let reference = reference.trim();
    let first_segment = |rest: &str| {
        rest.split('/')
            .next()
            .filter(|owner| !owner.is_empty())
            .map(str::to_string)
    };

    if let Some(rest) = reference.strip_prefix("github:") {
        return first_segment(rest);
    }
    if let Some(rest) = reference.strip_prefix("git@github.com:") {
        return first_segment(rest);
    }

    let url = Url::parse(reference.strip_prefix("git+").unwrap_or(reference)).ok()?;
    let host = url.host_str()?;
    if host != "github.com" && !host.ends_with(".github.com") {
        return None;
    }
    url.path_segments()?
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_str().map(str::to_string)))
}

fn lenient_people<'de, D>(deserializer: D) -> std::result::Result<Vec<PersonField>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_map<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(key, v)| v.as_str().map(|s| (key, s.to_string())))
            .collect(),
        _ => BTreeMap::new(),
    })
}
