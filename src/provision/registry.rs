use std::collections::HashMap;

use serde::Deserialize;

use crate::{
    config::{Variant, Version},
    error::ResolveError,
};

const EMBEDDED_REGISTRY: &str = include_str!("../../assets/registry.json");

#[derive(Debug, Deserialize)]
struct RegistryFile {
    paper: Vec<PaperEntry>,
    forge: Vec<ForgeEntry>,
}

#[derive(Debug, Deserialize)]
struct PaperEntry {
    version: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct ForgeEntry {
    version: String,
    installer_version: String,
    url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RegistryEntry {
    url: String,
    installer_version: Option<String>,
}

/// Where to fetch one (variant, version) pair from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub variant: Variant,
    pub version: String,
    pub url: String,
    /// Name the download is saved under.
    pub file_name: String,
    /// Loader build for installer based variants, e.g. `1.20.1-47.3.0`.
    pub installer_version: Option<String>,
}

/// Static lookup from (variant, version) to a download.
#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    entries: HashMap<(Variant, String), RegistryEntry>,
}

impl ArtifactResolver {
    /// The table shipped with the crate.
    pub fn embedded() -> Result<Self, ResolveError> {
        Self::from_json(EMBEDDED_REGISTRY)
    }

    pub fn from_json(raw: &str) -> Result<Self, ResolveError> {
        let file: RegistryFile =
            serde_json::from_str(raw).map_err(|e| ResolveError::Registry(e.to_string()))?;

        let paper = file.paper.into_iter().map(|entry| {
            (
                Variant::Paper,
                entry.version,
                RegistryEntry {
                    url: entry.url,
                    installer_version: None,
                },
            )
        });
        let forge = file.forge.into_iter().map(|entry| {
            (
                Variant::Forge,
                entry.version,
                RegistryEntry {
                    url: entry.url,
                    installer_version: Some(entry.installer_version),
                },
            )
        });

        let mut entries = HashMap::new();
        for (variant, version, entry) in paper.chain(forge) {
            version
                .parse::<Version>()
                .map_err(|e| ResolveError::Registry(format!("{variant} {version}: {e}")))?;
            if entry.url.is_empty() {
                return Err(ResolveError::Registry(format!(
                    "{variant} {version}: empty url"
                )));
            }
            if entries.insert((variant, version.clone()), entry).is_some() {
                return Err(ResolveError::Registry(format!(
                    "{variant} {version}: duplicate entry"
                )));
            }
        }

        Ok(Self { entries })
    }

    pub fn resolve(&self, variant: Variant, version: &str) -> Result<ArtifactDescriptor, ResolveError> {
        let entry = self
            .entries
            .get(&(variant, version.to_string()))
            .ok_or_else(|| ResolveError::UnknownVersion {
                variant,
                version: version.to_string(),
            })?;

        let file_name = match (&variant, &entry.installer_version) {
            (Variant::Forge, Some(installer)) => format!("forge-{installer}-installer.jar"),
            _ => format!("paper-{version}.jar"),
        };

        Ok(ArtifactDescriptor {
            variant,
            version: version.to_string(),
            url: entry.url.clone(),
            file_name,
            installer_version: entry.installer_version.clone(),
        })
    }

    /// Supported versions of `variant`, newest first.
    pub fn versions(&self, variant: Variant) -> Vec<String> {
        let mut versions: Vec<Version> = self
            .entries
            .keys()
            .filter(|(v, _)| *v == variant)
            .filter_map(|(_, version)| version.parse().ok())
            .collect();
        versions.sort_by(|a, b| b.cmp(a));
        versions.iter().map(Version::to_string).collect()
    }
}
