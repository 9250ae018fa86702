use std::{
    fmt::{self, Display},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::error::VersionError;

pub mod fields;
pub mod settings;
#[cfg(all(feature = "core", feature = "events"))]
pub mod stream;

pub use fields::{Difficulty, GameMode, ServerFields, Toggles};
pub use settings::SupervisorSettings;
#[cfg(all(feature = "core", feature = "events"))]
pub use stream::{EventPayload, InstanceEvent, StreamLine, StreamSource};

/// Server flavor being provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Plugin-oriented server shipped as a ready-to-run jar.
    Paper,
    /// Mod loader that is provisioned through an installer jar.
    Forge,
}

impl Variant {
    pub fn needs_installer(&self) -> bool {
        matches!(self, Variant::Forge)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Variant::Paper => "PaperMC",
            Variant::Forge => "Forge",
        }
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "paper" | "papermc" => Ok(Variant::Paper),
            "forge" => Ok(Variant::Forge),
            other => Err(format!("unknown server type: {other}")),
        }
    }
}

/// A Minecraft release number. Early releases of a line omit the patch
/// component (`1.21`), which sorts before `1.21.1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: Option<u32>,
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.patch {
            Some(patch) => write!(f, "{}.{}.{}", self.major, self.minor, patch),
            None => write!(f, "{}.{}", self.major, self.minor),
        }
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut split = s.trim().split('.');

        let major_str = split
            .next()
            .filter(|v| !v.is_empty())
            .ok_or(VersionError::MissingMajor)?;
        let minor_str = split.next().ok_or(VersionError::MissingMinor)?;
        let patch_str = split.next();

        if split.next().is_some() {
            return Err(VersionError::ExtraComponents);
        }

        let major = major_str
            .parse::<u32>()
            .map_err(|_| VersionError::IncorrectMajor(major_str.to_string()))?;

        let minor = minor_str
            .parse::<u32>()
            .map_err(|_| VersionError::IncorrectMinor(minor_str.to_string()))?;

        let patch = match patch_str {
            Some(p) => Some(
                p.parse::<u32>()
                    .map_err(|_| VersionError::IncorrectPatch(p.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            major,
            minor,
            patch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_and_three_component_releases() {
        let short: Version = "1.21".parse().unwrap();
        assert_eq!(short.patch, None);
        assert_eq!(short.to_string(), "1.21");

        let full: Version = "1.20.1".parse().unwrap();
        assert_eq!(full.patch, Some(1));
        assert_eq!(full.to_string(), "1.20.1");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            "1".parse::<Version>(),
            Err(VersionError::MissingMinor)
        ));
        assert!(matches!(
            "1.x".parse::<Version>(),
            Err(VersionError::IncorrectMinor(_))
        ));
        assert!(matches!(
            "1.2.3.4".parse::<Version>(),
            Err(VersionError::ExtraComponents)
        ));
        assert!(matches!(
            "".parse::<Version>(),
            Err(VersionError::MissingMajor)
        ));
    }

    #[test]
    fn release_without_patch_sorts_first() {
        let a: Version = "1.21".parse().unwrap();
        let b: Version = "1.21.1".parse().unwrap();
        let c: Version = "1.9.4".parse().unwrap();
        assert!(a < b);
        assert!(c < a);
    }

    #[test]
    fn variant_parses_case_insensitively() {
        assert_eq!("Paper".parse::<Variant>().unwrap(), Variant::Paper);
        assert_eq!("FORGE".parse::<Variant>().unwrap(), Variant::Forge);
        assert!("fabric".parse::<Variant>().is_err());
    }
}
