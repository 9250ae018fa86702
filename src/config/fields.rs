use std::{
    fmt::{self, Display},
    path::PathBuf,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Peaceful,
    #[default]
    Easy,
    Normal,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    #[default]
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Peaceful => write!(f, "peaceful"),
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Normal => write!(f, "normal"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

impl Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameMode::Survival => write!(f, "survival"),
            GameMode::Creative => write!(f, "creative"),
            GameMode::Adventure => write!(f, "adventure"),
            GameMode::Spectator => write!(f, "spectator"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "peaceful" => Ok(Difficulty::Peaceful),
            "easy" => Ok(Difficulty::Easy),
            "normal" => Ok(Difficulty::Normal),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "survival" => Ok(GameMode::Survival),
            "creative" => Ok(GameMode::Creative),
            "adventure" => Ok(GameMode::Adventure),
            "spectator" => Ok(GameMode::Spectator),
            other => Err(format!("unknown gamemode: {other}")),
        }
    }
}

/// Boolean switches written to `server.properties`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toggles {
    pub pvp: bool,
    pub whitelist: bool,
    pub hardcore: bool,
    pub allow_flight: bool,
    pub online_mode: bool,
    pub command_blocks: bool,
    pub force_gamemode: bool,
}

impl Default for Toggles {
    fn default() -> Self {
        Self {
            pvp: true,
            whitelist: false,
            hardcore: false,
            allow_flight: false,
            online_mode: true,
            command_blocks: false,
            force_gamemode: false,
        }
    }
}

/// Everything an operator chooses before a server is provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFields {
    pub port: u16,
    pub motd: String,
    pub max_players: u32,
    pub difficulty: Difficulty,
    pub gamemode: GameMode,
    pub seed: String,
    pub toggles: Toggles,
    /// Heap size in gigabytes, used for both `-Xmx` and `-Xms`.
    pub ram_gb: u32,
    pub operators: Vec<String>,
    /// Mod jars copied into `mods/` for installer based variants.
    pub mods: Vec<PathBuf>,
}

impl Default for ServerFields {
    fn default() -> Self {
        Self {
            port: 25565,
            motd: "A Minecraft Server".to_string(),
            max_players: 20,
            difficulty: Difficulty::default(),
            gamemode: GameMode::default(),
            seed: String::new(),
            toggles: Toggles::default(),
            ram_gb: 2,
            operators: Vec::new(),
            mods: Vec::new(),
        }
    }
}

impl ServerFields {
    /// Splits a comma separated operator list, dropping empty names.
    pub fn parse_operators(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(invalid("port", "must be between 1 and 65535"));
        }
        if self.max_players == 0 {
            return Err(invalid("max-players", "must be at least 1"));
        }
        if self.ram_gb == 0 {
            return Err(invalid("ram", "must be at least 1 GB"));
        }
        single_line("motd", &self.motd)?;
        single_line("level-seed", &self.seed)?;
        for name in &self.operators {
            single_line("operators", name)?;
            if name.trim().is_empty() {
                return Err(invalid("operators", "empty operator name"));
            }
        }
        Ok(())
    }
}

fn single_line(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.contains(['\n', '\r']) {
        return Err(invalid(field, "must not contain line breaks"));
    }
    Ok(())
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidField {
        field,
        reason: reason.to_string(),
    }
}
