use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tokio::fs;
use tracing::info;

use crate::{config::ServerFields, error::ConfigError};

pub const EULA_FILE: &str = "eula.txt";
pub const PROPERTIES_FILE: &str = "server.properties";
pub const OPS_FILE: &str = "ops.json";
pub const POSIX_START_SCRIPT: &str = "start.sh";
pub const WINDOWS_START_SCRIPT: &str = "start.bat";

/// Permission level given to every operator.
pub const OPERATOR_LEVEL: u8 = 4;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OperatorEntry<'a> {
    uuid: &'a str,
    name: &'a str,
    level: u8,
    bypasses_player_limit: bool,
}

/// Run command embedded in the generated start scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCommand {
    pub posix: String,
    pub windows: String,
}

impl ScriptCommand {
    pub fn same<S: Into<String>>(command: S) -> Self {
        let command = command.into();
        Self {
            posix: command.clone(),
            windows: command,
        }
    }
}

/// Materializes the server's config files. Output depends only on the
/// inputs, so rewriting with the same fields leaves files byte-identical.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigWriter;

impl ConfigWriter {
    pub fn render_properties(fields: &ServerFields) -> String {
        let t = &fields.toggles;
        let entries: [(&str, String); 19] = [
            ("gamemode", fields.gamemode.to_string()),
            ("difficulty", fields.difficulty.to_string()),
            ("motd", fields.motd.clone()),
            ("server-port", fields.port.to_string()),
            ("max-players", fields.max_players.to_string()),
            ("level-seed", fields.seed.clone()),
            ("pvp", t.pvp.to_string()),
            ("white-list", t.whitelist.to_string()),
            ("hardcore", t.hardcore.to_string()),
            ("allow-flight", t.allow_flight.to_string()),
            ("online-mode", t.online_mode.to_string()),
            ("enable-command-block", t.command_blocks.to_string()),
            ("force-gamemode", t.force_gamemode.to_string()),
            ("level-name", "world".to_string()),
            ("generate-structures", "true".to_string()),
            ("spawn-npcs", "true".to_string()),
            ("spawn-animals", "true".to_string()),
            ("spawn-monsters", "true".to_string()),
            ("view-distance", "10".to_string()),
        ];

        let mut out = String::new();
        for (key, value) in entries {
            _ = writeln!(out, "{key}={value}");
        }
        out
    }

    pub fn render_operators(names: &[String]) -> Result<String, ConfigError> {
        let entries: Vec<OperatorEntry<'_>> = names
            .iter()
            .map(|name| OperatorEntry {
                uuid: "",
                name,
                level: OPERATOR_LEVEL,
                bypasses_player_limit: false,
            })
            .collect();
        Ok(serde_json::to_string_pretty(&entries)?)
    }

    pub fn render_posix_script(command: &str) -> String {
        format!("#!/bin/bash\ncd \"$(dirname \"$0\")\"\n{command}\n")
    }

    pub fn render_windows_script(command: &str) -> String {
        format!("@echo off\ncd /d \"%~dp0\"\n{command}\npause\n")
    }

    /// Writes the EULA acceptance, `server.properties` and, when operators
    /// were given, `ops.json`. Returns the files written.
    pub async fn write_config(work_dir: &Path, fields: &ServerFields) -> Result<Vec<PathBuf>, ConfigError> {
        fields.validate()?;

        let mut written = vec![
            write_file(work_dir, EULA_FILE, "eula=true\n").await?,
            write_file(work_dir, PROPERTIES_FILE, &Self::render_properties(fields)).await?,
        ];

        if !fields.operators.is_empty() {
            let ops = Self::render_operators(&fields.operators)?;
            written.push(write_file(work_dir, OPS_FILE, &ops).await?);
        }

        info!(dir = %work_dir.display(), files = written.len(), "config written");
        Ok(written)
    }

    /// Writes `start.sh` (executable) and `start.bat`.
    pub async fn write_scripts(work_dir: &Path, command: &ScriptCommand) -> Result<(), ConfigError> {
        let sh = write_file(
            work_dir,
            POSIX_START_SCRIPT,
            &Self::render_posix_script(&command.posix),
        )
        .await?;
        make_executable(&sh).await?;

        write_file(
            work_dir,
            WINDOWS_START_SCRIPT,
            &Self::render_windows_script(&command.windows),
        )
        .await?;

        info!(dir = %work_dir.display(), "start scripts written");
        Ok(())
    }
}

async fn write_file(dir: &Path, name: &str, contents: &str) -> Result<PathBuf, ConfigError> {
    let path = dir.join(name);
    fs::write(&path, contents)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}
