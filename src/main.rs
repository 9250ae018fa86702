use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use minehost::{
    LifecycleState, MineHostServer, ServerFields, SupervisorSettings, Variant,
    config::{Difficulty, EventPayload, GameMode, Toggles},
    provision::{ArtifactResolver, ProvisionEvent, ProvisionRequest, Provisioner},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "minehost", version, about = "Set up and run a local Minecraft server")]
struct Cli {
    /// Java executable used to install and run servers
    #[arg(long, global = true, default_value = "java")]
    java: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List supported versions, newest first
    Versions {
        #[arg(default_value = "paper")]
        variant: Variant,
    },
    /// Provision a new server directory
    Create(CreateArgs),
    /// Start a provisioned server and attach its console
    Run {
        dir: PathBuf,
    },
}

#[derive(Debug, Args)]
struct CreateArgs {
    #[arg(default_value = "my-server")]
    dir: PathBuf,
    #[arg(long, default_value = "paper")]
    variant: Variant,
    #[arg(long, default_value = "1.21.4")]
    version: String,
    #[arg(long, default_value_t = 25565)]
    port: u16,
    #[arg(long, default_value = "A Minecraft Server")]
    motd: String,
    #[arg(long, default_value_t = 20)]
    max_players: u32,
    #[arg(long, default_value = "easy")]
    difficulty: Difficulty,
    #[arg(long, default_value = "survival")]
    gamemode: GameMode,
    #[arg(long, default_value = "")]
    seed: String,
    /// Heap size in GB
    #[arg(long, default_value_t = 2)]
    ram: u32,
    /// Comma separated operator names
    #[arg(long, default_value = "")]
    ops: String,
    /// Mod jar to copy into mods/ (Forge only), repeatable
    #[arg(long = "mod")]
    mods: Vec<PathBuf>,
    #[arg(long)]
    no_pvp: bool,
    #[arg(long)]
    whitelist: bool,
    #[arg(long)]
    hardcore: bool,
    #[arg(long)]
    allow_flight: bool,
    #[arg(long)]
    offline_mode: bool,
    #[arg(long)]
    command_blocks: bool,
    #[arg(long)]
    force_gamemode: bool,
    /// Replace the directory if it already exists
    #[arg(long)]
    overwrite: bool,
}

impl CreateArgs {
    fn fields(&self) -> ServerFields {
        ServerFields {
            port: self.port,
            motd: self.motd.clone(),
            max_players: self.max_players,
            difficulty: self.difficulty,
            gamemode: self.gamemode,
            seed: self.seed.clone(),
            toggles: Toggles {
                pvp: !self.no_pvp,
                whitelist: self.whitelist,
                hardcore: self.hardcore,
                allow_flight: self.allow_flight,
                online_mode: !self.offline_mode,
                command_blocks: self.command_blocks,
                force_gamemode: self.force_gamemode,
            },
            ram_gb: self.ram,
            operators: ServerFields::parse_operators(&self.ops),
            mods: self.mods.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("minehost=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = SupervisorSettings::default().with_runtime(&cli.java);

    match cli.command {
        Command::Versions { variant } => {
            let resolver = ArtifactResolver::embedded()?;
            for version in resolver.versions(variant) {
                println!("{version}");
            }
            Ok(())
        }
        Command::Create(args) => create(args, cli.java, settings).await,
        Command::Run { dir } => run(dir, settings).await,
    }
}

async fn create(args: CreateArgs, java: PathBuf, settings: SupervisorSettings) -> Result<()> {
    let provisioner = Arc::new(Provisioner::new(ArtifactResolver::embedded()?).with_runtime(java));
    let request = ProvisionRequest {
        variant: args.variant,
        version: args.version.clone(),
        target_dir: args.dir.clone(),
        fields: args.fields(),
        overwrite: args.overwrite,
    };

    let (handle, mut events) = provisioner.spawn(request);
    while let Some(event) = events.recv().await {
        match event {
            ProvisionEvent::Progress(pct) => eprintln!("[{pct:>3}%]"),
            ProvisionEvent::Status(line) => println!("{line}"),
        }
    }

    let instance = handle.await.context("provisioning task panicked")??;
    let server = MineHostServer::new(instance, settings);
    server.write_config().await?;

    println!(
        "Server created in {} (port {}). Run `minehost run {}` to launch.",
        args.dir.display(),
        server.instance().port,
        args.dir.display()
    );
    Ok(())
}

async fn run(dir: PathBuf, settings: SupervisorSettings) -> Result<()> {
    if !dir.is_dir() {
        bail!("Folder not found. Create the server first.");
    }
    let server = MineHostServer::load(&dir, settings).await?;
    let mut events = server.subscribe();
    let mut state = server.watch_state();
    server.start().await?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                server.shutdown().await;
                break;
            }
            changed = state.changed() => {
                if changed.is_err() || *state.borrow() == LifecycleState::Offline {
                    break;
                }
            }
            Some(event) = events.next() => {
                let Ok(event) = event else { continue };
                match &event.payload {
                    EventPayload::StdLine { line } => println!("{line}"),
                    EventPayload::StateChange { new, .. } => eprintln!("-- {new} --"),
                    EventPayload::Info { message } => eprintln!("{message}"),
                }
            }
            line = stdin.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if let Err(e) = server.send_command(&line).await {
                            eprintln!("{e}");
                        }
                    }
                    _ => {
                        server.shutdown().await;
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
