use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use oerpfs_config::{ConfigError, MountConfig, Secret, TreeType};
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "oerpfs", version, about = "Mount an OpenERP database as a filesystem")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log every filesystem request
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount the filesystem (blocks until unmounted)
    Mount {
        /// Directory to mount on (created if missing)
        mountpoint: PathBuf,
        /// Let other users access the mount
        #[arg(long)]
        allow_other: bool,
        #[command(flatten)]
        overrides: ConfigOverrides,
    },
    /// Show effective configuration
    Config {
        #[command(flatten)]
        overrides: ConfigOverrides,
    },
}

/// Settings given on the command line, applied over the config file.
#[derive(Args, Debug, Default)]
struct ConfigOverrides {
    /// Mount options, e.g. `-o treetype=csvimport,oerp_dbname=prod`
    #[arg(short = 'o', value_name = "OPTIONS")]
    options: Vec<String>,
    /// Tree to expose: model or csvimport
    #[arg(long)]
    tree_type: Option<TreeType>,
    /// Server host name
    #[arg(long)]
    server: Option<String>,
    /// Server XML-RPC port
    #[arg(long)]
    port: Option<u16>,
    /// Database name
    #[arg(long)]
    dbname: Option<String>,
    /// Login
    #[arg(long)]
    user: Option<String>,
    /// Password
    #[arg(long)]
    password: Option<String>,
}

impl ConfigOverrides {
    /// `-o` options in the order given, then the individual flags.
    fn apply(self, config: &mut MountConfig) -> Result<(), ConfigError> {
        for options in &self.options {
            config.apply_options(options)?;
        }
        if let Some(tree_type) = self.tree_type {
            config.tree_type = tree_type;
        }
        if let Some(server) = self.server {
            config.server = server;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dbname) = self.dbname {
            config.dbname = dbname;
        }
        if let Some(user) = self.user {
            config.user = user;
        }
        if let Some(password) = self.password {
            config.password = Secret::new(password);
        }
        Ok(())
    }
}

fn find_config() -> Option<PathBuf> {
    // 1. OERPFS_CONFIG environment variable
    if let Ok(path) = std::env::var("OERPFS_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. oerpfs.yaml in current directory
    let cwd_config = PathBuf::from("oerpfs.yaml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. ~/.config/oerpfs/config.yaml
    if let Some(home) = dirs_next::home_dir() {
        let home_config = home.join(".config/oerpfs/config.yaml");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

/// Config file if there is one, defaults otherwise, then the overrides.
fn load_config(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<MountConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            debug!("loading config from {:?}", path);
            MountConfig::from_file(path)?
        }
        None => MountConfig::default(),
    };
    overrides.apply(&mut config)?;
    config.validate_or_err()?;
    Ok(config)
}

fn init_tracing(debug: bool) {
    // "oerpfs" also matches the oerpfs_* library targets.
    let filter = if debug {
        EnvFilter::new("oerpfs=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("oerpfs=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config_path = cli.config.or_else(find_config);

    match cli.command {
        Commands::Mount {
            mountpoint,
            allow_other,
            overrides,
        } => {
            let config = load_config(config_path.as_deref(), overrides)?;
            commands::mount::run(
                config,
                commands::mount::MountArgs {
                    mountpoint,
                    allow_other,
                },
            )?;
        }
        Commands::Config { overrides } => {
            let config = load_config(config_path.as_deref(), overrides)?;
            commands::config::run(&config)?;
        }
    }

    Ok(())
}
