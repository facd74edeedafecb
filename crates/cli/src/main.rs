mod config_commands;
mod vault_commands;

use std::path::PathBuf;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    strongbox_config::StrongboxConfig,
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "strongbox", about = "Strongbox, an encrypted local-first vault")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of strongbox.{toml,yaml,json}).
    #[arg(long, global = true, env = "STRONGBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Vault data directory (overrides config value).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Unlock with the stored key after a confirmation prompt instead of the
    /// master password. Requires `biometrics.enabled`.
    #[arg(long, global = true, default_value_t = false)]
    stored_key: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Vault(vault_commands::VaultAction),
    /// Print the current one-time password for a base32 secret.
    Totp {
        secret: String,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<StrongboxConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = strongbox_config::load_config(path)
                .with_context(|| format!("loading {}", path.display()))?;
            strongbox_config::apply_env_overrides(&mut config)?;
            config
        },
        None => strongbox_config::discover_and_load(),
    };

    // CLI args override config values
    if let Some(dir) = &cli.data_dir {
        config.vault.data_dir = Some(dir.clone());
    }
    Ok(config)
}

fn print_totp(secret: &str) {
    use strongbox_totp::{TotpParams, generate};

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    match generate(secret, TotpParams::default(), now) {
        Ok(code) => println!("{} ({}s left)", code.code, code.remaining_secs),
        Err(_) => println!("{}", strongbox_totp::INVALID_SECRET),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "strongbox starting");

    let config = load_config(&cli)?;
    debug!(data_dir = %config.data_dir().display(), "config loaded");

    match cli.command {
        Commands::Vault(action) => {
            let mode = vault_commands::UnlockMode {
                stored_key: cli.stored_key,
            };
            vault_commands::handle_vault(action, &config, mode).await
        },
        Commands::Totp { secret } => {
            print_totp(&secret);
            Ok(())
        },
        Commands::Config { action } => {
            config_commands::handle_config(action, &config, cli.config.as_deref())
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_vault_commands() {
        let cli = Cli::try_parse_from(["strongbox", "list", "--notes"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Vault(vault_commands::VaultAction::List { notes: true })
        ));

        let cli = Cli::try_parse_from([
            "strongbox",
            "add-account",
            "--name",
            "mail",
            "--username",
            "alice",
            "--account-password",
            "pw",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Vault(vault_commands::VaultAction::AddAccount { .. })
        ));
    }

    #[test]
    fn star_requires_a_uuid() {
        assert!(Cli::try_parse_from(["strongbox", "star", "not-a-uuid"]).is_err());
        let id = uuid::Uuid::new_v4().to_string();
        assert!(Cli::try_parse_from(["strongbox", "star", id.as_str(), "--off"]).is_ok());
    }

    #[test]
    fn data_dir_flag_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strongbox.toml");
        std::fs::write(&path, "[vault]\ndata_dir = \"/from/file\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "strongbox",
            "--config",
            path.to_str().unwrap(),
            "--data-dir",
            "/from/flag",
            "status",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.vault.data_dir, Some(PathBuf::from("/from/flag")));
    }
}
