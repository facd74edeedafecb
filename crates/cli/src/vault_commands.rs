use std::{io::BufRead, sync::Arc};

use {
    anyhow::{Context, Result, bail},
    clap::Subcommand,
    strongbox_config::StrongboxConfig,
    strongbox_vault::{
        Account, BiometricPrompt, FileKeystore, Note, RecordFields, RecordKind, SortCriterion,
        VaultEngine, VaultError, VaultRecord, VaultStatus, codec,
    },
    tracing::debug,
    uuid::Uuid,
    zeroize::Zeroizing,
};

#[derive(Subcommand)]
pub enum VaultAction {
    /// Create a new vault protected by a master password.
    Init,
    /// Show whether the vault is initialized.
    Status,
    /// List accounts (or notes).
    List {
        /// List notes instead of accounts.
        #[arg(long)]
        notes: bool,
    },
    /// Add an account.
    AddAccount {
        #[arg(long)]
        name: String,
        #[arg(long)]
        username: String,
        /// Account password.
        #[arg(long, env = "STRONGBOX_ACCOUNT_PASSWORD", hide_env_values = true)]
        account_password: String,
        #[arg(long)]
        url: Option<String>,
        /// Base32 TOTP secret.
        #[arg(long)]
        otp_secret: Option<String>,
    },
    /// Add a secure note.
    AddNote {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        body: String,
    },
    /// Star (or unstar) a record.
    Star {
        id: Uuid,
        /// Remove the star instead.
        #[arg(long)]
        off: bool,
    },
    /// Delete a record.
    Delete { id: Uuid },
    /// Reorder a vault: created-asc, created-desc, alphabetical, or starred.
    Sort {
        criterion: String,
        /// Sort notes instead of accounts.
        #[arg(long)]
        notes: bool,
    },
    /// Delete the stored key and every vault file.
    Reset {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

/// How a command authenticates.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlockMode {
    /// Use the stored key after a presence check instead of the password.
    pub stored_key: bool,
}

pub async fn handle_vault(
    action: VaultAction,
    config: &StrongboxConfig,
    mode: UnlockMode,
) -> Result<()> {
    let engine = open_engine(config)?;

    match action {
        VaultAction::Init => init(&engine).await,
        VaultAction::Status => status(&engine).await,
        VaultAction::Reset { yes } => reset(&engine, yes).await,
        action => {
            unlock(&engine, mode).await?;
            let result = run_unlocked(&engine, action).await;
            engine.lock().await;
            result
        },
    }
}

fn open_engine(config: &StrongboxConfig) -> Result<VaultEngine> {
    let options = config
        .engine_options()
        .context("invalid vault configuration")?;
    let keystore = FileKeystore::new(config.keystore_path());
    debug!(
        data_dir = %options.data_dir.display(),
        keystore = %keystore.path().display(),
        "opening vault"
    );
    Ok(VaultEngine::new(options, Arc::new(keystore)))
}

async fn init(engine: &VaultEngine) -> Result<()> {
    if engine.status().await? != VaultStatus::Uninitialized {
        bail!("vault already exists; run `strongbox reset` first");
    }
    let password = read_password("New master password: ")?;
    let repeated = read_password("Repeat master password: ")?;
    if *password != *repeated {
        bail!("passwords do not match");
    }
    match engine.sign_up(&password).await {
        Err(VaultError::AlreadyInitialized) => {
            bail!("vault files already exist here or in the sync folder; run `strongbox reset` first");
        },
        other => other?,
    }
    engine.lock().await;
    println!("Vault created.");
    Ok(())
}

async fn status(engine: &VaultEngine) -> Result<()> {
    let label = match engine.status().await? {
        VaultStatus::Uninitialized => "not initialized",
        VaultStatus::Locked => "locked",
        VaultStatus::Unlocked => "unlocked",
    };
    println!("{label}");
    Ok(())
}

async fn reset(engine: &VaultEngine, yes: bool) -> Result<()> {
    if !yes && !confirm("Delete the vault and its key? This cannot be undone. [y/N] ")? {
        println!("Aborted.");
        return Ok(());
    }
    engine.reset().await?;
    println!("Vault deleted.");
    Ok(())
}

async fn unlock(engine: &VaultEngine, mode: UnlockMode) -> Result<()> {
    if engine.status().await? == VaultStatus::Uninitialized {
        bail!("no vault yet; run `strongbox init` first");
    }

    if mode.stored_key {
        return engine
            .unlock_with_stored_key(&TerminalPrompt)
            .await
            .context("stored-key unlock failed");
    }

    let password = read_password("Master password: ")?;
    match engine.unlock(&password).await {
        Err(VaultError::IncorrectPassword) => bail!("incorrect password"),
        other => other.map_err(Into::into),
    }
}

async fn run_unlocked(engine: &VaultEngine, action: VaultAction) -> Result<()> {
    match action {
        VaultAction::List { notes } => {
            let kind = if notes {
                RecordKind::Note
            } else {
                RecordKind::Account
            };
            match engine.store(kind).get().await {
                Some(records) => {
                    for record in &records {
                        println!("{}", describe(record));
                    }
                },
                None => println!("No {kind} records."),
            }
        },
        VaultAction::AddAccount {
            name,
            username,
            account_password,
            url,
            otp_secret,
        } => {
            let record = engine
                .accounts()
                .add(Account {
                    name,
                    username,
                    password: account_password,
                    url,
                    otp_secret,
                })
                .await?;
            println!("Added {}", record.id());
        },
        VaultAction::AddNote { title, body } => {
            let record = engine.notes().add(Note { title, body }).await?;
            println!("Added {}", record.id());
        },
        VaultAction::Star { id, off } => {
            let kind = locate(engine, id).await?;
            engine.store(kind).set_starred(id, !off).await?;
            println!("{} {id}", if off { "Unstarred" } else { "Starred" });
        },
        VaultAction::Delete { id } => {
            let kind = locate(engine, id).await?;
            engine.store(kind).delete(id).await?;
            println!("Deleted {id}");
        },
        VaultAction::Sort { criterion, notes } => {
            let store = if notes {
                engine.notes()
            } else {
                engine.accounts()
            };
            if criterion == "starred" {
                store.sort_by_starred().await?;
            } else {
                let Some(by) = SortCriterion::from_name(&criterion) else {
                    bail!("unknown sort criterion: {criterion}");
                };
                store.sort_by(by).await?;
            }
            println!("Sorted {} vault by {criterion}", store.kind());
        },
        VaultAction::Init | VaultAction::Status | VaultAction::Reset { .. } => {},
    }
    Ok(())
}

async fn locate(engine: &VaultEngine, id: Uuid) -> Result<RecordKind> {
    for kind in RecordKind::ALL {
        if engine.store(kind).find(id).await.is_some() {
            return Ok(kind);
        }
    }
    bail!("no record with id {id}")
}

/// One line per record for `list`.
pub(crate) fn describe(record: &VaultRecord) -> String {
    let star = if record.starred() { "*" } else { " " };
    let created = codec::format_date(&record.creation_time());
    match record.fields() {
        RecordFields::Account(account) => {
            let mut line = format!(
                "{star} {}  {}  {}",
                record.id(),
                account.name,
                account.username
            );
            if let Some(url) = &account.url {
                line.push_str(&format!("  {url}"));
            }
            if let Some(secret) = &account.otp_secret {
                line.push_str(&format!("  otp {}", strongbox_totp::totp(secret)));
            }
            line.push_str(&format!("  ({created})"));
            line
        },
        RecordFields::Note(note) => {
            format!("{star} {}  {}  ({created})", record.id(), note.title)
        },
    }
}

/// Master password from `STRONGBOX_PASSWORD`, or one line of stdin.
fn read_password(prompt: &str) -> Result<Zeroizing<String>> {
    if let Ok(password) = std::env::var("STRONGBOX_PASSWORD") {
        return Ok(Zeroizing::new(password));
    }
    eprint!("{prompt}");
    let line = read_line()?;
    Ok(Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt}");
    let answer = read_line()?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn read_line() -> Result<Zeroizing<String>> {
    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line)
}

/// Presence check for terminals without a biometric sensor: an explicit
/// confirmation on stdin.
struct TerminalPrompt;

#[async_trait::async_trait]
impl BiometricPrompt for TerminalPrompt {
    async fn authenticate(&self, reason: &str) -> bool {
        let prompt = format!("{reason}? [y/N] ");
        tokio::task::spawn_blocking(move || confirm(&prompt).unwrap_or(false))
            .await
            .unwrap_or(false)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_account_includes_totp() {
        let record = VaultRecord::new(Account {
            name: "mail".into(),
            username: "alice".into(),
            password: "p4ssw0rd".into(),
            url: Some("https://mail.example".into()),
            otp_secret: Some("!!".into()),
        });
        let line = describe(&record);
        assert!(line.contains("mail"));
        assert!(line.contains("https://mail.example"));
        assert!(line.contains(strongbox_totp::INVALID_SECRET));
        assert!(!line.contains("p4ssw0rd"));
    }

    #[test]
    fn describe_note_shows_title_only() {
        let record = VaultRecord::new(Note {
            title: "wifi".into(),
            body: "hunter2".into(),
        });
        let line = describe(&record);
        assert!(line.contains("wifi"));
        assert!(!line.contains("hunter2"));
    }
}
