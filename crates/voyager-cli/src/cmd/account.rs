use crate::output::print_json;
use anyhow::{bail, Context};
use clap::{Subcommand, ValueEnum};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use voyager_core::account::{HttpAccountService, ProfileEditor};
use voyager_core::deletion::{DeletionCountdown, DeletionEvent, DeletionPhase, COUNTDOWN_SECONDS};
use voyager_core::types::{AccountField, User, UserId};
use voyager_core::VoyagerError;

#[derive(Subcommand)]
pub enum AccountSubcommand {
    /// Create an account
    Create {
        email: String,
        /// Full name shown on the profile
        #[arg(long)]
        name: Option<String>,
    },
    /// Show an account
    Show { id: String },
    /// Change the account email
    Email { id: String, email: String },
    /// Turn the newsletter on or off
    Newsletter { id: String, state: Toggle },
    /// Permanently delete an account after a cancellable countdown
    Delete {
        id: String,
        /// Skip the confirmation prompt (the countdown still runs)
        #[arg(long, short = 'y')]
        yes: bool,
        /// Countdown tick length in milliseconds
        #[arg(long, hide = true)]
        tick_ms: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

pub fn run(
    root: &Path,
    url: Option<String>,
    subcmd: AccountSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    let config = super::client_config(root)?;
    let base_url = url.unwrap_or(config.base_url);
    let service = Arc::new(
        HttpAccountService::new(base_url, Duration::from_secs(config.timeout_secs))
            .context("failed to build http client")?,
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        match subcmd {
            AccountSubcommand::Create { email, name } => {
                let user = service
                    .create_user(&email, name.as_deref())
                    .await
                    .context("failed to create account")?;
                show_user(&user, json)
            }
            AccountSubcommand::Show { id } => {
                let user = service.get_user(&UserId::new(id)).await?;
                show_user(&user, json)
            }
            AccountSubcommand::Email { id, email } => {
                let editor = editor(&service, id).await?;
                let result = editor.update_email(&email).await;
                finish_update(&editor, AccountField::Email, result.map(|_| ()), json)
            }
            AccountSubcommand::Newsletter { id, state } => {
                let editor = editor(&service, id).await?;
                let result = editor.set_newsletter(matches!(state, Toggle::On)).await;
                finish_update(&editor, AccountField::Newsletter, result.map(|_| ()), json)
            }
            AccountSubcommand::Delete { id, yes, tick_ms } => {
                let user_id = UserId::new(id);
                let mut countdown = DeletionCountdown::new(service, user_id.clone());
                if let Some(ms) = tick_ms {
                    countdown = countdown.with_period(Duration::from_millis(ms.max(1)));
                }
                delete(countdown, &user_id, yes, json).await
            }
        }
    })
}

async fn editor(service: &Arc<HttpAccountService>, id: String) -> anyhow::Result<ProfileEditor> {
    let user = service.get_user(&UserId::new(id)).await?;
    Ok(ProfileEditor::new(service.clone(), user))
}

fn finish_update(
    editor: &ProfileEditor,
    field: AccountField,
    result: voyager_core::Result<()>,
    json: bool,
) -> anyhow::Result<()> {
    if let Err(e) = result {
        let message = editor.last_error(field).unwrap_or_else(|| e.to_string());
        bail!("could not update {field}: {message}");
    }
    show_user(&editor.user(), json)
}

fn show_user(user: &User, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(user);
    }
    println!("{} ({})", user.display_name(), user.initials());
    println!("  id:         {}", user.id);
    println!("  email:      {}", user.email);
    println!(
        "  newsletter: {}",
        if user.newsletter { "on" } else { "off" }
    );
    println!("  member since {}", user.created_at.format("%Y-%m-%d"));
    Ok(())
}

// ---------------------------------------------------------------------------
// delete
// ---------------------------------------------------------------------------

async fn delete(
    countdown: DeletionCountdown,
    user_id: &UserId,
    yes: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut events = countdown.subscribe();
    countdown.request_delete()?;

    if !yes && !prompt_confirmation(user_id).await? {
        countdown.cancel()?;
        if !json {
            println!("Cancelled. Your account was not deleted.");
        }
        return report_events(&mut events, json);
    }

    countdown.confirm()?;
    if !json {
        println!("Deleting account in {COUNTDOWN_SECONDS}s. Press Ctrl-C to cancel.");
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => bail!("deletion countdown stopped unexpectedly"),
                };
                emit(&event, json)?;
                match event {
                    DeletionEvent::Deleted => return Ok(()),
                    DeletionEvent::DeleteFailed { message } => {
                        bail!("account deletion failed: {message}")
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if !interrupt(&countdown)? {
                    eprintln!("Too late to cancel: the delete request is already on its way.");
                    continue;
                }
                if !json {
                    println!("\nCancelled. Your account was not deleted.");
                }
                return report_events(&mut events, json);
            }
        }
    }
}

/// Cancel on Ctrl-C. Returns `false` when the delete call already started,
/// which the countdown reports as an invalid transition out of `Deleted`.
fn interrupt(countdown: &DeletionCountdown) -> anyhow::Result<bool> {
    match countdown.cancel() {
        Ok(_) => Ok(true),
        Err(VoyagerError::InvalidDeletionTransition {
            from: DeletionPhase::Deleted,
            ..
        }) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn prompt_confirmation(user_id: &UserId) -> anyhow::Result<bool> {
    let question = format!(
        "Delete account {user_id} and all saved destinations and trips? Type 'delete' to confirm: "
    );
    let answer = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
        let mut stderr = std::io::stderr();
        stderr.write_all(question.as_bytes())?;
        stderr.flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(line)
    })
    .await
    .context("prompt task failed")??;
    Ok(answer.trim().eq_ignore_ascii_case("delete"))
}

/// Flush already-queued events without waiting for more.
fn report_events(
    events: &mut tokio::sync::broadcast::Receiver<DeletionEvent>,
    json: bool,
) -> anyhow::Result<()> {
    while let Ok(event) = events.try_recv() {
        if json {
            emit(&event, json)?;
        }
    }
    Ok(())
}

fn emit(event: &DeletionEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        DeletionEvent::Tick { remaining_seconds } if *remaining_seconds > 0 => {
            println!("  {remaining_seconds}...");
        }
        DeletionEvent::DeleteNow => println!("Deleting..."),
        DeletionEvent::Deleted => println!("Account deleted."),
        _ => {}
    }
    Ok(())
}
