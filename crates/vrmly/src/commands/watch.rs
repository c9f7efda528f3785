//! Continuous polling until Ctrl-C or `--count` publications.

use std::io::IsTerminal;

use secrecy::SecretString;
use tracing::{info, warn};

use vrmly_core::{AuthStatus, AuthWatch, FeedStatus, PollCoordinator, SensorStream};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::config::{self, PollOverrides};
use crate::error::CliError;
use crate::output;

use super::snapshot::render_updates;

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let overrides = PollOverrides {
        sensors: args.sensors,
        interval: args.interval,
        failure_threshold: args.failure_threshold,
    };
    let engine = config::resolve_engine_config(global, &overrides)?;
    let coordinator = PollCoordinator::new(engine)?;

    let mut stream = coordinator.subscribe();
    let mut auth = coordinator.auth_watch();
    coordinator.start().await?;

    let result = watch_loop(&coordinator, &mut stream, &mut auth, args.count, global).await;
    coordinator.stop().await;
    result
}

async fn watch_loop(
    coordinator: &PollCoordinator,
    stream: &mut SensorStream,
    auth: &mut AuthWatch,
    count: Option<u64>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut published = 0_u64;
    let mut last_sequence = None;

    loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping");
                return Ok(());
            }

            true = auth.wait_for(AuthStatus::AwaitingReplacement) => {
                let token = prompt_replacement_token(global).await?;
                coordinator.supply_token(token);
            }

            feed = stream.changed() => {
                let Some(feed) = feed else {
                    return Ok(());
                };

                match feed.status() {
                    FeedStatus::Stale { consecutive_failures } => {
                        warn!(consecutive_failures, "VRM unreachable, values marked unavailable");
                    }
                    FeedStatus::AuthBlocked => {
                        warn!("access token rejected, values marked unavailable");
                    }
                    FeedStatus::Pending | FeedStatus::Live => {}
                }

                output::print_output(&render_updates(&stream.updates(), global), global.quiet);

                let sequence = feed.snapshot().map(|s| s.sequence());
                if feed.is_live() && sequence != last_sequence {
                    last_sequence = sequence;
                    published += 1;
                    if count.is_some_and(|limit| published >= limit) {
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Ask for a new token on an interactive terminal; fail with an auth error
/// otherwise.
async fn prompt_replacement_token(global: &GlobalOpts) -> Result<SecretString, CliError> {
    let profile = config::active_profile_name(global, &config::load_config_or_default());
    if !std::io::stdin().is_terminal() {
        return Err(CliError::AuthFailed { profile });
    }

    eprintln!("VRM rejected the access token for profile '{profile}'.");
    let token = tokio::task::spawn_blocking(|| rpassword::prompt_password("New access token: "))
        .await
        .map_err(|e| CliError::Validation {
            field: "interactive".into(),
            reason: format!("prompt failed: {e}"),
        })??;

    if token.trim().is_empty() {
        return Err(CliError::AuthFailed { profile });
    }
    Ok(SecretString::from(token.trim().to_owned()))
}
