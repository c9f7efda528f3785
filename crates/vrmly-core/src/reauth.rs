// ── Reauthentication gate ──
//
// Owns the access token and its lifecycle. The coordinator reports
// rejections; the host supplies replacements. Subscribers only ever see
// the status, never the token itself.

use secrecy::SecretString;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

/// Token lifecycle.
///
/// `Valid -> Expired -> AwaitingReplacement -> Valid`, cycling for the
/// life of the poller. Only [`ReauthGate::supply_token`] leaves
/// `AwaitingReplacement`.
#[derive(Clone)]
pub enum AuthState {
    Valid(SecretString),
    /// Rejected by VRM; the last token is kept for diagnostics.
    Expired(SecretString),
    AwaitingReplacement,
}

impl AuthState {
    pub fn status(&self) -> AuthStatus {
        match self {
            Self::Valid(_) => AuthStatus::Valid,
            Self::Expired(_) => AuthStatus::Expired,
            Self::AwaitingReplacement => AuthStatus::AwaitingReplacement,
        }
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // SecretString already redacts; this just keeps the output short.
        f.write_str(self.status().as_ref())
    }
}

/// Token-free view of [`AuthState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuthStatus {
    Valid,
    Expired,
    AwaitingReplacement,
}

/// Gate contents: the state plus a counter bumped by every
/// [`ReauthGate::supply_token`].
#[derive(Debug, Clone)]
struct Slot {
    generation: u64,
    state: AuthState,
}

/// A trusted token handed out for one fetch.
///
/// Carries the generation it was issued under so a rejection that arrives
/// after a newer token was supplied can be told apart.
#[derive(Clone)]
pub struct TokenLease {
    pub generation: u64,
    pub token: SecretString,
}

pub struct ReauthGate {
    state: watch::Sender<Slot>,
}

impl ReauthGate {
    pub fn new(token: SecretString) -> Self {
        let (state, _) = watch::channel(Slot {
            generation: 0,
            state: AuthState::Valid(token),
        });
        Self { state }
    }

    pub fn current_state(&self) -> AuthStatus {
        self.state.borrow().state.status()
    }

    /// The token to send, if it is still trusted.
    pub fn lease(&self) -> Option<TokenLease> {
        let slot = self.state.borrow();
        match &slot.state {
            AuthState::Valid(token) => Some(TokenLease {
                generation: slot.generation,
                token: token.clone(),
            }),
            _ => None,
        }
    }

    /// VRM rejected the token issued under `generation`: `Valid -> Expired`.
    ///
    /// Ignored when a newer token has been supplied since; that one has not
    /// been tried yet.
    pub fn report_unauthorized(&self, generation: u64) -> AuthStatus {
        let current = self.state.borrow().generation;
        if current != generation {
            debug!(
                rejected = generation,
                current, "ignoring rejection of a superseded token"
            );
            return self.current_state();
        }
        self.expire(Some(generation), "token rejected by VRM")
    }

    /// Host-initiated expiry, e.g. the user revoked the token.
    pub fn invalidate(&self) -> AuthStatus {
        self.expire(None, "token invalidated")
    }

    fn expire(&self, generation: Option<u64>, reason: &'static str) -> AuthStatus {
        self.state.send_if_modified(|slot| {
            if generation.is_some_and(|g| g != slot.generation) {
                return false;
            }
            let AuthState::Valid(token) = &slot.state else {
                return false;
            };
            slot.state = AuthState::Expired(token.clone());
            info!(reason, "access token expired");
            true
        });
        self.current_state()
    }

    /// Ask the host for a new token: `Expired -> AwaitingReplacement`.
    /// Returns `false` if the gate was not in `Expired`.
    pub fn request_replacement(&self) -> bool {
        self.state.send_if_modified(|slot| {
            if !matches!(slot.state, AuthState::Expired(_)) {
                return false;
            }
            slot.state = AuthState::AwaitingReplacement;
            info!("waiting for a replacement access token");
            true
        })
    }

    /// Install a new token from any state. It is trusted until the next
    /// fetch says otherwise.
    pub fn supply_token(&self, token: SecretString) -> AuthStatus {
        let mut previous = AuthStatus::Valid;
        self.state.send_modify(|slot| {
            previous = slot.state.status();
            slot.generation += 1;
            slot.state = AuthState::Valid(token);
        });
        debug!(%previous, "access token supplied");
        previous
    }

    pub fn subscribe(&self) -> AuthWatch {
        AuthWatch {
            receiver: self.state.subscribe(),
        }
    }
}

/// Reauth-required signal for the host.
///
/// Wraps the gate's channel so subscribers observe status changes without
/// being able to read the token.
#[derive(Clone)]
pub struct AuthWatch {
    receiver: watch::Receiver<Slot>,
}

impl AuthWatch {
    pub fn status(&self) -> AuthStatus {
        self.receiver.borrow().state.status()
    }

    /// Wait for the next status change. `None` once the gate is gone.
    pub async fn changed(&mut self) -> Option<AuthStatus> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().state.status())
    }

    /// Resolve as soon as the status equals `wanted` (immediately if it
    /// already does). Returns `false` if the gate was dropped first.
    pub async fn wait_for(&mut self, wanted: AuthStatus) -> bool {
        self.receiver
            .wait_for(|slot| slot.state.status() == wanted)
            .await
            .is_ok()
    }
}
