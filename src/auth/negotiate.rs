// src/auth/negotiate.rs

//! The per-connection handshake state machine.
//!
//! A [`Negotiator`] moves `Idle → AwaitingToken → Completed | Failed`,
//! looping in `AwaitingToken` while the package asks for more round trips.
//! It owns the connection's [`SecurityContext`] and releases it on every
//! exit path.
//!
//! Steps are strictly sequential (`&mut self`); callers feed the peer's
//! tokens in the order they arrive and bound the number of rounds
//! themselves (see [`NegotiateConfig::max_round_trips`]).

use std::fmt;
use std::mem;
use std::sync::Arc;

use super::identity::{self, AuthenticatedIdentity, IdentityPolicy};
use super::sspi::{AcceptStatus, Accepted, ContextFlags, CredentialHandle, Package, SecurityContext};
use super::{CredentialCache, NegotiateConfig};
use crate::error::{self, Error, Kind, Result};

/// Observable negotiator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    AwaitingToken,
    Completed,
    Failed,
}

/// A finished handshake.
#[derive(Debug)]
pub struct Completion {
    pub identity: AuthenticatedIdentity,
    /// Flags the package actually granted.
    pub flags: ContextFlags,
    /// Final token for the peer (mutual authentication), if any.
    pub token: Option<Vec<u8>>,
}

/// The outcome of one [`Negotiator::step`].
#[derive(Debug)]
pub enum NegotiationResult {
    /// Send this token to the peer and feed back its answer.
    Continue(Vec<u8>),
    Complete(Completion),
    /// The token was truncated; step again with the complete token.
    Incomplete,
    Failed(Error),
}

enum Phase {
    Idle,
    // `None` only when the very first token was incomplete.
    Awaiting(Option<SecurityContext>),
    // `None` once closed.
    Completed(Option<SecurityContext>),
    Failed,
}

/// Drives one connection's handshake.
pub struct Negotiator {
    cache: Arc<CredentialCache>,
    credential: CredentialHandle,
    package: Package,
    requested: ContextFlags,
    policy: IdentityPolicy,
    channel_bindings: Option<Vec<u8>>,
    phase: Phase,
    rounds: usize,
    incomplete: usize,
}

impl Negotiator {
    /// Prepares a handshake for `package`.
    ///
    /// Only the credential is obtained here; the security context is
    /// created by the first [`step`](Negotiator::step).
    pub fn start(
        cache: Arc<CredentialCache>,
        package: Package,
        config: &NegotiateConfig,
    ) -> Result<Negotiator> {
        let credential = cache.get_or_acquire(&package)?;

        log::debug!("starting {} negotiation", package);

        Ok(Negotiator {
            cache,
            credential,
            package,
            requested: config.requested_flags,
            policy: config.identity,
            channel_bindings: None,
            phase: Phase::Idle,
            rounds: 0,
            incomplete: 0,
        })
    }

    /// Binds the handshake to the outer TLS channel
    /// (`SEC_CHANNEL_BINDINGS` bytes).
    pub fn set_channel_bindings(&mut self, bindings: Vec<u8>) {
        self.channel_bindings = Some(bindings);
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Number of `Continue` results produced so far.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Number of `Incomplete` results produced so far.
    pub fn incomplete_steps(&self) -> usize {
        self.incomplete
    }

    pub fn state(&self) -> State {
        match self.phase {
            Phase::Idle => State::Idle,
            Phase::Awaiting(_) => State::AwaitingToken,
            Phase::Completed(_) => State::Completed,
            Phase::Failed => State::Failed,
        }
    }

    /// Feeds the peer's next token.
    ///
    /// `token` may be `None` only on the first call, for packages where the
    /// server speaks first. Stepping a finished negotiator fails with
    /// [`Kind::NotReusable`] without calling into the facility.
    pub fn step(&mut self, token: Option<&[u8]>) -> NegotiationResult {
        let phase = mem::replace(&mut self.phase, Phase::Failed);
        let (phase, result) = self.transition(phase, token);
        self.phase = phase;

        match result {
            NegotiationResult::Continue(_) => {
                self.rounds += 1;
                log::debug!("{} negotiation continues (round {})", self.package, self.rounds);
            }
            NegotiationResult::Incomplete => {
                self.incomplete += 1;
                log::debug!("{} token incomplete", self.package);
            }
            NegotiationResult::Failed(ref e) if !e.is_not_reusable() => {
                log::debug!("{} negotiation failed: {}", self.package, e);
            }
            _ => {}
        }

        result
    }

    fn transition(&self, phase: Phase, token: Option<&[u8]>) -> (Phase, NegotiationResult) {
        let context = match (phase, token) {
            (Phase::Idle, _) => None,
            (Phase::Awaiting(context), Some(_)) => context,
            (Phase::Awaiting(context), None) => {
                if let Some(context) = context {
                    context.release();
                }
                let e = error::invalid_token("no token for a handshake in progress");
                return (Phase::Failed, NegotiationResult::Failed(e));
            }
            (phase @ Phase::Completed(_), _) | (phase @ Phase::Failed, _) => {
                return (phase, NegotiationResult::Failed(error::not_reusable()));
            }
        };

        let accepted = self.cache.sspi().accept_token(
            &self.credential,
            context,
            token,
            self.channel_bindings.as_deref(),
            self.requested,
        );

        self.resolve(accepted)
    }

    fn resolve(&self, accepted: Accepted) -> (Phase, NegotiationResult) {
        let Accepted {
            context,
            token,
            flags,
            status,
        } = accepted;

        match (status, context) {
            (AcceptStatus::ContinueNeeded, Some(context)) => (
                Phase::Awaiting(Some(context)),
                NegotiationResult::Continue(token.unwrap_or_default()),
            ),
            (AcceptStatus::IncompleteMessage, context) => {
                (Phase::Awaiting(context), NegotiationResult::Incomplete)
            }
            (AcceptStatus::Complete, Some(context)) => {
                match identity::extract_identity(&context, &self.policy) {
                    Ok(identity) => {
                        if !flags.contains(self.requested - ContextFlags::ALLOCATE_MEMORY) {
                            log::debug!(
                                "{} granted {:?}, requested {:?}",
                                self.package,
                                flags,
                                self.requested
                            );
                        }
                        (
                            Phase::Completed(Some(context)),
                            NegotiationResult::Complete(Completion {
                                identity,
                                flags,
                                token,
                            }),
                        )
                    }
                    Err(e) => {
                        context.release();
                        (Phase::Failed, NegotiationResult::Failed(e))
                    }
                }
            }
            (AcceptStatus::Error(e), context) => {
                if let Some(context) = context {
                    context.release();
                }
                if e.is_credential_invalid() {
                    self.cache.invalidate(&self.package, &self.credential);
                }
                (Phase::Failed, NegotiationResult::Failed(e))
            }
            (AcceptStatus::ContinueNeeded | AcceptStatus::Complete, None) => {
                let e = Error::new(Kind::Native, Some("facility returned no security context"));
                (Phase::Failed, NegotiationResult::Failed(e))
            }
        }
    }

    /// Abandons the handshake, e.g. because the connection closed.
    ///
    /// Releases any context still held. A handshake in progress moves to
    /// `Failed`; a completed one keeps its state. Safe to call repeatedly.
    pub fn abort(&mut self) {
        match mem::replace(&mut self.phase, Phase::Failed) {
            Phase::Idle | Phase::Failed => {}
            Phase::Awaiting(context) => {
                if let Some(context) = context {
                    context.release();
                }
                log::debug!("{} negotiation aborted", self.package);
            }
            Phase::Completed(context) => {
                if let Some(context) = context {
                    context.release();
                }
                self.phase = Phase::Completed(None);
            }
        }
    }

    /// Releases the context of a completed handshake.
    pub fn close(&mut self) {
        if let Phase::Completed(ref mut context) = self.phase {
            if let Some(context) = context.take() {
                context.release();
            }
        }
    }

    /// The completed context, for message protection.
    pub fn context(&self) -> Option<&SecurityContext> {
        match self.phase {
            Phase::Completed(Some(ref context)) => Some(context),
            _ => None,
        }
    }

    pub fn context_mut(&mut self) -> Option<&mut SecurityContext> {
        match self.phase {
            Phase::Completed(Some(ref mut context)) => Some(context),
            _ => None,
        }
    }

    /// Extracts the identity again from the completed context.
    pub fn identity(&self) -> Result<AuthenticatedIdentity> {
        match self.context() {
            Some(context) => identity::extract_identity(context, &self.policy),
            None => Err(error::not_ready()),
        }
    }
}

impl fmt::Debug for Negotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Negotiator")
            .field("package", &self.package)
            .field("state", &self.state())
            .field("rounds", &self.rounds)
            .field("incomplete", &self.incomplete)
            .finish()
    }
}
