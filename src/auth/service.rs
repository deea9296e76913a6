// src/auth/service.rs

//! Tower middleware that authenticates HTTP requests with Negotiate.
//!
//! Apply [`NegotiateLayer`] once per connection: the wrapped service keeps
//! that connection's handshake between requests, as NTLM requires.
//!
//! ```no_run
//! # #[cfg(all(windows, feature = "native"))]
//! # fn wrap<S>(inner: S) {
//! use std::sync::Arc;
//! use tower::Layer;
//! use winauth::auth::{Credentials, CredentialCache, NegotiateConfig, NegotiateLayer, Sspi};
//!
//! let cache = Arc::new(CredentialCache::new(Sspi::native(), Credentials::CurrentUser));
//! let layer = NegotiateLayer::new(cache, NegotiateConfig::new());
//! // per accepted connection:
//! let service = layer.layer(inner);
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use http::{Request, Response, StatusCode};
use tower::{Layer, Service};

use super::challenge::{self, Authorization};
use super::negotiate::{Completion, NegotiationResult, Negotiator, State};
use super::sspi::{ContextFlags, Package};
use super::{CredentialCache, NegotiateConfig};
use crate::error::{Error, Kind};

/// DER-encoded TLS client certificate, inserted by the transport.
///
/// When present on the request that completes the handshake it is attached
/// to the [`AuthenticatedIdentity`](super::AuthenticatedIdentity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCertificate(pub Vec<u8>);

/// `SEC_CHANNEL_BINDINGS` bytes for the connection's TLS channel,
/// inserted by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBindings(pub Vec<u8>);

type Slot = Arc<Mutex<Option<Negotiator>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<Negotiator>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Wraps services with [`NegotiateService`].
#[derive(Clone)]
pub struct NegotiateLayer {
    cache: Arc<CredentialCache>,
    config: Arc<NegotiateConfig>,
}

impl NegotiateLayer {
    pub fn new(cache: Arc<CredentialCache>, config: NegotiateConfig) -> NegotiateLayer {
        NegotiateLayer {
            cache,
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for NegotiateLayer {
    type Service = NegotiateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        NegotiateService {
            inner,
            cache: self.cache.clone(),
            config: self.config.clone(),
            negotiator: Arc::new(Mutex::new(None)),
        }
    }
}

impl fmt::Debug for NegotiateLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiateLayer")
            .field("config", &self.config)
            .finish()
    }
}

/// Authenticates one connection's requests.
///
/// Clones share the connection's pending handshake.
#[derive(Clone)]
pub struct NegotiateService<S> {
    inner: S,
    cache: Arc<CredentialCache>,
    config: Arc<NegotiateConfig>,
    negotiator: Slot,
}

impl<S> NegotiateService<S> {
    /// The state of the pending handshake, if any.
    pub fn state(&self) -> Option<State> {
        lock(&self.negotiator).as_ref().map(Negotiator::state)
    }
}

impl<S> fmt::Debug for NegotiateService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiateService")
            .field("pending", &self.state())
            .finish()
    }
}

enum Outcome {
    Continue(Package, Vec<u8>),
    Complete(Package, Completion),
    Incomplete(Package),
    Rejected(Error),
}

fn round_trips_exceeded(limit: usize) -> Error {
    Error::new(
        Kind::LogonDenied,
        Some(format!("handshake exceeded {} round trips", limit)),
    )
}

// Incomplete tokens count toward the limit.
fn exhausted(negotiator: &Negotiator, config: &NegotiateConfig) -> bool {
    negotiator.rounds() + negotiator.incomplete_steps() > config.max_round_trips
}

fn flags_not_granted(granted: ContextFlags, requested: ContextFlags) -> Error {
    Error::new(
        Kind::LogonDenied,
        Some(format!("granted {:?}, requested {:?}", granted, requested)),
    )
}

/// One blocking handshake step. Returns the negotiator to keep for the
/// connection's next request, if any.
fn advance(
    pending: Option<Negotiator>,
    cache: Arc<CredentialCache>,
    config: &NegotiateConfig,
    auth: Authorization,
    bindings: Option<Vec<u8>>,
) -> (Option<Negotiator>, Outcome) {
    let mut negotiator = match pending {
        Some(n) if n.package() == &auth.package && n.state() == State::AwaitingToken => n,
        pending => {
            if let Some(mut stale) = pending {
                log::debug!("restarting handshake, client switched to {}", auth.package);
                stale.abort();
            }
            match Negotiator::start(cache, auth.package.clone(), config) {
                Ok(mut n) => {
                    if let Some(bindings) = bindings {
                        n.set_channel_bindings(bindings);
                    }
                    n
                }
                Err(e) => return (None, Outcome::Rejected(e)),
            }
        }
    };

    let package = negotiator.package().clone();
    match negotiator.step(Some(&auth.token)) {
        NegotiationResult::Continue(_) | NegotiationResult::Incomplete
            if exhausted(&negotiator, config) =>
        {
            negotiator.abort();
            (None, Outcome::Rejected(round_trips_exceeded(config.max_round_trips)))
        }
        NegotiationResult::Continue(token) => (Some(negotiator), Outcome::Continue(package, token)),
        NegotiationResult::Incomplete => (Some(negotiator), Outcome::Incomplete(package)),
        NegotiationResult::Complete(completion) => {
            negotiator.close();
            let required = config.requested_flags - ContextFlags::ALLOCATE_MEMORY;
            if !completion.flags.contains(required) {
                return (
                    None,
                    Outcome::Rejected(flags_not_granted(completion.flags, required)),
                );
            }
            (None, Outcome::Complete(package, completion))
        }
        NegotiationResult::Failed(e) => (None, Outcome::Rejected(e)),
    }
}

fn respond<B: Default>(status: StatusCode) -> Response<B> {
    let mut res = Response::new(B::default());
    *res.status_mut() = status;
    res
}

fn challenge_all<B: Default>(config: &NegotiateConfig, status: StatusCode) -> Response<B> {
    let mut res = respond(status);
    challenge::append_challenges(res.headers_mut(), config.offered_packages());
    res
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for NegotiateService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        // The readied service handles this request; its clone takes its place.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let cache = self.cache.clone();
        let config = self.config.clone();
        let slot = self.negotiator.clone();

        Box::pin(async move {
            let auth = match challenge::parse_authorization(req.headers()) {
                Ok(Some(auth)) if config.offers(&auth.package) => auth,
                Ok(_) => return Ok(challenge_all(&config, StatusCode::UNAUTHORIZED)),
                Err(e) => {
                    log::warn!("rejected Authorization header: {}", e);
                    return Ok(challenge_all(&config, challenge::status_for(&e)));
                }
            };

            let bindings = req
                .extensions()
                .get::<ChannelBindings>()
                .map(|b| b.0.clone());
            let pending = lock(&slot).take();

            let step_config = config.clone();
            let joined = tokio::task::spawn_blocking(move || {
                advance(pending, cache, &step_config, auth, bindings)
            })
            .await;

            let outcome = match joined {
                Ok((keep, outcome)) => {
                    *lock(&slot) = keep;
                    outcome
                }
                Err(e) => {
                    log::warn!("negotiation task failed: {}", e);
                    return Ok(respond(StatusCode::INTERNAL_SERVER_ERROR));
                }
            };

            match outcome {
                Outcome::Continue(package, token) => {
                    let mut res = respond(StatusCode::UNAUTHORIZED);
                    res.headers_mut().insert(
                        http::header::WWW_AUTHENTICATE,
                        challenge::challenge(&package, Some(&token)),
                    );
                    Ok(res)
                }
                Outcome::Incomplete(package) => {
                    let mut res = respond(StatusCode::UNAUTHORIZED);
                    res.headers_mut().insert(
                        http::header::WWW_AUTHENTICATE,
                        challenge::challenge(&package, None),
                    );
                    Ok(res)
                }
                Outcome::Rejected(e) => {
                    log::warn!("negotiation rejected: {}", e);
                    Ok(challenge_all(&config, challenge::status_for(&e)))
                }
                Outcome::Complete(package, completion) => {
                    let Completion {
                        mut identity,
                        token,
                        ..
                    } = completion;
                    if let Some(cert) = req.extensions_mut().remove::<PeerCertificate>() {
                        identity = identity.with_peer_certificate(cert.0);
                    }
                    req.extensions_mut().insert(Arc::new(identity));

                    let mut res = inner.call(req).await?;
                    if let Some(token) = token {
                        res.headers_mut().append(
                            http::header::WWW_AUTHENTICATE,
                            challenge::challenge(&package, Some(&token)),
                        );
                    }
                    Ok(res)
                }
            }
        })
    }
}
