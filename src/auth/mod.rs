// src/auth/mod.rs

//! Server-side HTTP Negotiate (Kerberos/SPNEGO/NTLM) authentication.
//!
//! The pieces, leaf first:
//!
//! - [`sspi`]: typed adapter over the host's SSPI facility.
//! - [`cache`]: process-wide credential handles, one per package.
//! - [`negotiate`]: the per-connection handshake state machine.
//! - [`identity`]: the authenticated principal of a completed handshake.
//! - [`challenge`]: `Authorization` / `WWW-Authenticate` header glue.
//! - `service`: tower middleware tying it together (feature `middleware`).

pub mod cache;
pub mod challenge;
pub mod identity;
pub mod negotiate;
pub mod sspi;

#[cfg(feature = "middleware")]
pub mod service;

pub use self::cache::CredentialCache;
pub use self::identity::{extract_identity, AuthenticatedIdentity, IdentityPolicy, OsToken};
pub use self::negotiate::{Completion, NegotiationResult, Negotiator, State};
pub use self::sspi::{ContextFlags, CredentialHandle, Package, SecurityContext, Sspi};

#[cfg(feature = "middleware")]
pub use self::service::{ChannelBindings, NegotiateLayer, NegotiateService, PeerCertificate};

const DEFAULT_MAX_ROUND_TRIPS: usize = 5;

/// The identity the server acquires its credential handles as.
#[derive(Clone)]
pub enum Credentials {
    /// The identity the process runs as (the usual case for a service).
    CurrentUser,

    /// An explicit service account.
    Explicit {
        username: String,
        domain: Option<String>,
        password: String,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::CurrentUser => f.write_str("CurrentUser"),
            Credentials::Explicit {
                username, domain, ..
            } => f
                .debug_struct("Explicit")
                .field("username", username)
                .field("domain", domain)
                .finish_non_exhaustive(),
        }
    }
}

/// Configuration for Negotiate authentication.
///
/// ```
/// use winauth::auth::{NegotiateConfig, Package};
///
/// let config = NegotiateConfig::new()
///     .packages([Package::Negotiate])
///     .max_round_trips(3);
/// assert_eq!(config.offered_packages(), &[Package::Negotiate]);
/// ```
#[derive(Clone, Debug)]
pub struct NegotiateConfig {
    pub(crate) packages: Vec<Package>,
    pub(crate) credentials: Credentials,
    pub(crate) requested_flags: ContextFlags,
    pub(crate) max_round_trips: usize,
    pub(crate) identity: IdentityPolicy,
}

impl Default for NegotiateConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl NegotiateConfig {
    pub fn new() -> Self {
        Self {
            packages: vec![Package::Negotiate, Package::Ntlm],
            credentials: Credentials::CurrentUser,
            requested_flags: ContextFlags::CONNECTION,
            max_round_trips: DEFAULT_MAX_ROUND_TRIPS,
            identity: IdentityPolicy::default(),
        }
    }

    /// Packages offered in `WWW-Authenticate`, in preference order.
    pub fn packages<I>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = Package>,
    {
        self.packages = packages.into_iter().collect();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        domain: Option<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Credentials::Explicit {
            username: username.into(),
            domain,
            password: password.into(),
        };
        self
    }

    /// `ASC_REQ_*` flags requested on every acceptance step.
    pub fn requested_flags(mut self, flags: ContextFlags) -> Self {
        self.requested_flags = flags;
        self
    }

    /// Upper bound on `Continue` rounds per handshake.
    pub fn max_round_trips(mut self, rounds: usize) -> Self {
        self.max_round_trips = rounds;
        self
    }

    /// Also retrieve the client's OS token for impersonation.
    pub fn impersonation_token(mut self, enabled: bool) -> Self {
        self.identity.impersonation_token = enabled;
        self
    }

    /// Keeps only packages the host actually has installed.
    pub fn retain_available(mut self, installed: &[sspi::PackageInfo]) -> Self {
        self.packages.retain(|p| {
            installed
                .iter()
                .any(|info| info.name.eq_ignore_ascii_case(p.as_str()))
        });
        self
    }

    pub fn offered_packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn get_requested_flags(&self) -> ContextFlags {
        self.requested_flags
    }

    pub fn get_max_round_trips(&self) -> usize {
        self.max_round_trips
    }

    pub fn identity_policy(&self) -> &IdentityPolicy {
        &self.identity
    }

    pub(crate) fn offers(&self, package: &Package) -> bool {
        self.packages.contains(package)
    }
}
