// src/auth/identity.rs

//! Identity extraction from a completed security context.

use std::fmt;
use std::sync::Arc;

use super::sspi::{status, Facility, RawToken, SecurityContext};
use crate::error::{self, Error, Result};

/// Which optional parts of the identity to retrieve.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPolicy {
    /// Also fetch the client's OS access token (`QuerySecurityContextToken`).
    pub impersonation_token: bool,
}

/// The client's OS access token.
///
/// Closed on drop unless handed off with [`OsToken::into_raw`].
pub struct OsToken {
    facility: Option<Arc<dyn Facility>>,
    raw: RawToken,
}

impl OsToken {
    pub(crate) fn new(facility: Arc<dyn Facility>, raw: RawToken) -> OsToken {
        OsToken {
            facility: Some(facility),
            raw,
        }
    }

    /// Relinquishes ownership of the native token handle.
    ///
    /// The caller becomes responsible for closing it.
    pub fn into_raw(mut self) -> usize {
        self.facility = None;
        self.raw.0
    }
}

impl Drop for OsToken {
    fn drop(&mut self) {
        if let Some(facility) = self.facility.take() {
            let code = facility.close_token(self.raw);
            if code != status::SEC_E_OK {
                log::warn!("CloseHandle(token) failed: 0x{:08X}", code as u32);
            }
        }
    }
}

impl fmt::Debug for OsToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OsToken").finish()
    }
}

/// The principal a completed handshake authenticated.
///
/// Owned by the application once handed off.
#[derive(Debug)]
pub struct AuthenticatedIdentity {
    name: String,
    package: String,
    token: Option<OsToken>,
    peer_certificate: Option<Vec<u8>>,
}

impl AuthenticatedIdentity {
    /// The client principal, e.g. `CONTOSO\alice`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The package that actually authenticated the client.
    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn token(&self) -> Option<&OsToken> {
        self.token.as_ref()
    }

    /// Takes the OS token out of the identity.
    pub fn take_token(&mut self) -> Option<OsToken> {
        self.token.take()
    }

    /// The TLS client certificate (DER), when the transport supplied one.
    pub fn peer_certificate(&self) -> Option<&[u8]> {
        self.peer_certificate.as_deref()
    }

    pub fn with_peer_certificate(mut self, der: Vec<u8>) -> AuthenticatedIdentity {
        self.peer_certificate = Some(der);
        self
    }
}

// The package cannot report this part of the identity.
fn unavailable(e: Error) -> Error {
    if e.code() == Some(status::SEC_E_UNSUPPORTED_FUNCTION) {
        error::identity_unavailable(e)
    } else {
        e
    }
}

/// Builds the [`AuthenticatedIdentity`] of a completed context.
///
/// The negotiated package comes from `SECPKG_ATTR_NEGOTIATION_INFO`, then
/// `SECPKG_ATTR_PACKAGE_INFO`, then the package the context was accepted
/// under. Any OS token obtained here belongs to the returned identity.
pub fn extract_identity(
    context: &SecurityContext,
    policy: &IdentityPolicy,
) -> Result<AuthenticatedIdentity> {
    if !context.is_complete() {
        return Err(error::not_ready());
    }

    let name = match context.client_name() {
        Ok(name) if !name.is_empty() => name,
        Ok(_) => return Err(error::identity_unavailable("empty client name")),
        Err(e) => return Err(unavailable(e)),
    };

    let package = context
        .negotiated_package()
        .ok()
        .filter(|p| !p.is_empty())
        .or_else(|| {
            context
                .query_attribute(super::sspi::ContextAttribute::PackageInfo)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .filter(|p| !p.is_empty())
        })
        .unwrap_or_else(|| context.package().to_string());

    let token = if policy.impersonation_token {
        Some(context.security_token().map_err(unavailable)?)
    } else {
        None
    };

    log::debug!("authenticated {} via {}", name, package);

    Ok(AuthenticatedIdentity {
        name,
        package,
        token,
        peer_certificate: None,
    })
}
