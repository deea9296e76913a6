// src/error.rs

use std::error::Error as StdError;
use std::fmt;

/// A `Result` alias where the `Err` case is `winauth::Error`.
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// The errors that may occur while negotiating integrated authentication.
///
/// Native status codes are translated into an `Error` exactly once, inside
/// the SSPI adapter. The raw code is kept for diagnostics and is available
/// through [`Error::code`].
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    code: Option<i32>,
    source: Option<BoxError>,
}

/// The category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Kind {
    /// The requested security package is not installed on this host.
    PackageNotSupported,
    /// The process lacks the rights to act as the requested package.
    AccessDenied,
    /// The peer sent a token the package could not parse.
    InvalidToken,
    /// The token was truncated; feed the complete token again.
    IncompleteMessage,
    /// The security context expired and must be renegotiated.
    ContextExpired,
    /// The completed context cannot produce an identity.
    IdentityUnavailable,
    /// The server credential handle is no longer usable.
    CredentialInvalid,
    /// The peer's credentials were rejected.
    LogonDenied,
    /// The operation needs a completed security context.
    NotReady,
    /// The negotiator has finished and cannot be stepped again.
    NotReusable,
    /// Any native status without a dedicated category.
    Native,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                code: None,
                source: source.map(Into::into),
            }),
        }
    }

    pub(crate) fn with_code(mut self, code: i32) -> Error {
        self.inner.code = Some(code);
        self
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> Kind {
        self.inner.kind
    }

    /// Returns the native status code this error was translated from, if any.
    pub fn code(&self) -> Option<i32> {
        self.inner.code
    }

    /// Returns true if the security package is not available on this host.
    pub fn is_package_not_supported(&self) -> bool {
        matches!(self.inner.kind, Kind::PackageNotSupported)
    }

    /// Returns true if the error is an access denial.
    pub fn is_access_denied(&self) -> bool {
        matches!(self.inner.kind, Kind::AccessDenied)
    }

    /// Returns true if the peer's token was rejected as malformed.
    pub fn is_invalid_token(&self) -> bool {
        matches!(self.inner.kind, Kind::InvalidToken)
    }

    /// Returns true if the token was incomplete and should be retried.
    pub fn is_incomplete_message(&self) -> bool {
        matches!(self.inner.kind, Kind::IncompleteMessage)
    }

    /// Returns true if the server credential must be re-acquired.
    pub fn is_credential_invalid(&self) -> bool {
        matches!(self.inner.kind, Kind::CredentialInvalid)
    }

    /// Returns true if the negotiator cannot be reused.
    pub fn is_not_reusable(&self) -> bool {
        matches!(self.inner.kind, Kind::NotReusable)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut builder = f.debug_struct("winauth::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(code) = self.inner.code {
            builder.field("code", &format_args!("0x{:08X}", code as u32));
        }

        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.inner.kind {
            Kind::PackageNotSupported => f.write_str("security package not supported")?,
            Kind::AccessDenied => f.write_str("access denied")?,
            Kind::InvalidToken => f.write_str("invalid authentication token")?,
            Kind::IncompleteMessage => f.write_str("incomplete authentication token")?,
            Kind::ContextExpired => f.write_str("security context expired")?,
            Kind::IdentityUnavailable => f.write_str("authenticated identity unavailable")?,
            Kind::CredentialInvalid => f.write_str("server credential is invalid")?,
            Kind::LogonDenied => f.write_str("logon denied")?,
            Kind::NotReady => f.write_str("security context is not complete")?,
            Kind::NotReusable => f.write_str("negotiation already finished")?,
            Kind::Native => f.write_str("security facility error")?,
        }

        if let Some(code) = self.inner.code {
            write!(f, " (0x{:08X})", code as u32)?;
        }

        if let Some(ref e) = self.inner.source {
            write!(f, ": {e}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}

pub(crate) fn native(kind: Kind, code: i32) -> Error {
    Error::new(kind, None::<Error>).with_code(code)
}

pub(crate) fn invalid_token<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::InvalidToken, Some(e))
}

pub(crate) fn not_ready() -> Error {
    Error::new(Kind::NotReady, None::<Error>)
}

pub(crate) fn not_reusable() -> Error {
    Error::new(Kind::NotReusable, None::<Error>)
}

pub(crate) fn identity_unavailable<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::IdentityUnavailable, Some(e))
}
