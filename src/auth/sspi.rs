// src/auth/sspi.rs

//! Windows SSPI (Security Support Provider Interface) adapter for server-side
//! Negotiate/NTLM/Kerberos acceptance.
//!
//! The adapter has two layers:
//!
//! - [`Facility`] is the raw call surface. It has one method per native
//!   function and traffics in raw handles and raw status codes. The Windows
//!   implementation lives in [`WindowsFacility`]; tests plug in simulators.
//! - [`Sspi`] is the typed layer on top. Every raw status is translated here,
//!   once, and every facility-owned resource comes back wrapped in an owned
//!   type ([`CredentialHandle`], [`SecurityContext`], [`OsToken`]) whose
//!   native release runs exactly once.
//!
//! The adapter does no caching of its own; see
//! [`CredentialCache`](crate::auth::CredentialCache).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bitflags::bitflags;

use super::identity::OsToken;
use crate::error::{self, Error, Kind, Result};

#[cfg(all(windows, feature = "native"))]
mod win32;

#[cfg(all(windows, feature = "native"))]
pub use self::win32::WindowsFacility;

/// Raw `SECURITY_STATUS` values from the Windows SDK.
pub mod status {
    #![allow(missing_docs)]

    pub const SEC_E_OK: i32 = 0;
    pub const SEC_I_CONTINUE_NEEDED: i32 = 0x0009_0312;
    pub const SEC_I_COMPLETE_NEEDED: i32 = 0x0009_0313;
    pub const SEC_I_COMPLETE_AND_CONTINUE: i32 = 0x0009_0314;
    pub const SEC_E_INVALID_HANDLE: i32 = 0x8009_0301_u32 as i32;
    pub const SEC_E_UNSUPPORTED_FUNCTION: i32 = 0x8009_0302_u32 as i32;
    pub const SEC_E_SECPKG_NOT_FOUND: i32 = 0x8009_0305_u32 as i32;
    pub const SEC_E_NOT_OWNER: i32 = 0x8009_0306_u32 as i32;
    pub const SEC_E_INVALID_TOKEN: i32 = 0x8009_0308_u32 as i32;
    pub const SEC_E_LOGON_DENIED: i32 = 0x8009_030C_u32 as i32;
    pub const SEC_E_UNKNOWN_CREDENTIALS: i32 = 0x8009_030D_u32 as i32;
    pub const SEC_E_NO_CREDENTIALS: i32 = 0x8009_030E_u32 as i32;
    pub const SEC_E_MESSAGE_ALTERED: i32 = 0x8009_030F_u32 as i32;
    pub const SEC_E_OUT_OF_SEQUENCE: i32 = 0x8009_0310_u32 as i32;
    pub const SEC_E_CONTEXT_EXPIRED: i32 = 0x8009_0317_u32 as i32;
    pub const SEC_E_INCOMPLETE_MESSAGE: i32 = 0x8009_0318_u32 as i32;
    pub const SEC_E_BAD_BINDINGS: i32 = 0x8009_0346_u32 as i32;
    pub const E_ACCESSDENIED: i32 = 0x8007_0005_u32 as i32;
}

/// Closed classification of a raw status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SecurityStatus {
    Ok,
    ContinueNeeded,
    CompleteNeeded,
    CompleteAndContinue,
    IncompleteMessage,
    Failed(Kind),
}

impl SecurityStatus {
    pub(crate) fn from_raw(code: i32) -> SecurityStatus {
        match code {
            status::SEC_E_OK => SecurityStatus::Ok,
            status::SEC_I_CONTINUE_NEEDED => SecurityStatus::ContinueNeeded,
            status::SEC_I_COMPLETE_NEEDED => SecurityStatus::CompleteNeeded,
            status::SEC_I_COMPLETE_AND_CONTINUE => SecurityStatus::CompleteAndContinue,
            status::SEC_E_INCOMPLETE_MESSAGE => SecurityStatus::IncompleteMessage,
            other => SecurityStatus::Failed(kind_of(other)),
        }
    }
}

fn kind_of(code: i32) -> Kind {
    match code {
        status::SEC_E_SECPKG_NOT_FOUND => Kind::PackageNotSupported,
        status::SEC_E_NOT_OWNER | status::E_ACCESSDENIED => Kind::AccessDenied,
        status::SEC_E_INVALID_TOKEN | status::SEC_E_BAD_BINDINGS => Kind::InvalidToken,
        status::SEC_E_INCOMPLETE_MESSAGE => Kind::IncompleteMessage,
        status::SEC_E_CONTEXT_EXPIRED => Kind::ContextExpired,
        status::SEC_E_UNKNOWN_CREDENTIALS | status::SEC_E_NO_CREDENTIALS => {
            Kind::CredentialInvalid
        }
        status::SEC_E_LOGON_DENIED => Kind::LogonDenied,
        _ => Kind::Native,
    }
}

fn check(code: i32) -> Result<()> {
    if code == status::SEC_E_OK {
        Ok(())
    } else {
        Err(error::native(kind_of(code), code))
    }
}

fn translate(code: i32) -> Error {
    error::native(kind_of(code), code)
}

/// A native handle as two machine words, laid out like `SecHandle`.
///
/// Only [`Facility`] implementations ever see raw handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawHandle {
    pub lower: usize,
    pub upper: usize,
}

impl RawHandle {
    pub fn is_invalid(&self) -> bool {
        self.lower == 0 && self.upper == 0
    }
}

/// A raw OS access token handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawToken(pub usize);

/// How a credential will be used (`SECPKG_CRED_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CredentialUse {
    Inbound = 1,
    Outbound = 2,
    Both = 3,
}

/// An authentication package exposed by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Package {
    Negotiate,
    Ntlm,
    Kerberos,
    Other(String),
}

impl Package {
    /// The canonical package name, as SSPI spells it.
    pub fn as_str(&self) -> &str {
        match self {
            Package::Negotiate => "Negotiate",
            Package::Ntlm => "NTLM",
            Package::Kerberos => "Kerberos",
            Package::Other(name) => name,
        }
    }
}

impl FromStr for Package {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Ok(if s.eq_ignore_ascii_case("negotiate") {
            Package::Negotiate
        } else if s.eq_ignore_ascii_case("ntlm") {
            Package::Ntlm
        } else if s.eq_ignore_ascii_case("kerberos") {
            Package::Kerberos
        } else {
            Package::Other(s.to_string())
        })
    }
}

impl From<&str> for Package {
    fn from(s: &str) -> Package {
        match s.parse() {
            Ok(package) => package,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit credentials for `AcquireCredentialsHandle`.
#[derive(Clone)]
pub struct AuthIdentity {
    pub username: String,
    pub domain: Option<String>,
    pub password: String,
}

impl fmt::Debug for AuthIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthIdentity")
            .field("username", &self.username)
            .field("domain", &self.domain)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The kind of a [`SecurityBuffer`] (`SECBUFFER_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BufferKind {
    Empty = 0,
    Data = 1,
    Token = 2,
    Missing = 4,
    Extra = 5,
    StreamTrailer = 6,
    StreamHeader = 7,
    Padding = 9,
    Stream = 10,
    ChannelBindings = 14,
}

impl BufferKind {
    pub fn from_raw(raw: u32) -> BufferKind {
        // The high nibble carries SECBUFFER_ATTRMASK flags.
        match raw & 0x0FFF_FFFF {
            1 => BufferKind::Data,
            2 => BufferKind::Token,
            4 => BufferKind::Missing,
            5 => BufferKind::Extra,
            6 => BufferKind::StreamTrailer,
            7 => BufferKind::StreamHeader,
            9 => BufferKind::Padding,
            10 => BufferKind::Stream,
            14 => BufferKind::ChannelBindings,
            _ => BufferKind::Empty,
        }
    }
}

/// A tagged byte region passed to and from the facility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityBuffer {
    pub kind: BufferKind,
    pub data: Vec<u8>,
}

impl SecurityBuffer {
    pub fn new(kind: BufferKind, data: Vec<u8>) -> SecurityBuffer {
        SecurityBuffer { kind, data }
    }

    /// A zero-filled buffer of `len` bytes for the facility to write into.
    pub fn with_capacity(kind: BufferKind, len: usize) -> SecurityBuffer {
        SecurityBuffer {
            kind,
            data: vec![0; len],
        }
    }

    pub fn find(buffers: &[SecurityBuffer], kind: BufferKind) -> Option<&SecurityBuffer> {
        buffers.iter().find(|b| b.kind == kind)
    }
}

bitflags! {
    /// Requested (`ASC_REQ_*`) and negotiated (`ASC_RET_*`) context flags.
    ///
    /// Negotiated flags may differ from the request; check, don't assume.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ContextFlags: u32 {
        const DELEGATE = 0x1;
        const MUTUAL_AUTH = 0x2;
        const REPLAY_DETECT = 0x4;
        const SEQUENCE_DETECT = 0x8;
        const CONFIDENTIALITY = 0x10;
        const USE_SESSION_KEY = 0x20;
        const ALLOCATE_MEMORY = 0x100;
        const CONNECTION = 0x800;
        const EXTENDED_ERROR = 0x8000;
        const STREAM = 0x10_000;
        const INTEGRITY = 0x20_000;
        const IDENTIFY = 0x80_000;
        const ALLOW_NULL_SESSION = 0x100_000;
    }
}

/// Context attributes for `QueryContextAttributes` (`SECPKG_ATTR_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ContextAttribute {
    Sizes = 0,
    Names = 1,
    Lifespan = 2,
    PackageInfo = 10,
    NegotiationInfo = 12,
    Flags = 14,
    AccessToken = 18,
    ClientSpecifiedTarget = 27,
}

/// A security package installed on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    pub comment: String,
    pub capabilities: u32,
    pub version: u16,
    pub rpc_id: u16,
    pub max_token: u32,
}

/// Buffer sizes negotiated for message protection (`SecPkgContext_Sizes`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSizes {
    pub max_token: u32,
    pub max_signature: u32,
    pub block_size: u32,
    pub security_trailer: u32,
}

impl ContextSizes {
    /// Decodes the four little-endian `u32` fields of `SecPkgContext_Sizes`.
    pub fn from_bytes(bytes: &[u8]) -> Option<ContextSizes> {
        if bytes.len() < 16 {
            return None;
        }
        let field = |i: usize| {
            let mut word = [0u8; 4];
            word.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
            u32::from_le_bytes(word)
        };
        Some(ContextSizes {
            max_token: field(0),
            max_signature: field(1),
            block_size: field(2),
            security_trailer: field(3),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        [
            self.max_token,
            self.max_signature,
            self.block_size,
            self.security_trailer,
        ]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
    }
}

/// What one native `AcceptSecurityContext` call produced.
#[derive(Debug)]
pub struct AcceptCall {
    /// Raw `SECURITY_STATUS`.
    pub status: i32,
    /// The (possibly new) context handle; invalid if none was created.
    pub context: RawHandle,
    /// The output token, already copied out of facility memory.
    pub output: Vec<u8>,
    /// Negotiated `ASC_RET_*` flags.
    pub flags: ContextFlags,
}

/// The raw SSPI call surface.
///
/// Every method maps to one native function. Implementations must copy any
/// facility-allocated output into owned memory and free the native buffer
/// before returning. String-valued attributes are returned as UTF-8.
pub trait Facility: Send + Sync + 'static {
    fn enumerate_security_packages(&self) -> std::result::Result<Vec<PackageInfo>, i32>;

    fn acquire_credentials_handle(
        &self,
        package: &str,
        usage: CredentialUse,
        identity: Option<&AuthIdentity>,
    ) -> std::result::Result<RawHandle, i32>;

    fn accept_security_context(
        &self,
        credential: RawHandle,
        context: Option<RawHandle>,
        input: &[SecurityBuffer],
        requested: ContextFlags,
    ) -> AcceptCall;

    fn complete_auth_token(&self, context: RawHandle, token: &mut [SecurityBuffer]) -> i32;

    fn query_context_attributes(
        &self,
        context: RawHandle,
        attribute: ContextAttribute,
    ) -> std::result::Result<Vec<u8>, i32>;

    fn set_context_attributes(
        &self,
        context: RawHandle,
        attribute: ContextAttribute,
        value: &[u8],
    ) -> i32;

    fn query_security_context_token(&self, context: RawHandle)
        -> std::result::Result<RawToken, i32>;

    fn encrypt_message(
        &self,
        context: RawHandle,
        qop: u32,
        message: &mut [SecurityBuffer],
        sequence: u32,
    ) -> i32;

    fn decrypt_message(
        &self,
        context: RawHandle,
        message: &mut [SecurityBuffer],
        sequence: u32,
    ) -> std::result::Result<u32, i32>;

    fn delete_security_context(&self, context: RawHandle) -> i32;

    fn free_credentials_handle(&self, credential: RawHandle) -> i32;

    fn close_token(&self, token: RawToken) -> i32;
}

/// The typed SSPI adapter.
///
/// Cheap to clone; all clones share one facility.
#[derive(Clone)]
pub struct Sspi {
    facility: Arc<dyn Facility>,
}

impl Sspi {
    pub fn new(facility: Arc<dyn Facility>) -> Sspi {
        Sspi { facility }
    }

    /// The adapter over the host's `secur32` facility.
    #[cfg(all(windows, feature = "native"))]
    pub fn native() -> Sspi {
        Sspi::new(Arc::new(WindowsFacility::new()))
    }

    /// Lists the security packages installed on the host.
    pub fn packages(&self) -> Result<Vec<PackageInfo>> {
        self.facility
            .enumerate_security_packages()
            .map_err(translate)
    }

    /// Acquires a credential handle for `package`.
    ///
    /// `identity` of `None` uses the process identity.
    pub fn acquire_credentials(
        &self,
        package: &Package,
        usage: CredentialUse,
        identity: Option<&AuthIdentity>,
    ) -> Result<CredentialHandle> {
        let raw = self
            .facility
            .acquire_credentials_handle(package.as_str(), usage, identity)
            .map_err(translate)?;

        log::debug!("acquired {} credential handle ({:?})", package, usage);

        Ok(CredentialHandle {
            inner: Arc::new(CredentialInner {
                facility: self.facility.clone(),
                raw,
                package: package.clone(),
                usage,
            }),
        })
    }

    /// Runs one `AcceptSecurityContext` step.
    ///
    /// `context` is `None` on the first call of a handshake. Any context
    /// handle the facility created is returned in [`Accepted::context`] even
    /// when the step failed, so the caller can release it.
    pub fn accept_token(
        &self,
        credential: &CredentialHandle,
        context: Option<SecurityContext>,
        input: Option<&[u8]>,
        channel_bindings: Option<&[u8]>,
        requested: ContextFlags,
    ) -> Accepted {
        let mut buffers = Vec::with_capacity(2);
        if let Some(token) = input {
            buffers.push(SecurityBuffer::new(BufferKind::Token, token.to_vec()));
        }
        if let Some(bindings) = channel_bindings {
            buffers.push(SecurityBuffer::new(
                BufferKind::ChannelBindings,
                bindings.to_vec(),
            ));
        }

        let existing = context.as_ref().map(SecurityContext::raw);
        let call = self.facility.accept_security_context(
            credential.raw(),
            existing,
            &buffers,
            requested,
        );

        log::trace!(
            "AcceptSecurityContext({}) -> 0x{:08X}, {} byte token",
            credential.package(),
            call.status as u32,
            call.output.len()
        );

        // Take ownership of a freshly created handle before looking at the
        // status, so error paths release it too.
        let mut context = match context {
            Some(context) => Some(context),
            None if !call.context.is_invalid() => Some(SecurityContext {
                facility: self.facility.clone(),
                raw: Some(call.context),
                package: credential.package().clone(),
                complete: false,
            }),
            None => None,
        };

        let mut token = call.output;
        let status = match SecurityStatus::from_raw(call.status) {
            SecurityStatus::Ok => AcceptStatus::Complete,
            SecurityStatus::ContinueNeeded => AcceptStatus::ContinueNeeded,
            next @ (SecurityStatus::CompleteNeeded | SecurityStatus::CompleteAndContinue) => {
                match context.as_ref() {
                    Some(ctx) => {
                        let mut out = [SecurityBuffer::new(BufferKind::Token, token)];
                        let code = self.facility.complete_auth_token(ctx.raw(), &mut out);
                        let [out] = out;
                        token = out.data;
                        match check(code) {
                            Ok(()) if next == SecurityStatus::CompleteNeeded => {
                                AcceptStatus::Complete
                            }
                            Ok(()) => AcceptStatus::ContinueNeeded,
                            Err(e) => AcceptStatus::Error(e),
                        }
                    }
                    None => AcceptStatus::Error(error::native(Kind::Native, call.status)),
                }
            }
            SecurityStatus::IncompleteMessage => AcceptStatus::IncompleteMessage,
            SecurityStatus::Failed(kind) => AcceptStatus::Error(error::native(kind, call.status)),
        };

        if let (AcceptStatus::Complete, Some(ctx)) = (&status, context.as_mut()) {
            ctx.complete = true;
        }

        Accepted {
            context,
            token: if token.is_empty() { None } else { Some(token) },
            flags: call.flags,
            status,
        }
    }
}

impl fmt::Debug for Sspi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sspi").finish()
    }
}

/// The typed status of one acceptance step.
#[derive(Debug)]
pub enum AcceptStatus {
    ContinueNeeded,
    Complete,
    IncompleteMessage,
    Error(Error),
}

/// The result of [`Sspi::accept_token`].
#[derive(Debug)]
pub struct Accepted {
    pub context: Option<SecurityContext>,
    pub token: Option<Vec<u8>>,
    pub flags: ContextFlags,
    pub status: AcceptStatus,
}

/// A shared server credential for one package.
///
/// The native handle is freed when the last clone drops.
#[derive(Clone)]
pub struct CredentialHandle {
    inner: Arc<CredentialInner>,
}

struct CredentialInner {
    facility: Arc<dyn Facility>,
    raw: RawHandle,
    package: Package,
    usage: CredentialUse,
}

impl CredentialHandle {
    pub fn package(&self) -> &Package {
        &self.inner.package
    }

    pub fn usage(&self) -> CredentialUse {
        self.inner.usage
    }

    /// Returns true if both clones refer to the same native handle.
    pub fn ptr_eq(a: &CredentialHandle, b: &CredentialHandle) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    fn raw(&self) -> RawHandle {
        self.inner.raw
    }
}

impl Drop for CredentialInner {
    fn drop(&mut self) {
        let code = self.facility.free_credentials_handle(self.raw);
        if code != status::SEC_E_OK {
            log::warn!(
                "FreeCredentialsHandle({}) failed: 0x{:08X}",
                self.package,
                code as u32
            );
        }
    }
}

impl fmt::Debug for CredentialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHandle")
            .field("package", &self.inner.package)
            .field("usage", &self.inner.usage)
            .finish()
    }
}

/// One handshake's native security context.
///
/// Move-only; the native handle is deleted exactly once, by
/// [`release`](SecurityContext::release) or on drop.
pub struct SecurityContext {
    facility: Arc<dyn Facility>,
    raw: Option<RawHandle>,
    package: Package,
    complete: bool,
}

impl SecurityContext {
    /// The package the context was accepted under.
    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Returns true once the handshake reached `SEC_E_OK`.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn query_attribute(&self, attribute: ContextAttribute) -> Result<Vec<u8>> {
        self.facility
            .query_context_attributes(self.raw(), attribute)
            .map_err(translate)
    }

    pub fn set_attribute(&self, attribute: ContextAttribute, value: &[u8]) -> Result<()> {
        check(
            self.facility
                .set_context_attributes(self.raw(), attribute, value),
        )
    }

    /// The authenticated client principal (`SECPKG_ATTR_NAMES`).
    pub fn client_name(&self) -> Result<String> {
        self.query_string(ContextAttribute::Names)
    }

    /// The package actually negotiated (`SECPKG_ATTR_NEGOTIATION_INFO`).
    pub fn negotiated_package(&self) -> Result<String> {
        self.query_string(ContextAttribute::NegotiationInfo)
    }

    /// The target name the client asked for, if the package reports one.
    pub fn client_specified_target(&self) -> Result<String> {
        self.query_string(ContextAttribute::ClientSpecifiedTarget)
    }

    pub fn sizes(&self) -> Result<ContextSizes> {
        let bytes = self.query_attribute(ContextAttribute::Sizes)?;
        ContextSizes::from_bytes(&bytes).ok_or_else(|| {
            Error::new(Kind::Native, Some("truncated SecPkgContext_Sizes"))
        })
    }

    /// Retrieves the client's OS access token.
    ///
    /// Only available after the handshake completed.
    pub fn security_token(&self) -> Result<OsToken> {
        if !self.complete {
            return Err(error::not_ready());
        }
        let raw = self
            .facility
            .query_security_context_token(self.raw())
            .map_err(translate)?;
        Ok(OsToken::new(self.facility.clone(), raw))
    }

    /// Signs and seals `message` in place (`EncryptMessage`).
    pub fn encrypt(&mut self, qop: u32, message: &mut [SecurityBuffer], sequence: u32) -> Result<()> {
        if !self.complete {
            return Err(error::not_ready());
        }
        check(
            self.facility
                .encrypt_message(self.raw(), qop, message, sequence),
        )
    }

    /// Verifies and unseals `message` in place, returning the quality of
    /// protection (`DecryptMessage`).
    pub fn decrypt(&mut self, message: &mut [SecurityBuffer], sequence: u32) -> Result<u32> {
        if !self.complete {
            return Err(error::not_ready());
        }
        self.facility
            .decrypt_message(self.raw(), message, sequence)
            .map_err(translate)
    }

    /// Deletes the native context.
    pub fn release(mut self) {
        self.delete();
    }

    fn query_string(&self, attribute: ContextAttribute) -> Result<String> {
        let bytes = self.query_attribute(attribute)?;
        String::from_utf8(bytes).map_err(|e| Error::new(Kind::Native, Some(e)))
    }

    fn raw(&self) -> RawHandle {
        self.raw.unwrap_or_default()
    }

    fn delete(&mut self) {
        if let Some(raw) = self.raw.take() {
            let code = self.facility.delete_security_context(raw);
            if code == status::SEC_E_OK {
                log::trace!("deleted {} security context", self.package);
            } else {
                log::warn!(
                    "DeleteSecurityContext({}) failed: 0x{:08X}",
                    self.package,
                    code as u32
                );
            }
        }
    }
}

impl Drop for SecurityContext {
    fn drop(&mut self) {
        self.delete();
    }
}

impl fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContext")
            .field("package", &self.package)
            .field("complete", &self.complete)
            .finish()
    }
}
