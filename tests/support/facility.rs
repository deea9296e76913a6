// tests/support/facility.rs

//! An in-memory SSPI facility with a resource ledger.
//!
//! Handshakes are scripted: every accepted token advances the context one
//! round until `rounds` is reached. A few magic tokens drive failures.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use winauth::auth::sspi::{
    status, AcceptCall, AuthIdentity, BufferKind, ContextAttribute, ContextFlags, ContextSizes,
    CredentialUse, Facility, PackageInfo, RawHandle, RawToken, SecurityBuffer,
};

/// Rejected with `SEC_E_INVALID_TOKEN`, after a context was created.
pub const CORRUPT: &[u8] = b"corrupt";
/// Rejected with `SEC_E_INCOMPLETE_MESSAGE`; nothing is created.
pub const PARTIAL: &[u8] = b"partial";
/// Rejected with `SEC_E_UNKNOWN_CREDENTIALS`.
pub const STALE: &[u8] = b"stale";
/// Rejected with `E_ACCESSDENIED`, after a context was created.
pub const FORBIDDEN: &[u8] = b"forbidden";
/// Sent back on completion when `mutual` is set.
pub const MUTUAL: &[u8] = b"mutual";

const CREDENTIAL_TAG: usize = 0xC0;
const CONTEXT_TAG: usize = 0xC7;

struct Context {
    package: String,
    rounds: usize,
    complete: bool,
}

#[derive(Default)]
struct Ledger {
    next_id: usize,
    credentials: HashMap<usize, String>,
    contexts: HashMap<usize, Context>,
    tokens: HashSet<usize>,
    double_frees: usize,
    acquisitions: usize,
    accept_calls: usize,
    completions: usize,
    fail_acquire: VecDeque<i32>,
    last_bindings: Option<Vec<u8>>,
    last_identity: Option<String>,
    attributes_set: Vec<(ContextAttribute, Vec<u8>)>,
}

impl Ledger {
    fn next(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }
}

pub struct SimFacility {
    ledger: Mutex<Ledger>,
    rounds: usize,
    client_name: String,
    negotiated: Option<String>,
    installed: Vec<String>,
    mutual: bool,
    complete_needed: bool,
    names_unsupported: bool,
    token_failure: Option<i32>,
    granted: Option<ContextFlags>,
    acquire_delay: Duration,
}

impl Default for SimFacility {
    fn default() -> Self {
        SimFacility::new()
    }
}

impl SimFacility {
    /// Two-round handshakes for `CONTOSO\alice`, negotiated as Kerberos.
    pub fn new() -> SimFacility {
        SimFacility {
            ledger: Mutex::new(Ledger::default()),
            rounds: 2,
            client_name: "CONTOSO\\alice".to_string(),
            negotiated: Some("Kerberos".to_string()),
            installed: vec!["Negotiate".into(), "NTLM".into(), "Kerberos".into()],
            mutual: false,
            complete_needed: false,
            names_unsupported: false,
            token_failure: None,
            granted: None,
            acquire_delay: Duration::ZERO,
        }
    }

    /// Accept calls needed to complete a handshake.
    pub fn rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds.max(1);
        self
    }

    pub fn client_name(mut self, name: &str) -> Self {
        self.client_name = name.to_string();
        self
    }

    pub fn negotiated(mut self, package: Option<&str>) -> Self {
        self.negotiated = package.map(str::to_string);
        self
    }

    pub fn installed(mut self, packages: &[&str]) -> Self {
        self.installed = packages.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn mutual(mut self) -> Self {
        self.mutual = true;
        self
    }

    pub fn complete_needed(mut self) -> Self {
        self.complete_needed = true;
        self
    }

    pub fn names_unsupported(mut self) -> Self {
        self.names_unsupported = true;
        self
    }

    pub fn token_unsupported(self) -> Self {
        self.token_fails(status::SEC_E_UNSUPPORTED_FUNCTION)
    }

    /// `QuerySecurityContextToken` fails with `code`.
    pub fn token_fails(mut self, code: i32) -> Self {
        self.token_failure = Some(code);
        self
    }

    /// Completed contexts report only `flags`, whatever was requested.
    pub fn grants(mut self, flags: ContextFlags) -> Self {
        self.granted = Some(flags);
        self
    }

    pub fn acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }

    /// The next acquisition fails with `code`.
    pub fn fail_next_acquire(&self, code: i32) {
        self.ledger().fail_acquire.push_back(code);
    }

    pub fn live_contexts(&self) -> usize {
        self.ledger().contexts.len()
    }

    pub fn live_credentials(&self) -> usize {
        self.ledger().credentials.len()
    }

    pub fn live_tokens(&self) -> usize {
        self.ledger().tokens.len()
    }

    pub fn double_frees(&self) -> usize {
        self.ledger().double_frees
    }

    pub fn acquisitions(&self) -> usize {
        self.ledger().acquisitions
    }

    pub fn accept_calls(&self) -> usize {
        self.ledger().accept_calls
    }

    pub fn completions(&self) -> usize {
        self.ledger().completions
    }

    pub fn last_bindings(&self) -> Option<Vec<u8>> {
        self.ledger().last_bindings.clone()
    }

    pub fn last_identity(&self) -> Option<String> {
        self.ledger().last_identity.clone()
    }

    pub fn attributes_set(&self) -> Vec<(ContextAttribute, Vec<u8>)> {
        self.ledger().attributes_set.clone()
    }

    /// No leaked handles and no double releases.
    pub fn assert_clean(&self) {
        let ledger = self.ledger();
        assert_eq!(ledger.contexts.len(), 0, "leaked security contexts");
        assert_eq!(ledger.tokens.len(), 0, "leaked OS tokens");
        assert_eq!(ledger.double_frees, 0, "handle released twice");
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn live_context<'a>(ledger: &'a mut Ledger, handle: RawHandle) -> Option<&'a mut Context> {
        if handle.upper != CONTEXT_TAG {
            return None;
        }
        ledger.contexts.get_mut(&handle.lower)
    }
}

fn rejected(status: i32, context: RawHandle) -> AcceptCall {
    AcceptCall {
        status,
        context,
        output: Vec::new(),
        flags: ContextFlags::empty(),
    }
}

impl Facility for SimFacility {
    fn enumerate_security_packages(&self) -> Result<Vec<PackageInfo>, i32> {
        Ok(self
            .installed
            .iter()
            .map(|name| PackageInfo {
                name: name.clone(),
                comment: format!("{} (simulated)", name),
                capabilities: 0,
                version: 1,
                rpc_id: 0,
                max_token: 48256,
            })
            .collect())
    }

    fn acquire_credentials_handle(
        &self,
        package: &str,
        usage: CredentialUse,
        identity: Option<&AuthIdentity>,
    ) -> Result<RawHandle, i32> {
        assert_eq!(usage, CredentialUse::Inbound, "servers acquire inbound credentials");

        if let Some(code) = self.ledger().fail_acquire.pop_front() {
            return Err(code);
        }

        if !self.acquire_delay.is_zero() {
            thread::sleep(self.acquire_delay);
        }

        if !self.installed.iter().any(|p| p.eq_ignore_ascii_case(package)) {
            return Err(status::SEC_E_SECPKG_NOT_FOUND);
        }

        let mut ledger = self.ledger();
        ledger.acquisitions += 1;
        ledger.last_identity = identity.map(|id| match id.domain {
            Some(ref domain) => format!("{}\\{}", domain, id.username),
            None => id.username.clone(),
        });
        let id = ledger.next();
        ledger.credentials.insert(id, package.to_string());
        Ok(RawHandle {
            lower: id,
            upper: CREDENTIAL_TAG,
        })
    }

    fn accept_security_context(
        &self,
        credential: RawHandle,
        context: Option<RawHandle>,
        input: &[SecurityBuffer],
        requested: ContextFlags,
    ) -> AcceptCall {
        let mut ledger = self.ledger();
        ledger.accept_calls += 1;

        let package = match ledger.credentials.get(&credential.lower) {
            Some(package) if credential.upper == CREDENTIAL_TAG => package.clone(),
            _ => return rejected(status::SEC_E_INVALID_HANDLE, RawHandle::default()),
        };

        let token = SecurityBuffer::find(input, BufferKind::Token)
            .map(|b| b.data.clone())
            .unwrap_or_default();
        ledger.last_bindings =
            SecurityBuffer::find(input, BufferKind::ChannelBindings).map(|b| b.data.clone());

        match token.as_slice() {
            PARTIAL => return rejected(status::SEC_E_INCOMPLETE_MESSAGE, RawHandle::default()),
            STALE => return rejected(status::SEC_E_UNKNOWN_CREDENTIALS, RawHandle::default()),
            _ => {}
        }

        let handle = match context {
            Some(handle) => {
                if Self::live_context(&mut ledger, handle).is_none() {
                    return rejected(status::SEC_E_INVALID_HANDLE, RawHandle::default());
                }
                handle
            }
            None => {
                let id = ledger.next();
                ledger.contexts.insert(
                    id,
                    Context {
                        package,
                        rounds: 0,
                        complete: false,
                    },
                );
                RawHandle {
                    lower: id,
                    upper: CONTEXT_TAG,
                }
            }
        };

        match token.as_slice() {
            CORRUPT => return rejected(status::SEC_E_INVALID_TOKEN, handle),
            FORBIDDEN => return rejected(status::E_ACCESSDENIED, handle),
            _ => {}
        }

        let rounds = self.rounds;
        let (mutual, complete_needed) = (self.mutual, self.complete_needed);
        let ctx = match Self::live_context(&mut ledger, handle) {
            Some(ctx) => ctx,
            None => return rejected(status::SEC_E_INVALID_HANDLE, RawHandle::default()),
        };
        ctx.rounds += 1;

        if ctx.rounds < rounds {
            return AcceptCall {
                status: status::SEC_I_CONTINUE_NEEDED,
                context: handle,
                output: format!("challenge-{}", ctx.rounds).into_bytes(),
                flags: ContextFlags::empty(),
            };
        }

        ctx.complete = true;
        AcceptCall {
            status: if complete_needed {
                status::SEC_I_COMPLETE_NEEDED
            } else {
                status::SEC_E_OK
            },
            context: handle,
            output: if mutual { MUTUAL.to_vec() } else { Vec::new() },
            flags: self
                .granted
                .unwrap_or(requested - ContextFlags::ALLOCATE_MEMORY),
        }
    }

    fn complete_auth_token(&self, context: RawHandle, _token: &mut [SecurityBuffer]) -> i32 {
        let mut ledger = self.ledger();
        if Self::live_context(&mut ledger, context).is_none() {
            return status::SEC_E_INVALID_HANDLE;
        }
        ledger.completions += 1;
        status::SEC_E_OK
    }

    fn query_context_attributes(
        &self,
        context: RawHandle,
        attribute: ContextAttribute,
    ) -> Result<Vec<u8>, i32> {
        let mut ledger = self.ledger();
        let ctx = Self::live_context(&mut ledger, context).ok_or(status::SEC_E_INVALID_HANDLE)?;

        match attribute {
            ContextAttribute::Names if self.names_unsupported => {
                Err(status::SEC_E_UNSUPPORTED_FUNCTION)
            }
            ContextAttribute::Names if ctx.complete => Ok(self.client_name.clone().into_bytes()),
            ContextAttribute::Names => Err(status::SEC_E_INVALID_HANDLE),
            ContextAttribute::NegotiationInfo => self
                .negotiated
                .clone()
                .map(String::into_bytes)
                .ok_or(status::SEC_E_UNSUPPORTED_FUNCTION),
            ContextAttribute::PackageInfo => Ok(ctx.package.clone().into_bytes()),
            ContextAttribute::ClientSpecifiedTarget => Ok(b"HTTP/web.contoso.com".to_vec()),
            ContextAttribute::Sizes => Ok(ContextSizes {
                max_token: 12000,
                max_signature: 16,
                block_size: 8,
                security_trailer: 60,
            }
            .to_bytes()),
            _ => Err(status::SEC_E_UNSUPPORTED_FUNCTION),
        }
    }

    fn set_context_attributes(
        &self,
        context: RawHandle,
        attribute: ContextAttribute,
        value: &[u8],
    ) -> i32 {
        let mut ledger = self.ledger();
        if Self::live_context(&mut ledger, context).is_none() {
            return status::SEC_E_INVALID_HANDLE;
        }
        ledger.attributes_set.push((attribute, value.to_vec()));
        status::SEC_E_OK
    }

    fn query_security_context_token(&self, context: RawHandle) -> Result<RawToken, i32> {
        let mut ledger = self.ledger();
        match Self::live_context(&mut ledger, context) {
            Some(ctx) if ctx.complete => {}
            Some(_) => return Err(status::SEC_E_INVALID_HANDLE),
            None => return Err(status::SEC_E_INVALID_HANDLE),
        }
        if let Some(code) = self.token_failure {
            return Err(code);
        }
        let id = ledger.next();
        ledger.tokens.insert(id);
        Ok(RawToken(id))
    }

    fn encrypt_message(
        &self,
        context: RawHandle,
        _qop: u32,
        message: &mut [SecurityBuffer],
        _sequence: u32,
    ) -> i32 {
        let mut ledger = self.ledger();
        if Self::live_context(&mut ledger, context).is_none() {
            return status::SEC_E_INVALID_HANDLE;
        }
        for buffer in message.iter_mut() {
            match buffer.kind {
                BufferKind::Data => buffer.data.iter_mut().for_each(|b| *b ^= 0x5A),
                BufferKind::Token => buffer.data = b"sig".to_vec(),
                _ => {}
            }
        }
        status::SEC_E_OK
    }

    fn decrypt_message(
        &self,
        context: RawHandle,
        message: &mut [SecurityBuffer],
        _sequence: u32,
    ) -> Result<u32, i32> {
        let mut ledger = self.ledger();
        if Self::live_context(&mut ledger, context).is_none() {
            return Err(status::SEC_E_INVALID_HANDLE);
        }
        if SecurityBuffer::find(message, BufferKind::Token).map(|b| b.data.as_slice())
            != Some(b"sig".as_slice())
        {
            return Err(status::SEC_E_MESSAGE_ALTERED);
        }
        for buffer in message.iter_mut() {
            if buffer.kind == BufferKind::Data {
                buffer.data.iter_mut().for_each(|b| *b ^= 0x5A);
            }
        }
        Ok(0)
    }

    fn delete_security_context(&self, context: RawHandle) -> i32 {
        let mut ledger = self.ledger();
        let removed = context.upper == CONTEXT_TAG && ledger.contexts.remove(&context.lower).is_some();
        if removed {
            status::SEC_E_OK
        } else {
            ledger.double_frees += 1;
            status::SEC_E_INVALID_HANDLE
        }
    }

    fn free_credentials_handle(&self, credential: RawHandle) -> i32 {
        let mut ledger = self.ledger();
        let removed =
            credential.upper == CREDENTIAL_TAG && ledger.credentials.remove(&credential.lower).is_some();
        if removed {
            status::SEC_E_OK
        } else {
            ledger.double_frees += 1;
            status::SEC_E_INVALID_HANDLE
        }
    }

    fn close_token(&self, token: RawToken) -> i32 {
        let mut ledger = self.ledger();
        if ledger.tokens.remove(&token.0) {
            status::SEC_E_OK
        } else {
            ledger.double_frees += 1;
            status::SEC_E_INVALID_HANDLE
        }
    }
}
