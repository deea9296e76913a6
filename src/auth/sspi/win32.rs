// src/auth/sspi/win32.rs

//! [`Facility`] over `secur32.dll`.
//!
//! Output tokens are requested with `ASC_REQ_ALLOCATE_MEMORY`; every
//! facility-allocated buffer is copied into a `Vec` and released through a
//! [`ContextBuffer`] guard before the call returns.

use std::ffi::c_void;
use std::ptr;

use windows::core::{HRESULT, PCWSTR};
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::Security::Authentication::Identity::{
    AcceptSecurityContext, AcquireCredentialsHandleW, CompleteAuthToken, DecryptMessage,
    DeleteSecurityContext, EncryptMessage, EnumerateSecurityPackagesW, FreeContextBuffer,
    FreeCredentialsHandle, QueryContextAttributesW, QuerySecurityContextToken,
    SetContextAttributesW, SecBuffer, SecBufferDesc, SecPkgInfoW, ASC_REQ_FLAGS, SECPKG_ATTR,
    SECPKG_CRED,
};
use windows::Win32::Security::Credentials::SecHandle;

use super::{
    status, AcceptCall, AuthIdentity, BufferKind, ContextAttribute, ContextFlags, CredentialUse,
    Facility, PackageInfo, RawHandle, RawToken, SecurityBuffer,
};

const SECBUFFER_VERSION: u32 = 0;
const SECURITY_NATIVE_DREP: u32 = 0x10;
const SEC_WINNT_AUTH_IDENTITY_UNICODE: u32 = 0x2;

// Layouts from sspi.h; declared here so only the layout, not the binding's
// field types, is relied upon.

#[repr(C)]
struct WinntAuthIdentityW {
    user: *mut u16,
    user_length: u32,
    domain: *mut u16,
    domain_length: u32,
    password: *mut u16,
    password_length: u32,
    flags: u32,
}

#[repr(C)]
struct PkgInfoW {
    capabilities: u32,
    version: u16,
    rpc_id: u16,
    max_token: u32,
    name: *mut u16,
    comment: *mut u16,
}

#[repr(C)]
struct NamesW {
    user_name: *mut u16,
}

#[repr(C)]
struct NegotiationInfoW {
    package_info: *mut PkgInfoW,
    negotiation_state: u32,
}

#[repr(C)]
struct PackageInfoW {
    package_info: *mut PkgInfoW,
}

#[repr(C)]
struct ClientSpecifiedTarget {
    target_name: *mut u16,
}

#[repr(C)]
#[derive(Default)]
struct Sizes {
    max_token: u32,
    max_signature: u32,
    block_size: u32,
    security_trailer: u32,
}

#[repr(C)]
#[derive(Default)]
struct Lifespan {
    start: i64,
    expiry: i64,
}

trait IntoStatus {
    fn into_status(self) -> i32;
}

impl IntoStatus for windows::core::Result<()> {
    fn into_status(self) -> i32 {
        match self {
            Ok(()) => status::SEC_E_OK,
            Err(e) => e.code().0,
        }
    }
}

impl IntoStatus for HRESULT {
    fn into_status(self) -> i32 {
        self.0
    }
}

/// Frees a facility-allocated buffer on drop.
struct ContextBuffer(*mut c_void);

impl Drop for ContextBuffer {
    fn drop(&mut self) {
        if !self.0.is_null() {
            let code = unsafe { FreeContextBuffer(self.0) }.into_status();
            if code != status::SEC_E_OK {
                log::warn!("FreeContextBuffer failed: 0x{:08X}", code as u32);
            }
        }
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

unsafe fn from_wide(p: *const u16) -> String {
    if p.is_null() {
        return String::new();
    }
    let mut len = 0;
    while *p.add(len) != 0 {
        len += 1;
    }
    String::from_utf16_lossy(std::slice::from_raw_parts(p, len))
}

fn sec_handle(raw: RawHandle) -> SecHandle {
    SecHandle {
        dwLower: raw.lower,
        dwUpper: raw.upper,
    }
}

fn raw_handle(handle: &SecHandle) -> RawHandle {
    RawHandle {
        lower: handle.dwLower,
        upper: handle.dwUpper,
    }
}

/// Builds native descriptors over `buffers`, which must outlive the call.
fn descriptors(buffers: &mut [SecurityBuffer]) -> Vec<SecBuffer> {
    buffers
        .iter_mut()
        .map(|b| SecBuffer {
            cbBuffer: b.data.len() as u32,
            BufferType: b.kind as u32,
            pvBuffer: if b.data.is_empty() {
                ptr::null_mut()
            } else {
                b.data.as_mut_ptr() as *mut c_void
            },
        })
        .collect()
}

/// Copies the native descriptors back after an in-place operation.
///
/// Output regions may alias another buffer's storage (e.g. a decrypted
/// `Data` pointing into the `Stream`), so everything is read before any
/// `Vec` is replaced.
unsafe fn write_back(native: &[SecBuffer], buffers: &mut [SecurityBuffer]) {
    let copies: Vec<(BufferKind, Vec<u8>)> = native
        .iter()
        .map(|b| {
            let data = if b.pvBuffer.is_null() || b.cbBuffer == 0 {
                Vec::new()
            } else {
                std::slice::from_raw_parts(b.pvBuffer as *const u8, b.cbBuffer as usize).to_vec()
            };
            (BufferKind::from_raw(b.BufferType), data)
        })
        .collect();
    for (buffer, (kind, data)) in buffers.iter_mut().zip(copies) {
        buffer.kind = kind;
        buffer.data = data;
    }
}

unsafe fn package_info(info: &PkgInfoW) -> PackageInfo {
    PackageInfo {
        name: from_wide(info.name),
        comment: from_wide(info.comment),
        capabilities: info.capabilities,
        version: info.version,
        rpc_id: info.rpc_id,
        max_token: info.max_token,
    }
}

/// The host's SSPI, reached through `secur32.dll`.
#[derive(Debug, Default)]
pub struct WindowsFacility {
    _priv: (),
}

impl WindowsFacility {
    pub fn new() -> WindowsFacility {
        WindowsFacility { _priv: () }
    }

    unsafe fn query_into<T>(&self, context: &SecHandle, attribute: ContextAttribute, out: &mut T) -> i32 {
        QueryContextAttributesW(
            context,
            SECPKG_ATTR(attribute as u32),
            out as *mut T as *mut c_void,
        )
        .into_status()
    }
}

impl Facility for WindowsFacility {
    fn enumerate_security_packages(&self) -> Result<Vec<PackageInfo>, i32> {
        let mut count = 0u32;
        let mut infos: *mut SecPkgInfoW = ptr::null_mut();
        let code = unsafe { EnumerateSecurityPackagesW(&mut count, &mut infos) }.into_status();
        let guard = ContextBuffer(infos as *mut c_void);
        if code != status::SEC_E_OK {
            return Err(code);
        }
        let infos = guard.0 as *const PkgInfoW;
        Ok((0..count as usize)
            .map(|i| unsafe { package_info(&*infos.add(i)) })
            .collect())
    }

    fn acquire_credentials_handle(
        &self,
        package: &str,
        usage: CredentialUse,
        identity: Option<&AuthIdentity>,
    ) -> Result<RawHandle, i32> {
        let package = wide(package);

        // The UTF-16 copies must outlive the call.
        let mut user = Vec::new();
        let mut domain = Vec::new();
        let mut password = Vec::new();
        let auth = identity.map(|identity| {
            user = identity.username.encode_utf16().collect::<Vec<u16>>();
            domain = identity
                .domain
                .as_deref()
                .unwrap_or_default()
                .encode_utf16()
                .collect::<Vec<u16>>();
            password = identity.password.encode_utf16().collect::<Vec<u16>>();
            WinntAuthIdentityW {
                user: user.as_mut_ptr(),
                user_length: user.len() as u32,
                domain: if domain.is_empty() {
                    ptr::null_mut()
                } else {
                    domain.as_mut_ptr()
                },
                domain_length: domain.len() as u32,
                password: password.as_mut_ptr(),
                password_length: password.len() as u32,
                flags: SEC_WINNT_AUTH_IDENTITY_UNICODE,
            }
        });

        let mut handle = SecHandle::default();
        let mut expiry = 0i64;
        let code = unsafe {
            AcquireCredentialsHandleW(
                PCWSTR::null(),
                PCWSTR(package.as_ptr()),
                SECPKG_CRED(usage as u32),
                None,
                auth.as_ref()
                    .map(|a| a as *const WinntAuthIdentityW as *const c_void),
                None,
                None,
                &mut handle,
                Some(&mut expiry as *mut i64),
            )
        }
        .into_status();

        for secret in [&mut user, &mut domain, &mut password] {
            secret.iter_mut().for_each(|c| *c = 0);
        }

        if code == status::SEC_E_OK {
            Ok(raw_handle(&handle))
        } else {
            Err(code)
        }
    }

    fn accept_security_context(
        &self,
        credential: RawHandle,
        context: Option<RawHandle>,
        input: &[SecurityBuffer],
        requested: ContextFlags,
    ) -> AcceptCall {
        let mut input = input.to_vec();
        let mut in_buffers = descriptors(&mut input);
        let in_desc = SecBufferDesc {
            ulVersion: SECBUFFER_VERSION,
            cBuffers: in_buffers.len() as u32,
            pBuffers: in_buffers.as_mut_ptr(),
        };

        let mut out_buffer = SecBuffer {
            cbBuffer: 0,
            BufferType: BufferKind::Token as u32,
            pvBuffer: ptr::null_mut(),
        };
        let mut out_desc = SecBufferDesc {
            ulVersion: SECBUFFER_VERSION,
            cBuffers: 1,
            pBuffers: &mut out_buffer,
        };

        let credential = sec_handle(credential);
        let existing = context.map(sec_handle);
        let mut new_context = existing.unwrap_or_default();
        let mut attributes = 0u32;
        let mut expiry = 0i64;
        let requested = requested | ContextFlags::ALLOCATE_MEMORY;

        let code = unsafe {
            AcceptSecurityContext(
                Some(&credential as *const SecHandle),
                existing.as_ref().map(|h| h as *const SecHandle),
                if in_buffers.is_empty() {
                    None
                } else {
                    Some(&in_desc as *const SecBufferDesc)
                },
                ASC_REQ_FLAGS(requested.bits()),
                SECURITY_NATIVE_DREP,
                Some(&mut new_context as *mut SecHandle),
                Some(&mut out_desc as *mut SecBufferDesc),
                &mut attributes,
                Some(&mut expiry as *mut i64),
            )
        }
        .into_status();

        let allocated = ContextBuffer(out_buffer.pvBuffer);
        let output = if allocated.0.is_null() || out_buffer.cbBuffer == 0 {
            Vec::new()
        } else {
            unsafe {
                std::slice::from_raw_parts(allocated.0 as *const u8, out_buffer.cbBuffer as usize)
            }
            .to_vec()
        };
        drop(allocated);

        AcceptCall {
            status: code,
            context: raw_handle(&new_context),
            output,
            flags: ContextFlags::from_bits_truncate(attributes),
        }
    }

    fn complete_auth_token(&self, context: RawHandle, token: &mut [SecurityBuffer]) -> i32 {
        let context = sec_handle(context);
        let mut native = descriptors(token);
        let desc = SecBufferDesc {
            ulVersion: SECBUFFER_VERSION,
            cBuffers: native.len() as u32,
            pBuffers: native.as_mut_ptr(),
        };
        let code = unsafe { CompleteAuthToken(&context, &desc) }.into_status();
        if code == status::SEC_E_OK {
            unsafe { write_back(&native, token) };
        }
        code
    }

    fn query_context_attributes(
        &self,
        context: RawHandle,
        attribute: ContextAttribute,
    ) -> Result<Vec<u8>, i32> {
        let context = sec_handle(context);
        unsafe {
            match attribute {
                ContextAttribute::Names => {
                    let mut names = NamesW {
                        user_name: ptr::null_mut(),
                    };
                    let code = self.query_into(&context, attribute, &mut names);
                    let guard = ContextBuffer(names.user_name as *mut c_void);
                    match code {
                        status::SEC_E_OK => Ok(from_wide(guard.0 as *const u16).into_bytes()),
                        code => Err(code),
                    }
                }
                ContextAttribute::ClientSpecifiedTarget => {
                    let mut target = ClientSpecifiedTarget {
                        target_name: ptr::null_mut(),
                    };
                    let code = self.query_into(&context, attribute, &mut target);
                    let guard = ContextBuffer(target.target_name as *mut c_void);
                    match code {
                        status::SEC_E_OK => Ok(from_wide(guard.0 as *const u16).into_bytes()),
                        code => Err(code),
                    }
                }
                ContextAttribute::NegotiationInfo => {
                    let mut info = NegotiationInfoW {
                        package_info: ptr::null_mut(),
                        negotiation_state: 0,
                    };
                    let code = self.query_into(&context, attribute, &mut info);
                    let guard = ContextBuffer(info.package_info as *mut c_void);
                    match code {
                        status::SEC_E_OK if !guard.0.is_null() => {
                            Ok(from_wide((*info.package_info).name).into_bytes())
                        }
                        status::SEC_E_OK => Ok(Vec::new()),
                        code => Err(code),
                    }
                }
                ContextAttribute::PackageInfo => {
                    let mut info = PackageInfoW {
                        package_info: ptr::null_mut(),
                    };
                    let code = self.query_into(&context, attribute, &mut info);
                    let guard = ContextBuffer(info.package_info as *mut c_void);
                    match code {
                        status::SEC_E_OK if !guard.0.is_null() => {
                            Ok(from_wide((*info.package_info).name).into_bytes())
                        }
                        status::SEC_E_OK => Ok(Vec::new()),
                        code => Err(code),
                    }
                }
                ContextAttribute::Sizes => {
                    let mut sizes = Sizes::default();
                    match self.query_into(&context, attribute, &mut sizes) {
                        status::SEC_E_OK => Ok(super::ContextSizes {
                            max_token: sizes.max_token,
                            max_signature: sizes.max_signature,
                            block_size: sizes.block_size,
                            security_trailer: sizes.security_trailer,
                        }
                        .to_bytes()),
                        code => Err(code),
                    }
                }
                ContextAttribute::Flags => {
                    let mut flags = 0u32;
                    match self.query_into(&context, attribute, &mut flags) {
                        status::SEC_E_OK => Ok(flags.to_le_bytes().to_vec()),
                        code => Err(code),
                    }
                }
                ContextAttribute::Lifespan => {
                    let mut lifespan = Lifespan::default();
                    match self.query_into(&context, attribute, &mut lifespan) {
                        status::SEC_E_OK => {
                            let mut bytes = lifespan.start.to_le_bytes().to_vec();
                            bytes.extend_from_slice(&lifespan.expiry.to_le_bytes());
                            Ok(bytes)
                        }
                        code => Err(code),
                    }
                }
                ContextAttribute::AccessToken => {
                    let mut token: usize = 0;
                    match self.query_into(&context, attribute, &mut token) {
                        status::SEC_E_OK => Ok(token.to_le_bytes().to_vec()),
                        code => Err(code),
                    }
                }
            }
        }
    }

    fn set_context_attributes(
        &self,
        context: RawHandle,
        attribute: ContextAttribute,
        value: &[u8],
    ) -> i32 {
        let context = sec_handle(context);
        unsafe {
            SetContextAttributesW(
                &context,
                SECPKG_ATTR(attribute as u32),
                value.as_ptr() as *const c_void,
                value.len() as u32,
            )
        }
        .into_status()
    }

    fn query_security_context_token(&self, context: RawHandle) -> Result<RawToken, i32> {
        let context = sec_handle(context);
        let mut token: *mut c_void = ptr::null_mut();
        match unsafe { QuerySecurityContextToken(&context, &mut token) }.into_status() {
            status::SEC_E_OK => Ok(RawToken(token as usize)),
            code => Err(code),
        }
    }

    fn encrypt_message(
        &self,
        context: RawHandle,
        qop: u32,
        message: &mut [SecurityBuffer],
        sequence: u32,
    ) -> i32 {
        let context = sec_handle(context);
        let mut native = descriptors(message);
        let desc = SecBufferDesc {
            ulVersion: SECBUFFER_VERSION,
            cBuffers: native.len() as u32,
            pBuffers: native.as_mut_ptr(),
        };
        let code = unsafe { EncryptMessage(&context, qop, &desc, sequence) }.into_status();
        if code == status::SEC_E_OK {
            unsafe { write_back(&native, message) };
        }
        code
    }

    fn decrypt_message(
        &self,
        context: RawHandle,
        message: &mut [SecurityBuffer],
        sequence: u32,
    ) -> Result<u32, i32> {
        let context = sec_handle(context);
        let mut native = descriptors(message);
        let desc = SecBufferDesc {
            ulVersion: SECBUFFER_VERSION,
            cBuffers: native.len() as u32,
            pBuffers: native.as_mut_ptr(),
        };
        let mut qop = 0u32;
        let code =
            unsafe { DecryptMessage(&context, &desc, sequence, Some(&mut qop as *mut u32)) }
                .into_status();
        if code == status::SEC_E_OK {
            unsafe { write_back(&native, message) };
            Ok(qop)
        } else {
            Err(code)
        }
    }

    fn delete_security_context(&self, context: RawHandle) -> i32 {
        let context = sec_handle(context);
        unsafe { DeleteSecurityContext(&context) }.into_status()
    }

    fn free_credentials_handle(&self, credential: RawHandle) -> i32 {
        let credential = sec_handle(credential);
        unsafe { FreeCredentialsHandle(&credential) }.into_status()
    }

    fn close_token(&self, token: RawToken) -> i32 {
        unsafe { CloseHandle(HANDLE(token.0 as *mut c_void)) }.into_status()
    }
}
