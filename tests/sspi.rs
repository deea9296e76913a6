// tests/sspi.rs

//! The typed adapter against the simulated facility.

mod support;

use support::facility::{CORRUPT, MUTUAL, PARTIAL};
use support::SimFacility;

use winauth::auth::sspi::{
    status, AcceptStatus, BufferKind, ContextAttribute, ContextSizes, CredentialUse, Facility,
    SecurityBuffer,
};
use winauth::auth::{ContextFlags, CredentialHandle, Package};
use winauth::Kind;

#[test]
fn test_packages_lists_installed() {
    let (_facility, sspi) = support::sspi(SimFacility::new().installed(&["Negotiate", "NTLM"]));
    let names: Vec<_> = sspi.packages().unwrap().into_iter().map(|p| p.name).collect();
    assert_eq!(names, ["Negotiate", "NTLM"]);
}

#[test]
fn test_acquire_unknown_package() {
    let (facility, sspi) = support::sspi(SimFacility::new());
    let err = sspi
        .acquire_credentials(&Package::from("Digest"), CredentialUse::Inbound, None)
        .unwrap_err();
    assert!(err.is_package_not_supported());
    assert_eq!(err.code(), Some(status::SEC_E_SECPKG_NOT_FOUND));
    assert_eq!(facility.live_credentials(), 0);
}

#[test]
fn test_acquire_access_denied() {
    let (facility, sspi) = support::sspi(SimFacility::new());
    facility.fail_next_acquire(status::SEC_E_NOT_OWNER);
    let err = sspi
        .acquire_credentials(&Package::Negotiate, CredentialUse::Inbound, None)
        .unwrap_err();
    assert_eq!(err.kind(), Kind::AccessDenied);
}

#[test]
fn test_credential_freed_with_last_clone() {
    let (facility, sspi) = support::sspi(SimFacility::new());
    let handle = sspi
        .acquire_credentials(&Package::Ntlm, CredentialUse::Inbound, None)
        .unwrap();
    let clone = handle.clone();
    assert!(CredentialHandle::ptr_eq(&handle, &clone));
    assert_eq!(handle.package(), &Package::Ntlm);

    drop(handle);
    assert_eq!(facility.live_credentials(), 1);
    drop(clone);
    assert_eq!(facility.live_credentials(), 0);
    assert_eq!(facility.double_frees(), 0);
}

#[test]
fn test_accept_continue_then_complete() {
    let (facility, sspi) = support::sspi(SimFacility::new().mutual());
    let cred = sspi
        .acquire_credentials(&Package::Negotiate, CredentialUse::Inbound, None)
        .unwrap();

    let first = sspi.accept_token(&cred, None, Some(&b"hello"[..]), None, ContextFlags::CONNECTION);
    assert!(matches!(first.status, AcceptStatus::ContinueNeeded));
    assert_eq!(first.token.as_deref(), Some(&b"challenge-1"[..]));
    let context = first.context.expect("context created");
    assert!(!context.is_complete());

    let second = sspi.accept_token(
        &cred,
        Some(context),
        Some(&b"response"[..]),
        None,
        ContextFlags::CONNECTION,
    );
    assert!(matches!(second.status, AcceptStatus::Complete));
    assert_eq!(second.token.as_deref(), Some(MUTUAL));
    assert!(second.flags.contains(ContextFlags::CONNECTION));

    let context = second.context.unwrap();
    assert!(context.is_complete());
    assert_eq!(context.client_name().unwrap(), "CONTOSO\\alice");
    assert_eq!(context.negotiated_package().unwrap(), "Kerberos");

    drop(context);
    facility.assert_clean();
}

#[test]
fn test_accept_failure_still_returns_new_context() {
    let (facility, sspi) = support::sspi(SimFacility::new());
    let cred = sspi
        .acquire_credentials(&Package::Negotiate, CredentialUse::Inbound, None)
        .unwrap();

    let accepted = sspi.accept_token(&cred, None, Some(CORRUPT), None, ContextFlags::CONNECTION);
    match accepted.status {
        AcceptStatus::Error(ref e) => {
            assert!(e.is_invalid_token());
            assert_eq!(e.code(), Some(status::SEC_E_INVALID_TOKEN));
        }
        ref other => panic!("expected an error, got {:?}", other),
    }
    assert!(accepted.token.is_none());
    assert_eq!(facility.live_contexts(), 1);

    accepted.context.expect("failed step hands back the context").release();
    facility.assert_clean();
}

#[test]
fn test_accept_incomplete_creates_nothing() {
    let (facility, sspi) = support::sspi(SimFacility::new());
    let cred = sspi
        .acquire_credentials(&Package::Negotiate, CredentialUse::Inbound, None)
        .unwrap();

    let accepted = sspi.accept_token(&cred, None, Some(PARTIAL), None, ContextFlags::CONNECTION);
    assert!(matches!(accepted.status, AcceptStatus::IncompleteMessage));
    assert!(accepted.context.is_none());
    assert_eq!(facility.live_contexts(), 0);
}

#[test]
fn test_complete_needed_calls_complete_auth_token() {
    let (facility, sspi) = support::sspi(SimFacility::new().rounds(1).complete_needed());
    let cred = sspi
        .acquire_credentials(&Package::Ntlm, CredentialUse::Inbound, None)
        .unwrap();

    let accepted = sspi.accept_token(&cred, None, Some(&b"ntlm"[..]), None, ContextFlags::CONNECTION);
    assert!(matches!(accepted.status, AcceptStatus::Complete));
    assert_eq!(facility.completions(), 1);
    assert!(accepted.context.unwrap().is_complete());
}

#[test]
fn test_channel_bindings_are_passed_through() {
    let (facility, sspi) = support::sspi(SimFacility::new());
    let cred = sspi
        .acquire_credentials(&Package::Negotiate, CredentialUse::Inbound, None)
        .unwrap();

    let _accepted = sspi.accept_token(
        &cred,
        None,
        Some(&b"hello"[..]),
        Some(&b"tls-server-end-point"[..]),
        ContextFlags::CONNECTION,
    );
    assert_eq!(
        facility.last_bindings().as_deref(),
        Some(&b"tls-server-end-point"[..])
    );
}

#[test]
fn test_context_services_require_completion() {
    let (facility, sspi) = support::sspi(SimFacility::new());
    let cred = sspi
        .acquire_credentials(&Package::Negotiate, CredentialUse::Inbound, None)
        .unwrap();

    let mut context = sspi
        .accept_token(&cred, None, Some(&b"hello"[..]), None, ContextFlags::CONNECTION)
        .context
        .unwrap();

    assert_eq!(context.security_token().unwrap_err().kind(), Kind::NotReady);
    let mut message = [SecurityBuffer::new(BufferKind::Data, b"payload".to_vec())];
    assert_eq!(
        context.encrypt(0, &mut message, 0).unwrap_err().kind(),
        Kind::NotReady
    );
    assert_eq!(
        context.decrypt(&mut message, 0).unwrap_err().kind(),
        Kind::NotReady
    );

    context.release();
    facility.assert_clean();
}

#[test]
fn test_message_protection_after_completion() {
    let (facility, sspi) = support::sspi(SimFacility::new().rounds(1));
    let cred = sspi
        .acquire_credentials(&Package::Kerberos, CredentialUse::Inbound, None)
        .unwrap();
    let mut context = sspi
        .accept_token(&cred, None, Some(&b"ap-req"[..]), None, ContextFlags::CONFIDENTIALITY)
        .context
        .unwrap();

    let sizes = context.sizes().unwrap();
    assert_eq!(
        sizes,
        ContextSizes {
            max_token: 12000,
            max_signature: 16,
            block_size: 8,
            security_trailer: 60,
        }
    );

    let mut message = [
        SecurityBuffer::with_capacity(BufferKind::Token, sizes.security_trailer as usize),
        SecurityBuffer::new(BufferKind::Data, b"payload".to_vec()),
    ];
    context.encrypt(0, &mut message, 7).unwrap();
    assert_ne!(message[1].data, b"payload");

    let qop = context.decrypt(&mut message, 7).unwrap();
    assert_eq!(qop, 0);
    assert_eq!(message[1].data, b"payload");

    message[0].data = b"forged".to_vec();
    let err = context.decrypt(&mut message, 8).unwrap_err();
    assert_eq!(err.code(), Some(status::SEC_E_MESSAGE_ALTERED));

    drop(context);
    facility.assert_clean();
}

#[test]
fn test_context_attributes() {
    let (facility, sspi) = support::sspi(SimFacility::new().rounds(1));
    let cred = sspi
        .acquire_credentials(&Package::Negotiate, CredentialUse::Inbound, None)
        .unwrap();
    let context = sspi
        .accept_token(&cred, None, Some(&b"spnego"[..]), None, ContextFlags::CONNECTION)
        .context
        .unwrap();

    assert_eq!(
        context.client_specified_target().unwrap(),
        "HTTP/web.contoso.com"
    );
    context
        .set_attribute(ContextAttribute::Flags, &0x800u32.to_le_bytes())
        .unwrap();
    assert_eq!(
        facility.attributes_set(),
        vec![(ContextAttribute::Flags, 0x800u32.to_le_bytes().to_vec())]
    );

    let err = context.query_attribute(ContextAttribute::Lifespan).unwrap_err();
    assert_eq!(err.code(), Some(status::SEC_E_UNSUPPORTED_FUNCTION));
    assert_eq!(err.kind(), Kind::Native);
}

#[test]
fn test_os_token_lifecycle() {
    let (facility, sspi) = support::sspi(SimFacility::new().rounds(1));
    let cred = sspi
        .acquire_credentials(&Package::Negotiate, CredentialUse::Inbound, None)
        .unwrap();
    let context = sspi
        .accept_token(&cred, None, Some(&b"spnego"[..]), None, ContextFlags::CONNECTION)
        .context
        .unwrap();

    let token = context.security_token().unwrap();
    assert_eq!(facility.live_tokens(), 1);
    drop(token);
    assert_eq!(facility.live_tokens(), 0);

    let raw = context.security_token().unwrap().into_raw();
    assert_eq!(facility.live_tokens(), 1);
    assert_eq!(facility.close_token(winauth::auth::sspi::RawToken(raw)), status::SEC_E_OK);

    drop(context);
    facility.assert_clean();
}
