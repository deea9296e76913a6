// src/auth/challenge.rs

//! HTTP header glue for the Negotiate scheme (RFC 4559).
//!
//! Clients send `Authorization: Negotiate <base64>` (or `NTLM`/`Kerberos`);
//! the server answers `401` with `WWW-Authenticate: Negotiate [<base64>]`.

use base64::Engine as _;
use http::{HeaderMap, HeaderValue, StatusCode};

use super::sspi::Package;
use crate::error::{self, Error, Kind, Result};

/// A parsed `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub package: Package,
    pub token: Vec<u8>,
}

fn scheme_of(value: &str) -> Option<(Package, &str)> {
    let trimmed = value.trim();
    let (scheme, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((scheme, rest)) => (scheme, rest.trim()),
        None => (trimmed, ""),
    };

    let package = Package::from(scheme);
    match package {
        Package::Negotiate | Package::Ntlm | Package::Kerberos => Some((package, rest)),
        Package::Other(_) => None,
    }
}

/// Extracts the integrated-auth token from the request headers.
///
/// Returns `Ok(None)` if no `Authorization` header uses one of the
/// integrated schemes (e.g. absent, or `Basic`). A scheme without a token
/// or with malformed base64 is an [`Kind::InvalidToken`] error.
pub fn parse_authorization(headers: &HeaderMap) -> Result<Option<Authorization>> {
    for value in headers.get_all(http::header::AUTHORIZATION) {
        let value_str = match value.to_str() {
            Ok(s) => s,
            Err(_) => continue,
        };

        if let Some((package, token_str)) = scheme_of(value_str) {
            if token_str.is_empty() {
                return Err(error::invalid_token(format!(
                    "{} authorization without a token",
                    package
                )));
            }

            let token = base64::engine::general_purpose::STANDARD
                .decode(token_str)
                .map_err(error::invalid_token)?;

            return Ok(Some(Authorization { package, token }));
        }
    }

    Ok(None)
}

/// Builds a `WWW-Authenticate` value, with a continuation token if given.
pub fn challenge(package: &Package, token: Option<&[u8]>) -> HeaderValue {
    let value = match token {
        Some(token) if !token.is_empty() => format!(
            "{} {}",
            package,
            base64::engine::general_purpose::STANDARD.encode(token)
        ),
        _ => package.to_string(),
    };

    // Package names and base64 are plain ASCII.
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("Negotiate"))
}

/// Appends one bare challenge per offered package.
pub fn append_challenges(headers: &mut HeaderMap, packages: &[Package]) {
    for package in packages {
        headers.append(http::header::WWW_AUTHENTICATE, challenge(package, None));
    }
}

/// Maps a failed handshake to the response status.
pub fn status_for(err: &Error) -> StatusCode {
    match err.kind() {
        Kind::AccessDenied => StatusCode::FORBIDDEN,
        _ => StatusCode::UNAUTHORIZED,
    }
}
