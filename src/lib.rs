#![deny(missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # winauth
//!
//! Server-side Windows integrated authentication for HTTP: the SPNEGO
//! `Negotiate` scheme, plus bare `NTLM` and `Kerberos`, accepted through
//! the host's SSPI facility.
//!
//! A server typically creates one [`CredentialCache`](auth::CredentialCache)
//! per process and one [`Negotiator`](auth::Negotiator) per connection, then
//! feeds each client token to [`Negotiator::step`](auth::Negotiator::step)
//! until the handshake completes with an
//! [`AuthenticatedIdentity`](auth::AuthenticatedIdentity).
//!
//! With the `middleware` feature, [`NegotiateLayer`](auth::NegotiateLayer)
//! does all of this for a tower/hyper server.
//!
//! ## Optional Features
//!
//! - **native** *(enabled by default)*: the SSPI facility backed by
//!   `secur32` on Windows.
//! - **middleware** *(enabled by default)*: tower middleware, running
//!   native calls on tokio's blocking pool.

pub mod auth;
pub mod error;

pub use self::error::{Error, Kind, Result};
