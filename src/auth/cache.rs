// src/auth/cache.rs

//! Process-scoped cache of server credential handles.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::sspi::{AuthIdentity, CredentialHandle, CredentialUse, Package, PackageInfo, Sspi};
use super::Credentials;
use crate::error::Result;

type Slot = Arc<Mutex<Option<CredentialHandle>>>;

/// Shares one inbound credential handle per package across connections.
///
/// Create one per process and hand it to every negotiator as an `Arc`.
/// The first acquisition for a package is serialized by a per-package lock,
/// so concurrent callers see the same handle. Failed acquisitions are not
/// remembered; the next caller tries again.
pub struct CredentialCache {
    sspi: Sspi,
    identity: Option<AuthIdentity>,
    slots: Mutex<HashMap<Package, Slot>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CredentialCache {
    pub fn new(sspi: Sspi, credentials: Credentials) -> CredentialCache {
        let identity = match credentials {
            Credentials::CurrentUser => None,
            Credentials::Explicit {
                username,
                domain,
                password,
            } => Some(AuthIdentity {
                username,
                domain,
                password,
            }),
        };

        CredentialCache {
            sspi,
            identity,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn sspi(&self) -> &Sspi {
        &self.sspi
    }

    /// Returns the cached handle for `package`, acquiring it on first use.
    pub fn get_or_acquire(&self, package: &Package) -> Result<CredentialHandle> {
        let slot = lock(&self.slots).entry(package.clone()).or_default().clone();

        let mut cell = lock(&slot);
        if let Some(ref handle) = *cell {
            return Ok(handle.clone());
        }

        let handle =
            self.sspi
                .acquire_credentials(package, CredentialUse::Inbound, self.identity.as_ref())?;
        *cell = Some(handle.clone());
        Ok(handle)
    }

    /// Evicts `handle` if it is still the cached handle for `package`.
    ///
    /// Returns true if an entry was removed. A handle re-acquired since
    /// `handle` was handed out is left alone.
    pub fn invalidate(&self, package: &Package, handle: &CredentialHandle) -> bool {
        let slot = match lock(&self.slots).get(package) {
            Some(slot) => slot.clone(),
            None => return false,
        };

        let mut cell = lock(&slot);
        match *cell {
            Some(ref cached) if CredentialHandle::ptr_eq(cached, handle) => {
                log::debug!("evicting invalid {} credential", package);
                *cell = None;
                true
            }
            _ => false,
        }
    }

    /// Lists the packages installed on the host.
    pub fn packages(&self) -> Result<Vec<PackageInfo>> {
        self.sspi.packages()
    }

    /// Number of packages with a cached handle.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = lock(&self.slots).values().cloned().collect();
        slots.iter().filter(|slot| lock(slot).is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached handle.
    ///
    /// Native handles are freed once the last negotiator holding them is gone.
    pub fn shutdown(&self) {
        let slots: Vec<Slot> = lock(&self.slots).drain().map(|(_, slot)| slot).collect();
        for slot in slots {
            lock(&slot).take();
        }
    }
}

impl fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCache")
            .field("explicit_identity", &self.identity.is_some())
            .field("cached", &self.len())
            .finish()
    }
}
