#![allow(dead_code)]

pub mod facility;

use std::sync::Arc;

use winauth::auth::{CredentialCache, Credentials, Sspi};

pub use self::facility::SimFacility;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn sspi(facility: SimFacility) -> (Arc<SimFacility>, Sspi) {
    init_logging();
    let facility = Arc::new(facility);
    let sspi = Sspi::new(facility.clone());
    (facility, sspi)
}

pub fn cache(facility: SimFacility) -> (Arc<SimFacility>, Arc<CredentialCache>) {
    let (facility, sspi) = sspi(facility);
    (facility, Arc::new(CredentialCache::new(sspi, Credentials::CurrentUser)))
}
