//! Turning login form input into a session identity.

use parley_core::{Credentials, Environment, Identity, KeyValueStore, ProductArea, device_id};

use crate::error::SessionError;

/// Validate `credentials` and bind them to this profile's device id for
/// `area`, generating the id on first use.
pub fn prepare_identity<S, E>(
    credentials: Credentials,
    store: &S,
    area: ProductArea,
    env: &E,
) -> Result<Identity, SessionError>
where
    S: KeyValueStore + ?Sized,
    E: Environment,
{
    credentials.validate()?;
    let device = device_id(store, area, env)?;
    Ok(credentials.with_device(device))
}
