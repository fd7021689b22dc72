//! Handshake authentication.
//!
//! Credentials live in the registry itself:
//! - `b:/sys/admin/<client>/enable` must be non-zero
//! - `s:/sys/usr/<user>/passwd` must equal the password sent in the handshake
//!
//! Both entries are ordinary entries, usually loaded from an ini file.

use crate::error::{ServerError, ServerResult};
use optbus_core::{OptResult, Registry};
use optbus_protocol::Handshake;
use tracing::debug;

/// Path of the enable flag of `client`.
pub fn client_enable_path(client: &str) -> String {
    format!("b:/sys/admin/{client}/enable")
}

/// Path of the password of `user`.
pub fn user_password_path(user: &str) -> String {
    format!("s:/sys/usr/{user}/passwd")
}

/// Checks the client flag and user password named in a handshake.
///
/// The returned error never says which of the two checks failed.
pub fn check_credentials(registry: &Registry, handshake: &Handshake) -> ServerResult<()> {
    let enabled = registry
        .get_bool(&client_enable_path(&handshake.client))
        .unwrap_or(false);
    if !enabled {
        debug!("Client {} is not enabled", handshake.client);
        return Err(ServerError::AuthenticationFailed(handshake.client.clone()));
    }

    let password = registry
        .get_str(&user_password_path(&handshake.user))
        .ok();
    if password.as_deref() != Some(handshake.password.as_str()) {
        debug!("Password mismatch for user {}", handshake.user);
        return Err(ServerError::AuthenticationFailed(handshake.client.clone()));
    }

    Ok(())
}

/// Registers and enables `client`.
pub fn provision_client(registry: &Registry, client: &str) -> OptResult<()> {
    let path = client_enable_path(client);
    if !registry.contains(&path) {
        registry.register_default(&path)?;
    }
    registry.set_bool(&path, true).map(|_| ())
}

/// Registers `user` with `password`.
pub fn provision_user(registry: &Registry, user: &str, password: &str) -> OptResult<()> {
    let path = user_password_path(user);
    if !registry.contains(&path) {
        registry.register_default(&path)?;
    }
    registry.set_str(&path, password).map(|_| ())
}
