//! Tenant registry: the entry point command handlers use to find the right
//! event session and live connection.
//!
//! Holds two maps populated once per tenant registration: bot credential to
//! event session, and tenant id to chat connection. Registration is
//! idempotent so reconnects are no-ops; lookups return typed errors instead
//! of silently handing back nothing.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use muster_contract::ChatTransport;
use muster_session::EventSession;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Lookup failures; these indicate an unregistered tenant, which is an
/// integration fault upstream of the core rather than a user error.
pub enum RegistryError {
    #[error("no session registered for the given credential")]
    SessionNotFound,
    #[error("no connection registered for tenant '{tenant_id}'")]
    ConnectionNotFound { tenant_id: String },
}

#[derive(Default)]
/// Credential-to-session and tenant-to-connection maps. Entries are inserted
/// at registration and never removed; reads are safe concurrently.
pub struct TenantRegistry {
    sessions: Mutex<HashMap<String, Arc<EventSession>>>,
    connections: Mutex<HashMap<String, Arc<dyn ChatTransport>>>,
}

impl TenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tenant's session and connection. A credential that is
    /// already registered is left untouched, matching "already connected"
    /// reconnection flows.
    pub fn register(
        &self,
        tenant_id: &str,
        credential: &str,
        connection: Arc<dyn ChatTransport>,
        session: Arc<EventSession>,
    ) {
        let mut sessions = self.sessions.lock().expect("session map mutex poisoned");
        if sessions.contains_key(credential) {
            tracing::debug!(tenant = %tenant_id, "tenant already registered; keeping existing session");
            return;
        }
        sessions.insert(credential.to_string(), session);
        self.connections
            .lock()
            .expect("connection map mutex poisoned")
            .insert(tenant_id.to_string(), connection);
    }

    pub fn is_registered(&self, credential: &str) -> bool {
        self.sessions
            .lock()
            .expect("session map mutex poisoned")
            .contains_key(credential)
    }

    pub fn session_for(&self, credential: &str) -> Result<Arc<EventSession>, RegistryError> {
        self.sessions
            .lock()
            .expect("session map mutex poisoned")
            .get(credential)
            .cloned()
            .ok_or(RegistryError::SessionNotFound)
    }

    pub fn connection_for(&self, tenant_id: &str) -> Result<Arc<dyn ChatTransport>, RegistryError> {
        self.connections
            .lock()
            .expect("connection map mutex poisoned")
            .get(tenant_id)
            .cloned()
            .ok_or_else(|| RegistryError::ConnectionNotFound {
                tenant_id: tenant_id.to_string(),
            })
    }
}
