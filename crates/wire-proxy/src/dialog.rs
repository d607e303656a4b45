use std::net::SocketAddr;
use std::sync::OnceLock;

/// Shared per-connection state for one proxied dialog.
///
/// A dialog is one accepted client connection together with its paired
/// backend connection. Both relay directions hold the same `DialogContext`
/// behind an `Arc`, so the caller identity resolved from one direction's
/// traffic is visible to the other.
#[derive(Debug)]
pub struct DialogContext {
    /// Unique identifier for this dialog, used in logs.
    dialog_id: uuid::Uuid,
    /// The TCP address of the connecting client. Set once at accept time.
    remote_addr: SocketAddr,
    /// Caller identity resolved from the first message carrying credentials.
    ///
    /// Set-once semantics: whichever direction first observes credentials
    /// wins atomically; later writers are ignored. Messages without
    /// credentials inherit the current value instead of overwriting it.
    user: OnceLock<String>,
}

impl DialogContext {
    /// Create a context for a freshly accepted client connection.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            dialog_id: uuid::Uuid::new_v4(),
            remote_addr,
            user: OnceLock::new(),
        }
    }

    pub fn dialog_id(&self) -> uuid::Uuid {
        self.dialog_id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// The resolved caller identity, if any message has carried one yet.
    pub fn user(&self) -> Option<&str> {
        self.user.get().map(String::as_str)
    }

    /// Promote an observed identity into the dialog.
    ///
    /// The first non-empty identity wins; subsequent calls are no-ops.
    /// Returns `true` if this call set the identity.
    pub fn promote_user(&self, user: &str) -> bool {
        if user.is_empty() {
            return false;
        }
        self.user.set(user.to_string()).is_ok()
    }
}
