//! Bridges backend event callbacks to registered graph listeners.
//!
//! The backend knows nothing about graph objects; it only holds the opaque
//! token handed to it at callback registration. This module owns the
//! token-to-graph table and the one global trampoline ([`dispatch`]) that
//! resolves a token back to its graph and invokes the listener the caller
//! registered. Stale tokens and graphs torn down mid-flight are logged and
//! dropped -- nothing on this path ever propagates an error back into the
//! backend's callback context.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use crate::backend::GraphEvent;
use crate::graph::GraphShared;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn table() -> &'static Mutex<HashMap<u64, Weak<GraphShared>>> {
    static TABLE: OnceLock<Mutex<HashMap<u64, Weak<GraphShared>>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Allocate a fresh listener token. Tokens are never reused.
pub(crate) fn next_token() -> u64 {
    NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
}

/// Bind a token to its graph. Called once during open, before the token is
/// handed to the backend.
pub(crate) fn bind(token: u64, graph: &Arc<GraphShared>) {
    table()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(token, Arc::downgrade(graph));
}

/// Remove a token binding. Called during close/teardown; events arriving
/// afterwards resolve to nothing and are dropped.
pub(crate) fn unbind(token: u64) {
    table()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&token);
}

/// The global event trampoline handed to every backend registration.
///
/// Resolves the token to the owning graph and forwards the event to its
/// registered listener, if any.
pub fn dispatch(token: u64, event: &GraphEvent) {
    let graph = {
        let tbl = table().lock().unwrap_or_else(PoisonError::into_inner);
        tbl.get(&token).and_then(Weak::upgrade)
    };
    match graph {
        Some(graph) => graph.deliver(event),
        None => {
            tracing::warn!(token, event_id = event.event_id, "event for unknown graph dropped");
        }
    }
}
