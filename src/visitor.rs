//! Visitor identity boundary.
//!
//! The engine only ever consumes an opaque, already-computed visitor
//! identifier; how the identifier is derived (cookies, sessions, IP
//! hashing) belongs to the transport layer. Adapters here cover the two
//! cases the engine cares about: an id resolved per request, and anonymous
//! tracking being disabled entirely.

use sha2::{Digest, Sha256};

/// Produces a stable opaque identifier for the current caller.
///
/// Pure lookup: implementations must not mutate view data. Returning
/// `None` means anonymous tracking is disabled for this caller, which
/// skips cooldown deduplication and stores a null `visitor` column.
pub trait Visitor: Send + Sync {
    fn visitor_id(&self) -> Option<String>;
}

/// Visitor identity resolved ahead of time by the web layer, one per
/// logical request.
#[derive(Debug, Clone)]
pub struct FixedVisitor {
    id: String,
}

impl FixedVisitor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Derive a visitor id by fingerprinting request metadata.
    pub fn from_request(remote_ip: &str, user_agent: Option<&str>) -> Self {
        Self {
            id: fingerprint(remote_ip, user_agent),
        }
    }
}

impl Visitor for FixedVisitor {
    fn visitor_id(&self) -> Option<String> {
        Some(self.id.clone())
    }
}

/// Anonymous tracking disabled: no visitor id is ever available.
#[derive(Debug, Clone, Default)]
pub struct AnonymousVisitor;

impl Visitor for AnonymousVisitor {
    fn visitor_id(&self) -> Option<String> {
        None
    }
}

/// Hash request metadata into a stable visitor fingerprint.
///
/// The raw IP never reaches storage, only the digest does.
pub fn fingerprint(remote_ip: &str, user_agent: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(remote_ip.as_bytes());
    hasher.update(b"|");
    hasher.update(user_agent.unwrap_or("").as_bytes());
    let digest = hasher.finalize();

    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}
