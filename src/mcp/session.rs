//! Per-vendor MCP session manager

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::Result;
use crate::gateway::Lifecycle;
use crate::vendor::Vendor;

/// State kept for one client session
#[derive(Debug, Clone)]
pub struct Session {
    /// Protocol version agreed at `initialize`
    pub protocol_version: &'static str,
    /// When the session was created
    pub created_at: Instant,
}

/// Issues and tracks `mcp-session-id`s for one vendor endpoint
#[derive(Debug)]
pub struct SessionManager {
    vendor: Vendor,
    name: String,
    sessions: DashMap<String, Session>,
    running: AtomicBool,
}

impl SessionManager {
    /// Manager for `vendor`, initially stopped
    #[must_use]
    pub fn new(vendor: Vendor) -> Self {
        Self {
            vendor,
            name: format!("{vendor}-sessions"),
            sessions: DashMap::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Vendor this manager serves
    #[must_use]
    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    /// Open a session and return its id
    pub fn create(&self, protocol_version: &'static str) -> String {
        let id = Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            id.clone(),
            Session {
                protocol_version,
                created_at: Instant::now(),
            },
        );
        debug!(vendor = %self.vendor, session_id = %id, version = protocol_version, "Session created");
        id
    }

    /// Whether `id` names an open session
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Close a session; returns whether it existed
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            debug!(vendor = %self.vendor, session_id = %id, "Session terminated");
        }
        removed
    }

    /// Number of open sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no open sessions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl Lifecycle for SessionManager {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        info!(vendor = %self.vendor, "Session manager running");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        let dropped = self.sessions.len();
        self.sessions.clear();
        info!(vendor = %self.vendor, sessions = dropped, "Session manager stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
