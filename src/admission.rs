//! Operator-side SSH host allow-listing.
//!
//! This is an operator safeguard, not a firewall: exact string matches
//! only, no wildcards, no DNS resolution.

/// Allow-list gate for outbound SSH hosts.
#[derive(Debug, Clone)]
pub struct HostAdmission {
    allowed: Vec<String>,
}

impl HostAdmission {
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    /// An empty allow-list admits every host.
    pub fn admit(&self, host: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|h| h == host)
    }
}
