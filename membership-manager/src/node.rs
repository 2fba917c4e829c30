use std::fmt;

/// A worker as the coordinator sees it. Nodes have no identity beyond their address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Node {
    pub host: String,
    pub port: u16,
}

impl Node {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Strips a subnet suffix from a task address, so "10.0.0.5/24" becomes "10.0.0.5".
pub fn normalize_address(address: &str) -> &str {
    match address.split_once('/') {
        Some((host, _)) => host,
        None => address,
    }
}
