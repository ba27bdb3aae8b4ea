//! Server configuration

use crate::registration::TypeLibRegistration;
use dcerpc::DceRpcServerConfig;
use std::net::{Ipv4Addr, SocketAddr};

/// Default TCP endpoint of the ComTest server
pub const DEFAULT_PORT: u16 = 5150;

/// ComTest server configuration
#[derive(Debug, Clone)]
pub struct ComTestServerConfig {
    /// Address to listen on; port 0 picks an ephemeral port
    pub addr: SocketAddr,
    /// Transport limits
    pub rpc: DceRpcServerConfig,
    /// Type library entries written when `register` is set
    pub typelib: TypeLibRegistration,
    /// Self-register on startup
    pub register: bool,
}

impl Default for ComTestServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            rpc: DceRpcServerConfig::default(),
            typelib: TypeLibRegistration::default(),
            register: false,
        }
    }
}

impl ComTestServerConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.rpc.max_connections = max_connections;
        self
    }

    pub fn with_registration(mut self, typelib: TypeLibRegistration) -> Self {
        self.typelib = typelib;
        self.register = true;
        self
    }
}
