//! High-level ComTest server
//!
//! Activates ComTest, exposes it as a DCE RPC interface and optionally
//! self-registers its type library.

use crate::activation::ClassRegistry;
use crate::config::ComTestServerConfig;
use crate::error::ComResult;
use crate::ids::{CLSID_COMTEST, IID_ICOMTEST};
use crate::registration::{register_server, unregister_server, RegistryStore};
use crate::stub::create_icomtest_interface;
use dcerpc::{DceRpcServer, ServerStatsSnapshot};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub struct ComTestServer {
    config: ComTestServerConfig,
    classes: ClassRegistry,
    registry: Arc<RegistryStore>,
    rpc_server: DceRpcServer,
}

impl ComTestServer {
    pub async fn new(config: ComTestServerConfig) -> ComResult<Self> {
        Self::with_registry(config, Arc::new(RegistryStore::new())).await
    }

    /// Use an existing registry hive for self-registration
    pub async fn with_registry(
        config: ComTestServerConfig,
        registry: Arc<RegistryStore>,
    ) -> ComResult<Self> {
        let classes = ClassRegistry::with_defaults();
        let object = classes.create_instance(&CLSID_COMTEST, &IID_ICOMTEST)?;

        let rpc_server = DceRpcServer::with_config(config.rpc.clone());
        rpc_server
            .register_interface(create_icomtest_interface(object))
            .await;

        if config.register {
            register_server(&registry, &config.typelib);
        }

        Ok(Self {
            config,
            classes,
            registry,
            rpc_server,
        })
    }

    pub fn config(&self) -> &ComTestServerConfig {
        &self.config
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn registry(&self) -> &Arc<RegistryStore> {
        &self.registry
    }

    pub fn stats(&self) -> ServerStatsSnapshot {
        self.rpc_server.stats().snapshot()
    }

    /// Bind the configured address
    pub async fn bind(&self) -> ComResult<TcpListener> {
        let listener = TcpListener::bind(self.config.addr)
            .await
            .map_err(dcerpc::RpcError::from)?;
        Ok(listener)
    }

    /// Serve on the configured address until `shutdown` completes
    pub async fn run_until<F: Future<Output = ()>>(&self, shutdown: F) -> ComResult<()> {
        let listener = self.bind().await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` completes
    pub async fn serve_until<F: Future<Output = ()>>(
        &self,
        listener: TcpListener,
        shutdown: F,
    ) -> ComResult<()> {
        if let Ok(addr) = listener.local_addr() {
            info!("ComTest server starting on {}", addr);
        }
        self.rpc_server.serve_until(listener, shutdown).await?;
        Ok(())
    }

    /// Remove the type library registration written at startup
    pub fn unregister(&self) {
        unregister_server(&self.registry, &self.config.typelib.clsid);
    }
}
