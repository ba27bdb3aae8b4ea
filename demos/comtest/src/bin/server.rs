//! ComTest Server
//!
//! Hosts one ComTest instance behind the IComTest interface.
//!
//! Run with: cargo run --bin comtest-server -- --port 5150 --register

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use comtest::{
    ComTestServer, ComTestServerConfig, TypeLibRegistration, CLSID_COMTEST, IID_ICOMTEST,
};
use comtest_demo::init_logging;

#[derive(Parser)]
#[command(name = "comtest-server")]
#[command(about = "ComTest automation server over DCE RPC")]
struct Args {
    /// Host to bind to (IPv4 or IPv6)
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value = "5150")]
    port: u16,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Write the type library registration on startup
    #[arg(long)]
    register: bool,

    /// Module path recorded in the type library registration
    #[arg(long, default_value = "ComTestLibrary.dll")]
    module_path: PathBuf,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn endpoint(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let addr = args.endpoint();
    let mut config = ComTestServerConfig::new(addr).with_max_connections(args.max_connections);
    if args.register {
        config = config.with_registration(TypeLibRegistration {
            module_path: args.module_path,
            ..Default::default()
        });
    }

    info!("Starting ComTest server");
    info!("Interface IID: {}", IID_ICOMTEST);
    info!("Class CLSID: {}", CLSID_COMTEST);

    let server = ComTestServer::new(config).await?;
    if args.register {
        let key = server.config().typelib.version_key();
        for subkey in server.registry().subkeys(&key) {
            info!("Registered {}\\{}", key, subkey);
        }
    }

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if args.register {
        server.unregister();
    }
    let stats = server.stats();
    info!(
        "Served {} request(s) on {} connection(s)",
        stats.requests_processed, stats.connections_accepted
    );

    Ok(())
}
