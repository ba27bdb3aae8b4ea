//! ComTest Client
//!
//! Calls ComTestMethod early-bound and then again through IDispatch.
//!
//! Run with: cargo run --bin comtest-client -- --radius 2 --comment abc

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use comtest::{
    BString, ComTestProxy, DispParams, IComTest, Variant, DISPATCH_METHOD, DISPID_COMTESTMETHOD,
    IID_NULL,
};
use comtest_demo::init_logging;

#[derive(Parser)]
#[command(name = "comtest-client")]
#[command(about = "ComTest automation client over DCE RPC")]
struct Args {
    /// Server host (IPv4 or IPv6)
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Server port
    #[arg(short, long, default_value = "5150")]
    port: u16,

    /// Circle radius
    #[arg(short, long, default_value = "2.0", allow_negative_numbers = true)]
    radius: f64,

    /// Comment passed along with the call
    #[arg(short, long, default_value = "abc")]
    comment: String,

    /// Connect and bind timeout in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,

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
    info!("Connecting to ComTest server at {}", addr);
    let proxy = ComTestProxy::connect_timeout(addr, Duration::from_secs(args.timeout)).await?;

    let area = proxy
        .com_test_method(args.radius, BString::new(&args.comment))
        .await?;
    info!("ComTestMethod({}, {:?}) = {}", args.radius, args.comment, area);

    let ids = proxy
        .get_ids_of_names(&IID_NULL, &["ComTestMethod"], 0)
        .await?;
    let dispid = ids.first().copied().unwrap_or(DISPID_COMTESTMETHOD);
    let params = DispParams::positional(vec![
        Variant::R8(args.radius),
        Variant::from(args.comment.as_str()),
    ]);
    let outcome = proxy
        .invoke(dispid, &IID_NULL, 0, DISPATCH_METHOD, &params)
        .await?;
    match outcome.into_result() {
        Ok(value) => info!("Invoke(DISPID {}) = {:?}", dispid, value),
        Err(e) => warn!("Invoke failed: {}", e),
    }

    Ok(())
}
