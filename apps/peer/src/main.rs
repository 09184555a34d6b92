// [apps/peer/src/main.rs]
//! Binary entry point: parse configuration, wire up tracing, bootstrap
//! peer state from the store, and run the kernel until shut down.

use clap::Parser;
use fleetmesh_peer::bootstrap;
use fleetmesh_peer::config::Config;
use fleetmesh_peer::kernel::Kernel;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    heimdall::init_tracing("fleetmesh-peer");

    let config = Config::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let state = match bootstrap::bootstrap(config).await {
            Ok(state) => state,
            Err(err) => {
                error!(%err, "bootstrap failed");
                std::process::exit(1);
            }
        };

        let shutdown_state = state.clone();
        ctrlc::set_handler(move || {
            info!("shutdown signal received");
            shutdown_state.shut_down();
        })
        .ok();

        info!(node_id = %state.node_id, "fleetmesh peer starting");
        Kernel::new(state).run().await
    })
}
