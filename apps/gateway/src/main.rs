// [apps/gateway/src/main.rs]
//! Binary entry point: parse configuration, wire up tracing, join the mesh
//! as a passive leader observer, and serve the client-facing proxy until
//! shut down.

use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::routing::any;
use axum::Router;
use clap::Parser;
use fleetmesh_gateway::config::Config;
use fleetmesh_gateway::state::GatewayState;
use fleetmesh_gateway::{mesh_watch, proxy, ws};
use std::sync::Arc;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    heimdall::init_tracing("fleetmesh-gateway");

    let config = Config::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let state = GatewayState::new(Arc::new(config));

        let shutdown_state = state.clone();
        ctrlc::set_handler(move || {
            info!("shutdown signal received");
            shutdown_state.shut_down();
        })
        .ok();

        tokio::spawn(mesh_watch::run(state.clone()));

        let bind_addr = state.config.bind_addr;
        let app = router(state);

        info!(%bind_addr, "fleetmesh gateway starting");
        let listener = match tokio::net::TcpListener::bind(bind_addr).await {
            Ok(listener) => listener,
            Err(err) => {
                error!(%err, %bind_addr, "failed to bind client-facing listener");
                std::process::exit(1);
            }
        };
        if let Err(err) = axum::serve(listener, app).await {
            error!(%err, "gateway server exited with an error");
        }
    });

    Ok(())
}

fn router(state: GatewayState) -> IntoMakeServiceWithConnectInfo<Router, std::net::SocketAddr> {
    Router::new()
        .route("/ws", any(ws::upgrade))
        .fallback(any(proxy::forward))
        .with_state(state)
        .into_make_service_with_connect_info::<std::net::SocketAddr>()
}
