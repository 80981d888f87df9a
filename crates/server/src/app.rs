use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use db::DBService;

use crate::{AppState, config::ServerConfig, identity::ClerkIdentityProvider, routes};

pub struct Server;

impl Server {
    pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
        let db = DBService::new(&config.database_url)
            .await
            .context("failed to open sqlite database")?;

        let identity = ClerkIdentityProvider::new(&config.clerk)
            .context("failed to build identity provider client")?;
        let state = AppState::new(db, Arc::new(identity));

        let router = routes::router(state, config.cors_permissive);
        let addr: SocketAddr = config
            .listen_addr
            .parse()
            .context("listen address is invalid")?;
        let tcp_listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("failed to bind tcp listener")?;

        tracing::info!(%addr, "task graph server listening");

        axum::serve(tcp_listener, router.into_make_service())
            .await
            .context("task graph server failure")?;

        Ok(())
    }
}
