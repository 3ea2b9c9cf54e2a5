use std::net::SocketAddr;

use anyhow::Context;
use db::models::user::{CreateUser, User};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    auth,
    config::{BootstrapUser, ServerConfig},
    routes, AppState,
};

pub struct Server;

impl Server {
    pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
        let pool = db::start_db(&config.database_url)
            .await
            .context("failed to open database")?;

        if let Some(bootstrap) = &config.bootstrap_user {
            ensure_bootstrap_user(&pool, bootstrap).await?;
        }

        let state = AppState::new(pool);
        let router = routes::router(state);

        let addr: SocketAddr = config
            .listen_addr
            .parse()
            .context("listen address is invalid")?;
        let tcp_listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("failed to bind tcp listener")?;

        tracing::info!(%addr, "task api listening");

        axum::serve(tcp_listener, router.into_make_service())
            .await
            .context("server failure")?;

        Ok(())
    }
}

async fn ensure_bootstrap_user(pool: &SqlitePool, bootstrap: &BootstrapUser) -> anyhow::Result<()> {
    if User::find_by_email(pool, &bootstrap.email)
        .await
        .context("failed to look up bootstrap user")?
        .is_some()
    {
        return Ok(());
    }

    let password_hash = auth::hash_password(&bootstrap.password)?;
    User::create(
        pool,
        &CreateUser {
            name: bootstrap.name.clone(),
            email: bootstrap.email.clone(),
            password_hash,
        },
        Uuid::new_v4(),
    )
    .await
    .context("failed to create bootstrap user")?;

    tracing::info!(email = %bootstrap.email, "created bootstrap user");
    Ok(())
}
