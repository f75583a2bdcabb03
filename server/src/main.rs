use taskport_server::{
    config::{ListenConfiguration, TaskportConfiguration},
    setup::{create_state, router},
    tracing_setup::setup_tracing,
};

use axum::Router;
use futures::{Future, FutureExt};

use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() {
    setup().await;
}

async fn setup() {
    setup_tracing();

    let configuration = TaskportConfiguration::load().expect("Failed to load configuration");
    let listen = configuration.listen.clone();
    let state = create_state(&configuration);
    let router = router(state);

    let shutdown_future = signal::ctrl_c().map(|fut| {
        fut.expect("Error occurred while waiting for Ctrl+C signal");
        tracing::info!("Received shutdown signal");
    });

    start_server(listen, router, shutdown_future).await;
    tracing::info!("Shutdown complete");
}

async fn start_server(
    listen: ListenConfiguration,
    router: Router<()>,
    future: impl Future<Output = ()>,
) {
    let bind = axum::Server::bind(&listen.http);
    info!("Listening on {}...", listen.http);
    bind.serve(router.into_make_service())
        .with_graceful_shutdown(future)
        .await
        .expect("Server crashed");
}
