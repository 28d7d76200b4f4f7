use std::sync::Arc;

mod error;
mod handlers;
mod server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    server::init_tracing();

    let coordinator = Arc::new(shard_router::init().await?);
    let app = handlers::router(coordinator.clone());

    let port = std::env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(3001);
    server::serve(port, app).await?;

    coordinator.shutdown().await;
    Ok(())
}
