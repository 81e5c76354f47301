use mcast_rpc::{config::Config, domain::math::Math, logging, Server};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;

    let mut server = Server::new().with_dispatch_mode(config.dispatch);
    server.register(Math, "Math")?;

    server
        .listen_and_serve(&config, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("server stopped");
    Ok(())
}
