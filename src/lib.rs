use std::{future::Future, net::SocketAddr, sync::Arc, time::Instant};

use tracing::{error, info, warn};

pub mod client;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod rpc;
pub mod transport;

use config::{Config, DispatchMode};
use errors::{RegistrationError, ServerError};
use rpc::{
    dispatcher::{Dispatched, Dispatcher},
    envelope::{encode_response, MAX_DATAGRAM_BYTES},
    registry::{MethodTable, Registry, Service},
};
use transport::Transport;

/// Collects services, then serves them. Registration must finish before
/// serving starts; the registry is frozen once the loop begins.
#[derive(Debug, Default)]
pub struct Server {
    registry: Registry,
    dispatch: DispatchMode,
}

impl Server {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dispatch_mode(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn register<S: Service>(
        &mut self,
        receiver: S,
        name: &str,
    ) -> Result<(), RegistrationError> {
        self.registry.register(receiver, name)
    }

    pub fn register_with<S: Send + Sync + 'static>(
        &mut self,
        receiver: S,
        name: &str,
        table: MethodTable<S>,
    ) -> Result<(), RegistrationError> {
        self.registry.register_with(receiver, name, table)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Joins the configured group and serves until `shutdown` resolves. The
    /// socket is dropped on every return path.
    pub async fn listen_and_serve(
        self,
        config: &Config,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ServerError> {
        let socket = transport::bind_multicast(config)?;

        info!(
            group = %config.group,
            port = config.port,
            dispatch = ?self.dispatch,
            services = ?self.registry.services(),
            methods = self.registry.len(),
            "server starting"
        );

        self.serve(socket, shutdown).await;
        Ok(())
    }

    /// Runs the receive loop on any transport. Read failures are logged and
    /// the loop keeps going; only `shutdown` ends it.
    pub async fn serve<T>(self, transport: T, shutdown: impl Future<Output = ()>)
    where
        T: Transport + 'static,
    {
        let transport = Arc::new(transport);
        let dispatcher = Dispatcher::new(Arc::new(self.registry));
        let mut buf = vec![0_u8; MAX_DATAGRAM_BYTES];
        tokio::pin!(shutdown);

        loop {
            let (len, peer) = tokio::select! {
                () = &mut shutdown => {
                    info!("server shutting down");
                    break;
                }
                received = transport.recv_from(&mut buf) => match received {
                    Ok(received) => received,
                    Err(err) => {
                        warn!(error = %err, "failed to read datagram");
                        continue;
                    }
                },
            };
            let started = Instant::now();

            match self.dispatch {
                DispatchMode::Inline => {
                    let dispatched = dispatcher.dispatch(&buf[..len]);
                    respond(&*transport, peer, &dispatched, started).await;
                }
                DispatchMode::Spawned => {
                    let datagram = buf[..len].to_vec();
                    let dispatcher = dispatcher.clone();
                    let transport = Arc::clone(&transport);
                    tokio::spawn(async move {
                        let dispatched = match tokio::task::spawn_blocking(move || {
                            dispatcher.dispatch(&datagram)
                        })
                        .await
                        {
                            Ok(dispatched) => dispatched,
                            Err(err) => {
                                error!(peer = %peer, error = %err, "dispatch task failed");
                                return;
                            }
                        };
                        respond(&*transport, peer, &dispatched, started).await;
                    });
                }
            }
        }
    }
}

async fn respond<T: Transport + ?Sized>(
    transport: &T,
    peer: SocketAddr,
    dispatched: &Dispatched,
    started: Instant,
) {
    logging::log_dispatch(peer, dispatched, started.elapsed());

    let payload = match encode_response(&dispatched.response) {
        Ok(payload) => payload,
        Err(err) => {
            error!(peer = %peer, error = %err, "failed to encode response, dropping it");
            return;
        }
    };

    if let Err(err) = transport.send_to(&payload, peer).await {
        warn!(peer = %peer, error = %err, "failed to send response");
    }
}
