//! Request sender for the multicast RPC endpoint
//!
//! A request goes to the group address and any number of servers may answer by
//! unicast. `call` takes the first reply matching the request id; `gather`
//! collects every reply that arrives within a window.

use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::atomic::{AtomicI64, Ordering},
    time::Duration,
};

use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    net::UdpSocket,
    time::{timeout_at, Instant},
};
use tracing::debug;

use crate::errors::ClientError;
use crate::rpc::envelope::{
    decode_response, encode_request, Request, Response, MAX_DATAGRAM_BYTES,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Client {
    socket: UdpSocket,
    target: SocketAddr,
    timeout: Duration,
    next_id: AtomicI64,
}

impl Client {
    pub async fn bind(target: SocketAddr) -> Result<Self, ClientError> {
        let local: IpAddr = match target {
            SocketAddr::V4(addr) if addr.ip().is_loopback() => Ipv4Addr::LOCALHOST.into(),
            SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
            SocketAddr::V6(addr) if addr.ip().is_loopback() => Ipv6Addr::LOCALHOST.into(),
            SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
        };
        let socket = UdpSocket::bind(SocketAddr::new(local, 0)).await?;

        Ok(Self {
            socket,
            target,
            timeout: DEFAULT_TIMEOUT,
            next_id: AtomicI64::new(1),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ClientError> {
        Ok(self.socket.local_addr()?)
    }

    /// Sends one request and decodes the first reply carrying its id.
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, ClientError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.send(method, params).await?;
        let deadline = Instant::now() + self.timeout;

        loop {
            let (_, response) = self.next_reply(deadline).await?.ok_or(ClientError::Timeout)?;
            if response.id != id {
                debug!(expected = id, got = response.id, "ignoring unrelated reply");
                continue;
            }
            if response.is_error() {
                return Err(ClientError::Remote {
                    code: response.error.code,
                    message: response.error.message,
                });
            }
            return serde_json::from_value(response.result).map_err(ClientError::Decode);
        }
    }

    /// Sends one request and collects raw replies from every server that
    /// answers before `window` elapses.
    pub async fn gather<P: Serialize>(
        &self,
        method: &str,
        params: &P,
        window: Duration,
    ) -> Result<Vec<(SocketAddr, Response)>, ClientError> {
        let id = self.send(method, params).await?;
        let deadline = Instant::now() + window;

        let mut replies = Vec::new();
        while let Some((peer, response)) = self.next_reply(deadline).await? {
            if response.id == id {
                replies.push((peer, response));
            }
        }
        Ok(replies)
    }

    async fn send<P: Serialize>(&self, method: &str, params: &P) -> Result<i64, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(id, method, params).map_err(ClientError::Encode)?;
        let payload = encode_request(&request).map_err(ClientError::Encode)?;

        self.socket.send_to(&payload, self.target).await?;
        debug!(id, method = %method, target = %self.target, "request sent");
        Ok(id)
    }

    /// `None` once the deadline passes. Undecodable datagrams are skipped.
    async fn next_reply(
        &self,
        deadline: Instant,
    ) -> Result<Option<(SocketAddr, Response)>, ClientError> {
        let mut buf = vec![0_u8; MAX_DATAGRAM_BYTES];
        loop {
            let (len, peer) = match timeout_at(deadline, self.socket.recv_from(&mut buf)).await {
                Ok(received) => received?,
                Err(_) => return Ok(None),
            };

            match decode_response(&buf[..len]) {
                Ok(response) => return Ok(Some((peer, response))),
                Err(err) => debug!(peer = %peer, error = %err, "skipping undecodable reply"),
            }
        }
    }
}
