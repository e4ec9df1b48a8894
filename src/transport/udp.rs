use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use anyhow::{anyhow, Context, Result};

use super::Transport;

/// Fire-and-forget datagram sender to a fixed `host:port`.
///
/// Construction never fails: a bind or resolve error leaves the transport
/// disconnected so its publisher keeps running and logging.
pub struct UdpTransport {
    target: String,
    socket: Option<(UdpSocket, SocketAddr)>,
}

impl UdpTransport {
    pub fn new(host: &str, port: u16) -> Self {
        let target = format!("{}:{}", host, port);
        let socket = match Self::open(&target) {
            Ok(socket) => {
                log::info!("UdpTransport: sending to {}", target);
                Some(socket)
            }
            Err(err) => {
                log::error!("UdpTransport: setup for {} failed: {:#}", target, err);
                None
            }
        };
        Self { target, socket }
    }

    fn open(target: &str) -> Result<(UdpSocket, SocketAddr)> {
        let addr = target
            .to_socket_addrs()
            .with_context(|| format!("resolve {}", target))?
            .next()
            .ok_or_else(|| anyhow!("{} resolved to no addresses", target))?;
        let bind = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind).with_context(|| format!("bind {}", bind))?;
        Ok((socket, addr))
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, data: &str) -> bool {
        let Some((socket, addr)) = &self.socket else {
            return false;
        };
        match socket.send_to(data.as_bytes(), addr) {
            Ok(_) => true,
            Err(err) => {
                log::warn!("UdpTransport: send to {} failed: {}", self.target, err);
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn describe(&self) -> String {
        format!("udp://{}", self.target)
    }
}
