//! Network availability check run before each fetch.
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

/// Reports whether an active network is available before a fetch is tried.
///
/// Any `Fn() -> bool` closure works as a probe, which is what tests use.
pub trait ConnectivityProbe: Send + Sync {
    fn is_online(&self) -> bool;
}

impl<F> ConnectivityProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_online(&self) -> bool {
        self()
    }
}

/// Probe that asks the OS routing table whether `target` is reachable.
///
/// Connecting a UDP socket only selects a route; no packet is sent. With no
/// usable interface the connect fails with "network unreachable".
#[derive(Debug, Clone, Copy)]
pub struct RouteProbe {
    target: SocketAddr,
}

impl RouteProbe {
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }
}

impl Default for RouteProbe {
    fn default() -> Self {
        Self::new(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(1, 1, 1, 1), 53)))
    }
}

impl ConnectivityProbe for RouteProbe {
    fn is_online(&self) -> bool {
        let bind_addr = if self.target.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };

        match UdpSocket::bind(bind_addr).and_then(|socket| socket.connect(self.target)) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(target_addr = %self.target, error = %e, "No route to network");
                false
            }
        }
    }
}
