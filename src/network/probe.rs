//! Internet reachability probe
//!
//! Asks one or more DNS resolvers for an `A` record over UDP. If none of
//! them answer, falls back to a plain HTTP request.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use super::{ConnectivityProbe, ConnectivityState};

/// Probe settings
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Resolvers to query, in order
    pub dns_servers: Vec<SocketAddr>,
    /// Hostname looked up on each resolver
    pub dns_query_host: String,
    /// URL fetched when every resolver is silent
    pub http_fallback_url: Option<String>,
    /// Budget for one whole check, shared by every resolver and the fallback
    pub timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            dns_servers: vec![
                SocketAddr::from(([1, 1, 1, 1], 53)),
                SocketAddr::from(([8, 8, 8, 8], 53)),
            ],
            dns_query_host: "www.msftconnecttest.com".to_string(),
            http_fallback_url: Some(
                "http://www.msftconnecttest.com/connecttest.txt".to_string(),
            ),
            timeout: Duration::from_millis(800),
        }
    }
}

/// DNS-then-HTTP reachability check
pub struct ReachabilityProbe {
    options: ProbeOptions,
    http: Option<reqwest::blocking::Client>,
}

impl ReachabilityProbe {
    pub fn new(options: ProbeOptions) -> Self {
        let http = options.http_fallback_url.as_ref().and_then(|_| {
            reqwest::blocking::Client::builder()
                .timeout(options.timeout)
                .build()
                .map_err(|e| log::warn!("HTTP fallback disabled: {}", e))
                .ok()
        });

        Self { options, http }
    }

    /// Equal share of the budget for each resolver and the fallback
    fn attempt_budget(&self) -> Duration {
        let attempts = self.options.dns_servers.len() + usize::from(self.http.is_some());
        self.options.timeout / attempts.max(1) as u32
    }

    fn dns_reachable(&self, deadline: Instant) -> bool {
        let host = &self.options.dns_query_host;
        let budget = self.attempt_budget();

        self.options.dns_servers.iter().enumerate().any(|(i, server)| {
            let attempt_deadline = deadline.min(Instant::now() + budget);
            match query_resolver(*server, host, i as u16, attempt_deadline) {
                Ok(()) => true,
                Err(e) => {
                    log::debug!("DNS probe via {} failed: {}", server, e);
                    false
                }
            }
        })
    }

    fn http_reachable(&self, deadline: Instant) -> bool {
        let (Some(client), Some(url)) = (&self.http, &self.options.http_fallback_url) else {
            return false;
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            log::debug!("HTTP probe skipped, check budget spent");
            return false;
        }

        match client.get(url).timeout(remaining).send() {
            Ok(response) => {
                log::debug!("HTTP probe {} answered {}", url, response.status());
                true
            }
            Err(e) => {
                log::debug!("HTTP probe {} failed: {}", url, e);
                false
            }
        }
    }
}

impl Default for ReachabilityProbe {
    fn default() -> Self {
        Self::new(ProbeOptions::default())
    }
}

impl ConnectivityProbe for ReachabilityProbe {
    fn check(&self) -> ConnectivityState {
        let deadline = Instant::now() + self.options.timeout;
        let online = self.dns_reachable(deadline) || self.http_reachable(deadline);
        ConnectivityState::from_online(online)
    }
}

/// Time left before `deadline`, or a timeout error once it has passed
fn remaining(deadline: Instant) -> io::Result<Duration> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        return Err(io::ErrorKind::TimedOut.into());
    }
    Ok(left)
}

/// Send one query and wait for a reply carrying the same transaction id
///
/// Unrelated datagrams are dropped without extending the deadline.
fn query_resolver(server: SocketAddr, host: &str, salt: u16, deadline: Instant) -> io::Result<()> {
    let bind_addr: SocketAddr = if server.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    let socket = UdpSocket::bind(bind_addr)?;
    socket.set_write_timeout(Some(remaining(deadline)?))?;

    let id = transaction_id(salt);
    let query = encode_dns_query(id, host).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid hostname {}", host),
        )
    })?;
    socket.send_to(&query, server)?;

    let mut buf = [0u8; 512];
    loop {
        socket.set_read_timeout(Some(remaining(deadline)?))?;
        let (len, from) = socket.recv_from(&mut buf)?;
        if from == server && len >= 12 && buf[..2] == id.to_be_bytes() && buf[2] & 0x80 != 0 {
            return Ok(());
        }
    }
}

fn transaction_id(salt: u16) -> u16 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos as u16) ^ salt.rotate_left(8)
}

/// Encode a recursive `A`/`IN` query; `None` when a label is empty or too long
pub fn encode_dns_query(id: u16, host: &str) -> Option<Vec<u8>> {
    let mut packet = Vec::with_capacity(17 + host.len());
    packet.extend_from_slice(&id.to_be_bytes());
    packet.extend_from_slice(&[0x01, 0x00]); // RD
    packet.extend_from_slice(&[0x00, 0x01]); // QDCOUNT
    packet.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

    for label in host.trim_end_matches('.').split('.') {
        if label.is_empty() || label.len() > 63 {
            return None;
        }
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0);

    packet.extend_from_slice(&[0x00, 0x01]); // QTYPE A
    packet.extend_from_slice(&[0x00, 0x01]); // QCLASS IN
    Some(packet)
}
