use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::SinkConfig;
use crate::types::MetricName;
use super::{MetricSink, Observation};

/// StatsD client over UDP.
///
/// Each `transmit` call is packed into as few datagrams as possible without
/// exceeding `max_packet_size`.
pub struct StatsdSink {
    socket: RwLock<Option<UdpSocket>>,
    target: SocketAddr,
    prefix: Option<MetricName>,
    max_packet_size: usize,
}

impl StatsdSink {
    pub async fn connect(config: &SinkConfig, prefix: Option<MetricName>) -> Result<Self> {
        let target = tokio::net::lookup_host((config.host.as_str(), config.port))
            .await
            .with_context(|| format!("Failed to resolve sink host: {}", config.host))?
            .next()
            .ok_or_else(|| anyhow!("Sink host {} resolved to no addresses", config.host))?;

        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await.context("Failed to bind UDP socket")?;
        socket
            .connect(target)
            .await
            .with_context(|| format!("Failed to connect UDP socket to {}", target))?;

        info!(addr = %target, prefix = ?prefix.as_ref().map(|p| p.to_string()), "StatsD sink ready");

        Ok(Self {
            socket: RwLock::new(Some(socket)),
            target,
            prefix,
            max_packet_size: config.max_packet_size,
        })
    }

    fn qualified(&self, name: &MetricName) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}.{}", prefix, name),
            None => name.to_string(),
        }
    }

    /// Render one observation as StatsD lines.
    ///
    /// A negative gauge would be read as a delta, so it is sent as a reset to
    /// zero followed by the signed value.
    fn format(&self, obs: &Observation) -> Vec<String> {
        let name = self.qualified(obs.name());
        match obs {
            Observation::Gauge(_, value) if value.is_negative() => {
                vec![format!("{}:0|g", name), format!("{}:{}|g", name, value)]
            }
            Observation::Gauge(_, value) => vec![format!("{}:{}|g", name, value)],
            Observation::Timing(_, elapsed) => {
                vec![format!("{}:{:.3}|ms", name, elapsed.as_secs_f64() * 1000.0)]
            }
        }
    }

    /// Pack lines into newline-separated datagrams
    fn packets(&self, lines: &[String]) -> Vec<String> {
        let mut packets = Vec::new();
        let mut current = String::new();

        for line in lines {
            if !current.is_empty() && current.len() + 1 + line.len() > self.max_packet_size {
                packets.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
        if !current.is_empty() {
            packets.push(current);
        }

        packets
    }
}

#[async_trait]
impl MetricSink for StatsdSink {
    fn name(&self) -> &str { "statsd" }

    async fn transmit(&self, observations: &[Observation]) -> Result<()> {
        let lines: Vec<String> = observations.iter().flat_map(|o| self.format(o)).collect();
        if lines.is_empty() {
            return Ok(());
        }

        let guard = self.socket.read().await;
        let socket = guard.as_ref().ok_or_else(|| anyhow!("StatsD sink is closed"))?;

        for packet in self.packets(&lines) {
            socket
                .send(packet.as_bytes())
                .await
                .with_context(|| format!("Failed to send to {}", self.target))?;
        }

        debug!(count = observations.len(), addr = %self.target, "Transmitted observations");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.socket.write().await.take().is_some() {
            debug!(addr = %self.target, "StatsD socket closed");
        }
        Ok(())
    }
}
