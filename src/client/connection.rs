//! One TCP connection to a broker.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream, lookup_host};
use tokio::time::timeout;

use super::KafkaRequest;
use crate::config::HostOrIp;
use crate::constants::{CLIENT_ID, MAX_RESPONSE_SIZE};
use crate::encode::ToByte;
use crate::error::{Error, Result};

/// A connection that sends one request at a time and waits for its response.
#[derive(Debug)]
pub struct BrokerConnection {
    addr: String,
    stream: TcpStream,
    correlation_id: i32,
    request_timeout: Duration,
}

async fn resolve_source(source: &HostOrIp, target: &SocketAddr) -> Result<IpAddr> {
    match source {
        HostOrIp::Ip(ip) => Ok(*ip),
        HostOrIp::Hostname(name) => lookup_host((name.as_str(), 0))
            .await?
            .map(|addr| addr.ip())
            .find(|ip| ip.is_ipv4() == target.is_ipv4())
            .ok_or_else(|| {
                Error::BrokerUnavailable(format!(
                    "source address {} has no address usable for {}",
                    name, target
                ))
            }),
    }
}

async fn connect_from(target: SocketAddr, source: Option<&HostOrIp>) -> Result<TcpStream> {
    let socket = if target.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    if let Some(source) = source {
        let ip = resolve_source(source, &target).await?;
        socket.bind(SocketAddr::new(ip, 0))?;
    }

    let stream = socket.connect(target).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

impl BrokerConnection {
    /// Connect to `addr` (`host:port`), trying each resolved address in turn.
    ///
    /// With a `source` the socket is bound to that address first. A host name
    /// as source is resolved and the address matching the target's family
    /// is used.
    pub async fn connect(
        addr: &str,
        source: Option<&HostOrIp>,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let targets: Vec<SocketAddr> = timeout(connect_timeout, lookup_host(addr)).await??.collect();
        if targets.is_empty() {
            return Err(Error::BrokerUnavailable(format!("{} did not resolve", addr)));
        }

        let mut last_error = None;
        for target in targets {
            match timeout(connect_timeout, connect_from(target, source)).await {
                Ok(Ok(stream)) => {
                    tracing::debug!(broker = %addr, address = %target, "Connected to Kafka broker");
                    return Ok(Self {
                        addr: addr.to_string(),
                        stream,
                        correlation_id: 0,
                        request_timeout: connect_timeout,
                    });
                }
                Ok(Err(e)) => {
                    tracing::debug!(broker = %addr, address = %target, error = %e, "Connect failed");
                    last_error = Some(e);
                }
                Err(e) => {
                    tracing::debug!(broker = %addr, address = %target, "Connect timed out");
                    last_error = Some(e.into());
                }
            }
        }

        Err(Error::BrokerUnavailable(format!(
            "could not connect to {}: {}",
            addr,
            last_error.map_or_else(|| "no addresses".to_string(), |e| e.to_string())
        )))
    }

    /// Use a different timeout for requests than for connecting.
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send a request and wait for the matching response.
    pub async fn send<R: KafkaRequest>(&mut self, request: &R) -> Result<R::Response> {
        self.correlation_id = self.correlation_id.wrapping_add(1);
        let correlation_id = self.correlation_id;

        let mut frame = BytesMut::with_capacity(128);
        frame.put_i32(0); // size, patched below
        R::api_key().encode(&mut frame)?;
        R::api_version().encode(&mut frame)?;
        correlation_id.encode(&mut frame)?;
        CLIENT_ID.encode(&mut frame)?;
        request.encode_body(&mut frame)?;
        let size = (frame.len() - 4) as i32;
        frame[0..4].copy_from_slice(&size.to_be_bytes());

        let mut response = timeout(self.request_timeout, self.exchange(&frame)).await??;

        let received = response.get_i32();
        if received != correlation_id {
            return Err(Error::MissingData(format!(
                "correlation id {} from {} does not match request {}",
                received, self.addr, correlation_id
            )));
        }

        tracing::trace!(
            broker = %self.addr,
            api_key = R::api_key(),
            correlation_id,
            size = response.len(),
            "Received response"
        );
        R::decode_response(response)
    }

    async fn exchange(&mut self, frame: &[u8]) -> Result<Bytes> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await?;

        let size = self.stream.read_i32().await?;
        if size < 4 {
            return Err(Error::MissingData(format!(
                "Invalid response size {} from {}",
                size, self.addr
            )));
        }
        let size = size as usize;
        if size > MAX_RESPONSE_SIZE {
            return Err(Error::MissingData(format!(
                "Response size {} exceeds maximum allowed size {}",
                size, MAX_RESPONSE_SIZE
            )));
        }

        let mut data = vec![0u8; size];
        self.stream.read_exact(&mut data).await?;
        Ok(Bytes::from(data))
    }
}
