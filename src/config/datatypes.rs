//! Value types of the `send-to-kafka` section keys.
//!
//! Each type parses with [`FromStr`] and reports problems as a plain message;
//! the section loader adds the key and line number.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::str::FromStr;

use crate::constants::{
    DEFAULT_BROKER_PORT, DEFAULT_CONNECTION_HOST, DEFAULT_TOPIC, HOSTNAME_LABEL_MAX_LENGTH,
    HOSTNAME_MAX_LENGTH, TOPIC_EXTRA_CHARS, TOPIC_MAX_LENGTH,
};

/// A validated Kafka topic name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicName(String);

impl TopicName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TopicName {
    fn default() -> Self {
        TopicName(DEFAULT_TOPIC.to_string())
    }
}

impl FromStr for TopicName {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if matches!(value, "" | "." | "..") {
            return Err("Topic name can not be empty, '.' or '..'".to_string());
        }

        if value.chars().count() > TOPIC_MAX_LENGTH {
            return Err(format!(
                "Topic name must be {} characters or less",
                TOPIC_MAX_LENGTH
            ));
        }

        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || TOPIC_EXTRA_CHARS.contains(c))
        {
            return Err(format!(
                "Topic names may only contain ASCII letters, digits and '{}'",
                TOPIC_EXTRA_CHARS
            ));
        }

        Ok(TopicName(value.to_string()))
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check a host name against RFC 1123 and return it in lower case, without
/// the trailing dot of an absolute name.
fn hostname(value: &str) -> Result<String, String> {
    let name = value.strip_suffix('.').unwrap_or(value);
    if name.is_empty() || name.len() > HOSTNAME_MAX_LENGTH {
        return Err(format!("'{}' is not a valid host name", value));
    }

    for label in name.split('.') {
        let valid = !label.is_empty()
            && label.len() <= HOSTNAME_LABEL_MAX_LENGTH
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(format!("'{}' is not a valid host name", value));
        }
    }

    Ok(name.to_ascii_lowercase())
}

/// An IP address or a host name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostOrIp {
    Ip(IpAddr),
    Hostname(String),
}

impl FromStr for HostOrIp {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let unbracketed = value
            .strip_prefix('[')
            .and_then(|v| v.strip_suffix(']'))
            .unwrap_or(value);

        if let Ok(ip) = unbracketed.parse::<IpAddr>() {
            return Ok(HostOrIp::Ip(ip));
        }
        if unbracketed != value {
            return Err(format!("'{}' is not a valid IPv6 address", value));
        }

        hostname(value)
            .map(HostOrIp::Hostname)
            .map_err(|_| format!("'{}' is not a valid IP address or host name", value))
    }
}

impl fmt::Display for HostOrIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostOrIp::Ip(ip) => write!(f, "{}", ip),
            HostOrIp::Hostname(name) => f.write_str(name),
        }
    }
}

/// Render a host and port the way Kafka clients expect them.
///
/// An empty host stands for this machine's FQDN, IPv6 literals are put in
/// brackets, and a missing port is left out.
pub fn format_host_port(host: &str, port: Option<u16>) -> String {
    let host = if host.is_empty() {
        super::fqdn()
    } else {
        host.to_string()
    };
    let host = if host.contains(':') {
        format!("[{}]", host)
    } else {
        host
    };

    match port {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    }
}

/// The address of a broker: a host with an optional port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrokerAddress {
    pub host: String,
    pub port: Option<u16>,
}

impl BrokerAddress {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The port to connect to.
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_BROKER_PORT)
    }

    /// `host:port` with the default port filled in, ready to resolve.
    pub fn connect_string(&self) -> String {
        format_host_port(&self.host, Some(self.port_or_default()))
    }
}

fn parse_port(value: &str, original: &str) -> Result<u16, String> {
    match value.parse::<u16>() {
        Ok(0) | Err(_) => Err(format!("'{}' does not contain a valid port", original)),
        Ok(port) => Ok(port),
    }
}

fn connection_host(host: &str, original: &str) -> Result<String, String> {
    if host.is_empty() {
        return Ok(DEFAULT_CONNECTION_HOST.to_string());
    }
    match host.parse::<HostOrIp>() {
        Ok(h) => Ok(h.to_string()),
        Err(_) => Err(format!("'{}' does not contain a valid host", original)),
    }
}

impl FromStr for BrokerAddress {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err("Broker address can not be empty".to_string());
        }

        // [v6]:port or [v6]
        if let Some(rest) = value.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| format!("'{}' has an unterminated '['", value))?;
            let ip: Ipv6Addr = host
                .parse()
                .map_err(|_| format!("'{}' is not a valid IPv6 address", host))?;
            let port = match after {
                "" => None,
                _ => match after.strip_prefix(':') {
                    Some(port) => Some(parse_port(port, value)?),
                    None => return Err(format!("'{}' is not a valid connection address", value)),
                },
            };
            return Ok(BrokerAddress::new(ip.to_string(), port));
        }

        match value.matches(':').count() {
            // host, or a port on its own
            0 => {
                if value.chars().all(|c| c.is_ascii_digit()) {
                    Ok(BrokerAddress::new(
                        DEFAULT_CONNECTION_HOST,
                        Some(parse_port(value, value)?),
                    ))
                } else {
                    Ok(BrokerAddress::new(connection_host(value, value)?, None))
                }
            }
            // host:port
            1 => {
                let (host, port) = value.split_once(':').unwrap_or((value, ""));
                Ok(BrokerAddress::new(
                    connection_host(host, value)?,
                    Some(parse_port(port, value)?),
                ))
            }
            // bare IPv6 literal
            _ => {
                let ip: Ipv6Addr = value
                    .parse()
                    .map_err(|_| format!("'{}' is not a valid connection address", value))?;
                Ok(BrokerAddress::new(ip.to_string(), None))
            }
        }
    }
}

impl fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]", self.host)?;
        } else {
            f.write_str(&self.host)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}
