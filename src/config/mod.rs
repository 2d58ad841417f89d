//! Configuration of the `send-to-kafka` handler.
//!
//! The handler is configured with a section in the server configuration:
//!
//! ```text
//! <send-to-kafka>
//!     server-name dhcp1.example.com
//!     source-address 2001:db8::53
//!     topic dhcpkit.messages
//!     broker kafka1.example.com:9092
//!     broker kafka2.example.com:9092
//! </send-to-kafka>
//! ```
//!
//! All keys are optional. Without a `broker` the handler publishes to
//! `localhost:9092`, and without a `server-name` it uses the FQDN of this
//! machine.
//!
//! ```rust
//! use dhcpkit_kafka::config::SendToKafkaConfig;
//!
//! let config = SendToKafkaConfig::parse(
//!     "<send-to-kafka>\n broker host1:9092\n broker host2:9092\n</send-to-kafka>",
//! )
//! .unwrap();
//! assert_eq!(config.topic.as_str(), "dhcpkit.messages");
//! assert_eq!(config.brokers.len(), 2);
//! ```

mod datatypes;
mod section;

pub use datatypes::{BrokerAddress, HostOrIp, TopicName, format_host_port};
pub use section::{Document, Entry, Section, parse_sections};

use std::fmt;

use once_cell::sync::Lazy;

use crate::constants::{DEFAULT_BROKER, DEFAULT_TOPIC, MAX_SERVER_NAME_LENGTH};
use crate::error::{Error, Result};

/// Section type of the handler configuration.
pub const SECTION_TYPE: &str = "send-to-kafka";

/// Description of one configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub name: &'static str,
    pub datatype: &'static str,
    /// Whether the key may be given more than once.
    pub multiple: bool,
    pub default: Option<&'static str>,
    pub description: &'static str,
}

const SCHEMA: &[KeySpec] = &[
    KeySpec {
        name: "server-name",
        datatype: "string",
        multiple: false,
        default: None,
        description: "The name of this server, used to identify it in the published \
                      messages. Defaults to the fully qualified domain name of the host.",
    },
    KeySpec {
        name: "source-address",
        datatype: "ipaddr-or-hostname",
        multiple: false,
        default: None,
        description: "The address to send Kafka traffic from.",
    },
    KeySpec {
        name: "topic",
        datatype: "topic-name",
        multiple: false,
        default: Some(DEFAULT_TOPIC),
        description: "The Kafka topic to publish messages on.",
    },
    KeySpec {
        name: "broker",
        datatype: "inet-connection-address",
        multiple: true,
        default: Some(DEFAULT_BROKER),
        description: "A Kafka broker to bootstrap from. May be given more than once.",
    },
];

/// The keys accepted in a `send-to-kafka` section.
pub fn schema() -> &'static [KeySpec] {
    SCHEMA
}

static FQDN: Lazy<String> = Lazy::new(resolve_fqdn);

/// The fully qualified domain name of this machine.
///
/// Resolved once: the host name is looked up and the first name its
/// addresses resolve back to that contains a dot is used. Falls back to the
/// plain host name.
pub fn fqdn() -> String {
    FQDN.clone()
}

fn resolve_fqdn() -> String {
    let name = hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string());

    let addresses = match dns_lookup::lookup_host(&name) {
        Ok(addresses) => addresses,
        Err(e) => {
            tracing::debug!(hostname = %name, error = %e, "Can't resolve host name");
            Vec::new()
        }
    };
    let names = addresses
        .iter()
        .filter_map(|address| dns_lookup::lookup_addr(address).ok());

    let fqdn = pick_fqdn(&name, names);
    tracing::debug!(hostname = %name, fqdn = %fqdn, "Resolved server name");
    fqdn
}

/// The first candidate with a dot in it, or `hostname` when there is none.
fn pick_fqdn(hostname: &str, candidates: impl IntoIterator<Item = String>) -> String {
    candidates
        .into_iter()
        .map(|name| name.trim_end_matches('.').to_string())
        .find(|name| name.contains('.'))
        .unwrap_or_else(|| hostname.to_string())
}

/// Configuration of one `send-to-kafka` handler. Built once when the
/// configuration is loaded and not changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendToKafkaConfig {
    pub server_name: String,
    pub source_address: Option<HostOrIp>,
    pub topic: TopicName,
    pub brokers: Vec<BrokerAddress>,
}

impl Default for SendToKafkaConfig {
    fn default() -> Self {
        Self {
            server_name: fqdn(),
            source_address: None,
            topic: TopicName::default(),
            brokers: vec![default_broker()],
        }
    }
}

fn default_broker() -> BrokerAddress {
    BrokerAddress::new("localhost", Some(crate::constants::DEFAULT_BROKER_PORT))
}

fn convert<T>(entry: &Entry) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    entry
        .value
        .parse()
        .map_err(|e: String| Error::config_at(entry.line, format!("{}: {}", entry.key, e)))
}

impl SendToKafkaConfig {
    /// Build the configuration from a parsed `send-to-kafka` section.
    pub fn from_section(section: &Section) -> Result<Self> {
        if section.type_name != SECTION_TYPE {
            return Err(Error::config_at(
                section.line,
                format!("expected <{}>, found <{}>", SECTION_TYPE, section.type_name),
            ));
        }
        if let Some(nested) = section.sections.first() {
            return Err(Error::config_at(
                nested.line,
                format!("<{}> can not contain sections", SECTION_TYPE),
            ));
        }

        let mut seen: Vec<&str> = Vec::new();
        for entry in &section.entries {
            let spec = SCHEMA
                .iter()
                .find(|spec| spec.name == entry.key)
                .ok_or_else(|| {
                    Error::config_at(
                        entry.line,
                        format!("unknown key '{}' in <{}>", entry.key, SECTION_TYPE),
                    )
                })?;

            if !spec.multiple && seen.contains(&spec.name) {
                return Err(Error::config_at(
                    entry.line,
                    format!("'{}' may only be given once", spec.name),
                ));
            }
            seen.push(spec.name);
        }

        let mut config = Self::default();

        if let Some(entry) = section.values("server-name").next() {
            config.server_name = entry.value.clone();
        }
        if let Some(entry) = section.values("source-address").next() {
            config.source_address = Some(convert(entry)?);
        }
        if let Some(entry) = section.values("topic").next() {
            config.topic = convert(entry)?;
        }

        let brokers = section
            .values("broker")
            .map(convert)
            .collect::<Result<Vec<BrokerAddress>>>()?;
        if !brokers.is_empty() {
            config.brokers = brokers;
        }

        if let Err(errors) = config.validate() {
            return Err(Error::config_at(section.line, errors.join("; ")));
        }

        tracing::debug!(
            server_name = %config.server_name,
            topic = %config.topic,
            brokers = config.brokers.len(),
            "Loaded send-to-kafka configuration"
        );
        Ok(config)
    }

    /// Parse text holding exactly one `send-to-kafka` section.
    pub fn parse(text: &str) -> Result<Self> {
        let document = parse_sections(text)?;
        if let Some(entry) = document.entries.first() {
            return Err(Error::config_at(
                entry.line,
                format!("'{}' is outside of <{}>", entry.key, SECTION_TYPE),
            ));
        }

        match document.sections.as_slice() {
            [section] => Self::from_section(section),
            [] => Err(Error::Config(format!("no <{}> section found", SECTION_TYPE))),
            [_, second, ..] => Err(Error::config_at(
                second.line,
                format!("expected a single <{}> section", SECTION_TYPE),
            )),
        }
    }

    /// Every `send-to-kafka` section in a full server configuration, at any
    /// depth. Other sections and keys are ignored.
    pub fn from_document(text: &str) -> Result<Vec<Self>> {
        parse_sections(text)?
            .find_sections(SECTION_TYPE)
            .into_iter()
            .map(Self::from_section)
            .collect()
    }

    /// Every `send-to-kafka` section in a configuration file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Vec<Self>> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Can't read {}: {}", path.display(), e)))?;
        Self::from_document(&text)
    }

    /// Build the configuration from environment variables.
    ///
    /// Environment variables:
    /// - `KAFKA_SERVER_NAME`: server name (default: FQDN of this machine)
    /// - `KAFKA_SOURCE_ADDRESS`: address to connect from (default: none)
    /// - `KAFKA_TOPIC`: topic (default: dhcpkit.messages)
    /// - `KAFKA_BROKERS`: comma separated brokers (default: localhost:9092)
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(server_name) = std::env::var("KAFKA_SERVER_NAME") {
            if !server_name.trim().is_empty() {
                config.server_name = server_name.trim().to_string();
            }
        }

        if let Ok(source) = std::env::var("KAFKA_SOURCE_ADDRESS") {
            if !source.trim().is_empty() {
                config.source_address = Some(
                    source
                        .parse()
                        .map_err(|e| Error::Config(format!("Invalid KAFKA_SOURCE_ADDRESS: {}", e)))?,
                );
            }
        }

        let topic = std::env::var("KAFKA_TOPIC").unwrap_or_else(|_| DEFAULT_TOPIC.to_string());
        config.topic = topic
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid KAFKA_TOPIC: {}", e)))?;

        let brokers = std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| DEFAULT_BROKER.to_string());
        config.brokers = brokers
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(|b| {
                b.parse()
                    .map_err(|e| Error::Config(format!("Invalid KAFKA_BROKERS: {}", e)))
            })
            .collect::<Result<Vec<BrokerAddress>>>()?;

        config
            .validate()
            .map_err(|errors| Error::Config(errors.join("; ")))?;
        Ok(config)
    }

    /// Check the whole configuration, collecting every problem.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server_name.is_empty() {
            errors.push("server-name can not be empty".to_string());
        }
        if self.server_name.len() > MAX_SERVER_NAME_LENGTH {
            errors.push(format!(
                "server-name ({} bytes) must be {} bytes or less when encoded as UTF-8",
                self.server_name.len(),
                MAX_SERVER_NAME_LENGTH
            ));
        }
        if self.brokers.is_empty() {
            errors.push("at least one broker is required".to_string());
        }
        if self.brokers.iter().any(|b| b.port == Some(0)) {
            errors.push("broker port must be between 1 and 65535".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Renders the configuration as a section that parses back to it.
impl fmt::Display for SendToKafkaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<{}>", SECTION_TYPE)?;
        writeln!(f, "    server-name {}", self.server_name)?;
        if let Some(source) = &self.source_address {
            writeln!(f, "    source-address {}", source)?;
        }
        writeln!(f, "    topic {}", self.topic)?;
        for broker in &self.brokers {
            writeln!(f, "    broker {}", broker)?;
        }
        write!(f, "</{}>", SECTION_TYPE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Section loading
    // ========================================================================

    #[test]
    fn test_documented_example() {
        let config = SendToKafkaConfig::parse(
            "<send-to-kafka>
                broker host1:9092
                broker host2:9092
            </send-to-kafka>",
        )
        .unwrap();

        let brokers: Vec<String> = config.brokers.iter().map(|b| b.to_string()).collect();
        assert_eq!(brokers, vec!["host1:9092", "host2:9092"]);
        assert_eq!(config.topic.as_str(), "dhcpkit.messages");
    }

    #[test]
    fn test_empty_section_uses_defaults() {
        let config = SendToKafkaConfig::parse("<send-to-kafka>\n</send-to-kafka>").unwrap();

        let brokers: Vec<String> = config.brokers.iter().map(|b| b.to_string()).collect();
        assert_eq!(brokers, vec!["localhost:9092"]);
        assert_eq!(config.topic.as_str(), "dhcpkit.messages");
        assert_eq!(config.server_name, fqdn());
        assert_eq!(config.source_address, None);
    }

    #[test]
    fn test_all_keys() {
        let config = SendToKafkaConfig::parse(
            "<Send-To-Kafka>
                Server-Name dhcp1.example.com
                source-address 2001:db8::53
                topic my-topic
                broker [2001:db8::1]:9093
            </Send-To-Kafka>",
        )
        .unwrap();

        assert_eq!(config.server_name, "dhcp1.example.com");
        assert_eq!(
            config.source_address,
            Some(HostOrIp::Ip("2001:db8::53".parse().unwrap()))
        );
        assert_eq!(config.topic.as_str(), "my-topic");
        assert_eq!(
            config.brokers,
            vec![BrokerAddress::new("2001:db8::1", Some(9093))]
        );
    }

    #[test]
    fn test_default_broker_matches_constant() {
        assert_eq!(default_broker().to_string(), DEFAULT_BROKER);
        assert_eq!(DEFAULT_BROKER.parse::<BrokerAddress>().unwrap(), default_broker());
    }

    #[test]
    fn test_unknown_key() {
        let err = SendToKafkaConfig::parse("<send-to-kafka>\n  partition 1\n</send-to-kafka>")
            .unwrap_err();
        assert!(matches!(err, Error::ConfigAt { line: 2, .. }));
        assert!(err.to_string().contains("unknown key 'partition'"));
    }

    #[test]
    fn test_repeated_singular_key() {
        let err = SendToKafkaConfig::parse(
            "<send-to-kafka>\n  topic a\n  topic b\n</send-to-kafka>",
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigAt { line: 3, .. }));
    }

    #[test]
    fn test_invalid_values_report_line() {
        let cases = [
            "<send-to-kafka>\n  topic ..\n</send-to-kafka>",
            "<send-to-kafka>\n  broker host:0\n</send-to-kafka>",
            "<send-to-kafka>\n  source-address not_valid\n</send-to-kafka>",
        ];
        for text in cases {
            let err = SendToKafkaConfig::parse(text).unwrap_err();
            assert!(matches!(err, Error::ConfigAt { line: 2, .. }), "{}", text);
        }
    }

    #[test]
    fn test_server_name_too_long() {
        let text = format!(
            "<send-to-kafka>\n  server-name {}\n</send-to-kafka>",
            "x".repeat(256)
        );
        let err = SendToKafkaConfig::parse(&text).unwrap_err();
        assert!(err.to_string().contains("255 bytes or less"));
    }

    #[test]
    fn test_nested_section_rejected() {
        let err = SendToKafkaConfig::parse(
            "<send-to-kafka>\n  <other>\n  </other>\n</send-to-kafka>",
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigAt { line: 2, .. }));
    }

    #[test]
    fn test_parse_requires_single_section() {
        assert!(SendToKafkaConfig::parse("").is_err());
        assert!(
            SendToKafkaConfig::parse(
                "<send-to-kafka>\n</send-to-kafka>\n<send-to-kafka>\n</send-to-kafka>"
            )
            .is_err()
        );
        assert!(SendToKafkaConfig::parse("<other>\n</other>").is_err());
    }

    #[test]
    fn test_from_document() {
        let text = "
user nobody
<listen-unicast eth0>
    address 2001:db8::1
</listen-unicast>
<handlers>
    <send-to-kafka>
        topic first
    </send-to-kafka>
</handlers>
<send-to-kafka>
    topic second
</send-to-kafka>
";
        let configs = SendToKafkaConfig::from_document(text).unwrap();
        let topics: Vec<&str> = configs.iter().map(|c| c.topic.as_str()).collect();
        assert_eq!(topics, vec!["first", "second"]);
    }

    #[test]
    fn test_display_parses_back() {
        let config = SendToKafkaConfig {
            server_name: "dhcp1.example.com".to_string(),
            source_address: Some(HostOrIp::Hostname("src.example.com".to_string())),
            topic: "t".parse().unwrap(),
            brokers: vec![
                BrokerAddress::new("::1", Some(9092)),
                BrokerAddress::new("kafka", None),
            ],
        };
        assert_eq!(SendToKafkaConfig::parse(&config.to_string()).unwrap(), config);
    }

    // ========================================================================
    // Validation
    // ========================================================================

    #[test]
    fn test_validate_collects_all_errors() {
        let config = SendToKafkaConfig {
            server_name: String::new(),
            brokers: vec![],
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    // ========================================================================
    // Server name
    // ========================================================================

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_pick_fqdn_prefers_dotted_name() {
        // Debian style: 127.0.1.1 host.example.com host
        assert_eq!(
            pick_fqdn("host", names(&["host.example.com", "host"])),
            "host.example.com"
        );
        assert_eq!(
            pick_fqdn("host", names(&["host", "localhost", "host.example.com"])),
            "host.example.com"
        );
        assert_eq!(
            pick_fqdn("host", names(&["host.example.com", "host.example.net"])),
            "host.example.com"
        );
    }

    #[test]
    fn test_pick_fqdn_strips_root_dot() {
        assert_eq!(
            pick_fqdn("host", names(&["host.example.com."])),
            "host.example.com"
        );
        // The root alone doesn't count as a dotted name
        assert_eq!(pick_fqdn("host", names(&["."])), "host");
    }

    #[test]
    fn test_pick_fqdn_falls_back_to_hostname() {
        assert_eq!(pick_fqdn("host", names(&["host", "localhost"])), "host");
        assert_eq!(pick_fqdn("host", Vec::new()), "host");
    }

    #[test]
    fn test_fqdn_is_stable() {
        assert!(!fqdn().is_empty());
        assert_eq!(fqdn(), fqdn());
    }

    #[test]
    fn test_schema() {
        let names: Vec<&str> = schema().iter().map(|k| k.name).collect();
        assert_eq!(names, vec!["server-name", "source-address", "topic", "broker"]);
        assert!(schema().iter().filter(|k| k.multiple).all(|k| k.name == "broker"));
    }
}
