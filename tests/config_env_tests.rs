//! Integration tests for SendToKafkaConfig::from_env()
//!
//! These tests verify configuration loading from environment variables.

use dhcpkit_kafka::config::{BrokerAddress, HostOrIp, SendToKafkaConfig, fqdn};
use dhcpkit_kafka::error::Error;
use std::env;
use std::sync::Mutex;

/// Global mutex to serialize all env-based tests.
/// Environment variables are process-global, so we must prevent concurrent access.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// All environment variables read by SendToKafkaConfig::from_env().
const ALL_CONFIG_ENV_VARS: &[&str] = &[
    "KAFKA_SERVER_NAME",
    "KAFKA_SOURCE_ADDRESS",
    "KAFKA_TOPIC",
    "KAFKA_BROKERS",
];

/// Run `f` with exactly `vars` set out of the config variables, restoring
/// the previous environment afterwards.
fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let all_originals: Vec<_> = ALL_CONFIG_ENV_VARS
        .iter()
        .map(|k| (*k, env::var(*k).ok()))
        .collect();

    for key in ALL_CONFIG_ENV_VARS {
        unsafe { env::remove_var(key) };
    }
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    for (key, original) in all_originals {
        match original {
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
    }

    result
}

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn test_from_env_defaults() {
    with_env_vars(&[], || {
        let config = SendToKafkaConfig::from_env().expect("Should parse config");
        assert_eq!(config.server_name, fqdn());
        assert_eq!(config.source_address, None);
        assert_eq!(config.topic.as_str(), "dhcpkit.messages");
        assert_eq!(config.brokers, vec![BrokerAddress::new("localhost", Some(9092))]);
        assert_eq!(config, SendToKafkaConfig::default());
    });
}

#[test]
fn test_from_env_blank_server_name_uses_fqdn() {
    with_env_vars(&[("KAFKA_SERVER_NAME", "   ")], || {
        let config = SendToKafkaConfig::from_env().expect("Should parse config");
        assert_eq!(config.server_name, fqdn());
    });
}

// ============================================================================
// Explicit values
// ============================================================================

#[test]
fn test_from_env_all_values() {
    with_env_vars(
        &[
            ("KAFKA_SERVER_NAME", "dhcp1.example.com"),
            ("KAFKA_SOURCE_ADDRESS", "2001:db8::53"),
            ("KAFKA_TOPIC", "dhcp.transactions"),
            ("KAFKA_BROKERS", "kafka1:9092, kafka2:9093 ,[2001:db8::10]"),
        ],
        || {
            let config = SendToKafkaConfig::from_env().expect("Should parse config");
            assert_eq!(config.server_name, "dhcp1.example.com");
            assert_eq!(
                config.source_address,
                Some(HostOrIp::Ip("2001:db8::53".parse().unwrap()))
            );
            assert_eq!(config.topic.as_str(), "dhcp.transactions");
            assert_eq!(
                config.brokers,
                vec![
                    BrokerAddress::new("kafka1", Some(9092)),
                    BrokerAddress::new("kafka2", Some(9093)),
                    BrokerAddress::new("2001:db8::10", None),
                ]
            );
        },
    );
}

#[test]
fn test_from_env_skips_empty_broker_entries() {
    with_env_vars(&[("KAFKA_BROKERS", "kafka1,,kafka2,")], || {
        let config = SendToKafkaConfig::from_env().expect("Should parse config");
        assert_eq!(config.brokers.len(), 2);
    });
}

// ============================================================================
// Invalid values
// ============================================================================

#[test]
fn test_from_env_invalid_topic() {
    with_env_vars(&[("KAFKA_TOPIC", "no spaces allowed")], || {
        match SendToKafkaConfig::from_env() {
            Err(Error::Config(message)) => assert!(message.starts_with("Invalid KAFKA_TOPIC")),
            other => panic!("expected a configuration error, got {:?}", other),
        }
    });
}

#[test]
fn test_from_env_invalid_broker_port() {
    with_env_vars(&[("KAFKA_BROKERS", "kafka1:99999")], || {
        match SendToKafkaConfig::from_env() {
            Err(Error::Config(message)) => assert!(message.starts_with("Invalid KAFKA_BROKERS")),
            other => panic!("expected a configuration error, got {:?}", other),
        }
    });
}

#[test]
fn test_from_env_invalid_source_address() {
    with_env_vars(&[("KAFKA_SOURCE_ADDRESS", "not_a_host!")], || {
        assert!(matches!(
            SendToKafkaConfig::from_env(),
            Err(Error::Config(_))
        ));
    });
}

#[test]
fn test_from_env_without_brokers() {
    with_env_vars(&[("KAFKA_BROKERS", " , ")], || {
        match SendToKafkaConfig::from_env() {
            Err(Error::Config(message)) => assert!(message.contains("broker")),
            other => panic!("expected a configuration error, got {:?}", other),
        }
    });
}

#[test]
fn test_from_env_server_name_too_long() {
    let name = "a".repeat(256);
    with_env_vars(&[("KAFKA_SERVER_NAME", &name)], || {
        assert!(SendToKafkaConfig::from_env().is_err());
    });
}
