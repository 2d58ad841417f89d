//! Integration tests for loading `send-to-kafka` sections.

use std::io::Write;

use dhcpkit_kafka::config::{
    BrokerAddress, HostOrIp, SECTION_TYPE, SendToKafkaConfig, fqdn, parse_sections, schema,
};
use dhcpkit_kafka::error::Error;

const DOCUMENTED_EXAMPLE: &str = "\
<send-to-kafka>
    broker host1:9092
    broker host2:9092
</send-to-kafka>
";

const SERVER_CONFIG: &str = "\
# Server configuration
user dhcpkit
group dhcpkit

<logging>
    facility daemon
</logging>

<listen-unicast 2001:db8::1>
    reply-from fe80::1
</listen-unicast>

<send-to-kafka>
    server-name dhcp1.example.com
    topic dhcpkit.messages
    broker kafka1.example.com:9092
</send-to-kafka>

<subnet 2001:db8:1::/64>
    <send-to-kafka>
        server-name dhcp1-subnet.example.com
        source-address 2001:db8::1
        topic subnet.messages
        broker [2001:db8::10]:9093
        broker kafka2.example.com
    </send-to-kafka>
</subnet>
";

// ============================================================================
// Single section
// ============================================================================

#[test]
fn test_documented_example() {
    let config = SendToKafkaConfig::parse(DOCUMENTED_EXAMPLE).unwrap();

    let brokers: Vec<String> = config.brokers.iter().map(ToString::to_string).collect();
    assert_eq!(brokers, vec!["host1:9092", "host2:9092"]);
    assert_eq!(config.topic.as_str(), "dhcpkit.messages");
    assert_eq!(config.server_name, fqdn());
    assert_eq!(config.source_address, None);
}

#[test]
fn test_empty_section_uses_defaults() {
    let config = SendToKafkaConfig::parse("<send-to-kafka>\n</send-to-kafka>\n").unwrap();

    assert_eq!(config.brokers, vec![BrokerAddress::new("localhost", Some(9092))]);
    assert_eq!(config.brokers[0].to_string(), "localhost:9092");
    assert_eq!(config.topic.as_str(), "dhcpkit.messages");
    assert_eq!(config.server_name, fqdn());
    assert!(!config.server_name.is_empty());
}

#[test]
fn test_keys_are_case_insensitive() {
    let config = SendToKafkaConfig::parse(
        "<Send-To-Kafka>\n  Server-Name Srv1\n  TOPIC t1\n  Broker k1\n</send-to-kafka>",
    )
    .unwrap();

    assert_eq!(config.server_name, "Srv1");
    assert_eq!(config.topic.as_str(), "t1");
    assert_eq!(config.brokers, vec![BrokerAddress::new("k1", None)]);
}

#[test]
fn test_source_address_forms() {
    let config = SendToKafkaConfig::parse(
        "<send-to-kafka>\n  source-address 192.0.2.1\n</send-to-kafka>",
    )
    .unwrap();
    assert_eq!(
        config.source_address,
        Some(HostOrIp::Ip("192.0.2.1".parse().unwrap()))
    );

    let config = SendToKafkaConfig::parse(
        "<send-to-kafka>\n  source-address Relay.Example.COM\n</send-to-kafka>",
    )
    .unwrap();
    assert_eq!(
        config.source_address,
        Some(HostOrIp::Hostname("relay.example.com".to_string()))
    );
}

#[test]
fn test_display_parses_back() {
    let config = SendToKafkaConfig::from_document(SERVER_CONFIG).unwrap().remove(1);
    let rendered = config.to_string();
    assert_eq!(SendToKafkaConfig::parse(&rendered).unwrap(), config);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_invalid_values_report_their_line() {
    let cases = [
        ("<send-to-kafka>\n  topic ..\n</send-to-kafka>", 2),
        ("<send-to-kafka>\n  broker k1\n  broker host:0\n</send-to-kafka>", 3),
        ("<send-to-kafka>\n\n  source-address -bad-\n</send-to-kafka>", 3),
        ("<send-to-kafka>\n  colour blue\n</send-to-kafka>", 2),
        ("<send-to-kafka>\n  topic a\n  topic b\n</send-to-kafka>", 3),
    ];

    for (text, expected_line) in cases {
        match SendToKafkaConfig::parse(text) {
            Err(Error::ConfigAt { line, .. }) => assert_eq!(line, expected_line, "{}", text),
            other => panic!("expected an error on line {} for {:?}, got {:?}", expected_line, text, other),
        }
    }
}

#[test]
fn test_server_name_length_limit() {
    let ok = format!("<send-to-kafka>\n  server-name {}\n</send-to-kafka>", "a".repeat(255));
    assert!(SendToKafkaConfig::parse(&ok).is_ok());

    let too_long = format!("<send-to-kafka>\n  server-name {}\n</send-to-kafka>", "a".repeat(256));
    assert!(matches!(
        SendToKafkaConfig::parse(&too_long),
        Err(Error::ConfigAt { line: 1, .. })
    ));
}

#[test]
fn test_unbalanced_sections() {
    assert!(matches!(
        SendToKafkaConfig::parse("<send-to-kafka>\n  broker k1\n"),
        Err(Error::ConfigAt { line: 1, .. })
    ));
    assert!(matches!(
        SendToKafkaConfig::parse("<send-to-kafka>\n</subnet>\n"),
        Err(Error::ConfigAt { line: 2, .. })
    ));
}

#[test]
fn test_parse_needs_exactly_one_section() {
    assert!(matches!(
        SendToKafkaConfig::parse("# nothing here\n"),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        SendToKafkaConfig::parse(
            "<send-to-kafka>\n</send-to-kafka>\n<send-to-kafka>\n</send-to-kafka>\n"
        ),
        Err(Error::ConfigAt { line: 3, .. })
    ));
}

// ============================================================================
// Full server configuration
// ============================================================================

#[test]
fn test_sections_found_at_any_depth() {
    let configs = SendToKafkaConfig::from_document(SERVER_CONFIG).unwrap();
    assert_eq!(configs.len(), 2);

    assert_eq!(configs[0].server_name, "dhcp1.example.com");
    assert_eq!(
        configs[0].brokers,
        vec![BrokerAddress::new("kafka1.example.com", Some(9092))]
    );

    assert_eq!(configs[1].server_name, "dhcp1-subnet.example.com");
    assert_eq!(configs[1].topic.as_str(), "subnet.messages");
    assert_eq!(
        configs[1].source_address,
        Some(HostOrIp::Ip("2001:db8::1".parse().unwrap()))
    );
    assert_eq!(configs[1].brokers[0].to_string(), "[2001:db8::10]:9093");
    assert_eq!(configs[1].brokers[1].port_or_default(), 9092);
}

#[test]
fn test_generic_sections_keep_everything() {
    let document = parse_sections(SERVER_CONFIG).unwrap();
    let top_keys: Vec<&str> = document.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(top_keys, vec!["user", "group"]);
    assert_eq!(document.sections.len(), 4);

    let subnet = &document.sections[3];
    assert_eq!(subnet.type_name, "subnet");
    assert_eq!(subnet.name.as_deref(), Some("2001:db8:1::/64"));
    assert_eq!(subnet.sections[0].type_name, SECTION_TYPE);
    assert_eq!(document.find_sections(SECTION_TYPE).len(), 2);
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SERVER_CONFIG.as_bytes()).unwrap();
    file.flush().unwrap();

    let configs = SendToKafkaConfig::from_file(file.path()).unwrap();
    assert_eq!(configs, SendToKafkaConfig::from_document(SERVER_CONFIG).unwrap());
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.conf");

    match SendToKafkaConfig::from_file(&path) {
        Err(Error::Config(message)) => assert!(message.contains("missing.conf")),
        other => panic!("expected a configuration error, got {:?}", other),
    }
}

#[test]
fn test_schema_lists_every_key() {
    let names: Vec<&str> = schema().iter().map(|k| k.name).collect();
    assert_eq!(names, vec!["server-name", "source-address", "topic", "broker"]);
    assert!(schema().iter().find(|k| k.name == "broker").unwrap().multiple);
}
