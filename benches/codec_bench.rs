//! Criterion micro-benchmarks for the publishing path.
//!
//! These benchmarks measure the work done per DHCPv6 transaction:
//! - Encoding and decoding a DhcpKafkaMessage
//! - Wrapping the payload in a record batch
//! - CRC-32C over batch-sized buffers
//!
//! Run with: `cargo bench --bench codec_bench`

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use dhcpkit_kafka::client::{RecordBatch, crc32c};
use dhcpkit_kafka::dhcpv6::{ClientServerMessage, Dhcpv6Option, Message, MessageType, RelayMessage};
use dhcpkit_kafka::messages::{DhcpKafkaMessage, KafkaMessage};

/// A solicit with typical options, wrapped in `relays` relay-forward layers.
fn relayed(message_type: MessageType, relays: usize) -> Message {
    let mut message = Message::ClientServer(ClientServerMessage {
        message_type,
        transaction_id: [0xf3, 0x50, 0xd6],
        options: vec![
            Dhcpv6Option::new(8, Bytes::from_static(&[0, 0])),
            Dhcpv6Option::new(1, Bytes::from_static(&[0, 3, 0, 1, 0x34, 0x31, 0xc4, 0x3c, 0xb2, 0xf1])),
            Dhcpv6Option::new(3, Bytes::from_static(&[0xc4, 0x3c, 0xb2, 0xf1, 0, 0, 0, 0, 0, 0, 0, 0])),
            Dhcpv6Option::new(6, Bytes::from_static(&[0, 23, 0, 56, 0, 31, 0, 25])),
        ],
    });

    let relay_type = if message_type == MessageType::Solicit {
        MessageType::RelayForw
    } else {
        MessageType::RelayRepl
    };
    for hop in 0..relays {
        message = Message::Relay(RelayMessage {
            message_type: relay_type,
            hop_count: hop as u8,
            link_address: "2001:db8:ffff:1::1".parse().unwrap(),
            peer_address: "fe80::3631:c4ff:fe3c:b2f1".parse().unwrap(),
            options: vec![
                Dhcpv6Option::relay_message(message),
                Dhcpv6Option::new(18, Bytes::from_static(b"Gi0/0/0")),
            ],
        });
    }
    message
}

fn transaction(relays: usize) -> DhcpKafkaMessage {
    DhcpKafkaMessage {
        server_name: "dhcp1.example.com".to_string(),
        timestamp_in: 1_700_000_000.25,
        message_in: Some(relayed(MessageType::Solicit, relays)),
        timestamp_out: 1_700_000_000.5,
        message_out: Some(relayed(MessageType::Advertise, relays)),
    }
}

/// Benchmark encoding and decoding transactions at increasing relay depth.
fn bench_kafka_message(c: &mut Criterion) {
    let mut group = c.benchmark_group("dhcp_kafka_message");

    for relays in [0, 2, 8].iter() {
        let message = transaction(*relays);
        let payload = message.save().unwrap();

        group.throughput(Throughput::Bytes(payload.len() as u64));

        group.bench_with_input(BenchmarkId::new("save", relays), relays, |b, _| {
            b.iter(|| black_box(&message).save().unwrap());
        });

        group.bench_with_input(BenchmarkId::new("parse", relays), relays, |b, _| {
            b.iter(|| KafkaMessage::parse(black_box(&payload)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark wrapping one payload in a record batch, as done per send.
fn bench_record_batch(c: &mut Criterion) {
    let payload = transaction(2).save().unwrap();

    c.bench_function("record_batch_single", |b| {
        b.iter(|| {
            RecordBatch::single(black_box(payload.clone()), 1_700_000_000_000)
                .encode()
                .unwrap()
        });
    });
}

/// Benchmark the batch checksum for common payload sizes.
fn bench_crc32c(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc32c");

    for size in [256, 1_024, 16_384].iter() {
        let data = vec![0xa5u8; *size];
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| crc32c(black_box(&data)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_kafka_message, bench_record_batch, bench_crc32c);
criterion_main!(benches);
