// ABOUTME: Benchmark suite for the reply parser and request encoder
// ABOUTME: Measures cost of framing/decoding a pipelined burst of GET/SET-shaped traffic

use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use redis_engine::command::Arg;
use redis_engine::encode::encode_request;
use redis_engine::parser::{ReplyParser, StackParser};

fn encode_get(key: &str) -> Vec<Arg> {
    vec![Arg::from("GET"), Arg::from(key)]
}

fn encode_set(key: &str, value: &[u8]) -> Vec<Arg> {
    vec![
        Arg::from("SET"),
        Arg::from(key),
        Arg::from(Bytes::copy_from_slice(value)),
    ]
}

fn bench_encode_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_request");
    for size in [8usize, 64, 1024] {
        let value = vec![b'x'; size];
        group.bench_with_input(BenchmarkId::new("set", size), &value, |b, value| {
            let args = encode_set("benchmark-key", value);
            b.iter(|| black_box(encode_request(&args)));
        });
    }
    group.bench_function("get", |b| {
        let args = encode_get("benchmark-key");
        b.iter(|| black_box(encode_request(&args)));
    });
    group.finish();
}

fn simple_string_reply(n: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for _ in 0..n {
        buf.extend_from_slice(b"+OK\r\n");
    }
    buf
}

fn bulk_reply(n: usize, len: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    let payload = vec![b'v'; len];
    for _ in 0..n {
        buf.extend_from_slice(format!("${}\r\n", len).as_bytes());
        buf.extend_from_slice(&payload);
        buf.extend_from_slice(b"\r\n");
    }
    buf
}

fn array_reply(n: usize, elements: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for i in 0..n {
        buf.extend_from_slice(format!("*{}\r\n", elements).as_bytes());
        for j in 0..elements {
            let item = format!("item-{}-{}", i, j);
            buf.extend_from_slice(format!("${}\r\n", item.len()).as_bytes());
            buf.extend_from_slice(item.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
    }
    buf
}

fn bench_parse_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_pipeline");

    let simple = simple_string_reply(1000);
    group.bench_function("simple_strings_1000", |b| {
        b.iter(|| {
            let mut parser = StackParser::new();
            black_box(parser.feed(&simple).unwrap());
        });
    });

    let bulk = bulk_reply(1000, 64);
    group.bench_function("bulk_1000x64", |b| {
        b.iter(|| {
            let mut parser = StackParser::new();
            black_box(parser.feed(&bulk).unwrap());
        });
    });

    let arrays = array_reply(200, 10);
    group.bench_function("arrays_200x10", |b| {
        b.iter(|| {
            let mut parser = StackParser::new();
            black_box(parser.feed(&arrays).unwrap());
        });
    });

    group.finish();
}

fn bench_parse_fragmented(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_fragmented");
    let arrays = array_reply(200, 10);

    group.bench_function("arrays_200x10_byte_at_a_time", |b| {
        b.iter(|| {
            let mut parser = StackParser::new();
            for byte in &arrays {
                black_box(parser.feed(std::slice::from_ref(byte)).unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_encode_request,
    bench_parse_pipeline,
    bench_parse_fragmented
);
criterion_main!(benches);
