//! 포트 그룹 빌드 벤치마크
//!
//! 시그니처 수에 따른 전체 그룹 빌드 및 디스패치 조회 성능을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use portcullis_core::config::GroupingConfig;
use portcullis_core::types::{Direction, FlowDirection, PortRange, Protocol, SignatureId};
use portcullis_port_grouping::{GroupingEngine, PortGroupBuilder, Signature, SignatureSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 실제 룰셋처럼 잘 알려진 포트와 임의 범위를 섞은 시그니처 집합
fn ruleset(count: usize) -> SignatureSet {
    const COMMON: [u16; 8] = [21, 22, 25, 53, 80, 443, 445, 8080];
    let mut rng = StdRng::seed_from_u64(0xB0B);

    let signatures = (0..count)
        .map(|i| {
            let dst = match i % 4 {
                0 => PortRange::ANY,
                1 | 2 => PortRange::single(COMMON[rng.random_range(0..COMMON.len())]),
                _ => {
                    let low: u16 = rng.random_range(1024..60000);
                    PortRange::new(low, low + rng.random_range(0..1000)).unwrap()
                }
            };
            Signature {
                sid: SignatureId(i as u32 + 1),
                msg: String::new(),
                protocol: if i % 5 == 0 { Protocol::Udp } else { Protocol::Tcp },
                flow: FlowDirection::Both,
                src_ports: vec![PortRange::ANY],
                dst_ports: vec![dst],
            }
        })
        .collect();

    SignatureSet::new(signatures, usize::MAX).unwrap()
}

fn bench_build(c: &mut Criterion) {
    let config = GroupingConfig::default();
    let mut group = c.benchmark_group("port_group_build");

    for &size in &[1_000usize, 10_000] {
        let signatures = ruleset(size);
        let builder = PortGroupBuilder::from_config(Protocol::Tcp, Direction::ToServer, &config);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(
            BenchmarkId::new("tcp_to_server", size),
            &signatures,
            |b, sigs| b.iter(|| builder.build(black_box(sigs)).unwrap()),
        );
        group.bench_with_input(BenchmarkId::new("engine_reload", size), &signatures, |b, sigs| {
            let mut engine = GroupingEngine::new(config.clone());
            b.iter(|| engine.reload(black_box(sigs)).unwrap())
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let config = GroupingConfig::default();
    let map = PortGroupBuilder::from_config(Protocol::Tcp, Direction::ToServer, &config)
        .build(&ruleset(10_000))
        .unwrap();

    c.bench_function("dispatch_lookup", |b| {
        b.iter(|| map.signatures_for(black_box(443)).len())
    });
}

criterion_group!(benches, bench_build, bench_lookup);
criterion_main!(benches);
