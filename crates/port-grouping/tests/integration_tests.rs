//! 통합 테스트 -- 인벤토리 로드부터 디스패치 조회까지
//!
//! 파일 로드 → SignatureSet 검증 → 네 방향 그룹 빌드 → 포트 조회
//! 시나리오를 실제 임시 파일로 테스트합니다.

use std::io::Write;
use std::sync::Arc;

use portcullis_core::config::GroupingConfig;
use portcullis_core::types::{Direction, PortRange, Protocol, SignatureId};
use portcullis_port_grouping::{
    GroupingEngine, GroupingError, PortGroupBuilder, SignatureLoader, SignatureSet,
};
use tempfile::NamedTempFile;

const RULESET: &str = r#"
[[signatures]]
sid = 2000001
msg = "HTTP request"
protocol = "tcp"
flow = "to_server"
dst_ports = ["80", "8080"]

[[signatures]]
sid = 2000002
msg = "TLS client hello"
protocol = "tcp"
flow = "to_server"
dst_ports = ["443"]

[[signatures]]
sid = 2000003
msg = "generic tcp"
protocol = "tcp"

[[signatures]]
sid = 2000004
msg = "high port response"
protocol = "tcp"
flow = "to_client"
src_ports = ["1024:"]

[[signatures]]
sid = 2000005
msg = "DNS query"
protocol = "udp"
dst_ports = ["53"]
"#;

fn write_inventory(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(content.as_bytes()).expect("write inventory");
    file
}

fn sids(values: &[u32]) -> Vec<SignatureId> {
    values.iter().copied().map(SignatureId).collect()
}

#[tokio::test]
async fn load_build_and_lookup() {
    let file = write_inventory(RULESET);
    let signatures = SignatureLoader::default()
        .load_file(file.path())
        .await
        .expect("inventory should load");
    assert_eq!(signatures.len(), 5);

    let mut engine = GroupingEngine::new(GroupingConfig::default());
    let set = engine.reload(&signatures).expect("reload should succeed");

    let tcp_server = set.map(Protocol::Tcp, Direction::ToServer);
    assert_eq!(tcp_server.signatures_for(80), sids(&[2000001, 2000003]).as_slice());
    assert_eq!(tcp_server.signatures_for(8080), sids(&[2000001, 2000003]).as_slice());
    assert_eq!(tcp_server.signatures_for(443), sids(&[2000002, 2000003]).as_slice());
    assert_eq!(tcp_server.signatures_for(22), sids(&[2000003]).as_slice());
    // 80 과 8080 은 같은 집합을 공유
    assert_eq!(
        tcp_server.group_for(80).map(|g| g.id),
        tcp_server.group_for(8080).map(|g| g.id)
    );

    let tcp_client = set.map(Protocol::Tcp, Direction::ToClient);
    assert_eq!(tcp_client.signatures_for(80), sids(&[2000003]).as_slice());
    assert_eq!(tcp_client.signatures_for(50000), sids(&[2000003, 2000004]).as_slice());

    let udp_server = set.map(Protocol::Udp, Direction::ToServer);
    assert_eq!(udp_server.signatures_for(53), sids(&[2000005]).as_slice());
    assert!(udp_server.signatures_for(123).is_empty());
}

#[tokio::test]
async fn invalid_inventory_leaves_engine_untouched() {
    let good = write_inventory(RULESET);
    let bad = write_inventory("[[signatures]]\nsid = 1\nprotocol = \"tcp\"\ndst_ports = [\"99999\"]\n");

    let loader = SignatureLoader::default();
    let mut engine = GroupingEngine::new(GroupingConfig::default());
    let published = engine
        .reload(&loader.load_file(good.path()).await.unwrap())
        .unwrap();

    let err = loader.load_file(bad.path()).await.unwrap_err();
    assert!(matches!(err, GroupingError::SignatureLoad { .. }));

    // 로드 실패 시 리로드 자체가 일어나지 않음
    assert!(Arc::ptr_eq(&published, &engine.current()));
    assert_eq!(engine.generation(), 1);
}

#[tokio::test]
async fn failed_build_keeps_previous_generation() {
    let file = write_inventory(RULESET);
    let signatures = SignatureLoader::default().load_file(file.path()).await.unwrap();

    let mut config = GroupingConfig::default();
    config.profile = "custom".to_owned();
    config.toserver_groups = 0;

    let mut engine = GroupingEngine::new(config);
    assert!(engine.reload(&signatures).is_err());
    assert_eq!(engine.generation(), 0);
    assert_eq!(engine.current().total_groups(), 0);
}

#[tokio::test]
async fn oversized_inventory_rejected() {
    let file = NamedTempFile::new().unwrap();
    // 희소 파일로 크기 상한만 초과
    file.as_file().set_len(11 * 1024 * 1024).unwrap();

    let err = SignatureLoader::default()
        .load_file(file.path())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("file too large"));
}

#[test]
fn group_limit_applies_per_direction() {
    let mut inventory = String::new();
    for i in 0..30u32 {
        inventory.push_str(&format!(
            "[[signatures]]\nsid = {}\nprotocol = \"tcp\"\nflow = \"to_server\"\ndst_ports = [\"{}\"]\n\n",
            i + 1,
            1000 + i
        ));
    }
    let signatures = SignatureLoader::default().parse(&inventory, "generated").unwrap();

    let mut config = GroupingConfig::default();
    config.profile = "low".to_owned();
    let map = PortGroupBuilder::from_config(Protocol::Tcp, Direction::ToServer, &config)
        .build(&signatures)
        .unwrap();
    assert_eq!(map.len(), 25);

    // 병합되더라도 모든 포트는 자신의 시그니처를 계속 보유
    for i in 0..30u16 {
        let port = 1000 + i;
        assert!(
            map.signatures_for(port).contains(&SignatureId(u32::from(i) + 1)),
            "port {port} lost its signature"
        );
    }
}

#[test]
fn overlap_query_across_inventory() {
    let signatures = SignatureLoader::default().parse(RULESET, "inline").unwrap();
    let builder = PortGroupBuilder::new(
        Protocol::Tcp,
        Direction::ToServer,
        GroupingConfig::default().limits(),
    );

    let hits = builder
        .overlapping_signatures(&signatures, "400:500".parse::<PortRange>().unwrap())
        .unwrap();
    assert_eq!(hits, sids(&[2000002, 2000003]));

    let empty = SignatureSet::empty();
    assert!(builder
        .overlapping_signatures(&empty, PortRange::ANY)
        .unwrap()
        .is_empty());
}
