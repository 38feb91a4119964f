//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `portcullis_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(portcullis_core::metrics::GROUPING_BUILDS_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 프로토콜 레이블 키 (tcp, udp)
pub const LABEL_PROTOCOL: &str = "protocol";

/// 방향 레이블 키 (to_server, to_client)
pub const LABEL_DIRECTION: &str = "direction";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Port Grouping 메트릭 ───────────────────────────────────────────

/// 디스패치 세트 (재)빌드 횟수 (counter, label: result)
pub const GROUPING_BUILDS_TOTAL: &str = "portcullis_grouping_builds_total";

/// 디스패치 세트 빌드 소요 시간 (histogram, 초)
pub const GROUPING_BUILD_DURATION_SECONDS: &str = "portcullis_grouping_build_duration_seconds";

/// 게시된 포트 그룹 수 (gauge, labels: protocol, direction)
pub const GROUPING_PORT_GROUPS: &str = "portcullis_grouping_port_groups";

/// 그룹 수 상한으로 병합된 그룹 수 (counter, labels: protocol, direction)
pub const GROUPING_GROUPS_MERGED_TOTAL: &str = "portcullis_grouping_groups_merged_total";

/// 인터벌 트리에 삽입된 노드 수 (counter)
pub const GROUPING_TREE_NODES_TOTAL: &str = "portcullis_grouping_tree_nodes_total";

/// 로드된 시그니처 수 (gauge)
pub const SIGNATURES_LOADED: &str = "portcullis_signatures_loaded";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 프로세스 시작 시 한 번 호출합니다. 레코더가 없으면 아무 일도 하지 않습니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        GROUPING_BUILDS_TOTAL,
        "Total number of port-group dispatch set builds"
    );
    describe_histogram!(
        GROUPING_BUILD_DURATION_SECONDS,
        "Time to build a complete dispatch set in seconds"
    );
    describe_gauge!(
        GROUPING_PORT_GROUPS,
        "Number of port groups in the active dispatch set"
    );
    describe_counter!(
        GROUPING_GROUPS_MERGED_TOTAL,
        "Total number of port groups merged to honour group limits"
    );
    describe_counter!(
        GROUPING_TREE_NODES_TOTAL,
        "Total number of port ranges inserted into interval trees"
    );
    describe_gauge!(SIGNATURES_LOADED, "Number of signatures currently loaded");
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        GROUPING_BUILDS_TOTAL,
        GROUPING_BUILD_DURATION_SECONDS,
        GROUPING_PORT_GROUPS,
        GROUPING_GROUPS_MERGED_TOTAL,
        GROUPING_TREE_NODES_TOTAL,
        SIGNATURES_LOADED,
    ];

    #[test]
    fn all_metrics_start_with_portcullis_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("portcullis_"),
                "Metric '{}' does not start with 'portcullis_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in [
            GROUPING_BUILDS_TOTAL,
            GROUPING_GROUPS_MERGED_TOTAL,
            GROUPING_TREE_NODES_TOTAL,
        ] {
            assert!(name.ends_with("_total"), "counter '{}' must end with _total", name);
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더가 설치되지 않아도 패닉하지 않아야 함
        describe_all();
    }
}
