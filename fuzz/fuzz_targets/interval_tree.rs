#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use portcullis_core::types::PortRange;
use portcullis_port_grouping::tree::PortIntervalTree;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 삽입할 범위 (양 끝은 정렬 후 사용)
    ranges: Vec<(u16, u16)>,
    /// 질의 범위 (역전된 질의도 포함)
    queries: Vec<(u16, u16)>,
}

fuzz_target!(|input: FuzzInput| {
    // 입력 크기 제한
    if input.ranges.len() > 2048 || input.queries.len() > 64 {
        return;
    }

    let ranges: Vec<PortRange> = input
        .ranges
        .iter()
        .map(|&(a, b)| PortRange::new(a.min(b), a.max(b)).unwrap())
        .collect();

    let mut tree = PortIntervalTree::new();
    for (i, r) in ranges.iter().enumerate() {
        tree.insert(*r, i).unwrap();
    }
    assert_eq!(tree.len(), ranges.len());

    for &(low, high) in &input.queries {
        let mut got = tree.find_overlapping(low, high);
        got.sort_unstable();

        let expected: Vec<usize> = ranges
            .iter()
            .enumerate()
            .filter(|(_, r)| r.overlaps(low, high))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(got, expected, "query [{low}, {high}]");
    }

    tree.free();
});
