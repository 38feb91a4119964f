//! 포트 범위 인터벌 트리
//!
//! 16비트 포트 폐구간을 저장하는 증강(augmented) AVL 트리입니다.
//! 각 노드는 서브트리의 `high` 최댓값(`max_high`)을 유지하여
//! 겹침 질의를 O(log n + k)에 수행합니다.
//!
//! 트리는 탐지 엔진 빌드 시점에만 사용되는 삽입 전용 인덱스입니다.
//! 노드는 개별 삭제되지 않고 [`PortIntervalTree::free`]로 한꺼번에 해제됩니다.
//!
//! # 소유권
//! - 노드는 삽입 순서대로 평면 아레나에 저장됩니다. 이 아레나가 곧
//!   전체 노드 열거/해제 목록이며, 트리 모양과 무관하게 O(n), 비재귀로 동작합니다.
//! - 디스크립터 `D`는 외부(시그니처 DB)가 소유한 포트 디스크립터를 가리키는
//!   복사 가능한 핸들(인덱스 등)입니다. 트리는 저장하고 반환할 뿐 해제하지 않습니다.
//!
//! # 사용 예시
//! ```
//! use portcullis_core::types::PortRange;
//! use portcullis_port_grouping::tree::PortIntervalTree;
//!
//! let mut tree = PortIntervalTree::new();
//! tree.insert(PortRange::new(1, 100)?, "a")?;
//! tree.insert(PortRange::new(50, 150)?, "b")?;
//! tree.insert(PortRange::new(200, 300)?, "c")?;
//!
//! let mut hits = tree.find_overlapping(90, 210);
//! hits.sort();
//! assert_eq!(hits, vec!["a", "b", "c"]);
//! assert!(tree.find_overlapping(400, 500).is_empty());
//!
//! tree.free();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod node;

pub use node::IntervalNode;

use portcullis_core::types::PortRange;
use tracing::trace;

use crate::error::GroupingError;

use node::{NodeId, insert_under, slot};

/// 포트 범위 인터벌 트리
///
/// 겹치거나 중복된 범위도 그대로 저장합니다. 병합/중복 제거는
/// 호출자(포트 그룹 빌더)의 책임입니다.
#[derive(Debug, Clone)]
pub struct PortIntervalTree<D> {
    /// 삽입 순서의 노드 아레나 (열거/해제 목록)
    nodes: Vec<IntervalNode<D>>,
    /// 루트 노드
    root: Option<NodeId>,
}

impl<D> Default for PortIntervalTree<D> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }
}

impl<D: Copy> PortIntervalTree<D> {
    /// 빈 트리를 생성합니다. 할당은 첫 삽입 때 일어납니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// `capacity`개 노드를 미리 할당한 빈 트리를 생성합니다.
    ///
    /// # Errors
    /// 할당에 실패하면 [`GroupingError::OutOfMemory`]를 반환합니다.
    pub fn with_capacity(capacity: usize) -> Result<Self, GroupingError> {
        let mut nodes = Vec::new();
        nodes
            .try_reserve_exact(capacity)
            .map_err(|_| GroupingError::OutOfMemory {
                context: "allocating interval tree",
            })?;
        Ok(Self { nodes, root: None })
    }

    /// 포트 범위와 디스크립터 핸들을 삽입합니다.
    ///
    /// 기존 범위와의 겹침 여부와 무관하게 항상 새 노드를 추가합니다.
    ///
    /// # Errors
    /// 노드 할당에 실패하면 [`GroupingError::OutOfMemory`]를 반환하며,
    /// 이 경우 트리는 변경되지 않습니다.
    pub fn insert(&mut self, range: PortRange, descriptor: D) -> Result<(), GroupingError> {
        let id = NodeId::try_from(self.nodes.len()).map_err(|_| GroupingError::OutOfMemory {
            context: "indexing interval node",
        })?;
        self.nodes
            .try_reserve(1)
            .map_err(|_| GroupingError::OutOfMemory {
                context: "inserting port range",
            })?;
        self.nodes.push(IntervalNode::leaf(range, descriptor));

        self.root = Some(match self.root {
            Some(root) => insert_under(&mut self.nodes, root, id),
            None => id,
        });
        Ok(())
    }

    /// `[low, high]`와 교차하는 모든 범위의 디스크립터를 반환합니다.
    ///
    /// 반환 순서는 트리 순회 순서이며 정렬이 필요하면 호출자가 정렬해야 합니다.
    /// `low > high`인 질의는 호출자의 전제조건 위반이며 검증하지 않습니다.
    pub fn find_overlapping(&self, low: u16, high: u16) -> Vec<D> {
        self.overlaps(low, high).map(|node| node.descriptor).collect()
    }

    /// `[low, high]`와 교차하는 노드를 순회하는 반복자를 반환합니다.
    pub fn overlaps(&self, low: u16, high: u16) -> OverlapIter<'_, D> {
        let mut stack = Vec::with_capacity(usize::from(self.height()));
        stack.extend(self.root);
        OverlapIter {
            nodes: &self.nodes,
            stack,
            low,
            high,
        }
    }

    /// 모든 노드를 해제합니다.
    ///
    /// 아레나를 평면적으로 비우므로 트리 깊이와 무관하게 재귀하지 않습니다.
    /// 디스크립터가 가리키는 외부 객체에는 접근하지 않습니다.
    /// 트리를 소비하므로 같은 트리를 두 번 해제할 수 없습니다.
    pub fn free(mut self) {
        let released = self.nodes.len();
        self.clear();
        trace!(released, "port interval tree freed");
    }

    /// 모든 노드를 해제하고 빈 트리로 되돌립니다 (할당된 용량은 유지).
    pub fn clear(&mut self) {
        self.root = None;
        self.nodes.clear();
    }
}

impl<D> PortIntervalTree<D> {
    /// 저장된 노드 수
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// 트리가 비었는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 트리 높이 (빈 트리는 0)
    pub fn height(&self) -> u8 {
        self.root.map_or(0, |root| self.nodes[slot(root)].height)
    }

    /// 루트 노드
    pub fn root(&self) -> Option<&IntervalNode<D>> {
        self.root.map(|root| &self.nodes[slot(root)])
    }

    /// 모든 노드를 삽입 순서대로 순회합니다 (트리 모양과 무관).
    pub fn iter(&self) -> std::slice::Iter<'_, IntervalNode<D>> {
        self.nodes.iter()
    }
}

impl<'a, D> IntoIterator for &'a PortIntervalTree<D> {
    type Item = &'a IntervalNode<D>;
    type IntoIter = std::slice::Iter<'a, IntervalNode<D>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// 겹침 질의 반복자
///
/// [`PortIntervalTree::overlaps`]가 생성합니다. 명시적 스택으로
/// 트리를 내려가며 다음 규칙으로 서브트리를 가지치기합니다.
///
/// - 왼쪽: `left.max_high >= low`일 때만 방문
/// - 오른쪽: `node.low <= high`이고 `right.max_high >= low`일 때만 방문
///   (오른쪽 서브트리의 범위는 모두 `node.low` 이상에서 시작)
#[derive(Debug)]
pub struct OverlapIter<'a, D> {
    nodes: &'a [IntervalNode<D>],
    stack: Vec<NodeId>,
    low: u16,
    high: u16,
}

impl<'a, D> Iterator for OverlapIter<'a, D> {
    type Item = &'a IntervalNode<D>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let node = &self.nodes[slot(id)];

            if let Some(right) = node.right {
                if node.range.low() <= self.high && self.nodes[slot(right)].max_high >= self.low {
                    self.stack.push(right);
                }
            }
            if let Some(left) = node.left {
                if self.nodes[slot(left)].max_high >= self.low {
                    self.stack.push(left);
                }
            }

            if node.range.overlaps(self.low, self.high) {
                return Some(node);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn range(low: u16, high: u16) -> PortRange {
        PortRange::new(low, high).unwrap()
    }

    fn sorted<D: Ord>(mut v: Vec<D>) -> Vec<D> {
        v.sort();
        v
    }

    fn brute_force(ranges: &[PortRange], low: u16, high: u16) -> Vec<usize> {
        ranges
            .iter()
            .enumerate()
            .filter(|(_, r)| r.overlaps(low, high))
            .map(|(i, _)| i)
            .collect()
    }

    fn build(ranges: &[PortRange]) -> PortIntervalTree<usize> {
        let mut tree = PortIntervalTree::new();
        for (i, r) in ranges.iter().enumerate() {
            tree.insert(*r, i).unwrap();
        }
        tree
    }

    /// 중위 순서, AVL 균형, max_high, 노드 집합 일치를 검사합니다.
    fn assert_invariants<D>(tree: &PortIntervalTree<D>) {
        fn walk<D>(
            nodes: &[IntervalNode<D>],
            id: Option<NodeId>,
            inorder: &mut Vec<NodeId>,
        ) -> (u8, Option<u16>) {
            let Some(id) = id else {
                return (0, None);
            };
            let node = &nodes[slot(id)];
            let (lh, lmax) = walk(nodes, node.left, inorder);
            inorder.push(id);
            let (rh, rmax) = walk(nodes, node.right, inorder);

            assert!(lh.abs_diff(rh) <= 1, "node {id} is unbalanced ({lh} vs {rh})");
            assert_eq!(node.height, lh.max(rh) + 1, "stale height at node {id}");
            let expected = [Some(node.range.high()), lmax, rmax]
                .into_iter()
                .flatten()
                .max();
            assert_eq!(Some(node.max_high), expected, "stale max_high at node {id}");
            (node.height, expected)
        }

        let mut inorder = Vec::new();
        walk(&tree.nodes, tree.root, &mut inorder);
        assert_eq!(inorder.len(), tree.nodes.len(), "arena and tree disagree");

        for pair in inorder.windows(2) {
            let (a, b) = (&tree.nodes[slot(pair[0])], &tree.nodes[slot(pair[1])]);
            let (ka, kb) = (
                (a.range.low(), a.range.high()),
                (b.range.low(), b.range.high()),
            );
            assert!(ka <= kb, "in-order keys out of order");
            if ka == kb {
                assert!(pair[0] < pair[1], "equal keys lost insertion order");
            }
        }
    }

    #[test]
    fn empty_tree_has_no_overlaps() {
        let tree: PortIntervalTree<u32> = PortIntervalTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert!(tree.root().is_none());
        assert!(tree.find_overlapping(0, u16::MAX).is_empty());
    }

    #[test]
    fn three_range_scenario() {
        let tree = build(&[range(1, 100), range(50, 150), range(200, 300)]);
        assert_eq!(sorted(tree.find_overlapping(90, 210)), vec![0, 1, 2]);
        assert!(tree.find_overlapping(400, 500).is_empty());
        assert_eq!(sorted(tree.find_overlapping(120, 199)), vec![1]);
        assert_invariants(&tree);
    }

    #[test]
    fn single_port_boundaries() {
        let tree = build(&[range(80, 80)]);
        assert_eq!(tree.find_overlapping(80, 80), vec![0]);
        assert!(tree.find_overlapping(79, 79).is_empty());
        assert!(tree.find_overlapping(81, 81).is_empty());
    }

    #[test]
    fn universal_range_overlaps_everything() {
        let mut tree = PortIntervalTree::new();
        tree.insert(PortRange::ANY, "any").unwrap();
        tree.insert(range(443, 443), "https").unwrap();
        tree.insert(range(6000, 7000), "x11").unwrap();

        for (lo, hi) in [(0, 0), (65535, 65535), (22, 22), (444, 5999), (0, 65535)] {
            assert!(
                tree.find_overlapping(lo, hi).contains(&"any"),
                "[{lo},{hi}] must include the universal range"
            );
        }
        assert_eq!(sorted(tree.find_overlapping(0, 65535)), vec!["any", "https", "x11"]);
    }

    #[test]
    fn duplicates_and_overlaps_are_kept() {
        let tree = build(&[range(80, 80), range(80, 80), range(80, 80), range(1, 65535)]);
        assert_eq!(tree.len(), 4);
        assert_eq!(sorted(tree.find_overlapping(80, 80)), vec![0, 1, 2, 3]);
        assert_invariants(&tree);
    }

    #[test]
    fn edge_ports_are_reachable() {
        let tree = build(&[range(0, 0), range(65535, 65535), range(0, 1), range(65534, 65535)]);
        assert_eq!(sorted(tree.find_overlapping(0, 0)), vec![0, 2]);
        assert_eq!(sorted(tree.find_overlapping(65535, 65535)), vec![1, 3]);
    }

    #[test]
    fn iter_follows_insertion_order() {
        let ranges = [range(500, 600), range(1, 2), range(300, 301), range(1, 2)];
        let tree = build(&ranges);
        let descriptors: Vec<usize> = tree.iter().map(|n| *n.descriptor()).collect();
        assert_eq!(descriptors, vec![0, 1, 2, 3]);
        let ranges_seen: Vec<PortRange> = (&tree).into_iter().map(|n| n.range()).collect();
        assert_eq!(ranges_seen, ranges);
    }

    #[test]
    fn root_max_high_is_global_maximum() {
        let tree = build(&[range(10, 20), range(5, 9000), range(100, 200), range(1, 2)]);
        assert_eq!(tree.root().map(|n| n.max_high()), Some(9000));
    }

    #[test]
    fn sorted_insertion_stays_balanced() {
        // 오름차순 포트로 작성된 룰 파일을 흉내냅니다.
        let ranges: Vec<PortRange> = (0..4096u16).map(|p| range(p, p + 10)).collect();
        let tree = build(&ranges);
        // AVL 높이 상한: 1.44 * log2(n + 2)
        assert!(tree.height() <= 18, "height {} too large", tree.height());
        assert_invariants(&tree);

        let reversed: Vec<PortRange> = ranges.iter().rev().copied().collect();
        let tree = build(&reversed);
        assert!(tree.height() <= 18, "height {} too large", tree.height());
        assert_invariants(&tree);
    }

    #[test]
    fn with_capacity_preallocates() {
        let tree: PortIntervalTree<u32> = PortIntervalTree::with_capacity(128).unwrap();
        assert!(tree.nodes.capacity() >= 128);
        assert!(tree.is_empty());
    }

    #[test]
    fn with_capacity_reports_out_of_memory() {
        let result: Result<PortIntervalTree<u64>, _> = PortIntervalTree::with_capacity(usize::MAX);
        assert!(matches!(result, Err(GroupingError::OutOfMemory { .. })));
    }

    #[test]
    fn free_empty_tree_is_noop() {
        let tree: PortIntervalTree<usize> = PortIntervalTree::new();
        tree.free();
    }

    #[test]
    fn free_leaves_external_descriptors_untouched() {
        let descriptors = vec!["http".to_owned(), "dns".to_owned(), "smb".to_owned()];
        let mut tree = PortIntervalTree::new();
        tree.insert(range(80, 80), 0usize).unwrap();
        tree.insert(range(53, 53), 1).unwrap();
        tree.insert(range(445, 445), 2).unwrap();

        let hit = tree.find_overlapping(50, 60);
        tree.free();

        assert_eq!(descriptors[hit[0]], "dns");
        assert_eq!(descriptors.len(), 3);
    }

    #[test]
    fn clear_allows_reuse() {
        let mut tree = build(&[range(1, 10), range(5, 50)]);
        tree.clear();
        assert!(tree.is_empty());
        assert!(tree.find_overlapping(0, 100).is_empty());
        tree.insert(range(7, 7), 42).unwrap();
        assert_eq!(tree.find_overlapping(7, 7), vec![42]);
    }

    #[test]
    fn ten_thousand_random_ranges_match_brute_force() {
        let mut rng = StdRng::seed_from_u64(0x5EED_CAFE);
        let ranges: Vec<PortRange> = (0..10_000)
            .map(|_| {
                let a: u16 = rng.random();
                let b: u16 = rng.random();
                range(a.min(b), a.max(b))
            })
            .collect();
        let tree = build(&ranges);
        assert_invariants(&tree);
        assert!(tree.height() <= 20);

        for _ in 0..1_000 {
            let a: u16 = rng.random();
            let b: u16 = rng.random();
            let (lo, hi) = (a.min(b), a.max(b));
            assert_eq!(sorted(tree.find_overlapping(lo, hi)), brute_force(&ranges, lo, hi));
        }
    }

    #[test]
    fn narrow_ranges_prune_most_nodes() {
        let ranges: Vec<PortRange> = (0..2000u16).map(|i| range(i * 30, i * 30 + 5)).collect();
        let tree = build(&ranges);
        let hits = tree.find_overlapping(30_000, 30_010);
        assert_eq!(sorted(hits), vec![1000]);
    }

    fn arb_range() -> impl Strategy<Value = PortRange> {
        (any::<u16>(), any::<u16>()).prop_map(|(a, b)| range(a.min(b), a.max(b)))
    }

    fn arb_small_range() -> impl Strategy<Value = PortRange> {
        (0u16..512, 0u16..64).prop_map(|(lo, len)| range(lo, lo + len))
    }

    proptest! {
        #[test]
        fn overlap_query_matches_brute_force(
            ranges in prop::collection::vec(arb_range(), 0..300),
            queries in prop::collection::vec(arb_range(), 1..20),
        ) {
            let tree = build(&ranges);
            for q in queries {
                prop_assert_eq!(
                    sorted(tree.find_overlapping(q.low(), q.high())),
                    brute_force(&ranges, q.low(), q.high())
                );
            }
        }

        #[test]
        fn dense_overlap_query_matches_brute_force(
            ranges in prop::collection::vec(arb_small_range(), 0..300),
            q in arb_small_range(),
        ) {
            let tree = build(&ranges);
            assert_invariants(&tree);
            prop_assert_eq!(
                sorted(tree.find_overlapping(q.low(), q.high())),
                brute_force(&ranges, q.low(), q.high())
            );
        }

        #[test]
        fn results_are_independent_of_insertion_order(
            ranges in prop::collection::vec(arb_small_range(), 1..200),
            q in arb_small_range(),
            seed in any::<u64>(),
        ) {
            let mut tagged: Vec<(PortRange, usize)> =
                ranges.iter().copied().enumerate().map(|(i, r)| (r, i)).collect();

            let mut forward = PortIntervalTree::new();
            for (r, i) in &tagged {
                forward.insert(*r, *i).unwrap();
            }

            tagged.shuffle(&mut StdRng::seed_from_u64(seed));
            let mut shuffled = PortIntervalTree::new();
            for (r, i) in &tagged {
                shuffled.insert(*r, *i).unwrap();
            }

            prop_assert_eq!(
                sorted(forward.find_overlapping(q.low(), q.high())),
                sorted(shuffled.find_overlapping(q.low(), q.high()))
            );
        }

        #[test]
        fn malformed_query_does_not_panic(
            ranges in prop::collection::vec(arb_range(), 0..50),
            a in any::<u16>(),
            b in any::<u16>(),
        ) {
            let tree = build(&ranges);
            let _ = tree.find_overlapping(a.max(b), a.min(b));
        }
    }
}
