//! 인터벌 트리 노드와 AVL 재균형 연산
//!
//! 노드는 트리가 소유한 평면 아레나(`Vec`)에 삽입 순서대로 저장되며,
//! 자식 링크는 아레나 인덱스([`NodeId`])입니다. 모든 구조 변경(삽입, 회전) 후
//! 영향받은 노드의 `height`와 `max_high`를 아래에서 위로 다시 계산합니다.

use portcullis_core::types::PortRange;

/// 노드 아레나 인덱스
pub(crate) type NodeId = u32;

#[inline]
pub(crate) const fn slot(id: NodeId) -> usize {
    id as usize
}

/// 포트 범위 하나를 감싸는 트리 노드
///
/// `max_high`는 이 노드와 서브트리 전체의 `high` 최댓값이며,
/// 질의 시 서브트리 가지치기의 근거가 됩니다.
#[derive(Debug, Clone)]
pub struct IntervalNode<D> {
    pub(crate) range: PortRange,
    pub(crate) max_high: u16,
    pub(crate) height: u8,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
    pub(crate) descriptor: D,
}

impl<D> IntervalNode<D> {
    pub(crate) fn leaf(range: PortRange, descriptor: D) -> Self {
        Self {
            range,
            max_high: range.high(),
            height: 1,
            left: None,
            right: None,
            descriptor,
        }
    }

    /// 노드가 저장한 포트 범위
    pub fn range(&self) -> PortRange {
        self.range
    }

    /// 서브트리 전체의 상한 최댓값
    pub fn max_high(&self) -> u16 {
        self.max_high
    }

    /// 외부 디스크립터 핸들 (트리가 소유하지 않음)
    pub fn descriptor(&self) -> &D {
        &self.descriptor
    }

    /// 정렬 키: 하한, 같으면 상한. 완전히 같은 키는 오른쪽으로 내려가므로
    /// 삽입 순서가 중위 순회 순서로 보존됩니다.
    #[inline]
    fn key(&self) -> (u16, u16) {
        (self.range.low(), self.range.high())
    }
}

#[inline]
fn height<D>(nodes: &[IntervalNode<D>], id: Option<NodeId>) -> u8 {
    id.map_or(0, |i| nodes[slot(i)].height)
}

#[inline]
fn balance_factor<D>(nodes: &[IntervalNode<D>], id: NodeId) -> i16 {
    let node = &nodes[slot(id)];
    i16::from(height(nodes, node.left)) - i16::from(height(nodes, node.right))
}

/// 자식 값으로부터 `height`와 `max_high`를 다시 계산합니다.
pub(crate) fn update<D>(nodes: &mut [IntervalNode<D>], id: NodeId) {
    let node = &nodes[slot(id)];
    let mut child_height = 0;
    let mut max_high = node.range.high();
    for child in [node.left, node.right].into_iter().flatten() {
        let child = &nodes[slot(child)];
        child_height = child_height.max(child.height);
        max_high = max_high.max(child.max_high);
    }
    let node = &mut nodes[slot(id)];
    node.height = child_height + 1;
    node.max_high = max_high;
}

//      y            x
//     / \          / \
//    x   c  ==>   a   y
//   / \              / \
//  a   b            b   c
fn rotate_right<D>(nodes: &mut [IntervalNode<D>], y: NodeId) -> NodeId {
    let Some(x) = nodes[slot(y)].left else {
        return y;
    };
    nodes[slot(y)].left = nodes[slot(x)].right;
    nodes[slot(x)].right = Some(y);
    update(nodes, y);
    update(nodes, x);
    x
}

fn rotate_left<D>(nodes: &mut [IntervalNode<D>], x: NodeId) -> NodeId {
    let Some(y) = nodes[slot(x)].right else {
        return x;
    };
    nodes[slot(x)].right = nodes[slot(y)].left;
    nodes[slot(y)].left = Some(x);
    update(nodes, x);
    update(nodes, y);
    y
}

/// 노드를 갱신하고 AVL 불변식이 깨졌으면 회전합니다.
///
/// 반환값은 이 위치의 새 서브트리 루트입니다.
pub(crate) fn rebalance<D>(nodes: &mut [IntervalNode<D>], id: NodeId) -> NodeId {
    update(nodes, id);
    let bf = balance_factor(nodes, id);

    if bf > 1 {
        if let Some(left) = nodes[slot(id)].left {
            if balance_factor(nodes, left) < 0 {
                let new_left = rotate_left(nodes, left);
                nodes[slot(id)].left = Some(new_left);
            }
        }
        return rotate_right(nodes, id);
    }

    if bf < -1 {
        if let Some(right) = nodes[slot(id)].right {
            if balance_factor(nodes, right) > 0 {
                let new_right = rotate_right(nodes, right);
                nodes[slot(id)].right = Some(new_right);
            }
        }
        return rotate_left(nodes, id);
    }

    id
}

/// `at` 서브트리에 이미 아레나에 들어 있는 `new` 노드를 리프로 붙이고,
/// 돌아오는 경로의 모든 조상을 갱신/재균형합니다.
///
/// 재귀 깊이는 트리 높이(AVL이므로 O(log n))로 제한됩니다.
pub(crate) fn insert_under<D>(nodes: &mut [IntervalNode<D>], at: NodeId, new: NodeId) -> NodeId {
    let key = nodes[slot(new)].key();
    let current = &nodes[slot(at)];

    if key < current.key() {
        let child = match current.left {
            Some(left) => insert_under(nodes, left, new),
            None => new,
        };
        nodes[slot(at)].left = Some(child);
    } else {
        let child = match current.right {
            Some(right) => insert_under(nodes, right, new),
            None => new,
        };
        nodes[slot(at)].right = Some(child);
    }

    rebalance(nodes, at)
}
