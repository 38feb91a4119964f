//! 런타임 포트 디스패치 테이블
//!
//! 빌드가 끝난 포트 그룹을 정렬된 서로소 범위 목록으로 평탄화한 구조입니다.
//! 인터벌 트리와 별도로 할당되며, 게시된 뒤에는 읽기 전용입니다.
//! 조회는 이진 탐색으로 O(log n)입니다.

use std::fmt;

use portcullis_core::types::PortRange;
use serde::Serialize;

use crate::error::GroupingError;

/// 포트 그룹 식별자 (그룹 맵 내 인덱스)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GroupId(pub u32);

impl GroupId {
    /// 그룹 목록 인덱스
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// 테이블 항목: 포트 범위 하나와 그 범위를 담당하는 그룹
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchEntry {
    /// 포트 범위
    pub range: PortRange,
    /// 담당 그룹
    pub group: GroupId,
}

/// 정렬된 서로소 `(범위, 그룹)` 테이블
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortDispatchTable {
    entries: Vec<DispatchEntry>,
}

impl PortDispatchTable {
    /// 항목 목록으로 테이블을 생성합니다.
    ///
    /// 항목은 하한 기준으로 정렬되고, 같은 그룹을 가리키는 인접 범위는 하나로 합쳐집니다.
    ///
    /// # Errors
    /// 두 항목의 범위가 겹치면 [`GroupingError::InvalidRange`]를 반환합니다.
    pub fn new(mut entries: Vec<DispatchEntry>) -> Result<Self, GroupingError> {
        entries.sort_unstable_by_key(|e| (e.range.low(), e.range.high()));

        let mut merged: Vec<DispatchEntry> = Vec::new();
        merged.try_reserve_exact(entries.len())?;

        for entry in entries {
            match merged.last_mut() {
                Some(prev) if prev.range.high() >= entry.range.low() => {
                    return Err(GroupingError::InvalidRange {
                        low: entry.range.low(),
                        high: prev.range.high(),
                    });
                }
                Some(prev)
                    if prev.group == entry.group
                        && u32::from(prev.range.high()) + 1 == u32::from(entry.range.low()) =>
                {
                    let (low, high) = (prev.range.low(), entry.range.high());
                    prev.range = PortRange::new(low, high)
                        .map_err(|_| GroupingError::InvalidRange { low, high })?;
                }
                _ => merged.push(entry),
            }
        }

        Ok(Self { entries: merged })
    }

    /// 포트를 담당하는 그룹을 찾습니다. 어떤 그룹에도 속하지 않으면 `None`.
    pub fn lookup(&self, port: u16) -> Option<GroupId> {
        let idx = self.entries.partition_point(|e| e.range.high() < port);
        self.entries
            .get(idx)
            .filter(|e| e.range.contains(port))
            .map(|e| e.group)
    }

    /// 항목 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 하한 순으로 항목을 순회합니다.
    pub fn iter(&self) -> std::slice::Iter<'_, DispatchEntry> {
        self.entries.iter()
    }

    /// 어떤 그룹이든 담당하는 포트 수
    pub fn covered_ports(&self) -> u32 {
        self.entries.iter().map(|e| e.range.port_count()).sum()
    }
}
