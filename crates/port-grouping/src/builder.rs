//! 포트 그룹 빌더 -- 시그니처 포트 범위를 서로소 포트 그룹으로 컴파일합니다.
//!
//! # 빌드 단계
//! 1. 대상 `(protocol, direction)`에 적용되는 모든 시그니처의 포트 범위를
//!    인터벌 트리에 삽입합니다. 트리 디스크립터는 평면 포트 디스크립터 목록의 인덱스입니다.
//! 2. 범위 경계(`low`, `high + 1`)로 포트 공간을 기본 구간으로 자르고
//!    구간마다 트리에 겹침 질의를 하여 적용 시그니처 집합을 구합니다.
//!    집합은 지문(fingerprint)과 크기로 한 번만 등록되며, 구간은 집합 번호만 가집니다.
//! 3. 같은 집합을 가진 인접 구간을 합치고, 같은 집합끼리는 하나의 그룹을 공유합니다.
//! 4. 그룹 수가 방향별 상한을 넘으면 우선순위가 낮은 그룹을 하나로 병합합니다.
//! 5. 남은 그룹의 시그니처 목록을 트리에서 다시 모은 뒤 트리를 해제하고
//!    그룹 목록과 디스패치 테이블을 만듭니다.
//!
//! 구간마다 시그니처 목록을 복사해 두지 않으므로 메모리는
//! `구간 수 + 서로 다른 집합 수 + 최종 그룹의 시그니처 수`에 비례합니다.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{BuildHasher, BuildHasherDefault};

use metrics::counter;
use portcullis_core::config::{GroupLimits, GroupingConfig};
use portcullis_core::metrics as m;
use portcullis_core::types::{Direction, PortRange, Protocol, SignatureId};
use serde::Serialize;
use tracing::{debug, warn};

use crate::dispatch::{DispatchEntry, GroupId, PortDispatchTable};
use crate::error::GroupingError;
use crate::signature::SignatureSet;
use crate::tree::PortIntervalTree;

/// 트리 디스크립터가 가리키는 포트 디스크립터
///
/// 목록은 빌드가 소유하며, 트리는 인덱스만 저장합니다.
#[derive(Debug, Clone, Copy)]
struct PortDescriptor {
    range: PortRange,
    /// 시그니처 집합 내 위치
    signature: usize,
}

/// 등록된 시그니처 집합 번호 (등장 순서)
type SetId = usize;

/// 같은 시그니처 집합을 가진 연속 포트 구간
#[derive(Debug)]
struct Segment {
    range: PortRange,
    set: SetId,
}

/// 등록된 시그니처 집합. 멤버는 저장하지 않고 대표 구간으로 다시 질의합니다.
#[derive(Debug, Clone, Copy)]
struct InternedSet {
    sample: PortRange,
    len: usize,
}

/// 번호가 매겨지기 전의 그룹
#[derive(Debug)]
struct DraftGroup {
    ranges: Vec<PortRange>,
    /// 시그니처 수. 병합 그룹은 구성 그룹 중 최댓값입니다.
    signature_count: usize,
}

impl DraftGroup {
    fn first_port(&self) -> u16 {
        self.ranges.first().map_or(u16::MAX, PortRange::low)
    }

    fn covers_any(&self, ports: &[u16]) -> bool {
        self.ranges
            .iter()
            .any(|r| ports.iter().any(|&p| r.contains(p)))
    }
}

/// 트리 질의 결과를 시그니처 단위로 중복 없이 모으는 재사용 버퍼
///
/// 시그니처마다 마지막으로 본 세대(epoch)를 기록하여 정렬 없이 중복을 제거하고,
/// 멤버 키의 XOR로 순서와 무관한 지문을 계산합니다.
struct SignatureCollector<'a> {
    tree: &'a PortIntervalTree<usize>,
    descriptors: &'a [PortDescriptor],
    keys: &'a [u64],
    seen: Vec<u32>,
    epoch: u32,
    members: Vec<usize>,
    fingerprint: u64,
}

impl<'a> SignatureCollector<'a> {
    fn new(
        tree: &'a PortIntervalTree<usize>,
        descriptors: &'a [PortDescriptor],
        keys: &'a [u64],
    ) -> Result<Self, GroupingError> {
        let mut seen = Vec::new();
        seen.try_reserve_exact(keys.len())?;
        seen.resize(keys.len(), 0);
        Ok(Self {
            tree,
            descriptors,
            keys,
            seen,
            epoch: 0,
            members: Vec::new(),
            fingerprint: 0,
        })
    }

    /// 새 집합 수집을 시작합니다.
    fn begin(&mut self) {
        if self.epoch == u32::MAX {
            self.seen.fill(0);
            self.epoch = 0;
        }
        self.epoch += 1;
        self.members.clear();
        self.fingerprint = 0;
    }

    /// `range`와 겹치는 시그니처를 현재 집합에 더합니다.
    fn extend(&mut self, range: PortRange) -> Result<(), GroupingError> {
        let tree = self.tree;
        let descriptors = self.descriptors;
        for node in tree.overlaps(range.low(), range.high()) {
            let sig = descriptors[*node.descriptor()].signature;
            if self.seen[sig] != self.epoch {
                self.seen[sig] = self.epoch;
                self.members.try_reserve(1)?;
                self.members.push(sig);
                self.fingerprint ^= self.keys[sig];
            }
        }
        Ok(())
    }

    fn contains(&self, sig: usize) -> bool {
        self.seen[sig] == self.epoch
    }

    fn members(&self) -> &[usize] {
        &self.members
    }
}

/// 하나의 포트 그룹
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortGroup {
    /// 그룹 ID
    pub id: GroupId,
    /// 그룹이 담당하는 포트 범위 (하한 순)
    pub ranges: Vec<PortRange>,
    /// 적용 시그니처 (sid 순)
    pub signatures: Vec<SignatureId>,
    /// 우선 보존 포트를 포함하는지 여부
    pub whitelisted: bool,
}

/// 한 `(protocol, direction)`의 빌드 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortGroupMap {
    protocol: Protocol,
    direction: Direction,
    groups: Vec<PortGroup>,
    table: PortDispatchTable,
}

impl PortGroupMap {
    /// 그룹이 없는 맵
    pub fn empty(protocol: Protocol, direction: Direction) -> Self {
        Self {
            protocol,
            direction,
            groups: Vec::new(),
            table: PortDispatchTable::default(),
        }
    }

    /// 프로토콜
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// 방향
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// 그룹 목록 (첫 포트 순, 인덱스 == `GroupId`)
    pub fn groups(&self) -> &[PortGroup] {
        &self.groups
    }

    /// 디스패치 테이블
    pub fn table(&self) -> &PortDispatchTable {
        &self.table
    }

    /// 그룹 수
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// 그룹이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// ID로 그룹을 조회합니다.
    pub fn group(&self, id: GroupId) -> Option<&PortGroup> {
        self.groups.get(id.index())
    }

    /// 포트를 담당하는 그룹을 조회합니다.
    pub fn group_for(&self, port: u16) -> Option<&PortGroup> {
        self.table.lookup(port).and_then(|id| self.group(id))
    }

    /// 포트에 적용되는 시그니처. 담당 그룹이 없으면 빈 슬라이스입니다.
    pub fn signatures_for(&self, port: u16) -> &[SignatureId] {
        self.group_for(port)
            .map_or(&[], |group| group.signatures.as_slice())
    }
}

/// 포트 그룹 빌더
#[derive(Debug, Clone)]
pub struct PortGroupBuilder {
    protocol: Protocol,
    direction: Direction,
    limits: GroupLimits,
    whitelist: Vec<u16>,
}

impl PortGroupBuilder {
    /// 새 빌더를 생성합니다. 우선 보존 포트는 비어 있습니다.
    pub fn new(protocol: Protocol, direction: Direction, limits: GroupLimits) -> Self {
        Self {
            protocol,
            direction,
            limits,
            whitelist: Vec::new(),
        }
    }

    /// 설정의 상한과 프로토콜별 우선 보존 포트로 빌더를 생성합니다.
    pub fn from_config(protocol: Protocol, direction: Direction, config: &GroupingConfig) -> Self {
        Self::new(protocol, direction, config.limits())
            .with_whitelist(config.whitelist(protocol).to_vec())
    }

    /// 그룹 수 제한 시 우선 보존할 포트를 설정합니다.
    pub fn with_whitelist(mut self, ports: impl Into<Vec<u16>>) -> Self {
        self.whitelist = ports.into();
        self
    }

    /// 시그니처 집합으로 포트 그룹 맵을 빌드합니다.
    ///
    /// # Errors
    /// - 방향별 상한이 0인 경우 [`GroupingError::Config`]
    /// - 할당 실패 시 [`GroupingError::OutOfMemory`]
    pub fn build(&self, signatures: &SignatureSet) -> Result<PortGroupMap, GroupingError> {
        let limit = self.limits.for_direction(self.direction);
        if limit == 0 {
            let field = match self.direction {
                Direction::ToServer => "grouping.toserver_groups",
                Direction::ToClient => "grouping.toclient_groups",
            };
            return Err(GroupingError::Config {
                field: field.to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        let descriptors = self.collect_descriptors(signatures)?;
        let tree = index_descriptors(&descriptors)?;
        let keys = fingerprint_keys(signatures.len())?;

        let resolved = {
            let mut current = SignatureCollector::new(&tree, &descriptors, &keys)?;
            let mut sample = SignatureCollector::new(&tree, &descriptors, &keys)?;
            let (segments, sets) = segment(&descriptors, &mut current, &mut sample)?;

            debug!(
                protocol = %self.protocol,
                direction = %self.direction,
                descriptors = descriptors.len(),
                segments = segments.len(),
                distinct_sets = sets.len(),
                "segmented port space"
            );

            let groups = share_groups(segments, &sets)?;
            let groups = self.enforce_limit(groups, limit);
            resolve_signatures(groups, &mut current, signatures)?
        };
        tree.free();

        self.materialize(resolved)
    }

    /// `range`와 겹치는 포트 범위를 선언한 시그니처를 찾습니다 (sid 순, 중복 없음).
    ///
    /// 그룹화 없이 인터벌 트리에 직접 질의합니다.
    pub fn overlapping_signatures(
        &self,
        signatures: &SignatureSet,
        range: PortRange,
    ) -> Result<Vec<SignatureId>, GroupingError> {
        let descriptors = self.collect_descriptors(signatures)?;
        let tree = index_descriptors(&descriptors)?;

        let mut sids: Vec<SignatureId> = tree
            .overlaps(range.low(), range.high())
            .filter_map(|node| signatures.get(descriptors[*node.descriptor()].signature))
            .map(|sig| sig.sid)
            .collect();
        tree.free();

        sids.sort_unstable();
        sids.dedup();
        Ok(sids)
    }

    fn collect_descriptors(
        &self,
        signatures: &SignatureSet,
    ) -> Result<Vec<PortDescriptor>, GroupingError> {
        let mut descriptors = Vec::new();
        for (idx, sig) in signatures.iter().enumerate() {
            if !sig.applies_to(self.protocol, self.direction) {
                continue;
            }
            let ports = sig.ports_for(self.direction);
            descriptors.try_reserve(ports.len())?;
            descriptors.extend(ports.iter().map(|&range| PortDescriptor {
                range,
                signature: idx,
            }));
        }
        Ok(descriptors)
    }

    fn enforce_limit(&self, mut groups: Vec<DraftGroup>, limit: usize) -> Vec<DraftGroup> {
        if groups.len() <= limit {
            return groups;
        }

        let before = groups.len();
        groups.sort_by_key(|g| {
            (
                Reverse(g.covers_any(&self.whitelist)),
                Reverse(g.signature_count),
                g.first_port(),
            )
        });
        let rest = groups.split_off(limit - 1);
        let merged = rest.len();

        let mut overflow = DraftGroup {
            ranges: Vec::new(),
            signature_count: 0,
        };
        for group in rest {
            overflow.ranges.extend(group.ranges);
            overflow.signature_count = overflow.signature_count.max(group.signature_count);
        }
        overflow.ranges.sort_unstable();
        groups.push(overflow);

        warn!(
            protocol = %self.protocol,
            direction = %self.direction,
            groups = before,
            limit,
            merged,
            "port group limit reached, merging lowest priority groups"
        );
        counter!(
            m::GROUPING_GROUPS_MERGED_TOTAL,
            m::LABEL_PROTOCOL => self.protocol.as_str(),
            m::LABEL_DIRECTION => self.direction.as_str()
        )
        .increment(merged as u64);

        groups
    }

    fn materialize(
        &self,
        mut groups: Vec<(DraftGroup, Vec<SignatureId>)>,
    ) -> Result<PortGroupMap, GroupingError> {
        groups.sort_by_key(|(group, _)| group.first_port());

        let mut entries = Vec::new();
        let mut built = Vec::new();
        built.try_reserve_exact(groups.len())?;

        for (idx, (group, sids)) in groups.into_iter().enumerate() {
            let id = GroupId(u32::try_from(idx).map_err(|_| GroupingError::OutOfMemory {
                context: "numbering port groups",
            })?);

            entries.try_reserve(group.ranges.len())?;
            entries.extend(
                group
                    .ranges
                    .iter()
                    .map(|&range| DispatchEntry { range, group: id }),
            );

            built.push(PortGroup {
                id,
                whitelisted: group.covers_any(&self.whitelist),
                ranges: group.ranges,
                signatures: sids,
            });
        }

        let table = PortDispatchTable::new(entries)?;
        debug!(
            protocol = %self.protocol,
            direction = %self.direction,
            groups = built.len(),
            entries = table.len(),
            "port group map built"
        );

        Ok(PortGroupMap {
            protocol: self.protocol,
            direction: self.direction,
            groups: built,
            table,
        })
    }
}

fn index_descriptors(
    descriptors: &[PortDescriptor],
) -> Result<PortIntervalTree<usize>, GroupingError> {
    let mut tree = PortIntervalTree::with_capacity(descriptors.len())?;
    for (idx, descriptor) in descriptors.iter().enumerate() {
        tree.insert(descriptor.range, idx)?;
    }
    counter!(m::GROUPING_TREE_NODES_TOTAL).increment(tree.len() as u64);
    Ok(tree)
}

/// 시그니처 인덱스별 지문 키
fn fingerprint_keys(count: usize) -> Result<Vec<u64>, GroupingError> {
    let hasher = BuildHasherDefault::<DefaultHasher>::default();
    let mut keys = Vec::new();
    keys.try_reserve_exact(count)?;
    keys.extend((0..count).map(|idx| hasher.hash_one(idx)));
    Ok(keys)
}

/// 경계점으로 포트 공간을 자르고 구간별 시그니처 집합을 등록합니다.
///
/// 기본 구간 안에서는 모든 범위가 구간 전체를 덮거나 전혀 겹치지 않습니다.
/// 시그니처가 없는 구간은 건너뛰고, 같은 집합의 인접 구간은 합칩니다.
/// 지문과 크기가 같은 후보는 대표 구간을 다시 질의하여 실제로 같은 집합인지 확인합니다.
fn segment(
    descriptors: &[PortDescriptor],
    current: &mut SignatureCollector<'_>,
    sample: &mut SignatureCollector<'_>,
) -> Result<(Vec<Segment>, Vec<InternedSet>), GroupingError> {
    let mut bounds: Vec<u16> = Vec::new();
    bounds.try_reserve(descriptors.len() * 2)?;
    for d in descriptors {
        bounds.push(d.range.low());
        if d.range.high() < u16::MAX {
            bounds.push(d.range.high() + 1);
        }
    }
    bounds.sort_unstable();
    bounds.dedup();

    let mut segments: Vec<Segment> = Vec::new();
    let mut sets: Vec<InternedSet> = Vec::new();
    let mut by_fingerprint: HashMap<(u64, usize), Vec<SetId>> = HashMap::new();

    for (i, &start) in bounds.iter().enumerate() {
        let end = bounds.get(i + 1).map_or(u16::MAX, |&next| next - 1);
        let range = PortRange::new(start, end)
            .map_err(|_| GroupingError::InvalidRange { low: start, high: end })?;

        current.begin();
        current.extend(range)?;
        if current.members().is_empty() {
            continue;
        }

        let candidates = by_fingerprint
            .entry((current.fingerprint, current.members().len()))
            .or_default();
        let mut found = None;
        for &id in candidates.iter() {
            sample.begin();
            sample.extend(sets[id].sample)?;
            // 크기가 같으므로 포함 관계면 같은 집합
            if sample.members().iter().all(|&sig| current.contains(sig)) {
                found = Some(id);
                break;
            }
        }
        let set = match found {
            Some(id) => id,
            None => {
                sets.try_reserve(1)?;
                sets.push(InternedSet {
                    sample: range,
                    len: current.members().len(),
                });
                candidates.push(sets.len() - 1);
                sets.len() - 1
            }
        };

        match segments.last_mut() {
            Some(last) if last.set == set && u32::from(last.range.high()) + 1 == u32::from(start) => {
                let low = last.range.low();
                last.range = PortRange::new(low, end)
                    .map_err(|_| GroupingError::InvalidRange { low, high: end })?;
            }
            _ => {
                segments.try_reserve(1)?;
                segments.push(Segment { range, set });
            }
        }
    }
    Ok((segments, sets))
}

/// 같은 시그니처 집합을 가진 구간들이 하나의 그룹을 공유하도록 묶습니다.
///
/// 집합 번호는 등장 순서대로 매겨지므로 그룹 순서도 첫 포트 순입니다.
fn share_groups(
    segments: Vec<Segment>,
    sets: &[InternedSet],
) -> Result<Vec<DraftGroup>, GroupingError> {
    let mut groups: Vec<DraftGroup> = Vec::new();
    groups.try_reserve_exact(sets.len())?;
    groups.extend(sets.iter().map(|set| DraftGroup {
        ranges: Vec::new(),
        signature_count: set.len,
    }));

    for seg in segments {
        groups[seg.set].ranges.push(seg.range);
    }
    Ok(groups)
}

/// 최종 그룹마다 담당 범위를 트리에 질의하여 시그니처 목록(sid 순)을 만듭니다.
fn resolve_signatures(
    groups: Vec<DraftGroup>,
    collector: &mut SignatureCollector<'_>,
    signatures: &SignatureSet,
) -> Result<Vec<(DraftGroup, Vec<SignatureId>)>, GroupingError> {
    let mut resolved = Vec::new();
    resolved.try_reserve_exact(groups.len())?;

    for group in groups {
        collector.begin();
        for &range in &group.ranges {
            collector.extend(range)?;
        }

        let mut sids: Vec<SignatureId> = Vec::new();
        sids.try_reserve_exact(collector.members().len())?;
        sids.extend(
            collector
                .members()
                .iter()
                .filter_map(|&i| signatures.get(i))
                .map(|sig| sig.sid),
        );
        sids.sort_unstable();
        resolved.push((group, sids));
    }
    Ok(resolved)
}
