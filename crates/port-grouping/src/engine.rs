//! 리로드 가능한 그룹화 엔진
//!
//! [`GroupingEngine`]은 시그니처 집합으로 네 개의 `(protocol, direction)`
//! 포트 그룹 맵을 빌드하여 [`DispatchSet`]으로 게시합니다.
//!
//! 빌드는 항상 새 구조에 대해 수행되고, 모든 맵이 성공한 경우에만 교체됩니다.
//! 실패하면 이전에 게시된 세트가 그대로 유지됩니다. 패킷 경로의 리더는
//! [`GroupingEngine::current`]로 받은 `Arc`를 통해 읽기 전용으로 접근합니다.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use portcullis_core::config::GroupingConfig;
use portcullis_core::metrics as m;
use portcullis_core::types::{Direction, Protocol};
use tracing::{error, info};

use crate::builder::{PortGroupBuilder, PortGroupMap};
use crate::error::GroupingError;
use crate::signature::SignatureSet;

/// 게시된 포트 그룹 맵 묶음
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSet {
    generation: u64,
    signature_count: usize,
    tcp_to_server: PortGroupMap,
    tcp_to_client: PortGroupMap,
    udp_to_server: PortGroupMap,
    udp_to_client: PortGroupMap,
}

impl DispatchSet {
    /// 그룹이 없는 세트 (generation 0)
    pub fn empty() -> Self {
        Self {
            generation: 0,
            signature_count: 0,
            tcp_to_server: PortGroupMap::empty(Protocol::Tcp, Direction::ToServer),
            tcp_to_client: PortGroupMap::empty(Protocol::Tcp, Direction::ToClient),
            udp_to_server: PortGroupMap::empty(Protocol::Udp, Direction::ToServer),
            udp_to_client: PortGroupMap::empty(Protocol::Udp, Direction::ToClient),
        }
    }

    /// 게시 세대. 리로드가 성공할 때마다 1씩 증가합니다.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 빌드에 사용된 시그니처 수
    pub fn signature_count(&self) -> usize {
        self.signature_count
    }

    /// `(protocol, direction)`의 그룹 맵
    pub fn map(&self, protocol: Protocol, direction: Direction) -> &PortGroupMap {
        match (protocol, direction) {
            (Protocol::Tcp, Direction::ToServer) => &self.tcp_to_server,
            (Protocol::Tcp, Direction::ToClient) => &self.tcp_to_client,
            (Protocol::Udp, Direction::ToServer) => &self.udp_to_server,
            (Protocol::Udp, Direction::ToClient) => &self.udp_to_client,
        }
    }

    /// 네 개의 맵을 순회합니다.
    pub fn maps(&self) -> impl Iterator<Item = &PortGroupMap> {
        [
            &self.tcp_to_server,
            &self.tcp_to_client,
            &self.udp_to_server,
            &self.udp_to_client,
        ]
        .into_iter()
    }

    /// 전체 그룹 수
    pub fn total_groups(&self) -> usize {
        self.maps().map(PortGroupMap::len).sum()
    }
}

/// 포트 그룹화 엔진
#[derive(Debug)]
pub struct GroupingEngine {
    config: GroupingConfig,
    current: Arc<DispatchSet>,
}

impl GroupingEngine {
    /// 빈 세트가 게시된 엔진을 생성합니다.
    pub fn new(config: GroupingConfig) -> Self {
        Self {
            config,
            current: Arc::new(DispatchSet::empty()),
        }
    }

    /// 그룹화 설정
    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    /// 현재 게시된 세트
    pub fn current(&self) -> Arc<DispatchSet> {
        Arc::clone(&self.current)
    }

    /// 현재 게시 세대
    pub fn generation(&self) -> u64 {
        self.current.generation
    }

    /// 시그니처 집합으로 새 세트를 빌드하여 게시합니다.
    ///
    /// # Errors
    /// 그룹화 설정이 유효하지 않거나 어느 한 맵의 빌드라도 실패하면 에러를 반환하며,
    /// 이전 세트가 유지됩니다.
    pub fn reload(&mut self, signatures: &SignatureSet) -> Result<Arc<DispatchSet>, GroupingError> {
        let started = Instant::now();

        let built = self
            .config
            .validate()
            .map_err(GroupingError::from)
            .and_then(|()| self.build_set(signatures));
        match built {
            Ok(set) => {
                let set = Arc::new(set);
                self.current = Arc::clone(&set);

                for map in set.maps() {
                    gauge!(
                        m::GROUPING_PORT_GROUPS,
                        m::LABEL_PROTOCOL => map.protocol().as_str(),
                        m::LABEL_DIRECTION => map.direction().as_str()
                    )
                    .set(map.len() as f64);
                }
                gauge!(m::SIGNATURES_LOADED).set(set.signature_count as f64);
                counter!(m::GROUPING_BUILDS_TOTAL, m::LABEL_RESULT => "success").increment(1);
                histogram!(m::GROUPING_BUILD_DURATION_SECONDS)
                    .record(started.elapsed().as_secs_f64());

                info!(
                    generation = set.generation,
                    signatures = set.signature_count,
                    groups = set.total_groups(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "dispatch set published"
                );
                Ok(set)
            }
            Err(e) => {
                counter!(m::GROUPING_BUILDS_TOTAL, m::LABEL_RESULT => "failure").increment(1);
                error!(
                    error = %e,
                    active_generation = self.current.generation,
                    "dispatch set build failed, keeping previous set"
                );
                Err(e)
            }
        }
    }

    fn build_set(&self, signatures: &SignatureSet) -> Result<DispatchSet, GroupingError> {
        let build = |protocol, direction| {
            PortGroupBuilder::from_config(protocol, direction, &self.config).build(signatures)
        };

        Ok(DispatchSet {
            generation: self.current.generation + 1,
            signature_count: signatures.len(),
            tcp_to_server: build(Protocol::Tcp, Direction::ToServer)?,
            tcp_to_client: build(Protocol::Tcp, Direction::ToClient)?,
            udp_to_server: build(Protocol::Udp, Direction::ToServer)?,
            udp_to_client: build(Protocol::Udp, Direction::ToClient)?,
        })
    }
}
