#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`tree`]: 포트 범위 인터벌 트리 (증강 AVL, O(log n + k) 겹침 질의)
//! - [`signature`]: TOML 시그니처 인벤토리 로더 및 검증
//! - [`builder`]: 시그니처 포트 범위를 서로소 포트 그룹으로 컴파일
//! - [`dispatch`]: 런타임 포트 -> 그룹 디스패치 테이블
//! - [`engine`]: 네 개의 `(protocol, direction)` 맵을 빌드/게시하는 리로드 엔진
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! SignatureLoader -> SignatureSet -> PortGroupBuilder -> PortGroupMap -> DispatchSet
//!                                          |                  |
//!                                   PortIntervalTree   PortDispatchTable
//!                                   (빌드 후 해제)       (게시, 읽기 전용)
//! ```

pub mod builder;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod signature;
pub mod tree;

// --- 주요 타입 re-export ---

// 트리
pub use tree::{IntervalNode, OverlapIter, PortIntervalTree};

// 시그니처
pub use signature::{Signature, SignatureLoader, SignatureSet};

// 빌더
pub use builder::{PortGroup, PortGroupBuilder, PortGroupMap};

// 디스패치
pub use dispatch::{DispatchEntry, GroupId, PortDispatchTable};

// 엔진
pub use engine::{DispatchSet, GroupingEngine};

// 에러
pub use error::GroupingError;
