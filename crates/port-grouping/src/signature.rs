//! 시그니처 인벤토리 -- 그룹화에 필요한 시그니처 포트 정보를 로드합니다.
//!
//! 룰 문법은 해석하지 않습니다. 인벤토리는 시그니처마다
//! 프로토콜, 흐름 방향, 출발지/목적지 포트 범위만 담은 TOML 문서입니다.
//!
//! ```toml
//! [[signatures]]
//! sid = 2100498
//! msg = "GPL ATTACK_RESPONSE id check returned root"
//! protocol = "tcp"
//! flow = "to_client"
//! src_ports = ["any"]
//! dst_ports = ["1024:"]
//! ```

use std::collections::HashSet;
use std::path::Path;

use portcullis_core::types::{Direction, FlowDirection, PortRange, Protocol, SignatureId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::GroupingError;

/// 인벤토리 파일 최대 크기
const MAX_SIGNATURE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// 기본 최대 시그니처 수
pub const DEFAULT_MAX_SIGNATURES: usize = 100_000;

fn any_ports() -> Vec<PortRange> {
    vec![PortRange::ANY]
}

/// 포트 그룹화 대상 시그니처
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// 시그니처 ID
    pub sid: SignatureId,
    /// 설명
    #[serde(default)]
    pub msg: String,
    /// 전송 계층 프로토콜
    pub protocol: Protocol,
    /// 검사 흐름 방향
    #[serde(default)]
    pub flow: FlowDirection,
    /// 출발지 포트 범위 목록
    #[serde(default = "any_ports")]
    pub src_ports: Vec<PortRange>,
    /// 목적지 포트 범위 목록
    #[serde(default = "any_ports")]
    pub dst_ports: Vec<PortRange>,
}

impl Signature {
    /// 그룹 방향에 대해 키가 되는 포트 범위를 반환합니다.
    ///
    /// to-server 그룹은 목적지 포트, to-client 그룹은 출발지 포트를 사용합니다.
    pub fn ports_for(&self, direction: Direction) -> &[PortRange] {
        match direction {
            Direction::ToServer => &self.dst_ports,
            Direction::ToClient => &self.src_ports,
        }
    }

    /// 이 시그니처가 `(protocol, direction)` 그룹에 속하는지 확인합니다.
    pub fn applies_to(&self, protocol: Protocol, direction: Direction) -> bool {
        self.protocol == protocol && self.flow.covers(direction)
    }

    fn validate(&self) -> Result<(), GroupingError> {
        if self.sid.0 == 0 {
            return Err(GroupingError::SignatureValidation {
                sid: self.sid.0,
                reason: "sid must be non-zero".to_owned(),
            });
        }
        if self.src_ports.is_empty() {
            return Err(GroupingError::SignatureValidation {
                sid: self.sid.0,
                reason: "src_ports must not be empty".to_owned(),
            });
        }
        if self.dst_ports.is_empty() {
            return Err(GroupingError::SignatureValidation {
                sid: self.sid.0,
                reason: "dst_ports must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

/// 검증된 시그니처 집합
///
/// sid는 0이 아니고 서로 다르며, 모든 시그니처는 최소 하나의 포트 범위를 가집니다.
#[derive(Debug, Clone, Default)]
pub struct SignatureSet {
    signatures: Vec<Signature>,
}

impl SignatureSet {
    /// 시그니처 목록을 검증하여 집합을 생성합니다.
    ///
    /// # Errors
    /// - sid가 0이거나 중복인 경우
    /// - 포트 목록이 비어 있는 경우
    /// - 시그니처 수가 `max_signatures`를 초과하는 경우
    pub fn new(signatures: Vec<Signature>, max_signatures: usize) -> Result<Self, GroupingError> {
        if signatures.len() > max_signatures {
            return Err(GroupingError::Config {
                field: "signatures.max_signatures".to_owned(),
                reason: format!(
                    "too many signatures: {} (max: {max_signatures})",
                    signatures.len()
                ),
            });
        }

        let mut seen = HashSet::with_capacity(signatures.len());
        for sig in &signatures {
            sig.validate()?;
            if !seen.insert(sig.sid) {
                return Err(GroupingError::SignatureValidation {
                    sid: sig.sid.0,
                    reason: "duplicate sid".to_owned(),
                });
            }
        }

        Ok(Self { signatures })
    }

    /// 빈 집합
    pub fn empty() -> Self {
        Self::default()
    }

    /// 위치 인덱스로 시그니처를 조회합니다.
    pub fn get(&self, index: usize) -> Option<&Signature> {
        self.signatures.get(index)
    }

    /// sid로 시그니처를 조회합니다.
    pub fn find(&self, sid: SignatureId) -> Option<&Signature> {
        self.signatures.iter().find(|sig| sig.sid == sid)
    }

    /// 시그니처 수
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// 로드 순서대로 순회합니다.
    pub fn iter(&self) -> std::slice::Iter<'_, Signature> {
        self.signatures.iter()
    }
}

impl<'a> IntoIterator for &'a SignatureSet {
    type Item = &'a Signature;
    type IntoIter = std::slice::Iter<'a, Signature>;

    fn into_iter(self) -> Self::IntoIter {
        self.signatures.iter()
    }
}

#[derive(Deserialize)]
struct SignatureFile {
    #[serde(default)]
    signatures: Vec<Signature>,
}

/// 시그니처 인벤토리 로더
#[derive(Debug, Clone, Copy)]
pub struct SignatureLoader {
    max_signatures: usize,
}

impl Default for SignatureLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIGNATURES)
    }
}

impl SignatureLoader {
    /// 최대 시그니처 수를 지정하여 로더를 생성합니다.
    pub fn new(max_signatures: usize) -> Self {
        Self { max_signatures }
    }

    /// 인벤토리 파일을 로드합니다.
    ///
    /// # Errors
    /// - 파일을 읽을 수 없거나 10MB를 초과하는 경우
    /// - TOML 파싱 또는 시그니처 검증에 실패한 경우
    pub async fn load_file(&self, path: impl AsRef<Path>) -> Result<SignatureSet, GroupingError> {
        let path = path.as_ref();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| GroupingError::SignatureLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_SIGNATURE_FILE_SIZE {
            return Err(GroupingError::SignatureLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_SIGNATURE_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| GroupingError::SignatureLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        let set = self.parse(&content, &path.display().to_string())?;
        info!(
            path = %path.display(),
            count = set.len(),
            "loaded signature inventory"
        );
        Ok(set)
    }

    /// TOML 문자열을 파싱하여 검증된 시그니처 집합을 생성합니다.
    ///
    /// `source`는 에러 메시지에 표시될 출처(파일 경로 등)입니다.
    pub fn parse(&self, toml_str: &str, source: &str) -> Result<SignatureSet, GroupingError> {
        let file: SignatureFile =
            toml::from_str(toml_str).map_err(|e| GroupingError::SignatureLoad {
                path: source.to_owned(),
                reason: format!("TOML parse error: {e}"),
            })?;

        debug!(source, count = file.signatures.len(), "parsed signature inventory");
        SignatureSet::new(file.signatures, self.max_signatures)
    }
}
