//! 포트 그룹화 에러 타입
//!
//! [`GroupingError`]는 인터벌 트리, 시그니처 로딩, 그룹 빌드 중 발생하는
//! 모든 에러를 표현합니다. `From<GroupingError> for PortcullisError` 변환이
//! 구현되어 있어 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use portcullis_core::error::{BuildError, ConfigError, ParseError, PortcullisError};

/// 포트 그룹화 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum GroupingError {
    /// 메모리 할당 실패 (트리 노드, 디스크립터 목록 등)
    #[error("out of memory while {context}")]
    OutOfMemory {
        /// 할당을 시도한 작업
        context: &'static str,
    },

    /// 잘못된 포트 범위 (`low > high`)
    #[error("invalid port range {low}:{high}")]
    InvalidRange {
        /// 하한
        low: u16,
        /// 상한
        high: u16,
    },

    /// 시그니처 파일 로딩 실패
    #[error("signature load error: {path}: {reason}")]
    SignatureLoad {
        /// 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 시그니처 유효성 검증 실패
    #[error("signature validation error: sid {sid}: {reason}")]
    SignatureValidation {
        /// 문제가 된 시그니처 ID
        sid: u32,
        /// 검증 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<std::collections::TryReserveError> for GroupingError {
    fn from(_: std::collections::TryReserveError) -> Self {
        GroupingError::OutOfMemory {
            context: "reserving build storage",
        }
    }
}

impl From<ConfigError> for GroupingError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidValue { field, reason } => GroupingError::Config { field, reason },
            other => GroupingError::Config {
                field: "grouping".to_owned(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<GroupingError> for PortcullisError {
    fn from(err: GroupingError) -> Self {
        match err {
            GroupingError::OutOfMemory { context } => {
                PortcullisError::Build(BuildError::OutOfMemory {
                    context: context.to_owned(),
                })
            }
            GroupingError::InvalidRange { low, high } => {
                PortcullisError::Parse(ParseError::InvalidPortRange {
                    input: format!("{low}:{high}"),
                    reason: "low bound exceeds high bound".to_owned(),
                })
            }
            GroupingError::SignatureValidation { sid, reason } => {
                PortcullisError::Build(BuildError::Signature { sid, reason })
            }
            GroupingError::Config { field, reason } => {
                PortcullisError::Config(ConfigError::InvalidValue { field, reason })
            }
            GroupingError::Io(e) => PortcullisError::Io(e),
            other @ GroupingError::SignatureLoad { .. } => {
                PortcullisError::Build(BuildError::Aborted(other.to_string()))
            }
        }
    }
}
