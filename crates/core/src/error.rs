//! 에러 타입 -- 도메인별 에러 정의

/// Portcullis 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum PortcullisError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 탐지 엔진 빌드 에러
    #[error("build error: {0}")]
    Build(#[from] BuildError),

    /// 파싱 에러
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 탐지 엔진 (재)빌드 에러
///
/// 빌드 도중 발생한 에러는 현재 빌드만 중단시키며,
/// 이미 게시된 이전 빌드 결과에는 영향을 주지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// 메모리 할당 실패
    #[error("out of memory while {context}")]
    OutOfMemory { context: String },

    /// 입력 시그니처 검증 실패
    #[error("signature {sid}: {reason}")]
    Signature { sid: u32, reason: String },

    /// 빌드 중단
    #[error("build aborted: {0}")]
    Aborted(String),
}

/// 파싱 에러
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// 잘못된 포트 또는 포트 범위 표기
    #[error("invalid port range '{input}': {reason}")]
    InvalidPortRange { input: String, reason: String },

    /// 알 수 없는 키워드 값
    #[error("unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },
}
