//! 설정 관리 -- portcullis.toml 파싱 및 런타임 설정
//!
//! [`PortcullisConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`PORTCULLIS_GROUPING_PROFILE=high` 형식)
//! 3. 설정 파일 (`portcullis.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), portcullis_core::error::PortcullisError> {
//! use portcullis_core::config::PortcullisConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = PortcullisConfig::load("portcullis.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = PortcullisConfig::parse("[grouping]\nprofile = \"high\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, PortcullisError};
use crate::types::{Direction, Protocol};

/// Portcullis 통합 설정
///
/// `portcullis.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortcullisConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 포트 그룹화 설정
    #[serde(default)]
    pub grouping: GroupingConfig,
    /// 시그니처 인벤토리 설정
    #[serde(default)]
    pub signatures: SignaturesConfig,
}

impl PortcullisConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PortcullisError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, PortcullisError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PortcullisError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                PortcullisError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, PortcullisError> {
        toml::from_str(toml_str).map_err(|e| {
            PortcullisError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `PORTCULLIS_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "PORTCULLIS_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "PORTCULLIS_GENERAL_LOG_FORMAT");

        // Grouping
        override_string(&mut self.grouping.profile, "PORTCULLIS_GROUPING_PROFILE");
        override_usize(
            &mut self.grouping.toclient_groups,
            "PORTCULLIS_GROUPING_TOCLIENT_GROUPS",
        );
        override_usize(
            &mut self.grouping.toserver_groups,
            "PORTCULLIS_GROUPING_TOSERVER_GROUPS",
        );
        override_ports(
            &mut self.grouping.tcp_whitelist,
            "PORTCULLIS_GROUPING_TCP_WHITELIST",
        );
        override_ports(
            &mut self.grouping.udp_whitelist,
            "PORTCULLIS_GROUPING_UDP_WHITELIST",
        );

        // Signatures
        override_string(&mut self.signatures.path, "PORTCULLIS_SIGNATURES_PATH");
        override_usize(
            &mut self.signatures.max_signatures,
            "PORTCULLIS_SIGNATURES_MAX_SIGNATURES",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), PortcullisError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        self.grouping.validate()?;

        if self.signatures.max_signatures == 0 {
            return Err(ConfigError::InvalidValue {
                field: "signatures.max_signatures".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 포트 그룹 수 상한 프로파일
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingProfile {
    /// 적은 메모리, 적은 그룹
    Low,
    /// 기본값
    Medium,
    /// 많은 그룹, 빠른 디스패치
    High,
    /// `toclient_groups` / `toserver_groups` 값을 그대로 사용
    Custom,
}

impl GroupingProfile {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// 방향별 최대 포트 그룹 수
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLimits {
    /// to-client 방향 최대 그룹 수
    pub toclient: usize,
    /// to-server 방향 최대 그룹 수
    pub toserver: usize,
}

impl GroupLimits {
    /// 방향에 해당하는 상한을 반환합니다.
    pub const fn for_direction(&self, direction: Direction) -> usize {
        match direction {
            Direction::ToServer => self.toserver,
            Direction::ToClient => self.toclient,
        }
    }
}

/// 포트 그룹화 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// 그룹 수 프로파일 (low, medium, high, custom)
    pub profile: String,
    /// custom 프로파일의 to-client 최대 그룹 수
    pub toclient_groups: usize,
    /// custom 프로파일의 to-server 최대 그룹 수
    pub toserver_groups: usize,
    /// 그룹 수 제한 시 우선 보존할 TCP 포트
    pub tcp_whitelist: Vec<u16>,
    /// 그룹 수 제한 시 우선 보존할 UDP 포트
    pub udp_whitelist: Vec<u16>,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            profile: "medium".to_owned(),
            toclient_groups: 20,
            toserver_groups: 40,
            tcp_whitelist: vec![53, 80, 139, 443, 445, 1433, 3306, 3389, 6666, 6667, 8080],
            udp_whitelist: vec![53, 135, 5060],
        }
    }
}

impl GroupingConfig {
    /// 프로파일에 따른 방향별 그룹 수 상한을 계산합니다.
    ///
    /// 알 수 없는 프로파일은 경고를 남기고 medium으로 취급합니다.
    pub fn limits(&self) -> GroupLimits {
        let profile = GroupingProfile::from_name(&self.profile).unwrap_or_else(|| {
            warn!(
                profile = %self.profile,
                "unknown grouping profile, using medium limits"
            );
            GroupingProfile::Medium
        });
        match profile {
            GroupingProfile::Low => GroupLimits {
                toclient: 15,
                toserver: 25,
            },
            GroupingProfile::Medium => GroupLimits {
                toclient: 20,
                toserver: 40,
            },
            GroupingProfile::High => GroupLimits {
                toclient: 75,
                toserver: 75,
            },
            GroupingProfile::Custom => GroupLimits {
                toclient: self.toclient_groups,
                toserver: self.toserver_groups,
            },
        }
    }

    /// 프로토콜별 우선 보존 포트 목록
    pub fn whitelist(&self, protocol: Protocol) -> &[u16] {
        match protocol {
            Protocol::Tcp => &self.tcp_whitelist,
            Protocol::Udp => &self.udp_whitelist,
        }
    }

    /// 프로파일과 custom 상한을 검증합니다.
    ///
    /// # Errors
    /// 알 수 없는 프로파일이거나 custom 상한이 0이면 [`ConfigError::InvalidValue`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Some(profile) = GroupingProfile::from_name(&self.profile) else {
            return Err(ConfigError::InvalidValue {
                field: "grouping.profile".to_owned(),
                reason: "must be one of: low, medium, high, custom".to_owned(),
            });
        };

        if profile == GroupingProfile::Custom {
            if self.toclient_groups == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "grouping.toclient_groups".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                });
            }
            if self.toserver_groups == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "grouping.toserver_groups".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                });
            }
        }

        Ok(())
    }
}

/// 시그니처 인벤토리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignaturesConfig {
    /// 시그니처 인벤토리 파일 경로 (TOML)
    pub path: String,
    /// 최대 시그니처 수
    pub max_signatures: usize,
}

impl Default for SignaturesConfig {
    fn default() -> Self {
        Self {
            path: "/etc/portcullis/signatures.toml".to_owned(),
            max_signatures: 100_000,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_ports(target: &mut Vec<u16>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        let parsed: Result<Vec<u16>, _> = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<u16>)
            .collect();
        match parsed {
            Ok(ports) => *target = ports,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse port list from env var, ignoring"
            ),
        }
    }
}
