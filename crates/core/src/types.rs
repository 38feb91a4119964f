//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 포트 범위, 프로토콜, 방향, 시그니처 ID 등
//! 빌더와 런타임 디스패치 구조가 공유하는 데이터 구조를 정의합니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// 폐구간 포트 범위 `[low, high]`
///
/// 불변식: `low <= high`. 단일 포트는 `low == high`로 표현하며
/// 최대 범위는 `[0, 65535]` 입니다.
///
/// 문자열 표기는 `any`, `80`, `80:90`, `1024:` (65535까지), `:1024` (0부터)를 지원합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortRange {
    low: u16,
    high: u16,
}

impl PortRange {
    /// 전체 포트 공간 `[0, 65535]`
    pub const ANY: PortRange = PortRange {
        low: 0,
        high: u16::MAX,
    };

    /// 새 포트 범위를 생성합니다.
    ///
    /// # Errors
    /// `low > high`이면 [`ParseError::InvalidPortRange`]를 반환합니다.
    pub fn new(low: u16, high: u16) -> Result<Self, ParseError> {
        if low > high {
            return Err(ParseError::InvalidPortRange {
                input: format!("{low}:{high}"),
                reason: "low bound exceeds high bound".to_owned(),
            });
        }
        Ok(Self { low, high })
    }

    /// 단일 포트 범위 `[port, port]`
    pub const fn single(port: u16) -> Self {
        Self {
            low: port,
            high: port,
        }
    }

    /// 하한 (포함)
    pub const fn low(&self) -> u16 {
        self.low
    }

    /// 상한 (포함)
    pub const fn high(&self) -> u16 {
        self.high
    }

    /// 포트가 범위에 포함되는지 확인합니다.
    pub const fn contains(&self, port: u16) -> bool {
        self.low <= port && port <= self.high
    }

    /// 두 범위가 교차하는지 확인합니다 (`a <= d && c <= b`).
    pub const fn intersects(&self, other: &PortRange) -> bool {
        self.overlaps(other.low, other.high)
    }

    /// `[low, high]` 질의 범위와 교차하는지 확인합니다.
    ///
    /// 질의 범위의 유효성(`low <= high`)은 검사하지 않습니다.
    pub const fn overlaps(&self, low: u16, high: u16) -> bool {
        self.low <= high && low <= self.high
    }

    /// 범위에 포함된 포트 수 (1 ~ 65536)
    pub fn port_count(&self) -> u32 {
        u32::from(self.high) - u32::from(self.low) + 1
    }

    /// 단일 포트 범위인지 확인합니다.
    pub const fn is_single(&self) -> bool {
        self.low == self.high
    }

    /// 전체 포트 공간인지 확인합니다.
    pub const fn is_any(&self) -> bool {
        self.low == 0 && self.high == u16::MAX
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            write!(f, "any")
        } else if self.is_single() {
            write!(f, "{}", self.low)
        } else {
            write!(f, "{}:{}", self.low, self.high)
        }
    }
}

impl FromStr for PortRange {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.eq_ignore_ascii_case("any") {
            return Ok(Self::ANY);
        }

        let parse_port = |part: &str| -> Result<u16, ParseError> {
            part.trim()
                .parse::<u16>()
                .map_err(|e| ParseError::InvalidPortRange {
                    input: input.to_owned(),
                    reason: format!("'{}': {e}", part.trim()),
                })
        };

        match input.split_once(':') {
            None => parse_port(input).map(Self::single),
            Some((lo, hi)) => {
                let low = if lo.trim().is_empty() { 0 } else { parse_port(lo)? };
                let high = if hi.trim().is_empty() {
                    u16::MAX
                } else {
                    parse_port(hi)?
                };
                if lo.trim().is_empty() && hi.trim().is_empty() {
                    return Err(ParseError::InvalidPortRange {
                        input: input.to_owned(),
                        reason: "both bounds are empty".to_owned(),
                    });
                }
                Self::new(low, high).map_err(|_| ParseError::InvalidPortRange {
                    input: input.to_owned(),
                    reason: "low bound exceeds high bound".to_owned(),
                })
            }
        }
    }
}

impl TryFrom<String> for PortRange {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PortRange> for String {
    fn from(range: PortRange) -> Self {
        range.to_string()
    }
}

/// 전송 계층 프로토콜
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
}

impl Protocol {
    /// 소문자 이름
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(ParseError::UnknownValue {
                kind: "protocol",
                value: other.to_owned(),
            }),
        }
    }
}

/// 포트 그룹이 만들어지는 흐름 방향
///
/// to-server 그룹은 시그니처의 목적지 포트, to-client 그룹은 출발지 포트를 기준으로 합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// 클라이언트 -> 서버
    ToServer,
    /// 서버 -> 클라이언트
    ToClient,
}

impl Direction {
    /// snake_case 이름
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ToServer => "to_server",
            Self::ToClient => "to_client",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "to_server" | "toserver" => Ok(Self::ToServer),
            "to_client" | "toclient" => Ok(Self::ToClient),
            other => Err(ParseError::UnknownValue {
                kind: "direction",
                value: other.to_owned(),
            }),
        }
    }
}

/// 시그니처가 검사하는 흐름 방향
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowDirection {
    /// to-server 흐름만
    ToServer,
    /// to-client 흐름만
    ToClient,
    /// 양방향 (기본값)
    #[default]
    Both,
}

impl FlowDirection {
    /// 이 흐름 방향이 주어진 그룹 방향에 적용되는지 확인합니다.
    pub const fn covers(&self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (Self::Both, _)
                | (Self::ToServer, Direction::ToServer)
                | (Self::ToClient, Direction::ToClient)
        )
    }
}

/// 시그니처 ID (sid)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SignatureId(pub u32);

impl fmt::Display for SignatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
