//! 프로토콜 설정
//!
//! 모든 타임아웃은 고정값 (적응형 아님)

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, DEFAULT_DATAGRAM_SIZE, SEQ_HEADER_LEN};

/// SCT 프로토콜 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 데이터그램 최대 크기 (시퀀스 헤더 포함, 바이트)
    pub datagram_size: usize,

    /// [서버] ACK 대기 타임아웃 (밀리초)
    pub ack_timeout_ms: u64,

    /// [서버] 세그먼트당 최대 재전송 횟수
    /// 초과하면 전송 포기
    pub max_retransmits: u32,

    /// [서버] ACK 큐 용량
    /// 가득 차면 새 ACK는 조용히 버려짐
    pub ack_queue_capacity: usize,

    /// [서버] 동시 처리 요청 수 상한
    pub max_active_transfers: usize,

    /// [클라이언트] 수신 대기 타임아웃 (밀리초)
    pub recv_timeout_ms: u64,

    /// [클라이언트] 연속 타임아웃 허용 횟수
    pub max_retries: u32,

    /// [클라이언트] 첫 세그먼트 수신 전 타임아웃 시 GET 재전송 여부
    pub resend_request: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            datagram_size: DEFAULT_DATAGRAM_SIZE,
            ack_timeout_ms: 1000,       // 1초
            max_retransmits: 10,
            ack_queue_capacity: 64,
            max_active_transfers: 256,
            recv_timeout_ms: 5000,      // 5초
            max_retries: 5,
            resend_request: true,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// TOML 파일에서 설정 로드 (없는 항목은 기본값)
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<()> {
        if self.datagram_size <= SEQ_HEADER_LEN {
            return Err(Error::InvalidConfig(format!(
                "datagram_size {} must exceed the {}-byte sequence header",
                self.datagram_size, SEQ_HEADER_LEN
            )));
        }
        if self.datagram_size > 65507 {
            return Err(Error::InvalidConfig(format!(
                "datagram_size {} exceeds the UDP payload limit",
                self.datagram_size
            )));
        }
        if self.ack_queue_capacity == 0 {
            return Err(Error::InvalidConfig("ack_queue_capacity must be > 0".into()));
        }
        if self.max_active_transfers == 0 {
            return Err(Error::InvalidConfig("max_active_transfers must be > 0".into()));
        }
        if self.ack_timeout_ms == 0 || self.recv_timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be > 0".into()));
        }
        Ok(())
    }

    /// 세그먼트당 최대 페이로드 크기
    pub fn payload_size(&self) -> usize {
        self.datagram_size - SEQ_HEADER_LEN
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    /// 저지연 LAN용 설정
    pub fn low_latency() -> Self {
        Self {
            datagram_size: 1400,
            ack_timeout_ms: 100,
            max_retransmits: 20,
            ack_queue_capacity: 256,
            max_active_transfers: 512,
            recv_timeout_ms: 1000,
            max_retries: 5,
            resend_request: true,
        }
    }

    /// 불안정한 네트워크용 설정
    pub fn unstable_network() -> Self {
        Self {
            datagram_size: 512,             // 작은 데이터그램
            ack_timeout_ms: 2000,
            max_retransmits: 30,
            ack_queue_capacity: 128,
            max_active_transfers: 128,
            recv_timeout_ms: 10000,
            max_retries: 10,
            resend_request: true,
        }
    }
}

/// 서버 목록 파싱
///
/// 한 줄에 `<host> <port>` 하나. 빈 줄과 `#` 주석은 무시.
pub fn parse_server_list(text: &str) -> Result<Vec<(String, u16)>> {
    let mut servers = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let (host, port) = match (parts.next(), parts.next(), parts.next()) {
            (Some(host), Some(port), None) => (host, port),
            _ => {
                return Err(Error::InvalidConfig(format!(
                    "server list line {}: expected `<host> <port>`",
                    line_no + 1
                )))
            }
        };

        let port: u16 = port.parse().map_err(|_| {
            Error::InvalidConfig(format!(
                "server list line {}: invalid port `{}`",
                line_no + 1,
                port
            ))
        })?;

        servers.push((host.to_string(), port));
    }

    if servers.is_empty() {
        return Err(Error::NoServers);
    }

    Ok(servers)
}
