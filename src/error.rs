//! 에러 타입 정의

use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;

/// SCT 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("설정 파일 파싱 에러: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("타임아웃: {what}")]
    Timeout { what: String },

    #[error("잘못된 메시지: {0}")]
    MalformedMessage(String),

    #[error("시퀀스 불일치: expected {expected}, got {got}")]
    SequenceMismatch { expected: u64, got: u64 },

    #[error("유효하지 않은 범위: offset={offset}, length={length}, file_size={file_size}")]
    InvalidRange {
        offset: u64,
        length: u64,
        file_size: u64,
    },

    #[error("페이로드 초과: payload={payload}, remaining={remaining}")]
    PayloadOverflow { payload: usize, remaining: u64 },

    #[error("영역 범위 초과: write {start}..{end}, region length {region_len}")]
    RegionOverflow {
        start: usize,
        end: usize,
        region_len: usize,
    },

    #[error("서버가 요청 거부: {0}")]
    Rejected(String),

    #[error("파일 없음: {filename}")]
    NotFound { filename: String },

    #[error("파티션 에러: {0}")]
    Partition(String),

    #[error("빈 파일은 전송할 수 없음")]
    EmptyFile,

    #[error("서버 없음")]
    NoServers,

    #[error("전송 미완료: {} 청크 실패", failures.len())]
    TransferIncomplete { failures: Vec<ChunkFailure> },
}

impl Error {
    /// 로컬 재시도 대상 여부 (전송 실패, 타임아웃만 해당)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Timeout { .. })
    }

    /// 프로토콜 위반 여부
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::MalformedMessage(_)
                | Error::SequenceMismatch { .. }
                | Error::InvalidRange { .. }
                | Error::PayloadOverflow { .. }
                | Error::RegionOverflow { .. }
                | Error::Rejected(_)
        )
    }

    pub(crate) fn timeout(what: impl Into<String>) -> Self {
        Error::Timeout { what: what.into() }
    }
}

/// 실패한 청크 정보
#[derive(Debug, Clone)]
pub struct ChunkFailure {
    /// 청크 인덱스
    pub index: usize,
    pub server: SocketAddr,
    pub offset: u64,
    pub length: u64,
    /// 실패 사유
    pub reason: String,
}

impl fmt::Display for ChunkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk {} ({}, offset={}, length={}): {}",
            self.index, self.server, self.offset, self.length, self.reason
        )
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
