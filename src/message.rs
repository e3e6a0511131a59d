//! 프로토콜 메시지 정의
//!
//! 제어 메시지는 공백 구분 텍스트 (개행 없음), 데이터는 바이너리 세그먼트
//!
//! ```text
//! CHECK <filename>                   -> OK <size> | ERROR File not found
//! GET <filename> <offset> <length>   -> Segment* | ERROR <reason>
//! ACK <seq>                          (클라이언트 -> 서버)
//! ```

use std::fmt;

use bytes::Bytes;

use crate::segment::SeqNum;
use crate::{Error, Result};

/// 파일 없음 응답 사유
pub const REASON_NOT_FOUND: &str = "File not found";

/// 잘못된 범위 응답 사유
pub const REASON_INVALID_RANGE: &str = "Invalid range";

/// 클라이언트 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// 파일 존재 확인 + 크기 조회
    Check { filename: String },

    /// 바이트 범위 요청
    Get {
        filename: String,
        offset: u64,
        length: u64,
    },
}

impl Request {
    pub fn filename(&self) -> &str {
        match self {
            Request::Check { filename } | Request::Get { filename, .. } => filename,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.to_string())
    }

    /// 텍스트 요청 파싱
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = decode_text(bytes)?;
        let mut parts = text.split_whitespace();

        let request = match parts.next() {
            Some("CHECK") => Request::Check {
                filename: next_field(&mut parts, "filename")?.to_string(),
            },
            Some("GET") => Request::Get {
                filename: next_field(&mut parts, "filename")?.to_string(),
                offset: parse_number(next_field(&mut parts, "offset")?, "offset")?,
                length: parse_number(next_field(&mut parts, "length")?, "length")?,
            },
            Some(other) => {
                return Err(Error::MalformedMessage(format!("unknown command `{}`", other)))
            }
            None => return Err(Error::MalformedMessage("empty datagram".into())),
        };

        if parts.next().is_some() {
            return Err(Error::MalformedMessage(format!("trailing fields in `{}`", text)));
        }

        Ok(request)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Check { filename } => write!(f, "CHECK {}", filename),
            Request::Get {
                filename,
                offset,
                length,
            } => write!(f, "GET {} {} {}", filename, offset, length),
        }
    }
}

/// ACK 메시지 (세그먼트 수신 확인)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckMessage {
    pub seq: SeqNum,
}

impl AckMessage {
    pub fn new(seq: SeqNum) -> Self {
        Self { seq }
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(format!("ACK {}", self.seq))
    }

    /// ACK 접두어 확인 (파싱 전 빠른 분류용)
    pub fn is_ack(bytes: &[u8]) -> bool {
        bytes.starts_with(b"ACK")
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = decode_text(bytes)?;
        let mut parts = text.split_whitespace();

        if parts.next() != Some("ACK") {
            return Err(Error::MalformedMessage(format!("not an ACK: `{}`", text)));
        }
        let seq = parse_number(next_field(&mut parts, "seq")?, "seq")?;
        if parts.next().is_some() {
            return Err(Error::MalformedMessage(format!("trailing fields in `{}`", text)));
        }

        Ok(Self { seq })
    }
}

/// 서버 응답 (CHECK 결과 또는 에러)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok { size: u64 },
    Error(String),
}

impl Reply {
    pub fn not_found() -> Self {
        Reply::Error(REASON_NOT_FOUND.to_string())
    }

    pub fn invalid_range() -> Self {
        Reply::Error(REASON_INVALID_RANGE.to_string())
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            Reply::Ok { size } => Bytes::from(format!("OK {}", size)),
            Reply::Error(reason) => Bytes::from(format!("ERROR {}", reason)),
        }
    }

    /// 에러 응답 접두어 확인
    pub fn is_error(bytes: &[u8]) -> bool {
        bytes.starts_with(b"ERROR ")
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = decode_text(bytes)?;

        if let Some(reason) = text.strip_prefix("ERROR ") {
            return Ok(Reply::Error(reason.trim().to_string()));
        }

        let mut parts = text.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some("OK"), Some(size), None) => Ok(Reply::Ok {
                size: parse_number(size, "size")?,
            }),
            _ => Err(Error::MalformedMessage(format!("unexpected reply `{}`", text))),
        }
    }

    /// 응답을 결과로 변환 (OK면 크기)
    pub fn into_result(self, filename: &str) -> Result<u64> {
        match self {
            Reply::Ok { size } => Ok(size),
            Reply::Error(reason) if reason == REASON_NOT_FOUND => Err(Error::NotFound {
                filename: filename.to_string(),
            }),
            Reply::Error(reason) => Err(Error::Rejected(reason)),
        }
    }
}

/// 서버 수신 데이터그램 분류
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Ack(AckMessage),
    Request(Request),
}

impl Inbound {
    /// ACK 먼저 확인, 아니면 요청으로 파싱
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if AckMessage::is_ack(bytes) {
            AckMessage::parse(bytes).map(Inbound::Ack)
        } else {
            Request::parse(bytes).map(Inbound::Request)
        }
    }
}

fn decode_text(bytes: &[u8]) -> Result<&str> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| Error::MalformedMessage("control message is not UTF-8".into()))?;
    // NUL 종료, 개행 허용
    Ok(text.trim_end_matches(|c: char| c == '\0' || c.is_ascii_whitespace()))
}

fn next_field<'a>(parts: &mut impl Iterator<Item = &'a str>, name: &str) -> Result<&'a str> {
    parts
        .next()
        .ok_or_else(|| Error::MalformedMessage(format!("missing {}", name)))
}

fn parse_number(field: &str, name: &str) -> Result<u64> {
    field
        .parse()
        .map_err(|_| Error::MalformedMessage(format!("invalid {} `{}`", name, field)))
}
