//! 세그먼트 정의
//!
//! 데이터그램 하나 = `[seq: 8바이트 LE][payload]`
//! - seq: GET 요청 하나 안에서만 유효, 0부터 시작
//! - 재전송 시 같은 seq, 같은 payload

use bytes::{BufMut, Bytes, BytesMut};

use crate::SEQ_HEADER_LEN;

/// 시퀀스 번호 (요청 단위)
pub type SeqNum = u64;

/// 세그먼트 (데이터그램 단위)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// 시퀀스 번호
    pub seq: SeqNum,

    /// 파일 데이터
    pub payload: Bytes,
}

impl Segment {
    pub fn new(seq: SeqNum, payload: Bytes) -> Self {
        Self { seq, payload }
    }

    /// 인코딩된 크기
    pub fn encoded_len(&self) -> usize {
        SEQ_HEADER_LEN + self.payload.len()
    }

    /// 세그먼트를 바이트로 직렬화
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u64_le(self.seq);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }

    /// 바이트에서 세그먼트 역직렬화
    ///
    /// 헤더보다 짧으면 None. 빈 payload는 허용.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < SEQ_HEADER_LEN {
            return None;
        }

        let (header, payload) = bytes.split_at(SEQ_HEADER_LEN);
        let seq = u64::from_le_bytes(header.try_into().ok()?);

        Some(Self {
            seq,
            payload: Bytes::copy_from_slice(payload),
        })
    }
}
