//! # SCT (Sequenced Chunk Transfer)
//!
//! UDP 기반 ACK 확인형 청크 파일 전송 프로토콜
//!
//! ## 핵심 특징
//! - **Stop-and-wait**: 세그먼트마다 ACK 확인 후 다음 세그먼트 전송
//! - **ACK 라우팅**: 서버 소켓 하나로 여러 요청의 ACK를 seq + origin으로 분배
//! - **청크 분할**: 파일을 연속 구간으로 나눠 워커별 전용 소켓으로 병렬 수신
//! - **멀티 서버**: 구간을 서버 목록에 라운드로빈 배정
//! - **제한된 재시도**: 서버 재전송, 클라이언트 수신 모두 상한 있음

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod message;
pub mod planner;
pub mod router;
pub mod segment;
pub mod stats;
pub mod worker;

pub use client::{ChunkReport, Download, Downloader};
pub use config::Config;
pub use dispatcher::{Dispatcher, ServerHandle};
pub use error::{ChunkFailure, Error, Result};
pub use handler::{HandlerContext, HandlerOutcome, TransferHandler};
pub use message::{AckMessage, Inbound, Reply, Request};
pub use planner::{ChunkAssignment, Region};
pub use router::{Ack, AckRouter};
pub use segment::{Segment, SeqNum};
pub use stats::{ServerStats, WorkerStats};
pub use worker::ChunkWorker;

/// 기본 데이터그램 크기 (바이트, 헤더 포함)
pub const DEFAULT_DATAGRAM_SIZE: usize = 1024;

/// 시퀀스 번호 헤더 크기 (바이트)
pub const SEQ_HEADER_LEN: usize = 8;
