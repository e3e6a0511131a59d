//! 전송 핸들러 (서버측)
//!
//! 요청 하나를 자기 태스크에서 처리
//! - CHECK: 파일 크기 응답
//! - GET: stop-and-wait 전송, 세그먼트마다 ACK 확인 후 다음 세그먼트
//!
//! 상태: Opening -> Streaming -> Completed | Failed

use std::fmt;
use std::io::SeekFrom;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::message::{Reply, Request};
use crate::router::AckRouter;
use crate::segment::{Segment, SeqNum};
use crate::stats::ServerStats;
use crate::{Config, Error, Result};

/// 핸들러 공유 자원 (디스패처가 생성)
pub struct HandlerContext {
    /// 디스패처 소켓 (송신 공유, send_to는 &self)
    pub socket: Arc<UdpSocket>,
    pub router: Arc<AckRouter>,
    /// 파일 루트 디렉터리
    pub root: PathBuf,
    pub config: Config,
    pub stats: Arc<ServerStats>,
}

/// 핸들러 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandlerState {
    Opening,
    Streaming { seq: SeqNum, sent: u64 },
    Completed,
    Failed,
}

impl fmt::Display for HandlerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerState::Opening => write!(f, "opening"),
            HandlerState::Streaming { seq, sent } => write!(f, "streaming(seq={}, sent={})", seq, sent),
            HandlerState::Completed => write!(f, "completed"),
            HandlerState::Failed => write!(f, "failed"),
        }
    }
}

/// 핸들러 처리 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// CHECK 응답 완료
    Checked { size: u64 },
    /// CHECK 대상 파일 없음
    NotFound,
    /// GET 전송 완료
    Streamed {
        bytes: u64,
        segments: u64,
        retransmissions: u64,
        /// 마지막 세그먼트 ACK 확인 여부
        confirmed: bool,
    },
}

/// 요청 하나를 처리하는 핸들러
pub struct TransferHandler {
    ctx: Arc<HandlerContext>,
    request: Request,
    origin: SocketAddr,
    state: HandlerState,
    retransmissions: u64,
}

impl TransferHandler {
    pub fn new(ctx: Arc<HandlerContext>, request: Request, origin: SocketAddr) -> Self {
        Self {
            ctx,
            request,
            origin,
            state: HandlerState::Opening,
            retransmissions: 0,
        }
    }

    /// 요청 처리
    pub async fn run(mut self) -> Result<HandlerOutcome> {
        let result = match self.request.clone() {
            Request::Check { filename } => self.check(&filename).await,
            Request::Get {
                filename,
                offset,
                length,
            } => self.get(&filename, offset, length).await,
        };

        self.settle(&result);
        debug!("핸들러 종료: origin={}, state={}", self.origin, self.state);

        result
    }

    /// 결과에 따라 최종 상태 확정
    fn settle(&mut self, result: &Result<HandlerOutcome>) {
        self.state = match result {
            Ok(_) => HandlerState::Completed,
            Err(_) => HandlerState::Failed,
        };
    }

    async fn check(&mut self, filename: &str) -> Result<HandlerOutcome> {
        info!("CHECK {} from {}", filename, self.origin);

        let file = match self.open(filename).await? {
            Some(file) => file,
            None => {
                self.reply(Reply::not_found()).await?;
                info!("파일 없음: {}", filename);
                return Ok(HandlerOutcome::NotFound);
            }
        };

        let size = file.metadata().await?.len();
        self.reply(Reply::Ok { size }).await?;
        debug!("CHECK 응답: OK {} -> {}", size, self.origin);

        Ok(HandlerOutcome::Checked { size })
    }

    async fn get(&mut self, filename: &str, offset: u64, length: u64) -> Result<HandlerOutcome> {
        info!(
            "GET {} (offset={}, length={}) from {}",
            filename, offset, length, self.origin
        );

        let mut file = match self.open(filename).await? {
            Some(file) => file,
            None => {
                self.reply(Reply::not_found()).await?;
                return Err(Error::NotFound {
                    filename: filename.to_string(),
                });
            }
        };

        let file_size = file.metadata().await?.len();
        if !range_is_valid(offset, length, file_size) {
            warn!(
                "잘못된 범위 요청: offset={}, length={}, file_size={}, origin={}",
                offset, length, file_size, self.origin
            );
            self.reply(Reply::invalid_range()).await?;
            return Err(Error::InvalidRange {
                offset,
                length,
                file_size,
            });
        }

        file.seek(SeekFrom::Start(offset)).await?;

        let payload_size = self.ctx.config.payload_size();
        let mut remaining = length;
        let mut seq: SeqNum = 0;
        let mut sent: u64 = 0;
        let mut confirmed = true;

        while remaining > 0 {
            self.state = HandlerState::Streaming { seq, sent };

            let want = remaining.min(payload_size as u64) as usize;
            let payload = read_up_to(&mut file, want).await?;
            if payload.is_empty() {
                // 파일이 요청보다 짧아짐: 에러 없이 종료
                info!(
                    "파일 끝 도달: offset={}, remaining={} bytes",
                    offset + sent,
                    remaining
                );
                break;
            }

            let payload_len = payload.len() as u64;
            let is_last = payload_len == remaining;
            let segment = Segment::new(seq, payload);

            match self.send_until_acked(&segment).await {
                Ok(()) => {}
                Err(Error::Timeout { what }) if is_last => {
                    // 클라이언트는 이미 전부 받고 종료했을 수 있음
                    info!(
                        "마지막 세그먼트 ACK 미확인, 전송 종료: seq={}, origin={} ({})",
                        seq, self.origin, what
                    );
                    ServerStats::incr(&self.ctx.stats.unconfirmed);
                    confirmed = false;
                }
                Err(e) => return Err(e),
            }

            ServerStats::add(&self.ctx.stats.bytes_sent, payload_len);
            remaining -= payload_len;
            sent += payload_len;
            seq += 1;
        }

        info!(
            "전송 완료: {} bytes, {} segments, {} retransmissions -> {}",
            sent, seq, self.retransmissions, self.origin
        );

        Ok(HandlerOutcome::Streamed {
            bytes: sent,
            segments: seq,
            retransmissions: self.retransmissions,
            confirmed,
        })
    }

    /// 세그먼트 전송 후 ACK 대기, 타임아웃이면 같은 세그먼트 재전송
    async fn send_until_acked(&mut self, segment: &Segment) -> Result<()> {
        let datagram = segment.to_bytes();
        let max_retransmits = self.ctx.config.max_retransmits;
        let ack_timeout = self.ctx.config.ack_timeout();
        let mut attempts: u32 = 0;
        let mut last_io_error = None;

        loop {
            match self.ctx.socket.send_to(&datagram, self.origin).await {
                Ok(_) => {
                    ServerStats::incr(&self.ctx.stats.segments_sent);
                    if attempts > 0 {
                        ServerStats::incr(&self.ctx.stats.retransmissions);
                        self.retransmissions += 1;
                    }

                    if self
                        .ctx
                        .router
                        .await_match(segment.seq, self.origin, ack_timeout)
                        .await
                        .is_some()
                    {
                        debug!("ACK 확인: seq={}, origin={}", segment.seq, self.origin);
                        return Ok(());
                    }
                }
                Err(e) => {
                    warn!("세그먼트 전송 실패: seq={}, {}", segment.seq, e);
                    last_io_error = Some(e);
                    tokio::time::sleep(ack_timeout).await;
                }
            }

            attempts += 1;
            if attempts > max_retransmits {
                debug!(
                    "재전송 한도 초과: seq={}, origin={}",
                    segment.seq, self.origin
                );
                return Err(match last_io_error {
                    Some(e) => Error::Io(e),
                    None => Error::timeout(format!(
                        "ACK for seq {} from {} after {} retransmissions",
                        segment.seq, self.origin, max_retransmits
                    )),
                });
            }

            debug!(
                "재전송: seq={}, attempt={}/{}, origin={}",
                segment.seq, attempts, max_retransmits, self.origin
            );
        }
    }

    /// 파일 열기, 없거나 루트 밖이면 None
    async fn open(&self, filename: &str) -> Result<Option<File>> {
        let path = match resolve_path(&self.ctx.root, filename) {
            Ok(path) => path,
            Err(e) => {
                warn!("요청 거부 ({}): {}", self.origin, e);
                return Ok(None);
            }
        };

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) => {
                debug!("파일 열기 실패: {:?}: {}", path, e);
                return Ok(None);
            }
        };

        if file.metadata().await?.is_dir() {
            return Ok(None);
        }

        Ok(Some(file))
    }

    async fn reply(&self, reply: Reply) -> Result<()> {
        self.ctx.socket.send_to(&reply.to_bytes(), self.origin).await?;
        Ok(())
    }
}

/// offset < size, offset + length <= size (오버플로우 검사 포함)
pub fn range_is_valid(offset: u64, length: u64, file_size: u64) -> bool {
    offset < file_size
        && offset
            .checked_add(length)
            .map_or(false, |end| end <= file_size)
}

/// 루트 밖 경로 요청 거부
pub fn resolve_path(root: &Path, filename: &str) -> Result<PathBuf> {
    let requested = Path::new(filename);
    let confined = requested
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));

    if filename.is_empty() || !confined {
        return Err(Error::MalformedMessage(format!(
            "filename `{}` escapes the serving root",
            filename
        )));
    }

    Ok(root.join(requested))
}

async fn read_up_to(file: &mut File, want: usize) -> Result<Bytes> {
    let mut buf = BytesMut::zeroed(want);
    let mut filled = 0;

    while filled < want {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    buf.truncate(filled);
    Ok(buf.freeze())
}
