//! 청크 워커 (클라이언트측)
//!
//! 전용 소켓 하나로 구간 하나를 받아옴
//! - GET 전송 후 세그먼트 수신 -> 즉시 ACK -> 영역에 기록
//! - 타임아웃은 재시도 횟수로 제한, 초과하면 청크 실패
//! - 재전송된 세그먼트(seq < expected)는 ACK만 다시 보내고 기록하지 않음

use std::cmp::Ordering;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::message::{AckMessage, Reply, Request};
use crate::planner::{ChunkAssignment, Region};
use crate::segment::{Segment, SeqNum};
use crate::stats::WorkerStats;
use crate::{Config, Error, Result};

/// 수신 버퍼 크기 (UDP 최대)
const RECV_BUFFER_SIZE: usize = 65535;

/// 서버 주소 계열에 맞는 임시 포트로 바인딩 후 connect
///
/// connect된 소켓은 다른 주소에서 온 데이터그램을 받지 않음.
/// 서버가 `0.0.0.0`에 바인딩된 멀티홈 호스트면 다른 인터페이스 주소로 응답할 수
/// 있으므로 서버 목록에는 실제 응답 주소를 적어야 함.
pub(crate) async fn bind_connected(server: SocketAddr) -> Result<UdpSocket> {
    let local: SocketAddr = if server.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };

    let socket = UdpSocket::bind(local).await?;
    socket.connect(server).await?;
    Ok(socket)
}

/// 청크 워커
pub struct ChunkWorker {
    assignment: ChunkAssignment,
    region: Region,
    config: Config,
}

impl ChunkWorker {
    /// 배정과 영역 길이가 다르면 파티션 에러
    pub fn new(assignment: ChunkAssignment, region: Region, config: Config) -> Result<Self> {
        if region.len() as u64 != assignment.length || region.offset() != assignment.offset {
            return Err(Error::Partition(format!(
                "region {}+{} does not match chunk {} ({}+{})",
                region.offset(),
                region.len(),
                assignment.index,
                assignment.offset,
                assignment.length
            )));
        }

        Ok(Self {
            assignment,
            region,
            config,
        })
    }

    pub fn assignment(&self) -> &ChunkAssignment {
        &self.assignment
    }

    /// 구간 전체 수신 (성공 시 채워진 영역 반환)
    pub async fn run(mut self) -> Result<(Region, WorkerStats)> {
        let mut stats = WorkerStats::new();
        let index = self.assignment.index;
        let server = self.assignment.server;
        let length = self.assignment.length;

        let socket = bind_connected(server).await?;
        let request = Request::Get {
            filename: self.assignment.filename.clone(),
            offset: self.assignment.offset,
            length,
        }
        .to_bytes();

        socket.send(&request).await?;
        debug!(
            "chunk {}: GET {} {} {} -> {}",
            index, self.assignment.filename, self.assignment.offset, length, server
        );

        let recv_timeout = self.config.recv_timeout();
        let max_retries = self.config.max_retries;
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let mut expected: SeqNum = 0;
        let mut written: u64 = 0;
        let mut retries: u32 = 0;

        while written < length {
            let len = match tokio::time::timeout(recv_timeout, socket.recv(&mut buf)).await {
                Ok(Ok(len)) => len,
                Ok(Err(e)) => {
                    retries += 1;
                    warn!(
                        "chunk {}: 수신 에러 ({}/{}): {}",
                        index, retries, max_retries, e
                    );
                    if retries > max_retries {
                        return Err(Error::Io(e));
                    }
                    // ICMP 에러가 연속되면 바로 돌아오므로 잠시 대기
                    tokio::time::sleep(recv_timeout).await;
                    continue;
                }
                Err(_) => {
                    retries += 1;
                    stats.timeouts += 1;
                    warn!(
                        "chunk {}: Retry {}/{} (offset {}, remaining {} bytes)",
                        index,
                        retries,
                        max_retries,
                        self.assignment.offset,
                        length - written
                    );
                    if retries > max_retries {
                        return Err(Error::timeout(format!(
                            "chunk {} from {} after {} retries",
                            index, server, max_retries
                        )));
                    }

                    // 첫 세그먼트 전이면 요청 자체가 유실됐을 수 있음
                    if expected == 0 && self.config.resend_request {
                        if let Err(e) = socket.send(&request).await {
                            warn!("chunk {}: GET 재전송 실패: {}", index, e);
                        } else {
                            stats.request_resends += 1;
                        }
                    }
                    continue;
                }
            };

            let datagram = &buf[..len];
            let segment = match Segment::from_bytes(datagram) {
                Some(segment) => segment,
                None => {
                    debug!("chunk {}: 짧은 데이터그램 무시 ({} bytes)", index, len);
                    continue;
                }
            };

            match segment.seq.cmp(&expected) {
                Ordering::Less => {
                    // 이전 ACK 유실로 서버가 재전송한 세그먼트
                    retries = 0;
                    stats.duplicates += 1;
                    debug!(
                        "chunk {}: 중복 세그먼트 seq={} (expected {}), ACK 재전송",
                        index, segment.seq, expected
                    );
                    self.send_ack(&socket, segment.seq).await;
                    continue;
                }
                Ordering::Greater => {
                    if Reply::is_error(datagram) {
                        let reply = Reply::parse(datagram)?;
                        warn!("chunk {}: 서버 에러 응답: {:?}", index, reply);
                        return match reply.into_result(&self.assignment.filename) {
                            Err(e) => Err(e),
                            Ok(_) => Err(Error::MalformedMessage(
                                "unexpected OK reply to GET".into(),
                            )),
                        };
                    }
                    return Err(Error::SequenceMismatch {
                        expected,
                        got: segment.seq,
                    });
                }
                Ordering::Equal => {}
            }

            retries = 0;
            self.send_ack(&socket, segment.seq).await;

            let payload_len = segment.payload.len();
            let remaining = length - written;
            if payload_len as u64 > remaining {
                return Err(Error::PayloadOverflow {
                    payload: payload_len,
                    remaining,
                });
            }

            self.region.write_at(written as usize, &segment.payload)?;

            written += payload_len as u64;
            expected += 1;
            stats.segments += 1;
            stats.bytes += payload_len as u64;

            debug!(
                "chunk {}: seq={} payload={} remaining={}",
                index,
                segment.seq,
                payload_len,
                length - written
            );
        }

        stats.finish();
        info!("chunk {} 완료 ({}): {}", index, server, stats.summary());

        Ok((self.region, stats))
    }

    /// ACK 전송 (실패해도 서버 재전송으로 복구되므로 로그만)
    async fn send_ack(&self, socket: &UdpSocket, seq: SeqNum) {
        if let Err(e) = socket.send(&AckMessage::new(seq).to_bytes()).await {
            warn!(
                "chunk {}: ACK 전송 실패 seq={}: {}",
                self.assignment.index, seq, e
            );
        }
    }
}
