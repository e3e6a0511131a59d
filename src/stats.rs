//! 전송 통계

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 서버 통계 (디스패처, 핸들러가 공유)
#[derive(Debug)]
pub struct ServerStats {
    start_time: Instant,
    /// 처리 시작한 요청 수
    pub requests: AtomicU64,
    /// 완료된 요청 수
    pub completed: AtomicU64,
    /// 실패한 요청 수
    pub failed: AtomicU64,
    /// 버려진 잘못된 데이터그램 수
    pub malformed: AtomicU64,
    /// 중복/과부하로 무시된 요청 수
    pub ignored_requests: AtomicU64,
    /// 전송 세그먼트 수 (재전송 포함)
    pub segments_sent: AtomicU64,
    /// 재전송 세그먼트 수
    pub retransmissions: AtomicU64,
    /// 마지막 ACK 없이 끝난 전송 수
    pub unconfirmed: AtomicU64,
    /// 라우터에 전달된 ACK 수
    pub acks_routed: AtomicU64,
    /// 큐 가득 차서 버려진 ACK 수
    pub acks_dropped: AtomicU64,
    /// 전송 완료된 페이로드 바이트
    pub bytes_sent: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            requests: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            ignored_requests: AtomicU64::new(0),
            segments_sent: AtomicU64::new(0),
            retransmissions: AtomicU64::new(0),
            unconfirmed: AtomicU64::new(0),
            acks_routed: AtomicU64::new(0),
            acks_dropped: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, value: u64) {
        counter.fetch_add(value, Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        format!(
            "Uptime: {:.1}s | Requests: {} ({} ok, {} unconfirmed, {} failed, {} ignored) | Segments: {} ({} retransmitted) | ACKs: {} routed, {} dropped | Malformed: {} | Bytes: {}",
            self.elapsed().as_secs_f64(),
            load(&self.requests),
            load(&self.completed),
            load(&self.unconfirmed),
            load(&self.failed),
            load(&self.ignored_requests),
            load(&self.segments_sent),
            load(&self.retransmissions),
            load(&self.acks_routed),
            load(&self.acks_dropped),
            load(&self.malformed),
            load(&self.bytes_sent),
        )
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// 청크 워커 통계 (워커 하나가 단독 소유)
#[derive(Debug, Clone)]
pub struct WorkerStats {
    pub start_time: Instant,
    /// 받아서 기록한 세그먼트 수
    pub segments: u64,
    /// 중복 수신 세그먼트 수 (재전송, 기록 안 함)
    pub duplicates: u64,
    /// 수신 타임아웃 횟수
    pub timeouts: u64,
    /// GET 재전송 횟수
    pub request_resends: u64,
    /// 기록한 바이트
    pub bytes: u64,
    /// 완료까지 걸린 시간
    pub elapsed: Duration,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            segments: 0,
            duplicates: 0,
            timeouts: 0,
            request_resends: 0,
            bytes: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn finish(&mut self) {
        self.elapsed = self.start_time.elapsed();
    }

    /// 처리율 (bytes/sec)
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.bytes as f64 / secs
    }

    pub fn summary(&self) -> String {
        format!(
            "Bytes: {} | Segments: {} | Duplicates: {} | Timeouts: {} | Resends: {} | {:.2}s | {:.2} MB/s",
            self.bytes,
            self.segments,
            self.duplicates,
            self.timeouts,
            self.request_resends,
            self.elapsed.as_secs_f64(),
            self.throughput() / 1_000_000.0,
        )
    }
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self::new()
    }
}
