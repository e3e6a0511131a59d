//! ACK 라우터 (서버측)
//!
//! 디스패처가 받은 ACK를 저장하고, 해당 ACK를 기다리는 핸들러가 찾아서 소비
//! - 매칭 조건: seq + origin 둘 다 일치
//! - 용량 고정, 가득 차면 새 ACK는 버림 (핸들러는 타임아웃 후 재전송)
//! - 뮤텍스는 큐 조작 중에만 잡음 (await, 네트워크 I/O 중에는 잡지 않음)

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use crate::segment::SeqNum;

/// 수신된 ACK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub seq: SeqNum,
    pub origin: SocketAddr,
}

impl Ack {
    pub fn new(seq: SeqNum, origin: SocketAddr) -> Self {
        Self { seq, origin }
    }
}

/// 바운디드 ACK 큐 + 대기자 깨우기
pub struct AckRouter {
    queue: Mutex<VecDeque<Ack>>,
    capacity: usize,
    notify: Notify,
    dropped: AtomicU64,
}

impl AckRouter {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// ACK 삽입 후 모든 대기자 깨움
    ///
    /// 큐가 가득 차면 버리고 false 반환
    pub fn submit(&self, ack: Ack) -> bool {
        let stored = {
            let mut queue = self.queue.lock();
            if queue.len() < self.capacity {
                queue.push_back(ack);
                true
            } else {
                false
            }
        };

        if stored {
            // 어느 대기자의 ACK인지 모르므로 전부 깨움
            self.notify.notify_waiters();
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("ACK 큐 가득 참, 버림: seq={}, origin={}", ack.seq, ack.origin);
        }

        stored
    }

    /// seq + origin이 일치하는 ACK를 기다려서 꺼냄
    ///
    /// 타임아웃이면 None. 같은 origin의 더 낮은 seq(중복 ACK)는 함께 제거.
    pub async fn await_match(
        &self,
        seq: SeqNum,
        origin: SocketAddr,
        timeout: Duration,
    ) -> Option<Ack> {
        let deadline = Instant::now() + timeout;

        loop {
            // 큐 확인 전에 등록해야 submit 사이의 깨우기를 놓치지 않음
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(ack) = self.take(seq, origin) {
                return Some(ack);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// 즉시 매칭 시도 (대기 없음)
    pub fn take(&self, seq: SeqNum, origin: SocketAddr) -> Option<Ack> {
        let mut queue = self.queue.lock();

        let pos = queue
            .iter()
            .position(|ack| ack.seq == seq && ack.origin == origin)?;
        let ack = queue.remove(pos)?;

        queue.retain(|stale| !(stale.origin == origin && stale.seq < seq));
        Some(ack)
    }

    /// origin의 남은 ACK 전부 제거 (핸들러 종료 시)
    pub fn forget(&self, origin: SocketAddr) -> usize {
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|ack| ack.origin != origin);
        before - queue.len()
    }

    /// 현재 대기 중인 ACK 수
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 용량 초과로 버려진 ACK 수
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
