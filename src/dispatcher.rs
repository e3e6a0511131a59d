//! 요청 디스패처 (서버측)
//!
//! 소켓을 소유하는 단일 수신 루프
//! - ACK: 라우터로 전달 후 계속
//! - 요청: 핸들러 태스크 생성 (JoinSet으로 관리, 루프는 절대 대기하지 않음)
//! - 잘못된 데이터그램: 버리고 계속

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::handler::{HandlerContext, HandlerOutcome, TransferHandler};
use crate::message::{Inbound, Request};
use crate::router::{Ack, AckRouter};
use crate::stats::ServerStats;
use crate::{Config, Error, Result};

/// 수신 버퍼 크기 (UDP 최대)
const RECV_BUFFER_SIZE: usize = 65535;

type HandlerResult = (SocketAddr, Result<HandlerOutcome>);

/// 진행 중인 전송 목록 (origin 기준)
type ActiveTransfers = Arc<DashMap<SocketAddr, Request>>;

/// 서버 제어 핸들
///
/// drop되면 디스패처도 종료됨
pub struct ServerHandle {
    shutdown_tx: watch::Sender<bool>,
    local_addr: SocketAddr,
    stats: Arc<ServerStats>,
    router: Arc<AckRouter>,
}

impl ServerHandle {
    /// 종료 신호 전송 (진행 중인 핸들러는 취소됨)
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        self.stats.clone()
    }

    pub fn router(&self) -> Arc<AckRouter> {
        self.router.clone()
    }
}

/// 요청 디스패처
pub struct Dispatcher {
    ctx: Arc<HandlerContext>,
    active: ActiveTransfers,
    shutdown_rx: watch::Receiver<bool>,
}

impl Dispatcher {
    /// 소켓 바인딩
    pub async fn bind(
        bind_addr: SocketAddr,
        root: impl Into<PathBuf>,
        config: Config,
    ) -> Result<(Self, ServerHandle)> {
        config.validate()?;

        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        let local_addr = socket.local_addr()?;
        let router = Arc::new(AckRouter::new(config.ack_queue_capacity));
        let stats = Arc::new(ServerStats::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let ctx = Arc::new(HandlerContext {
            socket,
            router: router.clone(),
            root: root.into(),
            config,
            stats: stats.clone(),
        });

        let dispatcher = Self {
            ctx,
            active: Arc::new(DashMap::new()),
            shutdown_rx,
        };
        let handle = ServerHandle {
            shutdown_tx,
            local_addr,
            stats,
            router,
        };

        Ok((dispatcher, handle))
    }

    /// 수신 루프 (종료 신호까지)
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut tasks: JoinSet<HandlerResult> = JoinSet::new();
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        info!(
            "SCT Dispatcher started on {} (root: {:?})",
            self.ctx.socket.local_addr()?,
            self.ctx.root
        );

        loop {
            tokio::select! {
                result = self.ctx.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, origin)) => self.route(&buf[..len], origin, &mut tasks),
                        Err(e) => warn!("수신 에러: {}", e),
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    self.reap(joined);
                }
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }

        info!("Dispatcher shutting down, cancelling {} handler(s)", tasks.len());
        tasks.abort_all();
        while let Some(joined) = tasks.join_next().await {
            self.reap(joined);
        }

        info!("{}", self.ctx.stats.summary());
        Ok(())
    }

    /// 데이터그램 분류 및 전달
    fn route(&self, datagram: &[u8], origin: SocketAddr, tasks: &mut JoinSet<HandlerResult>) {
        match Inbound::parse(datagram) {
            Ok(Inbound::Ack(ack)) => {
                ServerStats::incr(&self.ctx.stats.acks_routed);
                if !self.ctx.router.submit(Ack::new(ack.seq, origin)) {
                    ServerStats::incr(&self.ctx.stats.acks_dropped);
                }
            }
            Ok(Inbound::Request(request)) => self.spawn_handler(request, origin, tasks),
            Err(e) => {
                ServerStats::incr(&self.ctx.stats.malformed);
                debug!("잘못된 데이터그램 버림 ({}): {}", origin, e);
            }
        }
    }

    fn spawn_handler(
        &self,
        request: Request,
        origin: SocketAddr,
        tasks: &mut JoinSet<HandlerResult>,
    ) {
        if self.active.contains_key(&origin) {
            // 클라이언트가 GET을 재전송한 경우
            ServerStats::incr(&self.ctx.stats.ignored_requests);
            debug!("진행 중인 전송의 중복 요청 무시: {} ({})", request, origin);
            return;
        }

        if tasks.len() >= self.ctx.config.max_active_transfers {
            ServerStats::incr(&self.ctx.stats.ignored_requests);
            warn!(
                "동시 전송 한도 {} 도달, 요청 무시: {} ({})",
                self.ctx.config.max_active_transfers, request, origin
            );
            return;
        }

        ServerStats::incr(&self.ctx.stats.requests);
        self.active.insert(origin, request.clone());

        let guard = ActiveGuard {
            origin,
            active: self.active.clone(),
            router: self.ctx.router.clone(),
        };
        let handler = TransferHandler::new(self.ctx.clone(), request, origin);

        tasks.spawn(async move {
            let _guard = guard;
            (origin, handler.run().await)
        });
    }

    /// 종료된 핸들러 결과 처리
    fn reap(&self, joined: std::result::Result<HandlerResult, JoinError>) {
        match joined {
            Ok((origin, Ok(outcome))) => {
                ServerStats::incr(&self.ctx.stats.completed);
                debug!("핸들러 완료 ({}): {:?}", origin, outcome);
            }
            Ok((origin, Err(Error::NotFound { filename }))) => {
                ServerStats::incr(&self.ctx.stats.failed);
                info!("요청 실패 ({}): 파일 없음 {}", origin, filename);
            }
            Ok((origin, Err(e))) => {
                ServerStats::incr(&self.ctx.stats.failed);
                warn!("요청 실패 ({}): {}", origin, e);
            }
            Err(e) if e.is_cancelled() => {
                debug!("핸들러 취소됨");
            }
            Err(e) => {
                ServerStats::incr(&self.ctx.stats.failed);
                warn!("핸들러 태스크 비정상 종료: {}", e);
            }
        }
    }
}

/// 핸들러 종료(완료, 실패, 취소) 시 활성 목록과 라우터 정리
struct ActiveGuard {
    origin: SocketAddr,
    active: ActiveTransfers,
    router: Arc<AckRouter>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.remove(&self.origin);
        self.router.forget(self.origin);
    }
}
