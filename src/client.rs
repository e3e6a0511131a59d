//! 다운로더 (클라이언트측 오케스트레이션)
//!
//! CHECK로 파일 크기 조회 -> 분할 -> 청크 워커 병렬 실행 -> 전부 성공하면 조립
//! 하나라도 실패하면 부분 결과는 버리고 청크별 실패 내역 반환

use std::collections::HashSet;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::ChunkFailure;
use crate::message::{Reply, Request};
use crate::planner::{self, ChunkAssignment};
use crate::stats::WorkerStats;
use crate::worker::{bind_connected, ChunkWorker};
use crate::{Config, Error, Result};

/// 청크별 완료 보고
#[derive(Debug, Clone)]
pub struct ChunkReport {
    pub assignment: ChunkAssignment,
    pub stats: WorkerStats,
}

/// 완료된 다운로드
#[derive(Debug)]
pub struct Download {
    /// 조립된 파일 데이터
    pub data: Bytes,
    /// 청크 인덱스 순
    pub chunks: Vec<ChunkReport>,
}

/// 다중 서버, 다중 워커 다운로더
pub struct Downloader {
    servers: Vec<SocketAddr>,
    workers: usize,
    config: Config,
}

impl Downloader {
    pub fn new(servers: Vec<SocketAddr>, workers: usize, config: Config) -> Self {
        Self {
            servers,
            workers,
            config,
        }
    }

    pub fn servers(&self) -> &[SocketAddr] {
        &self.servers
    }

    /// 파일 크기 조회 (서버 순서대로 시도, 첫 응답 사용)
    pub async fn query_file_size(&self, filename: &str) -> Result<u64> {
        let mut last_error = Error::NoServers;

        for &server in &self.servers {
            match self.check(server, filename).await {
                Ok(size) => {
                    info!("CHECK {} @ {}: OK {}", filename, server, size);
                    return Ok(size);
                }
                Err(e) => {
                    warn!("CHECK {} @ {} 실패: {}", filename, server, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn check(&self, server: SocketAddr, filename: &str) -> Result<u64> {
        let socket = bind_connected(server).await?;
        let request = Request::Check {
            filename: filename.to_string(),
        }
        .to_bytes();

        let attempts = self.config.max_retries + 1;
        let mut buf = vec![0u8; self.config.datagram_size];
        let mut last_error = Error::timeout(format!("CHECK reply from {}", server));

        for attempt in 1..=attempts {
            if let Err(e) = socket.send(&request).await {
                warn!("CHECK 전송 실패 ({}/{}): {}", attempt, attempts, e);
                last_error = Error::Io(e);
                tokio::time::sleep(self.config.recv_timeout()).await;
                continue;
            }

            match tokio::time::timeout(self.config.recv_timeout(), socket.recv(&mut buf)).await {
                Ok(Ok(len)) => return Reply::parse(&buf[..len])?.into_result(filename),
                Ok(Err(e)) => {
                    debug!("CHECK 수신 에러 ({}/{}): {}", attempt, attempts, e);
                    last_error = Error::Io(e);
                }
                Err(_) => {
                    debug!("CHECK 타임아웃 ({}/{})", attempt, attempts);
                    last_error = Error::timeout(format!("CHECK reply from {}", server));
                }
            }
        }

        Err(last_error)
    }

    /// 파일 전체 다운로드
    pub async fn fetch(&self, filename: &str) -> Result<Download> {
        self.config.validate()?;
        if self.servers.is_empty() {
            return Err(Error::NoServers);
        }

        let file_size = self.query_file_size(filename).await?;
        self.fetch_range(filename, file_size).await
    }

    /// 크기를 이미 알고 있을 때 다운로드
    ///
    /// 분할 검증이 끝나기 전에는 워커를 하나도 시작하지 않음
    pub async fn fetch_range(&self, filename: &str, file_size: u64) -> Result<Download> {
        let assignments = planner::plan(file_size, self.workers, &self.servers, filename)?;
        let regions = planner::split_regions(file_size, &assignments)?;

        info!(
            "Downloading {} ({} bytes) with {} worker(s) over {} server(s)",
            filename,
            file_size,
            assignments.len(),
            self.servers.len()
        );
        for assignment in &assignments {
            debug!(
                "chunk {}: offset={}, length={}, server={}",
                assignment.index, assignment.offset, assignment.length, assignment.server
            );
        }

        let mut workers = Vec::with_capacity(assignments.len());
        for (assignment, region) in assignments.iter().cloned().zip(regions) {
            workers.push(ChunkWorker::new(assignment, region, self.config.clone())?);
        }

        let mut tasks = JoinSet::new();
        for worker in workers {
            let assignment = worker.assignment().clone();
            tasks.spawn(async move { (assignment, worker.run().await) });
        }

        let mut regions = Vec::with_capacity(assignments.len());
        let mut reports = Vec::with_capacity(assignments.len());
        let mut failures = Vec::new();
        let mut finished = HashSet::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((assignment, Ok((region, stats)))) => {
                    finished.insert(assignment.index);
                    regions.push(region);
                    reports.push(ChunkReport { assignment, stats });
                }
                Ok((assignment, Err(e))) => {
                    warn!("chunk {} 실패: {}", assignment.index, e);
                    finished.insert(assignment.index);
                    failures.push(failure(&assignment, e.to_string()));
                }
                Err(e) => {
                    warn!("워커 태스크 비정상 종료: {}", e);
                }
            }
        }

        // 패닉 등으로 결과가 없는 청크
        for assignment in &assignments {
            if !finished.contains(&assignment.index) {
                failures.push(failure(assignment, "worker task aborted".into()));
            }
        }

        if !failures.is_empty() {
            failures.sort_by_key(|f| f.index);
            return Err(Error::TransferIncomplete { failures });
        }

        let data = planner::assemble(regions, file_size)?;
        reports.sort_by_key(|r| r.assignment.index);

        info!(
            "Download complete: {} bytes in {} chunk(s)",
            data.len(),
            reports.len()
        );

        Ok(Download {
            data,
            chunks: reports,
        })
    }
}

fn failure(assignment: &ChunkAssignment, reason: String) -> ChunkFailure {
    ChunkFailure {
        index: assignment.index,
        server: assignment.server,
        offset: assignment.offset,
        length: assignment.length,
        reason,
    }
}
