//! 루프백 종단간 테스트
//!
//! 실제 디스패처 + 다운로더, 또는 소켓을 직접 다루는 가짜 피어로 프로토콜 동작 확인

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use sct::handler::HandlerContext;
use sct::planner;
use sct::{
    Ack, AckMessage, AckRouter, ChunkWorker, Config, Dispatcher, Downloader, Error,
    HandlerOutcome, Reply, Request, Segment, ServerHandle, ServerStats, TransferHandler,
};

fn test_config() -> Config {
    Config {
        ack_timeout_ms: 100,
        max_retransmits: 5,
        recv_timeout_ms: 200,
        max_retries: 3,
        ..Config::default()
    }
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rand::thread_rng().fill(&mut data[..]);
    data
}

fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

async fn start_server(root: &Path, config: Config) -> (ServerHandle, JoinHandle<sct::Result<()>>) {
    let (dispatcher, handle) = Dispatcher::bind(loopback(), root, config).await.unwrap();
    let task = tokio::spawn(dispatcher.run());
    (handle, task)
}

async fn connected_socket(peer: SocketAddr) -> UdpSocket {
    let socket = UdpSocket::bind(loopback()).await.unwrap();
    socket.connect(peer).await.unwrap();
    socket
}

async fn recv_within(socket: &UdpSocket, wait: Duration) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; 65535];
    match tokio::time::timeout(wait, socket.recv(&mut buf)).await {
        Ok(Ok(len)) => Some(buf[..len].to_vec()),
        _ => None,
    }
}

async fn recv_from_within(socket: &UdpSocket, wait: Duration) -> Option<(Vec<u8>, SocketAddr)> {
    let mut buf = vec![0u8; 65535];
    match tokio::time::timeout(wait, socket.recv_from(&mut buf)).await {
        Ok(Ok((len, from))) => Some((buf[..len].to_vec(), from)),
        _ => None,
    }
}

/// 조건이 참이 될 때까지 폴링 (최대 2초)
async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn test_download_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let data = random_bytes(1000);
    std::fs::write(dir.path().join("data.bin"), &data).unwrap();

    let (handle, server) = start_server(dir.path(), test_config()).await;

    let downloader = Downloader::new(vec![handle.local_addr()], 3, test_config());
    let download = downloader.fetch("data.bin").await.unwrap();

    assert_eq!(&download.data[..], &data[..]);

    let lengths: Vec<u64> = download.chunks.iter().map(|c| c.assignment.length).collect();
    assert_eq!(lengths, vec![333, 333, 334]);
    assert!(download.chunks.iter().all(|c| c.stats.duplicates == 0));

    handle.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_download_multi_segment_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let data = random_bytes(10_000);
    std::fs::write(dir.path().join("big.bin"), &data).unwrap();

    let config = Config {
        datagram_size: 256,
        ..test_config()
    };
    let (handle, server) = start_server(dir.path(), config.clone()).await;

    let downloader = Downloader::new(vec![handle.local_addr()], 4, config);
    let download = downloader.fetch("big.bin").await.unwrap();

    assert_eq!(&download.data[..], &data[..]);

    // 2500바이트 청크, 페이로드 248 -> 청크당 11 세그먼트
    for report in &download.chunks {
        assert_eq!(report.stats.segments, 11);
        assert_eq!(report.stats.bytes, 2500);
    }

    let stats = handle.stats();
    assert!(eventually(|| stats.completed.load(Ordering::Relaxed) == 5).await);
    assert_eq!(stats.bytes_sent.load(Ordering::Relaxed), 10_000);

    handle.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_download_from_multiple_servers() {
    let dir = tempfile::tempdir().unwrap();
    let data = random_bytes(5000);
    std::fs::write(dir.path().join("shared.bin"), &data).unwrap();

    let (first, first_task) = start_server(dir.path(), test_config()).await;
    let (second, second_task) = start_server(dir.path(), test_config()).await;

    let servers = vec![first.local_addr(), second.local_addr()];
    let downloader = Downloader::new(servers.clone(), 4, test_config());
    let download = downloader.fetch("shared.bin").await.unwrap();

    assert_eq!(&download.data[..], &data[..]);
    for report in &download.chunks {
        assert_eq!(report.assignment.server, servers[report.assignment.index % 2]);
    }

    // CHECK는 첫 서버에만
    let first_stats = first.stats();
    let second_stats = second.stats();
    assert!(eventually(|| first_stats.completed.load(Ordering::Relaxed) == 3).await);
    assert!(eventually(|| second_stats.completed.load(Ordering::Relaxed) == 2).await);

    first.shutdown();
    second.shutdown();
    first_task.await.unwrap().unwrap();
    second_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_check_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, server) = start_server(dir.path(), test_config()).await;

    let downloader = Downloader::new(vec![handle.local_addr()], 2, test_config());
    match downloader.fetch("missing.bin").await {
        Err(Error::NotFound { filename }) => assert_eq!(filename, "missing.bin"),
        other => panic!("expected NotFound, got {:?}", other.map(|d| d.data.len())),
    }

    handle.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_invalid_range_is_rejected_before_streaming() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("data.bin"), random_bytes(1000)).unwrap();
    let (handle, server) = start_server(dir.path(), test_config()).await;

    let client = connected_socket(handle.local_addr()).await;
    let request = Request::Get {
        filename: "data.bin".into(),
        offset: 900,
        length: 200,
    };
    client.send(&request.to_bytes()).await.unwrap();

    let reply = recv_within(&client, Duration::from_secs(1)).await.unwrap();
    assert_eq!(
        Reply::parse(&reply).unwrap().into_result("data.bin").unwrap_err().to_string(),
        Error::Rejected("Invalid range".into()).to_string()
    );

    // 세그먼트는 하나도 오지 않음
    assert!(recv_within(&client, Duration::from_millis(300)).await.is_none());

    let stats = handle.stats();
    assert!(eventually(|| stats.failed.load(Ordering::Relaxed) == 1).await);
    assert_eq!(stats.segments_sent.load(Ordering::Relaxed), 0);

    handle.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_lost_ack_triggers_identical_retransmission() {
    let dir = tempfile::tempdir().unwrap();
    let data = random_bytes(2000);
    std::fs::write(dir.path().join("data.bin"), &data).unwrap();
    let (handle, server) = start_server(dir.path(), test_config()).await;

    let client = connected_socket(handle.local_addr()).await;
    let request = Request::Get {
        filename: "data.bin".into(),
        offset: 0,
        length: 2000,
    };
    client.send(&request.to_bytes()).await.unwrap();

    let wait = Duration::from_secs(1);
    let first = recv_within(&client, wait).await.unwrap();
    // ACK를 보내지 않음 -> 같은 세그먼트 재전송
    let again = recv_within(&client, wait).await.unwrap();
    assert_eq!(first, again);

    let segment = Segment::from_bytes(&first).unwrap();
    assert_eq!(segment.seq, 0);
    assert_eq!(&segment.payload[..], &data[..1016]);

    client.send(&AckMessage::new(0).to_bytes()).await.unwrap();
    let next = Segment::from_bytes(&recv_within(&client, wait).await.unwrap()).unwrap();
    assert_eq!(next.seq, 1);
    assert_eq!(&next.payload[..], &data[1016..]);
    client.send(&AckMessage::new(1).to_bytes()).await.unwrap();

    let stats = handle.stats();
    assert!(eventually(|| stats.completed.load(Ordering::Relaxed) == 1).await);
    assert!(stats.retransmissions.load(Ordering::Relaxed) >= 1);
    assert!(eventually(|| handle.router().is_empty()).await);

    handle.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_resent_get_is_ignored_while_active() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("data.bin"), random_bytes(2000)).unwrap();
    let (handle, server) = start_server(dir.path(), test_config()).await;

    let client = connected_socket(handle.local_addr()).await;
    let request = Request::Get {
        filename: "data.bin".into(),
        offset: 0,
        length: 2000,
    }
    .to_bytes();
    client.send(&request).await.unwrap();

    let wait = Duration::from_secs(1);
    let first = Segment::from_bytes(&recv_within(&client, wait).await.unwrap()).unwrap();
    assert_eq!(first.seq, 0);

    client.send(&request).await.unwrap();
    client.send(&AckMessage::new(0).to_bytes()).await.unwrap();

    // 중복 GET 다음에 보낸 ACK로 seq 1이 오므로 이미 처리됨
    let mut second = Segment::from_bytes(&recv_within(&client, wait).await.unwrap()).unwrap();
    while second.seq == 0 {
        second = Segment::from_bytes(&recv_within(&client, wait).await.unwrap()).unwrap();
    }
    assert_eq!(second.seq, 1);
    client.send(&AckMessage::new(1).to_bytes()).await.unwrap();

    let stats = handle.stats();
    assert_eq!(stats.ignored_requests.load(Ordering::Relaxed), 1);
    assert!(eventually(|| stats.completed.load(Ordering::Relaxed) == 1).await);
    assert_eq!(stats.requests.load(Ordering::Relaxed), 1);

    handle.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_malformed_datagram_does_not_stop_dispatcher() {
    let dir = tempfile::tempdir().unwrap();
    let data = random_bytes(500);
    std::fs::write(dir.path().join("data.bin"), &data).unwrap();
    let (handle, server) = start_server(dir.path(), test_config()).await;

    let client = connected_socket(handle.local_addr()).await;
    client.send(b"HELLO there").await.unwrap();
    client.send(&[0xff, 0xfe, 0x00]).await.unwrap();
    client.send(b"GET data.bin ten 5").await.unwrap();

    let stats = handle.stats();
    assert!(eventually(|| stats.malformed.load(Ordering::Relaxed) == 3).await);

    let downloader = Downloader::new(vec![handle.local_addr()], 2, test_config());
    let download = downloader.fetch("data.bin").await.unwrap();
    assert_eq!(&download.data[..], &data[..]);

    handle.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_failed_chunk_reports_transfer_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("data.bin"), random_bytes(1000)).unwrap();
    let (handle, server) = start_server(dir.path(), test_config()).await;

    // 응답하지 않는 서버
    let silent = UdpSocket::bind(loopback()).await.unwrap();
    let silent_addr = silent.local_addr().unwrap();

    let downloader = Downloader::new(vec![handle.local_addr(), silent_addr], 2, test_config());
    match downloader.fetch("data.bin").await {
        Err(Error::TransferIncomplete { failures }) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].index, 1);
            assert_eq!(failures[0].server, silent_addr);
            assert_eq!(failures[0].offset, 500);
            assert_eq!(failures[0].length, 500);
        }
        other => panic!("expected TransferIncomplete, got {:?}", other.map(|d| d.data.len())),
    }

    handle.shutdown();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_full_ack_queue_drops_ack_and_handler_retransmits() {
    let dir = tempfile::tempdir().unwrap();
    let data = random_bytes(100);
    std::fs::write(dir.path().join("small.bin"), &data).unwrap();

    let client = UdpSocket::bind(loopback()).await.unwrap();
    let client_addr = client.local_addr().unwrap();
    let other: SocketAddr = "127.0.0.1:1".parse().unwrap();

    let router = Arc::new(AckRouter::new(1));
    assert!(router.submit(Ack::new(7, other)));

    let ctx = Arc::new(HandlerContext {
        socket: Arc::new(UdpSocket::bind(loopback()).await.unwrap()),
        router: router.clone(),
        root: dir.path().to_path_buf(),
        config: test_config(),
        stats: Arc::new(ServerStats::new()),
    });
    let request = Request::Get {
        filename: "small.bin".into(),
        offset: 0,
        length: 100,
    };
    let handler = tokio::spawn(TransferHandler::new(ctx, request, client_addr).run());

    let wait = Duration::from_secs(1);
    let (first, _) = recv_from_within(&client, wait).await.unwrap();
    assert!(!router.submit(Ack::new(0, client_addr)));
    assert_eq!(router.dropped(), 1);

    // 버려진 ACK -> 같은 세그먼트 재전송
    let (again, _) = recv_from_within(&client, wait).await.unwrap();
    assert_eq!(first, again);

    assert_eq!(router.forget(other), 1);
    assert!(router.submit(Ack::new(0, client_addr)));

    match handler.await.unwrap().unwrap() {
        HandlerOutcome::Streamed {
            bytes,
            segments,
            retransmissions,
            confirmed,
        } => {
            assert_eq!(bytes, 100);
            assert_eq!(segments, 1);
            assert!(retransmissions >= 1);
            assert!(confirmed);
        }
        outcome => panic!("unexpected outcome {:?}", outcome),
    }
    assert_eq!(
        Segment::from_bytes(&first).unwrap().payload,
        Bytes::from(data)
    );
}

#[tokio::test]
async fn test_handler_gives_up_after_max_retransmits() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("small.bin"), random_bytes(10)).unwrap();

    let client = UdpSocket::bind(loopback()).await.unwrap();
    // 페이로드 8바이트 -> 10바이트 파일은 세그먼트 2개
    let config = Config {
        datagram_size: 16,
        ack_timeout_ms: 20,
        max_retransmits: 3,
        ..test_config()
    };
    let stats = Arc::new(ServerStats::new());
    let ctx = Arc::new(HandlerContext {
        socket: Arc::new(UdpSocket::bind(loopback()).await.unwrap()),
        router: Arc::new(AckRouter::new(4)),
        root: dir.path().to_path_buf(),
        config,
        stats: stats.clone(),
    });
    let request = Request::Get {
        filename: "small.bin".into(),
        offset: 0,
        length: 10,
    };

    let result = TransferHandler::new(ctx, request, client.local_addr().unwrap())
        .run()
        .await;
    assert!(matches!(result, Err(Error::Timeout { .. })));
    assert_eq!(stats.segments_sent.load(Ordering::Relaxed), 4);
    assert_eq!(stats.retransmissions.load(Ordering::Relaxed), 3);
    assert_eq!(stats.unconfirmed.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_missing_final_ack_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let data = random_bytes(20);
    std::fs::write(dir.path().join("small.bin"), &data).unwrap();

    let config = Config {
        datagram_size: 18,
        ack_timeout_ms: 20,
        max_retransmits: 2,
        ..test_config()
    };
    let (handle, server) = start_server(dir.path(), config).await;

    let client = connected_socket(handle.local_addr()).await;
    let request = Request::Get {
        filename: "small.bin".into(),
        offset: 0,
        length: 20,
    };
    client.send(&request.to_bytes()).await.unwrap();

    let wait = Duration::from_secs(1);
    let first = Segment::from_bytes(&recv_within(&client, wait).await.unwrap()).unwrap();
    assert_eq!(first.seq, 0);
    client.send(&AckMessage::new(0).to_bytes()).await.unwrap();

    let mut last = Segment::from_bytes(&recv_within(&client, wait).await.unwrap()).unwrap();
    while last.seq == 0 {
        last = Segment::from_bytes(&recv_within(&client, wait).await.unwrap()).unwrap();
    }
    assert_eq!(last.seq, 1);
    assert_eq!(&last.payload[..], &data[10..]);
    // 마지막 ACK는 보내지 않음

    let stats = handle.stats();
    assert!(eventually(|| stats.completed.load(Ordering::Relaxed) == 1).await);
    assert_eq!(stats.unconfirmed.load(Ordering::Relaxed), 1);
    assert_eq!(stats.failed.load(Ordering::Relaxed), 0);
    assert_eq!(stats.bytes_sent.load(Ordering::Relaxed), 20);

    handle.shutdown();
    server.await.unwrap().unwrap();
}

/// 가짜 서버 하나에 대한 단일 청크 워커
async fn single_worker(
    server: SocketAddr,
    length: u64,
    config: Config,
) -> JoinHandle<sct::Result<(sct::Region, sct::WorkerStats)>> {
    let assignments = planner::plan(length, 1, &[server], "fake.bin").unwrap();
    let regions = planner::split_regions(length, &assignments).unwrap();
    let assignment = assignments.into_iter().next().unwrap();
    let region = regions.into_iter().next().unwrap();
    let worker = ChunkWorker::new(assignment, region, config).unwrap();
    tokio::spawn(worker.run())
}

async fn expect_ack(socket: &UdpSocket, seq: u64) -> SocketAddr {
    let (bytes, from) = recv_from_within(socket, Duration::from_secs(1)).await.unwrap();
    assert_eq!(AckMessage::parse(&bytes).unwrap().seq, seq);
    from
}

#[tokio::test]
async fn test_worker_acks_duplicate_without_rewriting() {
    let fake = UdpSocket::bind(loopback()).await.unwrap();
    let worker = single_worker(fake.local_addr().unwrap(), 6, test_config()).await;

    let (get, client) = recv_from_within(&fake, Duration::from_secs(1)).await.unwrap();
    assert!(matches!(Request::parse(&get).unwrap(), Request::Get { offset: 0, length: 6, .. }));

    let first = Segment::new(0, Bytes::from_static(b"abc"));
    fake.send_to(&first.to_bytes(), client).await.unwrap();
    expect_ack(&fake, 0).await;

    // ACK 유실을 가정한 재전송
    fake.send_to(&first.to_bytes(), client).await.unwrap();
    expect_ack(&fake, 0).await;

    let second = Segment::new(1, Bytes::from_static(b"def"));
    fake.send_to(&second.to_bytes(), client).await.unwrap();
    expect_ack(&fake, 1).await;

    let (region, stats) = worker.await.unwrap().unwrap();
    assert_eq!(region.as_bytes(), b"abcdef");
    assert_eq!(stats.segments, 2);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.bytes, 6);
}

#[tokio::test]
async fn test_worker_recovers_lost_segment() {
    let fake = UdpSocket::bind(loopback()).await.unwrap();
    let config = Config {
        recv_timeout_ms: 100,
        ..test_config()
    };
    let worker = single_worker(fake.local_addr().unwrap(), 6, config).await;

    let (_, client) = recv_from_within(&fake, Duration::from_secs(1)).await.unwrap();
    let first = Segment::new(0, Bytes::from_static(b"abc"));
    fake.send_to(&first.to_bytes(), client).await.unwrap();
    expect_ack(&fake, 0).await;

    // seq 1 유실: 워커는 타임아웃만 하고 ACK도 GET도 보내지 않음
    assert!(recv_from_within(&fake, Duration::from_millis(250)).await.is_none());

    let second = Segment::new(1, Bytes::from_static(b"def"));
    fake.send_to(&second.to_bytes(), client).await.unwrap();
    expect_ack(&fake, 1).await;

    let (region, stats) = worker.await.unwrap().unwrap();
    assert_eq!(region.as_bytes(), b"abcdef");
    assert!(stats.timeouts >= 1);
    assert_eq!(stats.duplicates, 0);
    assert_eq!(stats.request_resends, 0);
}

#[tokio::test]
async fn test_worker_ignores_datagrams_from_other_addresses() {
    let fake = UdpSocket::bind(loopback()).await.unwrap();
    let worker = single_worker(fake.local_addr().unwrap(), 3, test_config()).await;
    let (_, client) = recv_from_within(&fake, Duration::from_secs(1)).await.unwrap();

    let stranger = UdpSocket::bind(loopback()).await.unwrap();
    let forged = Segment::new(0, Bytes::from_static(b"xyz"));
    stranger.send_to(&forged.to_bytes(), client).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let genuine = Segment::new(0, Bytes::from_static(b"abc"));
    fake.send_to(&genuine.to_bytes(), client).await.unwrap();
    expect_ack(&fake, 0).await;

    let (region, stats) = worker.await.unwrap().unwrap();
    assert_eq!(region.as_bytes(), b"abc");
    assert_eq!(stats.segments, 1);
}

#[tokio::test]
async fn test_worker_rejects_payload_overflow() {
    let fake = UdpSocket::bind(loopback()).await.unwrap();
    let worker = single_worker(fake.local_addr().unwrap(), 4, test_config()).await;

    let (_, client) = recv_from_within(&fake, Duration::from_secs(1)).await.unwrap();
    let oversized = Segment::new(0, Bytes::from_static(b"too long"));
    fake.send_to(&oversized.to_bytes(), client).await.unwrap();

    match worker.await.unwrap() {
        Err(Error::PayloadOverflow { payload, remaining }) => {
            assert_eq!(payload, 8);
            assert_eq!(remaining, 4);
        }
        other => panic!("expected PayloadOverflow, got {:?}", other.map(|(_, s)| s)),
    }
}

#[tokio::test]
async fn test_worker_rejects_sequence_gap() {
    let fake = UdpSocket::bind(loopback()).await.unwrap();
    let worker = single_worker(fake.local_addr().unwrap(), 10, test_config()).await;

    let (_, client) = recv_from_within(&fake, Duration::from_secs(1)).await.unwrap();
    let skipped = Segment::new(1, Bytes::from_static(b"abc"));
    fake.send_to(&skipped.to_bytes(), client).await.unwrap();

    let err = worker.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::SequenceMismatch { expected: 0, got: 1 }));
    assert!(err.is_protocol_violation());
}

#[tokio::test]
async fn test_worker_surfaces_error_reply() {
    let fake = UdpSocket::bind(loopback()).await.unwrap();
    let worker = single_worker(fake.local_addr().unwrap(), 10, test_config()).await;

    let (_, client) = recv_from_within(&fake, Duration::from_secs(1)).await.unwrap();
    fake.send_to(&Reply::not_found().to_bytes(), client).await.unwrap();

    match worker.await.unwrap() {
        Err(Error::NotFound { filename }) => assert_eq!(filename, "fake.bin"),
        other => panic!("expected NotFound, got {:?}", other.map(|(_, s)| s)),
    }
}

#[tokio::test]
async fn test_worker_gives_up_on_silent_server() {
    let fake = UdpSocket::bind(loopback()).await.unwrap();
    let config = Config {
        recv_timeout_ms: 50,
        max_retries: 2,
        ..test_config()
    };
    let worker = single_worker(fake.local_addr().unwrap(), 10, config).await;

    let err = worker.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    assert!(err.is_retryable());

    // 첫 GET + 타임아웃마다 재전송된 GET
    let mut requests = 0;
    while let Some((bytes, _)) = recv_from_within(&fake, Duration::from_millis(50)).await {
        assert!(Request::parse(&bytes).is_ok());
        requests += 1;
    }
    assert_eq!(requests, 3);
}

#[tokio::test]
async fn test_shutdown_stops_dispatcher() {
    let dir = tempfile::tempdir().unwrap();
    let (handle, server) = start_server(dir.path(), test_config()).await;

    handle.shutdown();
    let result = tokio::time::timeout(Duration::from_secs(1), server).await;
    assert!(matches!(result, Ok(Ok(Ok(())))));
}
