//! SCT 서버 - Sequenced Chunk Transfer
//!
//! 요청 디스패처 + 요청별 전송 핸들러
//! - CHECK: 파일 크기 응답
//! - GET: 구간을 세그먼트 단위로 전송, 세그먼트마다 ACK 대기
//!
//! 사용법:
//!   cargo run --release --bin sct-server -- <PORT> [OPTIONS]
//!
//! 예시:
//!   # 현재 디렉터리 파일 제공
//!   cargo run --release --bin sct-server -- 9000
//!
//!   # 루트 디렉터리 + 설정 파일
//!   cargo run --release --bin sct-server -- 9000 --root /srv/files --config sct.toml

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sct::{Config, Dispatcher};

/// SCT Server - ACK 기반 청크 파일 전송 서버
#[derive(Parser)]
#[command(name = "sct-server", version)]
struct Args {
    /// 수신 포트
    port: u16,

    /// 바인드 주소
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// 제공할 파일 루트 디렉터리
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// TOML 설정 파일
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정 (RUST_LOG, 기본 info)
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::default(),
    };

    info!("SCT Server starting...");
    info!("Datagram size: {} bytes", config.datagram_size);
    info!(
        "ACK timeout: {}ms, max retransmits: {}",
        config.ack_timeout_ms, config.max_retransmits
    );
    info!("ACK queue capacity: {}", config.ack_queue_capacity);

    let bind_addr = SocketAddr::new(args.bind, args.port);
    let (dispatcher, handle) = Dispatcher::bind(bind_addr, args.root, config).await?;
    info!("Ready to receive requests on {}", handle.local_addr());

    let server = tokio::spawn(dispatcher.run());

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down");
    handle.shutdown();

    server.await??;
    Ok(())
}
