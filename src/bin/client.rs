//! SCT 클라이언트 - Sequenced Chunk Transfer
//!
//! 파일을 구간으로 나눠 여러 워커(와 여러 서버)로 병렬 수신
//! - 모든 청크가 성공해야 출력 파일 기록
//!
//! 사용법:
//!   cargo run --release --bin sct-client -- <SERVER_INFO> <NUM_CHUNKS> <FILENAME> [OPTIONS]
//!
//! 서버 목록 파일 (한 줄에 하나):
//!   127.0.0.1 9000
//!   192.168.1.100 9000
//!
//! 예시:
//!   cargo run --release --bin sct-client -- server-info.txt 4 data.bin --output data.bin

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sct::config::parse_server_list;
use sct::{Config, Downloader, Error};

/// SCT Client - ACK 기반 청크 파일 전송 클라이언트
#[derive(Parser)]
#[command(name = "sct-client", version)]
struct Args {
    /// 서버 목록 파일 (`<host> <port>` 줄 단위)
    server_info: PathBuf,

    /// 청크(워커) 수
    num_chunks: usize,

    /// 받을 파일 이름
    filename: String,

    /// 출력 파일 경로
    #[arg(short, long, default_value = "output.dat")]
    output: PathBuf,

    /// TOML 설정 파일
    #[arg(short, long)]
    config: Option<PathBuf>,
}

async fn resolve_servers(text: &str) -> Result<Vec<SocketAddr>, Error> {
    let mut servers = Vec::new();

    for (host, port) in parse_server_list(text)? {
        let addr = tokio::net::lookup_host((host.as_str(), port))
            .await?
            .next()
            .ok_or_else(|| Error::InvalidConfig(format!("cannot resolve {}:{}", host, port)))?;
        servers.push(addr);
    }

    Ok(servers)
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

    let server_info = tokio::fs::read_to_string(&args.server_info).await?;
    let servers = resolve_servers(&server_info).await?;

    info!("SCT Client starting...");
    info!("Servers: {:?}", servers);
    info!("Chunks: {}, file: {}", args.num_chunks, args.filename);

    let downloader = Downloader::new(servers, args.num_chunks, config);
    let download = match downloader.fetch(&args.filename).await {
        Ok(download) => download,
        Err(Error::TransferIncomplete { failures }) => {
            for failure in &failures {
                error!("Failed: {}", failure);
            }
            error!("Transfer incomplete, output not written");
            return Err(Error::TransferIncomplete { failures }.into());
        }
        Err(e) => {
            error!("Transfer failed: {}", e);
            return Err(e.into());
        }
    };

    for report in &download.chunks {
        info!(
            "chunk {} ({}): {}",
            report.assignment.index,
            report.assignment.server,
            report.stats.summary()
        );
    }

    tokio::fs::write(&args.output, &download.data).await?;
    info!(
        "Saved {} bytes to {:?} (crc32 {:08X})",
        download.data.len(),
        args.output,
        crc32fast::hash(&download.data)
    );

    Ok(())
}
