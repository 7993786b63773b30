//! MJPEG relay server demo
//!
//! Run with: cargo run --example relay_server [BIND_ADDR] [SOURCE]
//!
//! Examples:
//!   cargo run --example relay_server                                  # 0.0.0.0:8080, default search
//!   cargo run --example relay_server 127.0.0.1:9000                   # custom bind
//!   cargo run --example relay_server 0.0.0.0:8080 https://yt.example  # direct source URL
//!   cargo run --example relay_server 0.0.0.0:8080 "city cam live"     # search query
//!
//! ## Watching
//!
//! WebSocket (one binary message per JPEG frame):
//!   ws://localhost:8080/stream
//!
//! Plain multipart MJPEG, e.g. in a browser <img> tag or with ffplay:
//!   http://localhost:8080/stream.mjpeg
//!
//! Requires `yt-dlp` and `ffmpeg` on PATH. The decode process only runs
//! while at least one viewer is connected.

use std::net::SocketAddr;

use mjpeg_relay::{RelayServer, ServerConfig, SourceConfig, SourceTarget};

#[tokio::main(flavor = "current_thread")]
async fn main() -> mjpeg_relay::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let bind_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:8080".to_string())
        .parse()
        .expect("invalid bind address");

    let target = match std::env::args().nth(2) {
        Some(arg) if arg.starts_with("http") => SourceTarget::Url(arg),
        Some(query) => SourceTarget::Search(query),
        None => SourceTarget::Search("Las Vegas Sphere Live 24/7".to_string()),
    };

    let source = SourceConfig::new(target)
        .frame_rate(10)
        .quality(2)
        .scale_width(1280);

    let server = RelayServer::new(ServerConfig::new(source).bind(bind_addr));

    let hub = std::sync::Arc::clone(server.broadcaster());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            ticker.tick().await;
            let stats = hub.stats();
            println!(
                "Stats: frames={} bytes={} skipped={} restarts={} subscribers={}",
                stats.frames_relayed,
                stats.bytes_ingested,
                stats.frames_skipped,
                stats.restarts,
                stats.subscribers,
            );
        }
    });

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
