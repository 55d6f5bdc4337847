use anyhow::{Context, Result};
use bytes::Bytes;
use castline_rtc::{
    BroadcastEvent, Broadcaster, CastConfig, LocalBus, MediaSource, RtcTransportFactory,
    StaticMediaSource, StreamId, Viewer, ViewerEvent,
};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const FRAME_INTERVAL: Duration = Duration::from_millis(33);
const AUDIO_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Parser)]
#[command(name = "castline")]
#[command(about = "One-to-many live streaming over direct peer connections")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Broadcast synthetic media to local viewers over real peer connections.
    Demo {
        #[arg(long, default_value_t = 2)]
        viewers: usize,

        #[arg(long, default_value_t = 10)]
        seconds: u64,

        #[arg(long, default_value = "demo")]
        stream: String,

        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Use host candidates only.
        #[arg(long)]
        no_stun: bool,
    },

    /// Print the effective configuration as JSON.
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Commands::Demo {
            viewers,
            seconds,
            stream,
            config,
            no_stun,
        } => {
            let config = load_config(config.as_deref(), no_stun)?;
            run_demo(StreamId::new(stream), viewers, Duration::from_secs(seconds), config).await?;
        }
        Commands::Config { config } => {
            let config = load_config(config.as_deref(), false)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>, no_stun: bool) -> Result<CastConfig> {
    let config = match path {
        Some(path) => CastConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => CastConfig::default(),
    };
    Ok(if no_stun {
        config.without_ice_servers()
    } else {
        config
    })
}

async fn run_demo(
    stream: StreamId,
    viewer_count: usize,
    duration: Duration,
    config: CastConfig,
) -> Result<()> {
    println!("{}", format!("🚀 Broadcasting '{stream}'...").green().bold());
    info!(
        "ICE servers: {}, connect timeout: {:?}",
        config.ice_servers.len(),
        config.connect_timeout
    );

    let bus = LocalBus::new();
    let transports = Arc::new(RtcTransportFactory::new(&config));

    let (mut broadcaster, broadcast_events) = Broadcaster::new(
        stream.clone(),
        Arc::new(bus.clone()),
        transports.clone(),
        config.clone(),
    );
    let source = Arc::new(StaticMediaSource::new(&stream));
    broadcaster
        .start(source.clone() as Arc<dyn MediaSource>)
        .await
        .context("Failed to start broadcaster")?;
    tokio::spawn(print_broadcast_events(broadcast_events));
    let pump = tokio::spawn(pump_media(source));

    let received = Arc::new(AtomicU64::new(0));
    let mut viewers = Vec::with_capacity(viewer_count);
    for index in 0..viewer_count {
        let (mut viewer, events) = Viewer::new(
            stream.clone(),
            Arc::new(bus.clone()),
            transports.clone(),
            config.clone(),
        );
        let peer_id = viewer
            .connect()
            .await
            .with_context(|| format!("Viewer #{index} failed to connect"))?;
        println!("{}", format!("📺 Viewer #{index} joining as {peer_id}").cyan());

        tokio::spawn(watch_viewer(index, events, viewer.watch_inbound(), received.clone()));
        viewers.push(viewer);
    }

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = tokio::signal::ctrl_c() => println!("{}", "Interrupted".yellow()),
    }

    for viewer in &mut viewers {
        viewer.disconnect().await;
    }
    broadcaster.stop().await;
    let _ = pump.await;

    println!("{}", "✨ Broadcast finished".green().bold());
    println!("   📦 Packets received: {}", received.load(Ordering::Relaxed));
    Ok(())
}

/// Feeds placeholder frames until the source is stopped.
async fn pump_media(source: Arc<StaticMediaSource>) {
    let mut video = tokio::time::interval(FRAME_INTERVAL);
    let mut audio = tokio::time::interval(AUDIO_INTERVAL);
    let frame = Bytes::from_static(&[0x10, 0x02, 0x00, 0x9d, 0x01, 0x2a, 0x10, 0x00, 0x10, 0x00]);
    let silence = Bytes::from_static(&[0xf8, 0xff, 0xfe]);

    loop {
        let written = tokio::select! {
            _ = video.tick() => source.write_video(frame.clone(), FRAME_INTERVAL).await,
            _ = audio.tick() => source.write_audio(silence.clone(), AUDIO_INTERVAL).await,
        };
        if written.is_err() {
            break;
        }
    }
}

async fn print_broadcast_events(mut events: mpsc::UnboundedReceiver<BroadcastEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            BroadcastEvent::ViewerCountChanged(count) => {
                println!("{}", format!("👥 Viewers: {count}").bold());
            }
            BroadcastEvent::ViewerConnected { peer_id } => {
                println!("{}", format!("🔗 Viewer {peer_id} connected").green());
            }
            BroadcastEvent::ViewerLost { peer_id, reason } => {
                println!("{}", format!("💔 Viewer {peer_id} lost: {reason}").red());
            }
        }
    }
}

async fn watch_viewer(
    index: usize,
    mut events: mpsc::UnboundedReceiver<ViewerEvent>,
    mut inbound: tokio::sync::watch::Receiver<Option<castline_rtc::InboundStream>>,
    received: Arc<AtomicU64>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ViewerEvent::Connected => {
                println!("{}", format!("✅ Viewer #{index} receiving media").green());
                let Some(stream) = inbound.borrow_and_update().clone() else {
                    continue;
                };
                for track in stream.tracks().iter().cloned() {
                    let received = received.clone();
                    tokio::spawn(async move {
                        while track.read_payload().await.is_ok() {
                            received.fetch_add(1, Ordering::Relaxed);
                        }
                    });
                }
            }
            ViewerEvent::ConnectTimeout => {
                println!("{}", format!("⏱  Viewer #{index} could not connect").yellow());
            }
            ViewerEvent::ConnectionLost { reason } => {
                println!("{}", format!("💔 Viewer #{index} lost the stream: {reason}").red());
            }
            ViewerEvent::StreamEnded => {
                println!("{}", format!("🛑 Viewer #{index}: stream ended").yellow());
            }
            ViewerEvent::StreamAvailable { broadcaster } => {
                println!("{}", format!("📡 Viewer #{index}: stream live from {broadcaster}").cyan());
            }
        }
    }
}
