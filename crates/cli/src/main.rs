mod commands;
mod duration;

use std::path::PathBuf;
use std::time::Duration;

use camsnap::CancelToken;
use clap::{Args, Parser, Subcommand};
use tracing::Level;

use crate::duration::parse_duration;

#[derive(Parser)]
#[command(
    name = "camsnap",
    version,
    about = "Find ONVIF cameras, grab snapshots and clips, watch for motion"
)]
struct Cli {
    /// Config file (default: <user config dir>/camsnap/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add or update a camera
    Add(AddArgs),
    /// List saved cameras
    List,
    /// Find ONVIF devices on the local network
    Discover(DiscoverArgs),
    /// Grab a single frame
    Snap(SnapArgs),
    /// Record a short clip
    Clip(ClipArgs),
    /// Run an action whenever motion is detected
    Watch(WatchArgs),
    /// Check ffmpeg and camera reachability
    Doctor(DoctorArgs),
}

#[derive(Args)]
struct AddArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    host: String,
    #[arg(long, default_value_t = 554)]
    port: u16,
    #[arg(long, default_value = "rtsp")]
    protocol: String,
    #[arg(long, default_value = "")]
    user: String,
    #[arg(long, default_value = "")]
    pass: String,
    /// Explicit RTSP path, overrides --stream
    #[arg(long, default_value = "")]
    path: String,
    /// Preferred RTSP transport: tcp or udp
    #[arg(long, default_value = "")]
    rtsp_transport: String,
    /// Default stream name, e.g. stream1 or stream2
    #[arg(long, default_value = "")]
    stream: String,
    /// Drop audio from clips by default
    #[arg(long)]
    no_audio: bool,
    /// Audio codec for clips (default aac)
    #[arg(long, default_value = "")]
    audio_codec: String,
}

#[derive(Args)]
struct DiscoverArgs {
    #[arg(long, default_value = "3s", value_parser = parse_duration)]
    timeout: Duration,
    /// Query each device for manufacturer, model and firmware
    #[arg(long)]
    info: bool,
}

/// Stream selection shared by every command that opens a camera.
#[derive(Args)]
struct StreamArgs {
    /// RTSP transport override: tcp or udp
    #[arg(long)]
    rtsp_transport: Option<String>,
    /// Stream name replacing the last URL segment, e.g. stream2
    #[arg(long, conflicts_with = "path")]
    stream: Option<String>,
    /// Explicit path replacing the last URL segment
    #[arg(long)]
    path: Option<String>,
}

#[derive(Args)]
struct SnapArgs {
    camera: String,
    /// Output file (default: a temp .jpg)
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    timeout: Duration,
    #[command(flatten)]
    stream: StreamArgs,
}

#[derive(Args)]
struct ClipArgs {
    camera: String,
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    dur: Duration,
    /// Output file (default: a temp .mp4)
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long, default_value = "20s", value_parser = parse_duration)]
    timeout: Duration,
    #[arg(long)]
    no_audio: bool,
    #[arg(long)]
    audio_codec: Option<String>,
    #[command(flatten)]
    stream: StreamArgs,
}

#[derive(Args)]
struct WatchArgs {
    camera: String,
    /// Shell command run on motion; CAMSNAP_CAMERA, CAMSNAP_SCORE and
    /// CAMSNAP_TIME are set in its environment
    #[arg(long, default_value = "")]
    action: String,
    /// Action with {camera}, {score} and {time} placeholders
    #[arg(long)]
    action_template: Option<String>,
    /// Scene-change threshold, between 0 and 1
    #[arg(long, default_value_t = 0.2)]
    threshold: f64,
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    cooldown: Duration,
    /// Stop after this long (0 = run until interrupted)
    #[arg(long, default_value = "0", value_parser = parse_duration)]
    duration: Duration,
    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
    #[command(flatten)]
    stream: StreamArgs,
}

#[derive(Args)]
struct DoctorArgs {
    /// Per-camera connect timeout
    #[arg(long, default_value = "2s", value_parser = parse_duration)]
    timeout: Duration,
    /// Also pull one second of each stream through ffmpeg
    #[arg(long)]
    probe: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
            tracing::warn!(error = %e, "cannot install Ctrl-C handler");
        }
    }

    if let Err(e) = commands::run(cli, &cancel) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
