use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use camsnap::config::default_config_path;
use camsnap::discovery::{Device, Discoverer, DiscoveryConfig};
use camsnap::ffmpeg::{self, ClipAudio, RtspTransport};
use camsnap::onvif::DeviceInfoClient;
use camsnap::rtsp_url::{build_url, redact};
use camsnap::watch::{MotionWatch, OutputFormat, StreamTarget, WatchConfig};
use camsnap::{Camera, CamsnapError, CancelToken, Config, Result, check_reachable};

use crate::{
    AddArgs, ClipArgs, Cli, Command, DiscoverArgs, DoctorArgs, SnapArgs, StreamArgs, WatchArgs,
};

/// How many times `doctor --probe` tries each stream.
const PROBE_ATTEMPTS: usize = 3;
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn run(cli: Cli, cancel: &CancelToken) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };

    match cli.command {
        Command::Add(args) => add(&config_path, args),
        Command::List => list(&config_path),
        Command::Discover(args) => discover(&config_path, args, cancel),
        Command::Snap(args) => snap(&config_path, args, cancel),
        Command::Clip(args) => clip(&config_path, args, cancel),
        Command::Watch(args) => watch(&config_path, args, cancel),
        Command::Doctor(args) => doctor(&config_path, args, cancel),
    }
}

fn add(config_path: &Path, args: AddArgs) -> Result<()> {
    if args.name.trim().is_empty() || args.host.trim().is_empty() {
        return Err(CamsnapError::InvalidInput("--name and --host are required".to_string()));
    }
    args.rtsp_transport.parse::<RtspTransport>()?;

    let mut cfg = Config::load(config_path)?;
    let name = args.name.clone();
    let inserted = cfg.upsert(Camera {
        name: args.name,
        host: args.host,
        port: args.port,
        protocol: args.protocol,
        username: args.user,
        password: args.pass,
        path: args.path,
        rtsp_transport: args.rtsp_transport.to_ascii_lowercase(),
        stream: args.stream,
        no_audio: args.no_audio,
        audio_codec: args.audio_codec,
    });
    cfg.save(config_path)?;

    if inserted {
        println!("Added camera {name:?}");
    } else {
        println!("Updated camera {name:?}");
    }
    Ok(())
}

fn list(config_path: &Path) -> Result<()> {
    let cfg = Config::load(config_path)?;
    if cfg.cameras.is_empty() {
        println!("No cameras configured. Add one with `camsnap add --name <n> --host <ip>`.");
        return Ok(());
    }
    let mut cameras: Vec<&Camera> = cfg.cameras.iter().collect();
    cameras.sort_by(|a, b| a.name.cmp(&b.name));
    for cam in cameras {
        let url = build_url(cam).map(|u| redact(&u)).unwrap_or_else(|_| cam.host.clone());
        println!("{}\t{}", cam.name, url);
    }
    Ok(())
}

fn discover(config_path: &Path, args: DiscoverArgs, cancel: &CancelToken) -> Result<()> {
    let mut devices =
        Discoverer::new(DiscoveryConfig::with_timeout(args.timeout)).run(cancel)?;
    if devices.is_empty() {
        println!(
            "No ONVIF devices answered. Cameras may have ONVIF disabled or sit on another subnet."
        );
        return Ok(());
    }

    if args.info {
        let cfg = Config::load(config_path)?;
        let client = DeviceInfoClient::new()?;
        for device in &mut devices {
            let (user, pass) = cfg.credentials_for_host(&device.host);
            match client.fetch(&device.address, &user, &pass) {
                Ok(info) => device.apply_info(&info),
                Err(e) => tracing::warn!(host = %device.host, error = %e, "device info failed"),
            }
        }
    }

    for device in &devices {
        println!("{}", device_line(device));
    }
    Ok(())
}

/// One tab-separated output row: host, identity summary when known, address.
fn device_line(device: &Device) -> String {
    let summary = device.info().summary();
    if summary.is_empty() {
        format!("{}\t{}", device.host, device.address)
    } else {
        format!("{}\t{}\t{}", device.host, summary, device.address)
    }
}

/// Resolved stream for one camera and the transport to use with it.
struct StreamSelection {
    url: String,
    transport: RtspTransport,
}

fn select_stream(cam: &Camera, args: &StreamArgs) -> Result<StreamSelection> {
    let mut target = StreamTarget::from_options(args.stream.as_deref(), args.path.as_deref())?;
    if target == StreamTarget::Default && cam.path.is_empty() && !cam.stream.is_empty() {
        target = StreamTarget::Stream(cam.stream.clone());
    }
    let transport = args
        .rtsp_transport
        .as_deref()
        .unwrap_or(&cam.rtsp_transport)
        .parse()?;
    Ok(StreamSelection {
        url: target.apply(&build_url(cam)?),
        transport,
    })
}

fn temp_output(camera: &str, ext: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    std::env::temp_dir().join(format!("camsnap-{camera}-{stamp}.{ext}"))
}

/// Run ffmpeg bounded by `timeout`, turning a deadline kill into a clear error.
fn run_bounded(args: &[String], cancel: &CancelToken, timeout: Duration) -> Result<()> {
    let bounded = cancel.child_with_timeout(timeout);
    match ffmpeg::run(args, &bounded) {
        Ok(_) => Ok(()),
        Err(e) if bounded.is_cancelled() && !cancel.is_cancelled() => {
            tracing::debug!(error = %e, "ffmpeg killed at deadline");
            Err(CamsnapError::Timeout(timeout))
        }
        Err(e) => Err(e),
    }
}

fn snap(config_path: &Path, args: SnapArgs, cancel: &CancelToken) -> Result<()> {
    let cfg = Config::load(config_path)?;
    let cam = cfg.require(&args.camera)?;
    let stream = select_stream(cam, &args.stream)?;
    let out = args.out.unwrap_or_else(|| temp_output(&cam.name, "jpg"));

    tracing::debug!(url = %redact(&stream.url), out = %out.display(), "snapshot");
    run_bounded(&ffmpeg::snapshot_args(&stream.url, stream.transport, &out), cancel, args.timeout)?;
    println!("{}", out.display());
    Ok(())
}

fn clip(config_path: &Path, args: ClipArgs, cancel: &CancelToken) -> Result<()> {
    if args.dur.is_zero() {
        return Err(CamsnapError::InvalidInput("--dur must be positive".to_string()));
    }
    let cfg = Config::load(config_path)?;
    let cam = cfg.require(&args.camera)?;
    let stream = select_stream(cam, &args.stream)?;
    let out = args.out.unwrap_or_else(|| temp_output(&cam.name, "mp4"));

    let audio = if args.no_audio || cam.no_audio {
        ClipAudio::Drop
    } else {
        match args.audio_codec.filter(|c| !c.is_empty()) {
            Some(codec) => ClipAudio::Encode(codec),
            None if !cam.audio_codec.is_empty() => ClipAudio::Encode(cam.audio_codec.clone()),
            None => ClipAudio::default(),
        }
    };

    tracing::debug!(url = %redact(&stream.url), out = %out.display(), ?audio, "clip");
    let ff_args = ffmpeg::clip_args(&stream.url, stream.transport, args.dur, &audio, &out);
    run_bounded(&ff_args, cancel, args.timeout)?;
    println!("{}", out.display());
    Ok(())
}

fn watch(config_path: &Path, args: WatchArgs, cancel: &CancelToken) -> Result<()> {
    let cfg = Config::load(config_path)?;
    let cam = cfg.require(&args.camera)?;
    let stream = select_stream(cam, &args.stream)?;

    let watch = MotionWatch::new(WatchConfig {
        camera: cam.name.clone(),
        url: stream.url,
        threshold: args.threshold,
        cooldown: args.cooldown,
        action: args.action,
        action_template: args.action_template,
        output: if args.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        },
        transport: stream.transport,
        ..WatchConfig::default()
    })?;

    let bounded = cancel.child_with_timeout(args.duration);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let summary = watch.run(&bounded, &mut out)?;
    tracing::debug!(?summary, "watch ended");
    Ok(())
}

/// Split `host[:port]` as stored in a camera, falling back to `port`.
fn dial_target(cam: &Camera) -> (String, u16) {
    let default_port = if cam.port == 0 { 554 } else { cam.port };
    match cam.host.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(p) => (host.to_string(), p),
            Err(_) => (cam.host.clone(), default_port),
        },
        None => (cam.host.clone(), default_port),
    }
}

fn doctor(config_path: &Path, args: DoctorArgs, cancel: &CancelToken) -> Result<()> {
    if ffmpeg::has_binary(ffmpeg::FFMPEG) {
        println!("ffmpeg: found");
    } else {
        println!("ffmpeg: NOT FOUND on PATH (snap, clip and watch need it)");
    }
    println!("config: {}", config_path.display());

    let cfg = Config::load(config_path)?;
    if cfg.cameras.is_empty() {
        println!("no cameras configured");
        return Ok(());
    }

    let mut failures = 0;
    for cam in &cfg.cameras {
        let (host, port) = dial_target(cam);
        match check_reachable(&host, port, args.timeout) {
            Ok(()) => println!("{}: {host}:{port} reachable", cam.name),
            Err(e) => {
                failures += 1;
                println!("{}: {host}:{port} unreachable: {e}", cam.name);
                continue;
            }
        }

        if args.probe {
            match probe_stream(cam, cancel) {
                Ok(()) => println!("{}: stream OK", cam.name),
                Err(e) => {
                    failures += 1;
                    println!("{}: stream failed: {e}", cam.name);
                }
            }
        }
    }

    if failures > 0 {
        return Err(CamsnapError::InvalidInput(format!("{failures} check(s) failed")));
    }
    Ok(())
}

fn probe_stream(cam: &Camera, cancel: &CancelToken) -> Result<()> {
    let url = build_url(cam)?;
    let transport: RtspTransport = cam.rtsp_transport.parse()?;
    let args = ffmpeg::probe_args(&url, transport);

    let mut last = None;
    for attempt in 1..=PROBE_ATTEMPTS {
        if cancel.is_cancelled() {
            break;
        }
        match run_bounded(&args, cancel, PROBE_TIMEOUT) {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::debug!(camera = %cam.name, attempt, error = %e, "stream probe failed");
                last = Some(e);
            }
        }
    }
    match last {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
