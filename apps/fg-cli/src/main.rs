use anyhow::{anyhow, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use frame_grabber as fg;
use frame_grabber::mock::{MockCaptureSubsystem, MockFrame};
use frame_grabber::{
    CaptureSubsystem, FrameGrabber, FrameHandle, FrameSnapshot, GrabberConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "fg",
    version,
    about = "Frame grabber CLI (mock capture backend)",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Selection {
    LastGroupWins,
    FirstMatch,
}

impl From<Selection> for fg::SelectionPolicy {
    fn from(s: Selection) -> Self {
        match s {
            Selection::LastGroupWins => fg::SelectionPolicy::LastGroupWins,
            Selection::FirstMatch => fg::SelectionPolicy::FirstMatch,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List mock source groups and show which color source gets selected
    ListSources {
        /// Add a second group exposing a color source
        #[arg(long, action = ArgAction::SetTrue)]
        extra_color_group: bool,
        /// Precedence when several groups expose a color source
        #[arg(long, value_enum, default_value = "last-group-wins")]
        selection: Selection,
    },
    /// Feed mock frames into a grabber and print each new snapshot as JSON
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Number of frames the mock camera delivers
    #[arg(long, default_value_t = 30u64)]
    frames: u64,
    /// Delay between delivered frames in milliseconds
    #[arg(long, default_value_t = 33u64)]
    interval_ms: u64,
    /// Consumer polling period in milliseconds (defaults to half the frame interval)
    #[arg(long)]
    poll_ms: Option<u64>,
    /// Deliver every Nth frame without a coordinate system (0 disables)
    #[arg(long, default_value_t = 0u64)]
    drop_pose_every: u64,
    /// Grabber config YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the config's source selection policy
    #[arg(long, value_enum)]
    selection: Option<Selection>,
    /// Make the mock reader refuse to start
    #[arg(long, action = ArgAction::SetTrue)]
    fail_start: bool,
    /// Print Prometheus metrics when done
    #[arg(long, action = ArgAction::SetTrue)]
    metrics: bool,
}

#[derive(Serialize)]
struct SnapshotLine<'a> {
    sequence: u64,
    timestamp_ms: u64,
    width: u32,
    height: u32,
    coordinate_system: &'a fg::SpatialCoordinateSystem,
    intrinsics: &'a fg::CameraIntrinsics,
    center_ray_origin: [f64; 3],
    center_ray_direction: [f64; 3],
}

impl<'a> SnapshotLine<'a> {
    fn new(snap: &'a FrameSnapshot) -> Self {
        let frame = snap.frame();
        let (width, height) = frame.dimensions();
        let intr = snap.intrinsics();
        let (origin, direction) = snap.pixel_ray_in_world(intr.cx, intr.cy);
        Self {
            sequence: frame.sequence(),
            timestamp_ms: snap.timestamp_ms(),
            width,
            height,
            coordinate_system: snap.coordinate_system(),
            intrinsics: intr,
            center_ray_origin: origin,
            center_ray_direction: direction,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::ListSources {
            extra_color_group,
            selection,
        } => list_sources(extra_color_group, selection).await,
        Commands::Run(args) => run(args).await,
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn mock_subsystem(extra_color_group: bool) -> MockCaptureSubsystem {
    let base = MockCaptureSubsystem::single_color_camera();
    if !extra_color_group {
        return base;
    }
    let mut groups = base.groups().to_vec();
    groups.push(fg::SourceGroup {
        id: "mock-aux".to_string(),
        display_name: "Mock auxiliary camera".to_string(),
        sources: vec![
            fg::SourceDescriptor::new("aux-ir#0", fg::SourceKind::Infrared),
            fg::SourceDescriptor::new("aux-color#0", fg::SourceKind::Color),
        ],
    });
    MockCaptureSubsystem::new(groups)
}

async fn list_sources(extra_color_group: bool, selection: Selection) -> Result<()> {
    let subsystem = mock_subsystem(extra_color_group);
    let groups = subsystem.enumerate_source_groups().await?;
    for group in &groups {
        println!("{group}");
        for source in &group.sources {
            println!("\t{}\t{:?}", source.id, source.kind);
        }
    }
    match fg::select_color_source(&groups, selection.into()) {
        Some(sel) => println!("selected: {} in {}", sel.source.id, sel.group),
        None => println!("selected: none (no color source)"),
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => fg::load_config_file(path)?,
        None => GrabberConfig::default(),
    };
    if let Some(selection) = args.selection {
        config.selection = selection.into();
    }

    let mut subsystem = mock_subsystem(false);
    if args.fail_start {
        subsystem = subsystem.with_start_status(fg::ReaderStartStatus::DeviceNotAvailable);
    }

    let grabber = FrameGrabber::create(&subsystem, &config).await;
    if !grabber.is_valid() {
        let reason = grabber.failure().map(|e| e.to_string()).unwrap_or_default();
        println!(
            "{}",
            serde_json::json!({ "valid": false, "failure": reason })
        );
        return Ok(());
    }

    let reader = subsystem
        .reader()
        .ok_or_else(|| anyhow!("mock subsystem has no reader"))?;
    let frames = args.frames;
    let drop_pose_every = args.drop_pose_every;
    let interval = Duration::from_millis(args.interval_ms);
    let poll = Duration::from_millis(args.poll_ms.unwrap_or(args.interval_ms / 2).max(1));

    let producer = thread::spawn(move || {
        for seq in 1..=frames {
            let mut frame = MockFrame::new(seq);
            if drop_pose_every > 0 && seq % drop_pose_every == 0 {
                frame = frame.without_pose();
            }
            reader.deliver(Arc::new(frame));
            thread::sleep(interval);
        }
    });

    let mut last_printed = None;
    loop {
        let done = producer.is_finished();
        if let Some(snap) = grabber.latest_frame() {
            let seq = snap.frame().sequence();
            if last_printed != Some(seq) {
                println!("{}", serde_json::to_string(&SnapshotLine::new(&snap))?);
                last_printed = Some(seq);
            }
        }
        if done {
            break;
        }
        tokio::time::sleep(poll).await;
    }
    producer
        .join()
        .map_err(|_| anyhow!("frame producer thread panicked"))?;

    let stats = grabber.stats();
    info!(
        arrived = stats.frames_arrived,
        cached = stats.frames_cached,
        discarded = stats.frames_discarded,
        "run complete"
    );
    if args.metrics {
        match grabber.metrics() {
            Some(hub) => print!("{}", hub.encode_text()),
            None => warn!("metrics unavailable"),
        }
    }
    Ok(())
}
