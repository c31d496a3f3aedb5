use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use framescrub::{
    EngineConfig, FrameIndex, FramePattern, FsLoader, ImageExt, ImageLoader, LoadTicket,
    ProbeAction, ScrollTrace, Scrubber, TotalProbe,
};

#[derive(Parser, Debug)]
#[command(name = "framescrub", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a recorded scroll trace against a frame directory.
    Replay(ReplayArgs),
    /// Report the last frame present in a directory.
    Probe(ProbeArgs),
}

#[derive(Parser, Debug)]
struct ReplayArgs {
    /// Scroll trace JSON.
    #[arg(long)]
    trace: PathBuf,

    /// Directory containing the frame sequence.
    #[arg(long)]
    frames: PathBuf,

    /// Engine configuration JSON (defaults apply when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tick cadence in milliseconds.
    #[arg(long, default_value_t = 10)]
    tick_ms: u64,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Directory containing the frame sequence.
    #[arg(long)]
    frames: PathBuf,

    /// Upper bound on the frame count.
    #[arg(long, default_value_t = 100_000)]
    limit: u32,

    /// Frame file extension.
    #[arg(long, value_enum, default_value_t = ExtArg::Png)]
    ext: ExtArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExtArg {
    Png,
    Webp,
}

impl From<ExtArg> for ImageExt {
    fn from(ext: ExtArg) -> Self {
        match ext {
            ExtArg::Png => ImageExt::Png,
            ExtArg::Webp => ImageExt::Webp,
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Replay(args) => cmd_replay(args),
        Command::Probe(args) => cmd_probe(args),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn read_trace(path: &Path) -> anyhow::Result<ScrollTrace> {
    let f = File::open(path).with_context(|| format!("open trace '{}'", path.display()))?;
    let trace = ScrollTrace::from_reader(BufReader::new(f))
        .with_context(|| format!("parse trace '{}'", path.display()))?;
    Ok(trace)
}

fn read_config(path: &Path) -> anyhow::Result<EngineConfig> {
    let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
    let config: EngineConfig =
        serde_json::from_reader(BufReader::new(f)).with_context(|| "parse config JSON")?;
    Ok(config)
}

fn cmd_replay(args: ReplayArgs) -> anyhow::Result<()> {
    let trace = read_trace(&args.trace)?;
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => EngineConfig::default(),
    };
    // Locators resolve relative to --frames.
    config.base_path = String::new();
    config.max_scroll_px = trace.max_scroll_px;

    let mut loader = FsLoader::new(&args.frames, config.max_concurrent);
    let mut scrubber = Scrubber::new(config)?;

    let tick = Duration::from_millis(args.tick_ms.max(1));
    let started = Instant::now();
    let end_ms = trace.end_ms();
    let mut events = trace.events.iter().peekable();

    loop {
        let now_ms = started.elapsed().as_millis() as u64;
        while let Some(event) = events.peek() {
            if event.at_ms > now_ms {
                break;
            }
            scrubber.on_scroll(now_ms, event.position_px);
            events.next();
        }

        let update = scrubber.tick(now_ms, &mut loader);
        if let Some(displayed) = &update.display {
            info!(frame = displayed.index.0, locator = %displayed.locator, "display");
        }
        if update.completed_now {
            info!("animation complete");
        }

        if events.peek().is_none() && now_ms > end_ms && update.settled && scrubber.loads_idle() {
            break;
        }
        if now_ms > end_ms.saturating_add(30_000) {
            warn!("replay did not settle, stopping");
            break;
        }
        thread::sleep(tick);
    }

    info!(
        completed = scrubber.is_complete(),
        frame = scrubber.displayed().map(|f| f.0),
        "replay finished"
    );
    println!("{}", serde_json::to_string_pretty(&scrubber.stats())?);
    Ok(())
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let pattern = FramePattern {
        base_path: String::new(),
        ext: args.ext.into(),
        cache_bust: None,
    };
    let mut loader = FsLoader::new(&args.frames, 1);
    let mut probe = TotalProbe::new(1, 1.0);
    probe.begin(FrameIndex(0), FrameIndex(args.limit));

    let mut next_ticket = 0u64;
    loop {
        match probe.poll() {
            ProbeAction::Request(index) => {
                loader.start(LoadTicket(next_ticket), &pattern.resolve(index));
                next_ticket += 1;
                let outcome = loop {
                    if let Some(completion) = loader.drain().pop() {
                        break completion.outcome;
                    }
                    thread::sleep(Duration::from_millis(2));
                };
                probe.on_result(outcome.is_ok());
            }
            ProbeAction::Done { last_valid } => {
                match last_valid {
                    Some(frame) => {
                        println!("last frame: {frame} ({} frames total)", frame.0 + 1)
                    }
                    None => println!("no frames found"),
                }
                return Ok(());
            }
            ProbeAction::Wait | ProbeAction::Idle => {
                thread::sleep(Duration::from_millis(2));
            }
        }
    }
}
