use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use cinescroll::{
    FrameStore, PlaybackEngine, Progress, SequenceSpec, Storyboard, ViewportState,
    evaluate_timeline,
};

#[derive(Parser, Debug)]
#[command(name = "cinescroll", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the showcase canvas at a scroll progress as a PNG.
    Frame(FrameArgs),
    /// Evaluate scene styles at a scroll progress and print JSON.
    Styles(StylesArgs),
    /// Write the default five-scene storyboard as JSON.
    Init(InitArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input storyboard JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Scroll progress in [0, 1].
    #[arg(long)]
    progress: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Displayed canvas width in logical pixels.
    #[arg(long, default_value_t = 1280.0)]
    width: f64,

    /// Displayed canvas height in logical pixels.
    #[arg(long, default_value_t = 720.0)]
    height: f64,

    /// Device pixel ratio.
    #[arg(long, default_value_t = 1.0)]
    scale: f64,

    /// Max seconds to wait for the frame sequence to finish loading.
    #[arg(long, default_value_t = 60)]
    wait_secs: u64,

    /// Also print evaluated scene styles to stderr.
    #[arg(long)]
    dump_styles: bool,
}

#[derive(Parser, Debug)]
struct StylesArgs {
    /// Input storyboard JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Scroll progress in [0, 1].
    #[arg(long)]
    progress: f64,
}

#[derive(Parser, Debug)]
struct InitArgs {
    /// Output storyboard JSON path.
    #[arg(long)]
    out: PathBuf,

    /// Frame directory, relative to the storyboard.
    #[arg(long, default_value = "sequence")]
    frames_root: String,

    /// Frame file prefix.
    #[arg(long, default_value = "reel-frame")]
    prefix: String,

    /// Frame file extension.
    #[arg(long, default_value = "jpg")]
    ext: String,

    /// Total frame count.
    #[arg(long, default_value_t = 240)]
    count: u32,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Styles(args) => cmd_styles(args),
        Command::Init(args) => cmd_init(args),
    }
}

fn read_storyboard(path: &Path) -> anyhow::Result<Storyboard> {
    let f = File::open(path).with_context(|| format!("open storyboard '{}'", path.display()))?;
    let r = BufReader::new(f);
    let mut board: Storyboard =
        serde_json::from_reader(r).with_context(|| "parse storyboard JSON")?;
    board.validate()?;

    // Frame paths resolve relative to the storyboard file.
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let root = base.join(&board.sequence.root);
    board.sequence.root = root.to_string_lossy().into_owned();

    Ok(board)
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let board = read_storyboard(&args.in_path)?;

    let store = FrameStore::begin_load(&board.sequence)?;
    if !store.wait_until_ready(Duration::from_secs(args.wait_secs)) {
        anyhow::bail!(
            "sequence did not finish loading ({} of {} frames, {:.0}%)",
            store.loaded(),
            store.count(),
            store.progress() * 100.0
        );
    }

    let progress = Progress::new(args.progress);
    let mut engine = PlaybackEngine::new(
        store,
        board.background,
        ViewportState::new(args.width, args.height, args.scale),
    );
    let frame = engine
        .redraw(progress)?
        .context("nothing drawn (empty viewport?)")?;

    if args.dump_styles {
        let snapshot = evaluate_timeline(&board, progress);
        eprintln!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ExtendedColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_styles(args: StylesArgs) -> anyhow::Result<()> {
    let board = read_storyboard(&args.in_path)?;
    let snapshot = evaluate_timeline(&board, Progress::new(args.progress));
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn cmd_init(args: InitArgs) -> anyhow::Result<()> {
    let board = Storyboard::showcase_default(SequenceSpec {
        root: args.frames_root,
        prefix: args.prefix,
        padding: 3,
        ext: args.ext,
        count: args.count,
    });
    board.validate()?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, serde_json::to_string_pretty(&board)?)
        .with_context(|| format!("write storyboard '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
