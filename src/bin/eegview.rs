/// eegview: open a recording, overlay predictions, and print a rendered
/// frame, an export plan, or channel statistics as JSON on stdout.
///
/// Timings and progress go to stderr (`RUST_LOG=info` for more).
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use eegview::{
    config::{ViewerConfig, WindowSize},
    edf::{plan_export, EdfHeader},
    filter::FilterProgress,
    io,
    Direction, Session,
};

#[derive(Parser, Debug)]
#[command(name = "eegview", about = "EEG prediction overlay viewer core")]
struct Args {
    /// Recording safetensors file.
    #[arg(long)]
    file: PathBuf,

    /// Prediction tensor to overlay.
    #[arg(long)]
    predictions: Option<PathBuf>,

    /// Treat predictions as multi-class scores rather than probabilities.
    #[arg(long)]
    multi_class: bool,

    /// Channel labels to keep, one per line, in display order.
    #[arg(long)]
    channel_list: Option<PathBuf>,

    /// Annotation JSON sidecar.
    #[arg(long)]
    annotations: Option<PathBuf>,

    /// Initial window start (s).
    #[arg(long, default_value_t = 0)]
    location: usize,

    /// Window width (s): 1, 5, 10, 15, 20, 25 or 30.
    #[arg(long, default_value_t = 10)]
    window: u32,

    /// Filter spec `enabled,lp,hp,notch,bp1,bp2`.
    #[arg(long, value_delimiter = ',', num_args = 6, default_values_t = [0.0, 30.0, 2.0, 0.0, 0.0, 0.0])]
    filter: Vec<f64>,

    /// Binary prediction threshold.
    #[arg(long, default_value_t = 0.5)]
    threshold: f64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the frame at the current window.
    Render {
        /// Move right (positive) or left (negative) by this many seconds first.
        #[arg(long, allow_hyphen_values = true, default_value_t = 0)]
        shift: i64,

        /// Amplitude steps: positive tightens spacing, negative widens it.
        #[arg(long, allow_hyphen_values = true, default_value_t = 0)]
        amplitude: i32,

        /// Jump to the onset of this annotation first.
        #[arg(long)]
        annotation: Option<usize>,
    },
    /// Lay out an EDF+ export and write its signals to a safetensors bundle.
    Export {
        #[arg(long)]
        output: PathBuf,

        /// EDF file whose identification header is reused.
        #[arg(long)]
        header_from: Option<PathBuf>,
    },
    /// Mean, variance, line length and band powers of one channel.
    Stats {
        #[arg(long)]
        channel: usize,
        /// First sample.
        #[arg(long)]
        start: usize,
        /// One past the last sample.
        #[arg(long)]
        end: usize,
    },
}

/// Progress printed to stderr every 10 %.
struct StderrProgress {
    last: usize,
}

impl FilterProgress for StderrProgress {
    fn advance(&mut self, done: usize, total: usize) {
        let pct = done * 100 / total.max(1);
        if pct >= self.last + 10 || done == total {
            eprintln!("  filtering {pct}%");
            self.last = pct;
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let filter: [f64; 6] = args
        .filter
        .as_slice()
        .try_into()
        .context("--filter takes exactly six values")?;
    let cfg = ViewerConfig {
        recording: Some(args.file.clone()),
        predictions: args.predictions.clone(),
        channel_list: args.channel_list.clone(),
        location: args.location,
        window: WindowSize::try_from(args.window)?,
        filter,
        threshold: args.threshold,
    };
    cfg.validate()?;

    let t_load = std::time::Instant::now();
    let mut rec = io::load_recording(&args.file)?;
    if let Some(path) = &cfg.channel_list {
        rec = rec.select_channels(&io::load_channel_list(path)?)?;
    }
    if let Some(path) = &args.annotations {
        rec = rec.with_annotations(io::load_annotations(path)?);
    }
    let ms_load = t_load.elapsed().as_secs_f64() * 1000.0;

    let mut session = Session::new(rec, &cfg)?;
    if let Some(path) = &cfg.predictions {
        let tensor = io::load_predictions(path)?;
        session
            .load_predictions(tensor, !args.multi_class)
            .with_context(|| format!("rejected predictions from {}", path.display()))?;
    }

    let t_run = std::time::Instant::now();
    let json = match args.command {
        Command::Render { shift, amplitude, annotation } => {
            if let Some(i) = annotation {
                session.jump_to_annotation(i)?;
            }
            if shift != 0 {
                let dir = if shift > 0 { Direction::Right } else { Direction::Left };
                session.move_plot(dir, shift.unsigned_abs() as usize)?;
            }
            for _ in 0..amplitude.unsigned_abs() {
                if amplitude > 0 {
                    session.inc_amplitude()?;
                } else {
                    session.dec_amplitude()?;
                }
            }
            serde_json::to_string_pretty(&session.render()?)?
        }
        Command::Export { output, header_from } => {
            let header = match header_from {
                Some(path) => io::read_edf_header(&path)?,
                None => EdfHeader::default(),
            };
            let plan = plan_export(
                session.recording(),
                session.filter(),
                session.predictions(),
                header,
                &mut StderrProgress { last: 0 },
            )?
            .context("export canceled")?;
            io::write_export(&plan, &output)?;
            serde_json::to_string_pretty(&plan)?
        }
        Command::Stats { channel, start, end } => {
            let stats = session.get_stats(channel, start, end)?;
            let power = session.get_power(channel, start, end)?;
            serde_json::to_string_pretty(&serde_json::json!({ "stats": stats, "power": power }))?
        }
    };
    let ms_run = t_run.elapsed().as_secs_f64() * 1000.0;

    println!("{json}");
    eprintln!("TIMING load={ms_load:.2}ms run={ms_run:.2}ms");
    Ok(())
}
