/// eegsym: run the regular/random pipeline over BIDS subjects and save
/// every figure as SVG.
///
/// Output layout (under `--out`):
///   sub-XX_erp.svg           regular vs random ERP, PO7/PO8
///   sub-XX_tfr.svg           2×2 TFR overview
///   sub-XX_topomap.svg       scalp maps at 0.52 s and 2.0 s
///   average_erp.svg          grand-average ERP over processed subjects
///   average_topomap.svg      grand-average scalp maps
///   debug/                   diagnostic figures with --debug-images
use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use eegsym::plot::{plot_average_erp, plot_erp, plot_tfr, plot_topomap, DEFAULT_TOPOMAP_TIMES};
use eegsym::{grand_average, process_subject, BidsPath, Condition, Evoked, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "eegsym", about = "Regular/random symmetry EEG pipeline")]
struct Args {
    /// BIDS dataset root.
    #[arg(long)]
    bids_root: PathBuf,

    /// BIDS task label.
    #[arg(long)]
    task: String,

    /// Subject labels without the `sub-` prefix (comma-separated).
    #[arg(long, value_delimiter = ',', required = true)]
    subjects: Vec<String>,

    /// BIDS session label.
    #[arg(long)]
    session: Option<String>,

    /// Recording extension (`.bdf` or `.safetensors`).
    #[arg(long, default_value = ".bdf")]
    extension: String,

    /// Epoch start relative to the marker (s).
    #[arg(long, default_value_t = -0.5, allow_hyphen_values = true)]
    tmin: f64,

    /// Epoch end relative to the marker (s).
    #[arg(long, default_value_t = 2.5)]
    tmax: f64,

    /// Peak-to-peak rejection threshold in volts.
    #[arg(long)]
    reject: Option<f64>,

    /// Output directory for figures.
    #[arg(long, default_value = "figures")]
    out: PathBuf,

    /// JSON pipeline configuration; absent keys keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log the numeric routines at info level.
    #[arg(long)]
    debug_logs: bool,

    /// Write diagnostic figures for every stage.
    #[arg(long)]
    debug_images: bool,

    /// Verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => PipelineConfig { debug_dir: args.out.join("debug"), ..PipelineConfig::default() },
    };
    cfg.debug_logs |= args.debug_logs;
    cfg.debug_images |= args.debug_images;
    cfg.validate()?;

    std::fs::create_dir_all(&args.out).with_context(|| format!("creating {}", args.out.display()))?;

    let mut per_condition: BTreeMap<Condition, Vec<Evoked>> = BTreeMap::new();
    let mut failed = Vec::new();
    for subject in &args.subjects {
        let mut bids = BidsPath::new(&args.bids_root, subject.as_str(), args.task.as_str())
            .with_extension(args.extension.as_str());
        if let Some(ses) = &args.session {
            bids = bids.with_session(ses.as_str());
        }
        match run_subject(&bids, &args, &cfg) {
            Ok(evokeds) => {
                for (cond, ev) in evokeds {
                    per_condition.entry(cond).or_default().push(ev);
                }
            }
            Err(e) => {
                log::error!("sub-{subject}: {e:#}");
                failed.push(subject.clone());
            }
        }
    }

    if failed.len() == args.subjects.len() {
        bail!("every subject failed: {}", failed.join(", "));
    }

    let mut grand = BTreeMap::new();
    for (cond, evs) in &per_condition {
        grand.insert(*cond, grand_average(evs).with_context(|| format!("grand average of {cond}"))?);
    }
    plot_average_erp(&grand)?.save_svg(&args.out.join("average_erp.svg"))?;
    plot_topomap(&grand, &DEFAULT_TOPOMAP_TIMES, "Average topography")?
        .save_svg(&args.out.join("average_topomap.svg"))?;

    if !failed.is_empty() {
        log::warn!("skipped subjects: {}", failed.join(", "));
    }
    println!(
        "{} subject(s) processed, figures in {}",
        args.subjects.len() - failed.len(),
        args.out.display()
    );
    Ok(())
}

/// Process one subject, save its figures and return its evoked responses.
fn run_subject(bids: &BidsPath, args: &Args, cfg: &PipelineConfig) -> Result<BTreeMap<Condition, Evoked>> {
    let sub = &bids.subject;
    let out = process_subject(bids, args.tmin, args.tmax, args.reject, cfg)
        .with_context(|| format!("processing {}", bids.fpath().display()))?;

    let mut evokeds = BTreeMap::new();
    for cond in Condition::ALL {
        evokeds.insert(cond, out.epochs.select(cond)?.average()?);
    }

    plot_erp(&out.epochs, sub)?.save_svg(&args.out.join(format!("sub-{sub}_erp.svg")))?;
    plot_tfr(&out.powers, sub)?.save_svg(&args.out.join(format!("sub-{sub}_tfr.svg")))?;
    plot_topomap(&evokeds, &DEFAULT_TOPOMAP_TIMES, &format!("Subject {sub} topography"))?
        .save_svg(&args.out.join(format!("sub-{sub}_topomap.svg")))?;
    log::info!("sub-{sub}: figures written");
    Ok(evokeds)
}
