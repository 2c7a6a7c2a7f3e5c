/// pipeline_steps: run each cleaning step on one recording and write every
/// intermediate array to a safetensors file for side-by-side comparison.
///
/// Output keys:
///   raw          [C, T_orig]   f64  recording as loaded
///   referenced   [C', T_orig]  f64  after dropping EXG1..EXG8 + average reference
///   filtered     [C', T_orig]  f64  after the band-pass FIR
///   resampled    [C', T]       f64  after resampling to the target rate
///   cleaned      [C', T]       f64  after ICA component removal
///   epochs       [E, C_eeg, N] f64  baseline-corrected epochs
///   epoch_codes  [E]           i32  marker code of each epoch
///   ica_exclude  [K_ex]        i32  removed components
///   fir          [L]           f64  filter taps
///   ch_names     newline-separated names of the cleaned channels
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use eegsym::{
    bdf::read_raw_bdf,
    filter::create_filter,
    filter::apply_fir_zero_phase,
    io::{RawData, StWriter},
    montage::{make_standard_montage, set_montage},
    pipeline::{epoch_data, fit_artifact_model},
    reference::set_average_reference,
    resample::resample_raw,
    PipelineConfig,
};

#[derive(Parser, Debug)]
#[command(name = "pipeline_steps")]
struct Args {
    /// Input recording (`.bdf` or `.safetensors`).
    #[arg(long)]
    input: PathBuf,

    /// Output safetensors path.
    #[arg(long)]
    output: PathBuf,

    /// Epoch start (s).
    #[arg(long, default_value_t = -0.5, allow_hyphen_values = true)]
    tmin: f64,

    /// Epoch end (s).
    #[arg(long, default_value_t = 2.5)]
    tmax: f64,

    /// JSON pipeline configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp(None)
        .init();
    let args = Args::parse();
    let cfg = match &args.config {
        Some(p) => PipelineConfig::from_json_file(p)?,
        None => PipelineConfig::default(),
    };

    // ── 1. Read ────────────────────────────────────────────────────────────
    let t_read = now();
    let raw = match args.input.extension().and_then(|e| e.to_str()) {
        Some("bdf") => read_raw_bdf(&args.input)?,
        _ => RawData::load(&args.input)?.into_raw()?,
    };
    let ms_read = t_read.elapsed().as_secs_f64() * 1000.0;
    let data_raw = raw.data.clone();
    let src_sfreq = raw.sfreq;

    // ── 2. Drop auxiliary channels, montage, average reference ────────────
    let t_ref = now();
    let raw = raw
        .drop_channels(&cfg.aux_channel_refs())
        .context("dropping auxiliary channels")?;
    let raw = set_montage(raw, &make_standard_montage("standard_1020")?, false)?;
    let raw = set_average_reference(raw)?;
    let ms_ref = t_ref.elapsed().as_secs_f64() * 1000.0;
    let data_ref = raw.data.clone();

    // ── 3. Band-pass ───────────────────────────────────────────────────────
    let t_fir = now();
    let mut raw = raw;
    let h = create_filter(cfg.l_freq, cfg.h_freq, raw.sfreq)?;
    let picks = raw.eeg_picks();
    apply_fir_zero_phase(&mut raw.data, &h, &picks);
    let ms_fir = t_fir.elapsed().as_secs_f64() * 1000.0;
    let data_fir = raw.data.clone();

    // ── 4. Resample ────────────────────────────────────────────────────────
    let t_rs = now();
    let raw = resample_raw(raw, cfg.target_sfreq)?;
    let ms_rs = t_rs.elapsed().as_secs_f64() * 1000.0;
    let data_rs = raw.data.clone();

    // ── 5. ICA ─────────────────────────────────────────────────────────────
    let t_ica = now();
    let ica = fit_artifact_model(&raw, &cfg)?;
    let raw = ica.apply(raw)?;
    let ms_ica = t_ica.elapsed().as_secs_f64() * 1000.0;

    // ── 6. Epochs ──────────────────────────────────────────────────────────
    let t_ep = now();
    let epochs = epoch_data(&raw, args.tmin, args.tmax, None, &cfg)?;
    let ms_ep = t_ep.elapsed().as_secs_f64() * 1000.0;

    // Format: "TIMING read=Xms ref=Xms fir=Xms resample=Xms ica=Xms epochs=Xms"
    eprintln!(
        "TIMING read={ms_read:.4}ms ref={ms_ref:.4}ms fir={ms_fir:.4}ms \
         resample={ms_rs:.4}ms ica={ms_ica:.4}ms epochs={ms_ep:.4}ms",
    );
    eprintln!(
        "  {} ch  src_sfreq={src_sfreq} Hz  {} taps  {} epochs  excluded {:?}",
        raw.n_channels(),
        h.len(),
        epochs.len(),
        ica.exclude
    );

    // ── 7. Write output ────────────────────────────────────────────────────
    eprintln!("Writing → {}", args.output.display());
    let mut w = StWriter::new();
    w.add_f64_arr2("raw", &data_raw);
    w.add_f64_arr2("referenced", &data_ref);
    w.add_f64_arr2("filtered", &data_fir);
    w.add_f64_arr2("resampled", &data_rs);
    w.add_f64_arr2("cleaned", &raw.data);
    w.add_f64_arr3("epochs", &epochs.data);
    let codes: Vec<i32> = epochs.events.iter().map(|&(_, c)| c.code()).collect();
    w.add_i32("epoch_codes", &codes, &[codes.len()]);
    let excluded: Vec<i32> = ica.exclude.iter().map(|&k| k as i32).collect();
    w.add_i32("ica_exclude", &excluded, &[excluded.len()]);
    w.add_f64("fir", &h, &[h.len()]);
    w.add_lines("ch_names", raw.ch_names.iter().map(String::as_str));
    w.write(&args.output)?;

    eprintln!("Done.");
    Ok(())
}

/// Return `std::time::Instant::now()` (used for internal timing).
#[inline(always)]
fn now() -> std::time::Instant {
    std::time::Instant::now()
}
