use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle, FontTransform, TextStyle};
use run_rollup::{
    aggregate_weekly, extract_runs_from_path, GreedyFirstMatch, ResolutionStrategy, RunInterval,
    WeeklyBucket,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Weekly running mileage rollup for Apple Health exports", long_about = None)]
struct Cli {
    /// Health export XML file (Apple Health `export.xml`)
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Weekly mileage CSV path (`-` for stdout, which is also the
    /// default when no other output is requested)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Resolved run list CSV path
    #[arg(long, value_hint = ValueHint::FilePath)]
    raw_csv: Option<PathBuf>,

    /// Weekly mileage bar chart PNG path
    #[arg(long, value_hint = ValueHint::FilePath)]
    chart: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    handle_rollup(cli)
}

fn handle_rollup(cli: Cli) -> Result<()> {
    let (intervals, stats) = extract_runs_from_path(&cli.input)
        .with_context(|| format!("failed to ingest {}", cli.input.display()))?;
    info!(
        "Workouts: {} seen, {} running, {} with usable distance",
        stats.workouts_seen,
        stats.running_workouts,
        intervals.len()
    );
    if stats.skipped_total() > 0 {
        warn!(
            "{} running record(s) excluded (timestamps: {}, units: {}, values: {}, missing distance: {})",
            stats.skipped_total(),
            stats.skipped_bad_timestamp,
            stats.skipped_bad_unit,
            stats.skipped_bad_value,
            stats.skipped_no_distance
        );
    }

    let runs = GreedyFirstMatch.resolve(intervals);
    info!("Running workouts after overlap filtering: {}", runs.len());
    for run in runs.iter().take(5) {
        debug!(
            "kept run: {} to {} ({:.2} mi)",
            run.start, run.end, run.distance_mi
        );
    }

    let weekly = aggregate_weekly(&runs);
    info!("Weekly buckets: {}", weekly.len());

    match cli.output.as_deref() {
        Some(path) if path.as_os_str() != "-" => {
            write_weekly_csv(&weekly, path)?;
            info!("Wrote weekly mileage CSV: {}", path.display());
        }
        Some(_) => write_weekly_stdout(&weekly)?,
        None => {
            if cli.raw_csv.is_none() && cli.chart.is_none() {
                write_weekly_stdout(&weekly)?;
            }
        }
    }

    if let Some(path) = cli.raw_csv.as_ref() {
        write_raw_csv(&runs, path)?;
        info!("Wrote resolved run CSV: {}", path.display());
    }

    if let Some(path) = cli.chart.as_ref() {
        // Outputs are independent; a chart failure must not sink the CSVs.
        if let Err(err) = render_chart(&weekly, path) {
            warn!("Skipping chart render ({}): {}", path.display(), err);
        } else {
            info!("Wrote chart: {}", path.display());
        }
    }

    Ok(())
}

fn write_weekly_stdout(weekly: &[WeeklyBucket]) -> Result<()> {
    let stdout = io::stdout();
    let handle = stdout.lock();
    let mut writer = csv::Writer::from_writer(handle);
    write_weekly_rows(weekly, &mut writer)
}

fn write_weekly_csv(weekly: &[WeeklyBucket], path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_weekly_rows(weekly, &mut writer)
}

fn write_weekly_rows<W: Write>(weekly: &[WeeklyBucket], writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record(["week_start", "total_miles"])?;
    for bucket in weekly {
        writer.write_record([
            bucket.week_start.format("%Y-%m-%d").to_string(),
            format!("{:.2}", bucket.total_mi),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_raw_csv(runs: &[RunInterval], path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(["start", "end", "distance_mi"])?;
    for run in runs {
        writer.write_record([
            run.start.format("%Y-%m-%d %H:%M:%S").to_string(),
            run.end.format("%Y-%m-%d %H:%M:%S").to_string(),
            format!("{:.3}", run.distance_mi),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn render_chart(weekly: &[WeeklyBucket], path: &Path) -> Result<()> {
    if weekly.is_empty() {
        return Err(anyhow::anyhow!("no weekly data to chart"));
    }

    let labels: Vec<String> = weekly
        .iter()
        .map(|b| b.week_start.format("%Y-%m-%d").to_string())
        .collect();
    let y_max = weekly
        .iter()
        .map(|b| b.total_mi)
        .fold(0.0_f64, f64::max)
        .max(1.0)
        * 1.15;
    let n = weekly.len();

    let root = BitMapBackend::new(path, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;

    let title_font = FontDesc::new(FontFamily::SansSerif, 28.0, FontStyle::Normal);
    let mut chart = ChartBuilder::on(&root)
        .caption("Weekly Running Mileage", title_font)
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 100)
        .build_cartesian_2d(-0.5..n as f64 - 0.5, 0.0..y_max)?;

    let axis_font = FontDesc::new(FontFamily::SansSerif, 14.0, FontStyle::Normal);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .light_line_style(&TRANSPARENT)
        .x_labels(n)
        .x_label_formatter(&|v| {
            let idx = v.round();
            if (v - idx).abs() > 0.01 || idx < 0.0 || idx as usize >= labels.len() {
                String::new()
            } else {
                labels[idx as usize].clone()
            }
        })
        .x_label_style(
            axis_font
                .clone()
                .transform(FontTransform::Rotate90)
                .color(&BLACK.mix(0.85)),
        )
        .y_label_formatter(&|v| format!("{:.0}", v))
        .y_desc("Miles")
        .label_style(axis_font.clone().color(&BLACK.mix(0.85)))
        .draw()?;

    let bar_color = RGBColor(66, 133, 244);
    chart.draw_series(weekly.iter().enumerate().map(|(i, bucket)| {
        Rectangle::new(
            [
                (i as f64 - 0.35, 0.0),
                (i as f64 + 0.35, bucket.total_mi),
            ],
            bar_color.mix(0.85).filled(),
        )
    }))?;

    let value_font = FontDesc::new(FontFamily::SansSerif, 13.0, FontStyle::Normal);
    let value_style = TextStyle::from(value_font).pos(Pos::new(HPos::Center, VPos::Bottom));
    chart.draw_series(weekly.iter().enumerate().map(|(i, bucket)| {
        Text::new(
            format!("{:.1}", bucket.total_mi),
            (i as f64, bucket.total_mi + y_max * 0.01),
            value_style.clone(),
        )
    }))?;

    root.present()?;
    Ok(())
}
