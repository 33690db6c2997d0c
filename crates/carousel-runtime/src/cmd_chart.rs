//! `carousel chart`: price series from a JSON file, outliers dropped, binned.

use std::path::Path;

use serde::Deserialize;

use carousel_core::chart::{
    BinSize, DataPoint, bin, bin_size_for_range, data_points, remove_outliers, sort_asc,
};
use carousel_core::types::EventRecord;

use crate::cli::ChartOpts;
use crate::render;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChartInput {
    Points(Vec<DataPoint>),
    Events(Vec<EventRecord>),
}

#[derive(Debug, serde::Serialize)]
pub(crate) struct Series {
    pub bin_size: BinSize,
    pub points: Vec<DataPoint>,
}

pub(crate) fn read_points(path: &Path) -> anyhow::Result<Vec<DataPoint>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
    let input: ChartInput = serde_json::from_str(&content).map_err(|e| {
        anyhow::anyhow!(
            "{}: expected an array of events or points: {e}",
            path.display()
        )
    })?;
    let points = match input {
        ChartInput::Points(mut points) => {
            sort_asc(&mut points);
            points
        }
        ChartInput::Events(events) => data_points(&events),
    };
    Ok(points)
}

pub(crate) fn build_series(
    points: &[DataPoint],
    bin_minutes: Option<u32>,
    outlier_scale: f64,
    sample_rate: f64,
) -> Series {
    let kept = remove_outliers(points, outlier_scale);
    let bin_size = match bin_minutes {
        Some(minutes) => BinSize::minutes(minutes),
        None => {
            let timestamps: Vec<i64> = kept.iter().map(|p| p.timestamp).collect();
            bin_size_for_range(&timestamps, sample_rate, false)
        }
    };
    tracing::debug!(
        input = points.len(),
        outliers = points.len() - kept.len(),
        bin_ms = bin_size.to_millis(),
        "chart series built"
    );
    Series {
        bin_size,
        points: bin(&kept, bin_size),
    }
}

pub fn cmd_chart(opts: &ChartOpts) -> anyhow::Result<()> {
    let points = read_points(&opts.file)?;
    let series = build_series(
        &points,
        opts.bin_minutes,
        opts.outlier_scale,
        opts.sample_rate,
    );
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&series)?);
    } else {
        print!(
            "{}",
            render::format_series(series.bin_size, &series.points, opts.decimals)
        );
    }
    Ok(())
}
