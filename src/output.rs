use anyhow::{Context, Result};
use log::{error, info};
use schelling_common::{OutputConfig, SweepReport, ThresholdStats};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// On-disk encodings of a [`SweepReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Bincode,
    MessagePack,
}

impl ReportFormat {
    /// Parses the `[output] format` value. Unknown names fall back to JSON.
    pub fn from_name(name: &str) -> Self {
        match name {
            "json" => ReportFormat::Json,
            "bincode" => ReportFormat::Bincode,
            "messagepack" => ReportFormat::MessagePack,
            other => {
                error!("Unknown output format: {}. Using JSON instead.", other);
                ReportFormat::Json
            }
        }
    }

    /// Guesses the format from a file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("bin") => ReportFormat::Bincode,
            Some("msgpack") => ReportFormat::MessagePack,
            _ => ReportFormat::Json,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Bincode => "bin",
            ReportFormat::MessagePack => "msgpack",
        }
    }
}

/// Writes `(threshold, min, mean, max)` rows with a header.
pub fn write_stats_csv<W: Write>(stats: &ThresholdStats, writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["threshold", "min", "mean", "max"])?;
    for (threshold, min, mean, max) in stats.points() {
        writer.write_record(&[
            format!("{:.2}", threshold),
            format!("{:.6}", min),
            format!("{:.6}", mean),
            format!("{:.6}", max),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_report(report: &SweepReport, path: &Path, format: ReportFormat) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create report file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    match format {
        ReportFormat::Json => serde_json::to_writer(&mut writer, report)
            .context("Failed to serialize report to JSON")?,
        ReportFormat::Bincode => bincode::serialize_into(&mut writer, report)
            .context("Failed to serialize report to bincode")?,
        ReportFormat::MessagePack => rmp_serde::encode::write(&mut writer, report)
            .context("Failed to serialize report to MessagePack")?,
    }
    writer.flush()?;
    Ok(())
}

/// Reads a report written by [`write_report`], picking the decoder from the extension.
pub fn read_report(path: &Path) -> Result<SweepReport> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open report file '{}'", path.display()))?;
    let reader = BufReader::new(file);
    let report: SweepReport = match ReportFormat::from_path(path) {
        ReportFormat::Json => serde_json::from_reader(reader).context("Failed to parse JSON report")?,
        ReportFormat::Bincode => bincode::deserialize_from(reader).context("Failed to parse bincode report")?,
        ReportFormat::MessagePack => rmp_serde::from_read(reader).context("Failed to parse MessagePack report")?,
    };
    Ok(report)
}

/// Writes everything `[output]` asks for and returns the files written.
pub fn save_outputs(report: &SweepReport, output: &OutputConfig) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    if output.save_stats {
        let filename = PathBuf::from(format!("{}_stats.csv", output.base_filename));
        let file = File::create(&filename)
            .with_context(|| format!("Failed to create stats file '{}'", filename.display()))?;
        write_stats_csv(&report.stats, BufWriter::new(file))?;
        info!("Threshold stats saved to {}", filename.display());
        written.push(filename);
    } else {
        info!("Skipping threshold stats as per config (save_stats is false).");
    }

    if output.save_matrix {
        let format = ReportFormat::from_name(output.format.as_deref().unwrap_or("json"));
        let filename = PathBuf::from(format!("{}_report.{}", output.base_filename, format.extension()));
        write_report(report, &filename, format)?;
        info!("Sweep report saved to {} ({:?})", filename.display(), format);
        written.push(filename);
    } else {
        info!("Skipping sweep report as per config (save_matrix is false).");
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use schelling_common::ExperimentMatrix;

    fn report() -> SweepReport {
        let values: Vec<f64> = (0..200).map(|i| (i % 7) as f64 / 7.0).collect();
        let matrix = ExperimentMatrix::from_values(2, values).unwrap();
        SweepReport {
            seed: 42,
            random: false,
            simulations: 2,
            max_iterations: 10,
            width: 5,
            height: 6,
            neighbour_depth: 1,
            stats: matrix.stats(),
            matrix,
        }
    }

    #[test]
    fn test_stats_csv_layout() {
        let mut buf = Vec::new();
        write_stats_csv(&report().stats, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 101);
        assert_eq!(lines[0], "threshold,min,mean,max");
        assert!(lines[1].starts_with("0.01,"));
        assert!(lines[100].starts_with("1.00,"));
    }

    #[test]
    fn test_report_files_read_back() {
        let dir = std::env::temp_dir().join(format!("schelling-output-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let original = report();
        for format in [ReportFormat::Json, ReportFormat::Bincode, ReportFormat::MessagePack] {
            let path = dir.join(format!("report.{}", format.extension()));
            write_report(&original, &path, format).unwrap();
            let loaded = read_report(&path).unwrap();
            assert_eq!(loaded.seed, 42);
            assert_eq!(loaded.matrix.simulations(), 2);
            for t in 1..=100 {
                for (a, b) in loaded.matrix.row(t).iter().zip(original.matrix.row(t)) {
                    assert!((a - b).abs() < 1e-12);
                }
            }
        }
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_format_names() {
        assert_eq!(ReportFormat::from_name("bincode"), ReportFormat::Bincode);
        assert_eq!(ReportFormat::from_name("xml"), ReportFormat::Json);
        assert_eq!(ReportFormat::from_path(Path::new("a/b.msgpack")), ReportFormat::MessagePack);
    }
}
