//! Filesystem artifact writers (spec §6.4).
//!
//! The miniSEED frame format, the plot renderer, and the PSD algorithm
//! itself are all explicitly out of scope (spec §1) — these writers exist
//! so the per-day output tree has the files a downstream consumer expects,
//! not so that the files are valid miniSEED/PNG/npz. Each writer's content
//! is a plain-text or raw-sample placeholder.

use crate::metrics::ppsd::PpsdMetrics;
use crate::metrics::Stream;
use chrono::NaiveDate;
use std::io::{self, Write};
use std::path::PathBuf;

fn day_dir(root: &str, date: NaiveDate) -> PathBuf {
    PathBuf::from(root).join(date.format("%Y-%m-%d").to_string())
}

/// `<outputmseed>/<D>/<code>_<comp>.mseed` — raw big-endian 32-bit samples,
/// no frame headers.
pub fn write_mseed(root: &str, date: NaiveDate, code: &str, channel: &str, stream: &Stream) -> io::Result<()> {
    let dir = day_dir(root, date);
    std::fs::create_dir_all(&dir)?;
    let mut file = std::fs::File::create(dir.join(format!("{code}_{channel}.mseed")))?;
    for trace in &stream.traces {
        for &sample in &trace.samples {
            file.write_all(&(sample as i32).to_be_bytes())?;
        }
    }
    Ok(())
}

/// `<outputsignal>/<D>/<code>_<comp>_signal.png`.
pub fn write_signal_plot(root: &str, date: NaiveDate, code: &str, channel: &str, stream: &Stream) -> io::Result<()> {
    let dir = day_dir(root, date);
    std::fs::create_dir_all(&dir)?;
    let sample_count: usize = stream.traces.iter().map(|t| t.samples.len()).sum();
    std::fs::write(
        dir.join(format!("{code}_{channel}_signal.png")),
        format!("signal placeholder: {} traces, {sample_count} samples\n", stream.traces.len()),
    )
}

/// `<outputpdf>/<D>/<code>_<comp>_PDF.png`, written only when PPSD metrics
/// were actually computed for this component.
pub fn write_pdf_plot(root: &str, date: NaiveDate, code: &str, channel: &str, metrics: &PpsdMetrics) -> io::Result<()> {
    let dir = day_dir(root, date);
    std::fs::create_dir_all(&dir)?;
    std::fs::write(
        dir.join(format!("{code}_{channel}_PDF.png")),
        format!(
            "pdf placeholder: pct_h={:.2} pct_l={:.2} dcl={:.2} dcg={}\n",
            metrics.pct_h, metrics.pct_l, metrics.dcl, metrics.dcg
        ),
    )
}

/// `<outputpsd>/<D>/..._<trace-id>.npz`, written only when `--ppsd` is set
/// and PPSD metrics were actually computed.
pub fn write_psd_npz(
    root: &str,
    date: NaiveDate,
    code: &str,
    channel: &str,
    trace_id: &str,
    metrics: &PpsdMetrics,
) -> io::Result<()> {
    let dir = day_dir(root, date);
    std::fs::create_dir_all(&dir)?;
    let mut file = std::fs::File::create(dir.join(format!("{code}_{channel}_{trace_id}.npz")))?;
    writeln!(
        file,
        "pct_h,pct_l,dcl,dcg,band_long,band_micro,band_short\n{},{},{},{},{},{},{}",
        metrics.pct_h,
        metrics.pct_l,
        metrics.dcl,
        metrics.dcg,
        metrics.band_pct.long,
        metrics.band_pct.micro,
        metrics.band_pct.short
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Trace;
    use chrono::Utc;

    fn sample_stream() -> Stream {
        Stream {
            traces: vec![Trace {
                samples: vec![0.0, 1.0, 2.0],
                start: Utc::now(),
                sample_rate_hz: 100.0,
            }],
        }
    }

    #[test]
    fn write_signal_plot_creates_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("signal");
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        write_signal_plot(root.to_str().unwrap(), date, "MSAI", "BHZ", &sample_stream()).unwrap();
        assert!(root.join("2024-03-05").join("MSAI_BHZ_signal.png").exists());
    }

    #[test]
    fn write_mseed_writes_four_bytes_per_sample() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("mseed");
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        write_mseed(root.to_str().unwrap(), date, "MSAI", "BHZ", &sample_stream()).unwrap();
        let bytes = std::fs::read(root.join("2024-03-05").join("MSAI_BHZ.mseed")).unwrap();
        assert_eq!(bytes.len(), 3 * 4);
    }

    #[test]
    fn write_psd_npz_creates_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("psd");
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let metrics = PpsdMetrics {
            pct_h: 1.0,
            pct_l: 2.0,
            dcl: 3.0,
            dcg: false,
            band_pct: Default::default(),
        };
        write_psd_npz(root.to_str().unwrap(), date, "MSAI", "BHZ", "IA.MSAI.00.BHZ", &metrics).unwrap();
        assert!(root.join("2024-03-05").join("MSAI_BHZ_IA.MSAI.00.BHZ.npz").exists());
    }
}
