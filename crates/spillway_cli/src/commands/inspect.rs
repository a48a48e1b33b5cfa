//! Inspect command implementation.

use serde::Serialize;
use spillway_core::spill::record::{scan_frames, FrameScan};
use spillway_core::NotificationKind;
use spillway_storage::{FileBackend, StorageBackend};
use std::path::Path;

/// Frame representation for output.
#[derive(Debug, Serialize)]
pub struct FrameRow {
    /// Offset in the segment file.
    pub offset: u64,
    /// Notification kind.
    pub kind: &'static str,
    /// Payload size in bytes.
    pub payload_len: u32,
    /// Whether the stored checksum matches.
    pub crc_ok: bool,
}

/// Segment summary for output.
#[derive(Debug, Serialize)]
pub struct SegmentReport {
    /// File size in bytes.
    pub size: u64,
    /// Frames listed.
    pub frames: Vec<FrameRow>,
    /// Frames with a checksum mismatch.
    pub corrupt_frames: usize,
    /// Bytes after the last whole frame.
    pub trailing_bytes: u64,
    /// Why the walk stopped early, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_on: Option<String>,
}

/// Runs the inspect command.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("segment file not found: {}", path.display()).into());
    }

    let backend = FileBackend::open(path)?;
    let report = build_report(&backend, limit)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(path, &report);
        }
    }

    Ok(())
}

fn build_report(
    backend: &dyn StorageBackend,
    limit: Option<usize>,
) -> Result<SegmentReport, Box<dyn std::error::Error>> {
    let size = backend.size()?;
    let FrameScan {
        frames,
        trailing_bytes,
        stopped_on,
    } = scan_frames(backend, limit)?;

    let frames: Vec<FrameRow> = frames
        .into_iter()
        .map(|frame| FrameRow {
            offset: frame.offset,
            kind: kind_label(frame.kind),
            payload_len: frame.payload_len,
            crc_ok: frame.crc_ok,
        })
        .collect();
    let corrupt_frames = frames.iter().filter(|f| !f.crc_ok).count();

    Ok(SegmentReport {
        size,
        frames,
        corrupt_frames,
        trailing_bytes,
        stopped_on,
    })
}

fn kind_label(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Value => "VALUE",
        NotificationKind::Error => "ERROR",
        NotificationKind::Complete => "COMPLETE",
    }
}

fn print_text_output(path: &Path, report: &SegmentReport) {
    println!("Segment: {}", path.display());
    println!("================");
    println!("Size:   {} bytes", report.size);
    println!("Frames: {}", report.frames.len());
    println!();

    for frame in &report.frames {
        print!(
            "[{:08}] {:8} payload={} bytes",
            frame.offset, frame.kind, frame.payload_len
        );
        if !frame.crc_ok {
            print!(" CRC MISMATCH");
        }
        println!();
    }

    if report.corrupt_frames > 0 {
        println!();
        println!("{} frame(s) failed checksum", report.corrupt_frames);
    }
    if report.trailing_bytes > 0 {
        println!("{} trailing byte(s) after the last frame", report.trailing_bytes);
    }
    if let Some(reason) = &report.stopped_on {
        println!("Stopped: {reason}");
    }
}
