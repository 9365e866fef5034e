// SPDX-License-Identifier: GPL-3.0-only

//! File and stdout output with keyframe-aligned segmenting
//!
//! Segment 0 is written to the path given by the user. Each split opens
//! `<stem>_<nnnn>.<ext>` next to it. A split requested mid-GOP waits for
//! the next keyframe so every segment starts decodable.

use super::Output;
use crate::backends::camera::types::FrameMetadata;
use crate::config::MetadataFormat;
use crate::errors::{OutputError, OutputResult};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

enum Target {
    Stdout,
    File(PathBuf),
}

pub struct FileOutput {
    target: Target,
    writer: Option<BufWriter<Box<dyn Write + Send>>>,
    segment: u32,
    split_pending: bool,
    pts: Option<BufWriter<File>>,
    first_timestamp_us: Option<i64>,
    metadata: Option<MetadataWriter>,
    frames: u64,
    closed: bool,
}

impl FileOutput {
    /// Write segment 0 to `path`, creating it now so permission problems
    /// surface before capture starts
    pub fn create(path: &Path) -> OutputResult<Self> {
        let writer = open_segment(path)?;
        info!(path = %path.display(), "Writing output");
        Ok(Self::with_writer(Target::File(path.to_path_buf()), writer))
    }

    /// Write to standard output; splits are ignored
    pub fn stdout() -> Self {
        Self::with_writer(Target::Stdout, Box::new(std::io::stdout()))
    }

    fn with_writer(target: Target, writer: Box<dyn Write + Send>) -> Self {
        Self {
            target,
            writer: Some(BufWriter::new(writer)),
            segment: 0,
            split_pending: false,
            pts: None,
            first_timestamp_us: None,
            metadata: None,
            frames: 0,
            closed: false,
        }
    }

    /// Also write a timecode v2 file with one millisecond timestamp per frame
    pub fn with_pts(mut self, path: &Path) -> OutputResult<Self> {
        let mut pts = BufWriter::new(create_file(path)?);
        writeln!(pts, "# timecode format v2")?;
        self.pts = Some(pts);
        Ok(self)
    }

    /// Also write per-frame metadata
    pub fn with_metadata(mut self, path: &Path, format: MetadataFormat) -> OutputResult<Self> {
        self.metadata = Some(MetadataWriter::create(path, format)?);
        Ok(self)
    }

    /// Index of the segment currently being written
    pub fn segment(&self) -> u32 {
        self.segment
    }

    fn rotate(&mut self) -> OutputResult<()> {
        let Target::File(base) = &self.target else {
            return Ok(());
        };

        // The current segment stays in place until its successor exists
        let next = self.segment + 1;
        let path = segment_path(base, next);
        let opened = BufWriter::new(open_segment(&path)?);

        let previous = self.writer.replace(opened);
        self.segment = next;
        if let Some(mut previous) = previous {
            previous.flush()?;
        }
        info!(segment = next, path = %path.display(), "Started new output segment");
        Ok(())
    }
}

impl Output for FileOutput {
    fn output_ready(&mut self, data: &[u8], timestamp_us: i64, keyframe: bool) -> OutputResult<()> {
        // A failed split is reported but the frame still lands in the
        // current segment
        let mut split_result = Ok(());
        if self.split_pending && keyframe {
            self.split_pending = false;
            split_result = self.rotate();
        }

        let writer = self.writer.as_mut().ok_or(OutputError::Closed)?;
        writer.write_all(data)?;

        if let Some(pts) = self.pts.as_mut() {
            let first = *self.first_timestamp_us.get_or_insert(timestamp_us);
            writeln!(pts, "{}", pts_line(timestamp_us - first))?;
        }

        self.frames += 1;
        split_result
    }

    fn metadata_ready(&mut self, metadata: &FrameMetadata) -> OutputResult<()> {
        match self.metadata.as_mut() {
            Some(writer) => writer.write(metadata),
            None => Ok(()),
        }
    }

    fn start_new_segment(&mut self) -> OutputResult<()> {
        match self.target {
            Target::Stdout => warn!("Cannot split output written to stdout"),
            Target::File(_) => {
                debug!(segment = self.segment, "Split requested");
                self.split_pending = true;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> OutputResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        if let Some(mut pts) = self.pts.take() {
            pts.flush()?;
        }
        if let Some(metadata) = self.metadata.take() {
            metadata.finish()?;
        }
        info!(
            frames = self.frames,
            segments = self.segment + 1,
            "Output closed"
        );
        Ok(())
    }
}

impl Drop for FileOutput {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "Failed to close output");
        }
    }
}

/// Milliseconds with three decimals, e.g. `-1.500` for -1500 us
fn pts_line(relative_us: i64) -> String {
    let sign = if relative_us < 0 { "-" } else { "" };
    let magnitude = relative_us.unsigned_abs();
    format!("{}{}.{:03}", sign, magnitude / 1000, magnitude % 1000)
}

/// Path of segment `index`; segment 0 is the base path itself
pub fn segment_path(base: &Path, index: u32) -> PathBuf {
    if index == 0 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    let name = match base.extension() {
        Some(ext) => format!("{}_{:04}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}_{:04}", stem, index),
    };
    base.with_file_name(name)
}

fn create_file(path: &Path) -> OutputResult<File> {
    File::create(path).map_err(|source| OutputError::Create {
        path: path.to_path_buf(),
        source,
    })
}

fn open_segment(path: &Path) -> OutputResult<Box<dyn Write + Send>> {
    Ok(Box::new(create_file(path)?))
}

struct MetadataWriter {
    writer: BufWriter<File>,
    format: MetadataFormat,
    entries: u64,
}

impl MetadataWriter {
    fn create(path: &Path, format: MetadataFormat) -> OutputResult<Self> {
        let mut writer = BufWriter::new(create_file(path)?);
        if format == MetadataFormat::Json {
            writeln!(writer, "[")?;
        }
        Ok(Self {
            writer,
            format,
            entries: 0,
        })
    }

    fn write(&mut self, metadata: &FrameMetadata) -> OutputResult<()> {
        match self.format {
            MetadataFormat::Json => {
                if self.entries > 0 {
                    writeln!(self.writer, ",")?;
                }
                serde_json::to_writer(&mut self.writer, metadata)?;
            }
            MetadataFormat::Txt => {
                if let serde_json::Value::Object(fields) = serde_json::to_value(metadata)? {
                    for (key, value) in fields {
                        writeln!(self.writer, "{}={}", key, value)?;
                    }
                }
                writeln!(self.writer)?;
            }
        }
        self.entries += 1;
        Ok(())
    }

    fn finish(mut self) -> OutputResult<()> {
        if self.format == MetadataFormat::Json {
            if self.entries > 0 {
                writeln!(self.writer)?;
            }
            writeln!(self.writer, "]")?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
