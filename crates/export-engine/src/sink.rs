//! Frame sinks.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::SinkError;
use crate::source::FrameBuffer;

/// Consumes rendered frames and produces the output file.
///
/// `open` and `close` bracket the writes. After a successful `open`, the
/// export loop calls `close` exactly once, also when a write failed, so the
/// sink can flush buffered encoder state.
pub trait Sink {
    /// Where the output lands.
    fn path(&self) -> &Path;

    fn open(&mut self) -> Result<(), SinkError>;

    fn write(&mut self, frame: &FrameBuffer) -> Result<(), SinkError>;

    fn close(&mut self) -> Result<(), SinkError>;
}

impl<K: Sink + ?Sized> Sink for &mut K {
    fn path(&self) -> &Path {
        (**self).path()
    }

    fn open(&mut self) -> Result<(), SinkError> {
        (**self).open()
    }

    fn write(&mut self, frame: &FrameBuffer) -> Result<(), SinkError> {
        (**self).write(frame)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        (**self).close()
    }
}

/// Writes frames back to back as raw RGBA bytes.
#[derive(Debug)]
pub struct RawFileSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    frames_written: u64,
}

impl RawFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            frames_written: 0,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl Sink for RawFileSink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn open(&mut self) -> Result<(), SinkError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.path)?;
        self.writer = Some(BufWriter::new(file));
        self.frames_written = 0;
        Ok(())
    }

    fn write(&mut self, frame: &FrameBuffer) -> Result<(), SinkError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| SinkError::unknown("Raw sink written before open"))?;
        writer.write_all(&frame.data)?;
        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_sink_writes_all_bytes() {
        let path = std::env::temp_dir()
            .join(format!("framecast-raw-{}", std::process::id()))
            .join("frames.rgba");
        let mut sink = RawFileSink::new(&path);
        sink.open().unwrap();
        sink.write(&FrameBuffer::blank(1, 2, 2)).unwrap();
        sink.write(&FrameBuffer::blank(2, 2, 2)).unwrap();
        sink.close().unwrap();

        assert_eq!(sink.frames_written(), 2);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 32);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_raw_sink_rejects_write_before_open() {
        let mut sink = RawFileSink::new("unused.rgba");
        let err = sink.write(&FrameBuffer::blank(1, 1, 1)).unwrap_err();
        assert_eq!(err.kind, crate::error::SinkErrorKind::Unknown);
    }
}
