use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use env_logger::{Builder, Env, Target};
use log::Level;

/// Destination of complete log lines.
pub trait LogSink: Send {
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct StderrSink;

impl LogSink for StderrSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        stderr.write_all(line.as_bytes())?;
        stderr.write_all(b"\n")
    }
}

/// Log file, truncated when opened. Every line is flushed right away so the
/// file stays current while a long run is in progress.
#[derive(Debug)]
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn create(path: &Path) -> io::Result<FileSink> {
        Ok(FileSink {
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl LogSink for FileSink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Splits written bytes into lines and hands each line to every sink.
///
/// A failing sink does not keep the line from the remaining sinks; the first
/// error is returned.
#[derive(Default)]
pub struct TeeWriter {
    sinks: Vec<Box<dyn LogSink>>,
    pending: Vec<u8>,
}

impl TeeWriter {
    pub fn new() -> Self {
        TeeWriter::default()
    }

    #[must_use]
    pub fn with_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    fn emit(&mut self, line: &[u8]) -> io::Result<()> {
        let line = String::from_utf8_lossy(line);
        let line = line.strip_suffix('\r').unwrap_or(&line);
        let mut result = Ok(());
        for sink in &mut self.sinks {
            if let Err(e) = sink.write_line(line) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            self.emit(&line[..end])?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

impl Drop for TeeWriter {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let _ = self.emit(&rest);
        }
    }
}

/// Filter level for the `-v` count: info, then debug, then trace.
pub fn level_for_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::Info,
        1 => Level::Debug,
        _ => Level::Trace,
    }
}

/// Installs the global logger writing to stderr and, if given, `log_file`.
/// `RUST_LOG` takes precedence over `verbose`.
pub fn init(verbose: u8, log_file: Option<&Path>) -> io::Result<()> {
    let mut tee = TeeWriter::new().with_sink(StderrSink);
    if let Some(path) = log_file {
        tee = tee.with_sink(FileSink::create(path)?);
    }

    Builder::from_env(Env::default().default_filter_or(level_for_verbosity(verbose).as_str()))
        .target(Target::Pipe(Box::new(tee)))
        .init();
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{
        fs,
        sync::{Arc, Mutex},
    };
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<String>>>);

    impl LogSink for SharedSink {
        fn write_line(&mut self, line: &str) -> io::Result<()> {
            self.0.lock().unwrap().push(line.to_owned());
            Ok(())
        }
    }

    struct BrokenSink;

    impl LogSink for BrokenSink {
        fn write_line(&mut self, _line: &str) -> io::Result<()> {
            Err(io::Error::other("broken"))
        }
    }

    #[test]
    fn tee_splits_lines() {
        let sink = SharedSink::default();
        let mut tee = TeeWriter::new().with_sink(sink.clone());

        tee.write_all(b"[INFO] first\n[INFO] sec").unwrap();
        assert_eq!(*sink.0.lock().unwrap(), vec!["[INFO] first"]);
        tee.write_all(b"ond\r\n").unwrap();
        tee.write_all(b"\n").unwrap();
        assert_eq!(
            *sink.0.lock().unwrap(),
            vec!["[INFO] first", "[INFO] second", ""]
        );

        tee.write_all(b"unterminated").unwrap();
        drop(tee);
        assert_eq!(sink.0.lock().unwrap().last().unwrap(), "unterminated");
    }

    #[test]
    fn tee_reaches_all_sinks_despite_failure() {
        let first = SharedSink::default();
        let second = SharedSink::default();
        let mut tee = TeeWriter::new()
            .with_sink(first.clone())
            .with_sink(BrokenSink)
            .with_sink(second.clone());

        assert!(tee.write_all(b"line\n").is_err());
        assert_eq!(*first.0.lock().unwrap(), vec!["line"]);
        assert_eq!(*second.0.lock().unwrap(), vec!["line"]);
    }

    #[test]
    fn file_sink_truncates_and_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.log");
        fs::write(&path, "old content\n").unwrap();

        let mut tee = TeeWriter::new().with_sink(FileSink::create(&path).unwrap());
        tee.write_all(b"Round 1/10\nRound 2/10\n").unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Round 1/10\nRound 2/10\n"
        );
    }

    #[test]
    fn file_sink_in_missing_directory() {
        let dir = tempdir().unwrap();
        assert!(FileSink::create(&dir.path().join("missing").join("run.log")).is_err());
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for_verbosity(0), Level::Info);
        assert_eq!(level_for_verbosity(1), Level::Debug);
        assert_eq!(level_for_verbosity(2), Level::Trace);
        assert_eq!(level_for_verbosity(9), Level::Trace);
    }
}
