use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::Path,
};

use anyhow::Context;
use env_logger::{Builder, Env, Target};

/// Sends every log line to stderr and appends it to the run log.
struct Tee<W: Write> {
    file: W,
}

impl<W: Write> Write for Tee<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// `RUST_LOG` picks the level, `info` otherwise.
pub fn init(log_file: &Path) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .context(format!("could not open log file {:?}", log_file))?;

    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .target(Target::Pipe(Box::new(Tee { file })))
        .try_init()
        .context("logger already initialised")?;
    Ok(())
}
