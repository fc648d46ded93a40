use std::{
    fs::File,
    io::{self, Write},
    thread,
};

use env_logger::{Builder, Target};
use log::{Level, Record};

use crate::{
    Error, Result,
    io::options::{LogFormat, SolverOptions},
};

/// Installs the global logger. Pretty output names the emitting thread so
/// lines from `anneal-N` and `grid-N` pool workers can be told apart.
pub fn init_logger(options: &SolverOptions) -> Result<()> {
    let log_format = options.log_format;
    let log_timestamp = options.log_timestamp;

    let mut builder = Builder::new();
    builder
        .filter_level(options.log_level.to_filter())
        .write_style(env_logger::WriteStyle::Never)
        .format(move |buf, record| {
            if log_timestamp {
                write!(buf, "{} ", buf.timestamp_millis())?;
            }
            write_line(buf, log_format, record)
        });

    let target = match options.log_output_path() {
        Some(log_path) => {
            let log_file = File::create(log_path).map_err(|e| {
                Error::other(format!(
                    "failed to create log output file {}: {e}",
                    log_path.display()
                ))
            })?;
            Target::Pipe(Box::new(log_file))
        }
        None => Target::Stderr,
    };
    builder.target(target);

    builder
        .try_init()
        .map_err(|e| Error::other(format!("logger init failed: {e}")))
}

/// One log line without the timestamp prefix.
fn write_line<W: Write + ?Sized>(
    out: &mut W,
    format: LogFormat,
    record: &Record<'_>,
) -> io::Result<()> {
    match format {
        LogFormat::Compact => writeln!(out, "{} {}", level_tag(record.level()), record.args()),
        LogFormat::Pretty => {
            let current = thread::current();
            writeln!(
                out,
                "{:<5} [{}] {} {}",
                level_tag(record.level()),
                current.name().unwrap_or("-"),
                record.target(),
                record.args()
            )
        }
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}
