use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::sync::Mutex;

use crate::config::LogConfig;

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

fn open_truncated(file_name: &str) -> io::Result<Mutex<LineWriter<File>>> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(file_name)?;
    Ok(Mutex::new(LineWriter::new(file)))
}

/// Where a record ends up and how much of it is written.
enum Sink {
    Console,
    ConsoleAndFile(Mutex<LineWriter<File>>),
    TraceFile(Mutex<LineWriter<File>>),
}

pub struct RevisionLogger {
    sink: Sink,
    max_level: Level,
}

impl RevisionLogger {
    fn console(max_level: Level) -> Self {
        Self {
            sink: Sink::Console,
            max_level,
        }
    }

    fn mirrored(max_level: Level) -> io::Result<Self> {
        Ok(Self {
            sink: Sink::ConsoleAndFile(open_truncated("debug.log")?),
            max_level,
        })
    }

    fn trace() -> io::Result<Self> {
        Ok(Self {
            sink: Sink::TraceFile(open_truncated("trace.log")?),
            max_level: Level::Trace,
        })
    }

    fn write_file(writer: &Mutex<LineWriter<File>>, record: &Record, with_module: bool) {
        let Ok(mut writer) = writer.lock() else {
            return;
        };
        let ts = Local::now().format("%H:%M:%S%.6f");
        let _ = if with_module {
            writeln!(
                writer,
                "[{:<5} {} {}] {}",
                level_tag(record.level()),
                ts,
                record.module_path().unwrap_or("???"),
                record.args()
            )
        } else {
            writeln!(
                writer,
                "[{:<5} {}] {}",
                level_tag(record.level()),
                ts,
                record.args()
            )
        };
    }

    fn write_console(record: &Record) {
        eprintln!(
            "[{:<5} {}] {}",
            level_tag(record.level()),
            Local::now().format("%H:%M:%S%.3f"),
            record.args()
        )
    }
}

impl Log for RevisionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match &self.sink {
            Sink::Console => Self::write_console(record),
            Sink::ConsoleAndFile(writer) => {
                Self::write_file(writer, record, false);
                Self::write_console(record);
            }
            Sink::TraceFile(writer) => Self::write_file(writer, record, true),
        }
    }

    fn flush(&self) {
        if let Sink::ConsoleAndFile(writer) | Sink::TraceFile(writer) = &self.sink {
            if let Ok(mut writer) = writer.lock() {
                let _ = writer.flush();
            }
        }
    }
}

impl Drop for RevisionLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

fn install(logger: io::Result<RevisionLogger>, filter: LevelFilter) {
    match logger {
        Ok(logger) => {
            if log::set_boxed_logger(Box::new(logger)).is_ok() {
                log::set_max_level(filter);
            }
        }
        Err(e) => eprintln!("cannot open log file: {}", e),
    }
}

pub fn init_log(config: &LogConfig) {
    match config {
        LogConfig::Trace => install(RevisionLogger::trace(), LevelFilter::Trace),
        LogConfig::Verbose(verbose) => match *verbose {
            0 => {}
            1 => install(Ok(RevisionLogger::console(Level::Info)), LevelFilter::Info),
            2 => install(Ok(RevisionLogger::console(Level::Debug)), LevelFilter::Debug),
            3 => install(RevisionLogger::mirrored(Level::Debug), LevelFilter::Debug),
            4..=u8::MAX => install(RevisionLogger::trace(), LevelFilter::Trace),
        },
        LogConfig::NoLog => {}
    };
}
