//! Logging setup for the emulator and its front ends.
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::Once;

use colored::*;
use env_logger::Logger;
use log::Level;
use log::Log;
use log::Record;

static ONCE_INIT: Once = Once::new();

const LOG_ENV_VAR: &str = "NES_LOG";
const TRACE_CONTEXT_LINES: usize = 20;

/// Logger that uses env_logger for filtering and prints a compact colored format.
///
/// Trace records (e.g. the per-instruction `cpu_state` log) are not printed right away. The last
/// `TRACE_CONTEXT_LINES` of them are kept and printed as context in front of the next record of
/// a higher level, which keeps logs readable while still showing what led up to a warning.
struct NesLogger {
    trace_context: Mutex<VecDeque<String>>,
    logger: Logger,
}

impl NesLogger {
    fn new(logger: Logger) -> Self {
        log::set_max_level(logger.filter());
        Self {
            trace_context: Mutex::new(VecDeque::with_capacity(TRACE_CONTEXT_LINES)),
            logger,
        }
    }

    fn format_record(record: &Record) -> String {
        let message = record.args().to_string();
        match record.level() {
            Level::Error => format!("{} {}", "E".red().bold(), message.red()),
            Level::Warn => format!("{} {}", "W".yellow().bold(), message.yellow()),
            Level::Info => format!("{} {}", "I".blue().bold(), message.normal()),
            Level::Debug => format!("{} {}", "D".blue(), message.normal()),
            Level::Trace => format!("{}", message.dimmed()),
        }
    }
}

impl Log for NesLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.logger.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.logger.matches(record) {
            return;
        }
        let line = Self::format_record(record);
        let mut context = match self.trace_context.lock() {
            Ok(context) => context,
            Err(poisoned) => poisoned.into_inner(),
        };
        if record.level() == Level::Trace {
            if context.len() == TRACE_CONTEXT_LINES {
                context.pop_front();
            }
            context.push_back(line);
            return;
        }
        if context.len() == TRACE_CONTEXT_LINES {
            eprintln!("{}", "...".dimmed());
        }
        for trace_line in context.drain(..) {
            eprintln!("{}", trace_line);
        }
        eprintln!("{}", line);
    }

    fn flush(&self) {}
}

fn install(default_filter: &str) {
    let filter_config = std::env::var(LOG_ENV_VAR).unwrap_or_else(|_| default_filter.to_string());
    let filter = env_logger::builder().parse_filters(&filter_config).build();
    // Another logger may already be installed by the embedding application. Keep that one.
    let _ = log::set_boxed_logger(Box::new(NesLogger::new(filter)));
}

/// Installs the logger for applications. Filters are read from `NES_LOG`, default `error`.
pub fn init() {
    ONCE_INIT.call_once(|| install("error"));
}

/// Installs the logger for tests. `verbose` enables info logs and the cpu_state trace.
pub fn test_init(verbose: bool) {
    ONCE_INIT.call_once(|| {
        install(if verbose {
            "info,cpu_state=trace"
        } else {
            "warn"
        })
    });
}
