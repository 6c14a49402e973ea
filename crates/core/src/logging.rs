//! Category/level logging shared by the CPU core and the console crates.
//!
//! # Architecture
//!
//! - **LogConfig**: process-wide configuration held in atomics
//! - **LogLevel**: Off < Error < Warn < Info < Debug < Trace
//! - **LogCategory**: Cpu, Bus, Interrupts, Cartridge
//! - **log()**: lazy, rate-limited output to stderr or a log file
//!
//! File output goes through a channel to a background writer thread so that a
//! per-instruction trace does not stall emulation on disk I/O.
//!
//! # Usage
//!
//! ```rust
//! use r6502_core::logging::{log, LogCategory, LogConfig, LogLevel};
//!
//! LogConfig::global().apply_filter("cpu=trace,warn").unwrap();
//! log(LogCategory::Cpu, LogLevel::Debug, || {
//!     format!("CPU: BRK at PC={:04X}", 0x1234)
//! });
//! ```
//!
//! The environment is read by [`init_from_env`]:
//!
//! - `R6502_LOG`: filter string, e.g. `interrupts=debug,bus=warn,info`
//! - `R6502_LOG_FILE`: write to this file instead of stderr
//! - `R6502_LOG_RATE`: max messages per second per category, `0` = unlimited

use std::collections::VecDeque;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

pub const ENV_FILTER: &str = "R6502_LOG";
pub const ENV_FILE: &str = "R6502_LOG_FILE";
pub const ENV_RATE: &str = "R6502_LOG_RATE";

/// Messages per second per category unless configured otherwise.
pub const DEFAULT_RATE_LIMIT: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

impl FromStr for LogLevel {
    type Err = LogConfigError;

    /// Case-insensitive; numeric levels 0-5 are accepted too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "0" => Ok(LogLevel::Off),
            "error" | "err" | "1" => Ok(LogLevel::Error),
            "warn" | "warning" | "2" => Ok(LogLevel::Warn),
            "info" | "3" => Ok(LogLevel::Info),
            "debug" | "4" => Ok(LogLevel::Debug),
            "trace" | "5" => Ok(LogLevel::Trace),
            _ => Err(LogConfigError::UnknownLevel(s.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Off => "OFF",
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Instruction execution and trace lines
    Cpu,
    /// Bus dispatch, open-bus and unmapped accesses
    Bus,
    /// Reset, NMI, IRQ and BRK entry
    Interrupts,
    /// Image loading and mapper setup
    Cartridge,
}

const CATEGORY_COUNT: usize = 4;

impl LogCategory {
    pub const ALL: [LogCategory; CATEGORY_COUNT] = [
        LogCategory::Cpu,
        LogCategory::Bus,
        LogCategory::Interrupts,
        LogCategory::Cartridge,
    ];

    const fn index(self) -> usize {
        match self {
            LogCategory::Cpu => 0,
            LogCategory::Bus => 1,
            LogCategory::Interrupts => 2,
            LogCategory::Cartridge => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            LogCategory::Cpu => "cpu",
            LogCategory::Bus => "bus",
            LogCategory::Interrupts => "interrupts",
            LogCategory::Cartridge => "cartridge",
        }
    }
}

impl FromStr for LogCategory {
    type Err = LogConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(LogCategory::Cpu),
            "bus" => Ok(LogCategory::Bus),
            "interrupts" | "irq" | "int" => Ok(LogCategory::Interrupts),
            "cartridge" | "cart" => Ok(LogCategory::Cartridge),
            _ => Err(LogConfigError::UnknownCategory(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum LogConfigError {
    #[error("unknown log level `{0}`")]
    UnknownLevel(String),
    #[error("unknown log category `{0}`")]
    UnknownCategory(String),
    #[error("invalid rate limit `{0}`")]
    InvalidRate(String),
    #[error("cannot open log file: {0}")]
    File(#[from] std::io::Error),
}

/// Sliding one-second window per category.
struct RateLimiter {
    /// 0 disables limiting.
    max_per_second: AtomicUsize,
    window: Duration,
    state: Mutex<[WindowState; CATEGORY_COUNT]>,
}

#[derive(Default)]
struct WindowState {
    timestamps: VecDeque<Instant>,
    dropped: usize,
    last_report: Option<Instant>,
}

/// Outcome of a rate-limit check.
#[derive(Debug, PartialEq, Eq)]
struct Admission {
    allowed: bool,
    /// Dropped messages to report now, if any.
    dropped: Option<usize>,
}

impl RateLimiter {
    fn new(max_per_second: usize) -> Self {
        Self {
            max_per_second: AtomicUsize::new(max_per_second),
            window: Duration::from_secs(1),
            state: Mutex::new(Default::default()),
        }
    }

    fn set_max(&self, max: usize) {
        self.max_per_second.store(max, Ordering::Relaxed);
    }

    fn max(&self) -> usize {
        self.max_per_second.load(Ordering::Relaxed)
    }

    fn admit(&self, category: LogCategory) -> Admission {
        let max = self.max();
        if max == 0 {
            return Admission {
                allowed: true,
                dropped: None,
            };
        }

        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        let slot = &mut state[category.index()];

        while let Some(&front) = slot.timestamps.front() {
            if now.duration_since(front) > self.window {
                slot.timestamps.pop_front();
            } else {
                break;
            }
        }

        if slot.timestamps.len() < max {
            slot.timestamps.push_back(now);
            let dropped = std::mem::take(&mut slot.dropped);
            if dropped > 0 {
                slot.last_report = Some(now);
                return Admission {
                    allowed: true,
                    dropped: Some(dropped),
                };
            }
            return Admission {
                allowed: true,
                dropped: None,
            };
        }

        slot.dropped += 1;
        let report_due = slot
            .last_report
            .map_or(true, |last| now.duration_since(last) >= self.window);
        if report_due {
            slot.last_report = Some(now);
            Admission {
                allowed: false,
                dropped: Some(std::mem::take(&mut slot.dropped)),
            }
        } else {
            Admission {
                allowed: false,
                dropped: None,
            }
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    /// Per-category override; Off means "use the global level".
    levels: [AtomicU8; CATEGORY_COUNT],
    sink: Mutex<Option<Sender<String>>>,
    rate_limiter: RateLimiter,
}

impl LogConfig {
    /// Everything off, default rate limit.
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            levels: Default::default(),
            sink: Mutex::new(None),
            rate_limiter: RateLimiter::new(DEFAULT_RATE_LIMIT),
        }
    }

    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category level, when set, replaces the global level for that category.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        let category_level = self.level(category);
        if category_level != LogLevel::Off {
            level <= category_level
        } else {
            level <= self.global_level()
        }
    }

    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
        self.set_rate_limit(DEFAULT_RATE_LIMIT);
    }

    /// Maximum messages per second per category; 0 means unlimited.
    pub fn set_rate_limit(&self, max_per_second: usize) {
        self.rate_limiter.set_max(max_per_second);
    }

    pub fn rate_limit(&self) -> usize {
        self.rate_limiter.max()
    }

    /// Apply a filter such as `cpu=trace,bus=warn,info`.
    ///
    /// `category=level` sets one category, a bare level sets the global
    /// level. Nothing is changed if any directive fails to parse.
    pub fn apply_filter(&self, filter: &str) -> Result<(), LogConfigError> {
        let mut global = None;
        let mut overrides = Vec::new();
        for directive in filter.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.split_once('=') {
                Some((category, level)) => {
                    overrides.push((category.parse::<LogCategory>()?, level.parse::<LogLevel>()?));
                }
                None => global = Some(directive.parse::<LogLevel>()?),
            }
        }

        if let Some(level) = global {
            self.set_global_level(level);
        }
        for (category, level) in overrides {
            self.set_level(category, level);
        }
        Ok(())
    }

    /// Apply the logging variables as returned by `lookup`.
    ///
    /// The filter and rate are both validated before either is applied.
    pub fn apply_env<F>(&self, lookup: F) -> Result<(), LogConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rate = match lookup(ENV_RATE) {
            Some(rate) => Some(
                rate.trim()
                    .parse::<usize>()
                    .map_err(|_| LogConfigError::InvalidRate(rate.clone()))?,
            ),
            None => None,
        };
        if let Some(filter) = lookup(ENV_FILTER) {
            self.apply_filter(&filter)?;
        }
        if let Some(max) = rate {
            self.set_rate_limit(max);
        }
        if let Some(path) = lookup(ENV_FILE) {
            self.set_log_file(PathBuf::from(path))?;
        }
        Ok(())
    }

    /// Send output to `path` through a background writer thread.
    ///
    /// Replaces any previous log file; the old writer exits once its channel
    /// is dropped.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("r6502-log-writer".to_string())
            .spawn(move || {
                let mut file = file;
                while let Ok(message) = receiver.recv() {
                    let _ = writeln!(file, "{}", message);
                }
                let _ = file.flush();
            })?;

        *self.sink.lock().unwrap() = Some(sender);
        Ok(())
    }

    /// Go back to stderr output.
    pub fn clear_log_file(&self) {
        *self.sink.lock().unwrap() = None;
    }

    fn write_message(&self, message: String) {
        let sink = self.sink.lock().unwrap();
        match sink.as_ref() {
            Some(sender) => {
                if let Err(failed) = sender.send(message) {
                    eprintln!("{}", failed.0);
                }
            }
            None => eprintln!("{}", message),
        }
    }
}

/// Configure the global logger from `R6502_LOG`, `R6502_LOG_FILE` and
/// `R6502_LOG_RATE`. Unset variables leave the current settings alone.
pub fn init_from_env() -> Result<(), LogConfigError> {
    LogConfig::global().apply_env(|key| std::env::var(key).ok())
}

/// Log a message; `message_fn` only runs when the message will be written.
///
/// Each category is rate limited. Dropped messages are summarised in a single
/// warning line once the category is admitted again, or once per second.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }

    let admission = config.rate_limiter.admit(category);
    if let Some(count) = admission.dropped.filter(|&n| n > 0) {
        config.write_message(format!(
            "[{}] WARN: rate limit exceeded, {} message(s) dropped",
            category.name(),
            count
        ));
    }
    if admission.allowed {
        config.write_message(message_fn());
    }
}
