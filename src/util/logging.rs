use std::collections::HashSet;
use std::sync::RwLock;

use once_cell::sync::Lazy;

static LOGGER_CONFIG: Lazy<RwLock<LoggingConfig>> =
    Lazy::new(|| RwLock::new(LoggingConfig::default()));

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    INFO,
    VERBOSE,
}

impl LogLevel {
    fn as_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::INFO => log::LevelFilter::Info,
            LogLevel::VERBOSE => log::LevelFilter::Debug,
        }
    }
}

/// Logs at info level under the calling component's `CC` target.
#[macro_export]
macro_rules! logln {
    ($($arg:tt)+) => {
        if $crate::util::logging::is_enabled(Self::CC) {
            log::info!(target: Self::CC, $($arg)+);
        }
    };
}

/// Logs only when the global level is `VERBOSE`.
#[macro_export]
macro_rules! logvbln {
    ($($arg:tt)+) => {
        if $crate::util::logging::is_enabled(Self::CC) {
            log::debug!(target: Self::CC, $($arg)+);
        }
    };
}

#[macro_export]
macro_rules! logwarnln {
    ($($arg:tt)+) => {
        if $crate::util::logging::is_enabled(Self::CC) {
            log::warn!(target: Self::CC, $($arg)+);
        }
    };
}

#[macro_export]
macro_rules! logerrln {
    ($($arg:tt)+) => {
        if $crate::util::logging::is_enabled(Self::CC) {
            log::error!(target: Self::CC, $($arg)+);
        }
    };
}

/// Installs the `env_logger` backend. `RUST_LOG`, when set, wins over `level`.
pub fn init(level: LogLevel) {
    set_global_level(level);

    let _ = env_logger::Builder::new()
        .filter_level(level.as_filter())
        .parse_default_env()
        .format_target(true)
        .try_init();
}

pub fn is_enabled(cc: &'static str) -> bool {
    LOGGER_CONFIG
        .read()
        .map(|config| config.cc_enabled(cc))
        .unwrap_or(true)
}

pub fn disable_cc(cc: &'static str) {
    if let Ok(mut config) = LOGGER_CONFIG.write() {
        config.disable_cc(cc);
    }
}

pub fn enable_cc(cc: &'static str) {
    if let Ok(mut config) = LOGGER_CONFIG.write() {
        config.enable_cc(cc);
    }
}

pub fn set_global_logging(enabled: bool) {
    if let Ok(mut config) = LOGGER_CONFIG.write() {
        config.global_tracing_enabled = enabled;
    }
}

pub fn set_global_level(level: LogLevel) {
    if let Ok(mut config) = LOGGER_CONFIG.write() {
        config.global_level = level;
    }

    log::set_max_level(level.as_filter());
}

pub fn global_level() -> LogLevel {
    LOGGER_CONFIG
        .read()
        .map(|config| config.global_level)
        .unwrap_or(LogLevel::INFO)
}

struct LoggingConfig {
    global_tracing_enabled: bool,
    global_level: LogLevel,
    disabled: HashSet<&'static str>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_tracing_enabled: true,
            global_level: LogLevel::INFO,
            disabled: HashSet::new(),
        }
    }
}

impl LoggingConfig {
    fn cc_enabled(&self, cc: &'static str) -> bool {
        self.global_tracing_enabled && !self.disabled.contains(cc)
    }

    fn enable_cc(&mut self, cc: &'static str) {
        self.disabled.remove(cc);
    }

    fn disable_cc(&mut self, cc: &'static str) {
        self.disabled.insert(cc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_can_be_silenced_individually() {
        let mut config = LoggingConfig::default();
        assert!(config.cc_enabled("Synchronizer"));

        config.disable_cc("Synchronizer");
        assert!(!config.cc_enabled("Synchronizer"));
        assert!(config.cc_enabled("TrackFetcher"));

        config.enable_cc("Synchronizer");
        assert!(config.cc_enabled("Synchronizer"));
    }

    #[test]
    fn global_switch_overrides_components() {
        let mut config = LoggingConfig::default();
        config.global_tracing_enabled = false;

        assert!(!config.cc_enabled("Synchronizer"));
    }
}
