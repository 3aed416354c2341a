use env_logger::{Builder, Env};
use log::{Level, LevelFilter};

const TARGET: &str = "snaplog";

/// Logging context for snaplog.
///
/// Built once from [`Config`](crate::config::Config) and handed by reference to the
/// components that report progress. Records go through the `log` facade, so whatever
/// sink `install` set up (env_logger on stderr) receives them.
#[derive(Debug, Clone, Copy)]
pub struct Logger {
    level: LevelFilter,
}

impl Logger {
    pub fn new(level: LevelFilter) -> Self {
        Logger { level }
    }

    /// A logger that drops everything (tests, library callers without a sink)
    pub fn silent() -> Self {
        Logger::new(LevelFilter::Off)
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Install env_logger as the process sink and return the logger to use with it.
    ///
    /// This logger's level is the sink's default filter. When `RUST_LOG` is set it
    /// replaces that default, and the returned logger gates at whatever level the
    /// sink then accepts. If a sink is already installed, `self` comes back unchanged.
    pub fn install(self) -> Self {
        let default = self.level.to_string().to_lowercase();
        let installed = Builder::from_env(Env::default().default_filter_or(default))
            .format_timestamp_millis()
            .try_init();
        match installed {
            Ok(()) => self.adopt(log::max_level()),
            Err(_) => self,
        }
    }

    /// Gate at the sink's maximum level, so the sink's filter decides.
    fn adopt(self, sink: LevelFilter) -> Self {
        Logger::new(sink)
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    pub fn info(&self, msg: &str) {
        self.emit(Level::Info, msg);
    }

    pub fn debug(&self, msg: &str) {
        self.emit(Level::Debug, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.emit(Level::Warn, msg);
    }

    pub fn error(&self, msg: &str) {
        self.emit(Level::Error, msg);
    }

    fn emit(&self, level: Level, msg: &str) {
        if self.enabled(level) {
            log::log!(target: TARGET, level, "{}", msg);
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Logger::new(LevelFilter::Warn)
    }
}
