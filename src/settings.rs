use std::time::Duration;

const VERBOSE_VAR: &str = "MODFLOW_VERBOSE";
const POLL_VAR: &str = "MODFLOW_POLL_MS";
const RECAP_VAR: &str = "MODFLOW_RECAP";
const WORKERS_VAR: &str = "MODFLOW_WORKERS";

const DEFAULT_POLL: Duration = Duration::from_millis(50);

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid value '{1}' for {0}")]
    InvalidVar(&'static str, String),
}

/// Run settings shared by the executor and the text UI.
#[derive(Debug, Clone)]
pub struct Settings {
    /// 0 = quiet; higher values print per-module progress and raise the log level.
    pub verbose: u8,
    /// How often a waiting executor checks for cancellation.
    /// Also bounds how late a timeout can be noticed.
    pub poll_interval: Duration,
    /// Print a list of module errors to stderr at the end of each run.
    pub print_recap: bool,
    /// Modules that may run at once. 1 runs the plan strictly in order.
    pub max_workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbose: 0,
            poll_interval: DEFAULT_POLL,
            print_recap: false,
            max_workers: 1,
        }
    }
}

impl Settings {
    /// Defaults, overridden by `MODFLOW_VERBOSE`, `MODFLOW_POLL_MS`, `MODFLOW_RECAP`
    /// and `MODFLOW_WORKERS`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    /// Like [`Settings::from_env`], but reads variables through `lookup`.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut settings = Self::default();
        if let Some(v) = lookup(VERBOSE_VAR) {
            settings.verbose = v.trim().parse().map_err(|_| Error::InvalidVar(VERBOSE_VAR, v))?;
        }
        if let Some(v) = lookup(POLL_VAR) {
            let ms: u64 = v.trim().parse().map_err(|_| Error::InvalidVar(POLL_VAR, v.clone()))?;
            if ms == 0 {
                return Err(Error::InvalidVar(POLL_VAR, v));
            }
            settings.poll_interval = Duration::from_millis(ms);
        }
        if let Some(v) = lookup(RECAP_VAR) {
            let recap = match v.trim() {
                "1" | "true" | "yes" => Some(true),
                "0" | "false" | "no" => Some(false),
                _ => None,
            };
            settings.print_recap = recap.ok_or(Error::InvalidVar(RECAP_VAR, v))?;
        }
        if let Some(v) = lookup(WORKERS_VAR) {
            let workers = v.trim().parse::<usize>().ok().filter(|n| *n > 0);
            settings.max_workers = workers.ok_or(Error::InvalidVar(WORKERS_VAR, v))?;
        }
        Ok(settings)
    }

    /// Log level for the current verbosity.
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
