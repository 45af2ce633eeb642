use tracing_subscriber::{fmt, EnvFilter};

/// Output format for the process-wide subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// Reads `LOG_FORMAT`; anything other than `json` keeps the human format
    pub fn from_env() -> Self {
        Self::from_value(std::env::var("LOG_FORMAT").ok().as_deref())
    }

    fn from_value(raw: Option<&str>) -> Self {
        match raw {
            Some(value) if value.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init(),
        LogFormat::Pretty => fmt().with_env_filter(filter).with_target(false).try_init(),
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already installed: {}", e);
    }
}
