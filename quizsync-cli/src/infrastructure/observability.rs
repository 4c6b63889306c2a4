use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub default_level: tracing::Level,
    pub json_format: bool,
    pub show_spans: bool,
    pub show_thread_ids: bool,
    pub show_targets: bool,
    /// Whether anything is written to stderr
    pub show_logs: bool,

    #[cfg(feature = "console")]
    pub enable_console: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: tracing::Level::INFO,
            json_format: false,
            show_spans: false,
            show_thread_ids: false,
            show_targets: true,
            show_logs: true,
            #[cfg(feature = "console")]
            enable_console: false,
        }
    }
}

impl LogConfig {
    /// Development configuration (verbose, human-readable)
    pub fn dev() -> Self {
        Self {
            default_level: tracing::Level::DEBUG,
            show_spans: true,
            show_thread_ids: true,
            ..Default::default()
        }
    }

    /// Interactive mode: warnings only, so the prompt stays readable
    pub fn quiet() -> Self {
        Self {
            default_level: tracing::Level::WARN,
            show_targets: false,
            ..Default::default()
        }
    }

    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.default_level = level;
        self
    }

    /// One JSON object per line
    pub fn with_json(mut self) -> Self {
        self.json_format = true;
        self
    }

    /// Enable tokio console
    #[cfg(feature = "console")]
    pub fn with_console(mut self) -> Self {
        self.enable_console = true;
        self
    }

    pub fn without_logs(mut self) -> Self {
        self.show_logs = false;
        self
    }

    /// Directives used when `RUST_LOG` is not set
    pub fn default_directives(&self) -> Vec<String> {
        let level = self.default_level.to_string().to_lowercase();
        vec![
            format!("{}={}", env!("CARGO_PKG_NAME").replace('-', "_"), level),
            format!("quizsync_core={}", level),
            format!("quizsync_p2p={}", level),
            "matchbox_socket=warn".to_string(),
        ]
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            self.default_directives()
                .iter()
                .filter_map(|directive| directive.parse::<Directive>().ok())
                .fold(EnvFilter::new("warn"), |filter, directive| {
                    filter.add_directive(directive)
                })
        })
    }

    pub fn init(self) -> Result<(), String> {
        let env_filter = self.env_filter();

        #[cfg(feature = "console")]
        if self.enable_console {
            use console_subscriber::ConsoleLayer;

            if self.show_logs {
                eprintln!("🔍 Tokio Console enabled - connect with `tokio-console`");
            }

            let console_layer = ConsoleLayer::builder()
                .server_addr(([127, 0, 0, 1], 6669))
                .spawn();

            return tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init()
                .map_err(|e| format!("Failed to initialize tracing: {}", e));
        }

        if !self.show_logs {
            return tracing_subscriber::registry()
                .with(env_filter)
                .try_init()
                .map_err(|e| format!("Failed to initialize tracing: {}", e));
        }

        let span_events = if self.show_spans {
            fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE
        } else {
            fmt::format::FmtSpan::NONE
        };

        if self.json_format {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_span_events(span_events)
                .with_thread_ids(self.show_thread_ids)
                .with_target(self.show_targets);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
                .map_err(|e| format!("Failed to initialize tracing: {}", e))
        } else {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(span_events)
                .with_thread_ids(self.show_thread_ids)
                .with_target(self.show_targets);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()
                .map_err(|e| format!("Failed to initialize tracing: {}", e))
        }
    }
}
