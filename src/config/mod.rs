//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU64, NonZeroUsize},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::{engine::RenderTimeouts, template::DEFAULT_FONT_STYLESHEET_URL};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "markpress";
const ENV_PREFIX: &str = "MARKPRESS";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MAX_REQUEST_BYTES: u64 = 2 * 1024 * 1024;
const DEFAULT_MAX_CONCURRENT_SESSIONS: u64 = 4;
const DEFAULT_LAUNCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FONT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CAPTURE_TIMEOUT_SECS: u64 = 60;

/// Command-line arguments for the markpress binary.
#[derive(Debug, Parser)]
#[command(name = "markpress", version, about = "Markdown to PDF conversion service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MARKPRESS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP conversion service.
    Serve(Box<ServeArgs>),
    /// Convert one Markdown file to PDF and exit.
    Convert(ConvertArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Override the Chrome/Chromium executable used for rendering.
    #[arg(long = "chrome-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub chrome_path: Option<PathBuf>,

    /// Override the cap on simultaneous render sessions (0 disables the cap).
    #[arg(long = "max-concurrent-sessions", value_name = "COUNT")]
    pub max_concurrent_sessions: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub render: RenderOverrides,

    /// Override the listener host.
    #[arg(long = "host", value_name = "HOST")]
    pub host: Option<String>,

    /// Override the listener port.
    #[arg(long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub render: RenderOverrides,

    /// Markdown file to convert, or `-` for standard input.
    #[arg(value_name = "INPUT", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Where to write the PDF; defaults to INPUT with a `.pdf` extension.
    #[arg(long, short, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,
}

impl ConvertArgs {
    pub fn reads_stdin(&self) -> bool {
        self.input == Path::new("-")
    }

    pub fn output_path(&self) -> PathBuf {
        match &self.output {
            Some(path) => path.clone(),
            None if self.reads_stdin() => PathBuf::from("document.pdf"),
            None => self.input.with_extension("pdf"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// `None` lets the engine discover an installed browser.
    pub chrome_path: Option<PathBuf>,
    pub sandbox: bool,
    /// `None` disables the concurrency cap.
    pub max_concurrent_sessions: Option<NonZeroUsize>,
    pub launch_timeout: Duration,
    pub load_timeout: Duration,
    pub font_timeout: Duration,
    pub capture_timeout: Duration,
    /// `None` keeps documents free of remote font references.
    pub font_stylesheet_url: Option<Url>,
}

impl RenderSettings {
    pub fn timeouts(&self) -> RenderTimeouts {
        RenderTimeouts {
            launch: self.launch_timeout,
            load: self.load_timeout,
            fonts: self.font_timeout,
            capture: self.capture_timeout,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Convert(args)) => raw.apply_render_overrides(&args.render),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        self.apply_render_overrides(&overrides.render);
    }

    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(path) = overrides.chrome_path.as_ref() {
            self.render.chrome_path = Some(path.clone());
        }
        if let Some(count) = overrides.max_concurrent_sessions {
            self.render.max_concurrent_sessions = Some(count);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        Ok(Self {
            server: build_server_settings(raw.server)?,
            logging: build_logging_settings(raw.logging)?,
            render: build_render_settings(raw.render)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let max_request_bytes = server
        .max_request_bytes
        .unwrap_or(DEFAULT_MAX_REQUEST_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes).ok_or_else(|| {
        LoadError::invalid("server.max_request_bytes", "must be greater than zero")
    })?;
    if usize::try_from(max_request_bytes.get()).is_err() {
        return Err(LoadError::invalid(
            "server.max_request_bytes",
            "value exceeds supported range for usize",
        ));
    }

    Ok(ServerSettings {
        addr,
        max_request_bytes,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let chrome_path = match render.chrome_path {
        Some(path) if path.as_os_str().is_empty() => {
            return Err(LoadError::invalid(
                "render.chrome_path",
                "path must not be empty",
            ));
        }
        other => other,
    };

    let max_concurrent_sessions = render
        .max_concurrent_sessions
        .unwrap_or(DEFAULT_MAX_CONCURRENT_SESSIONS);
    let max_concurrent_sessions = if max_concurrent_sessions == 0 {
        None
    } else {
        let value: usize = max_concurrent_sessions.try_into().map_err(|_| {
            LoadError::invalid(
                "render.max_concurrent_sessions",
                "value exceeds supported range for usize",
            )
        })?;
        NonZeroUsize::new(value)
    };

    let launch_timeout = non_zero_duration(
        render.launch_timeout_seconds,
        DEFAULT_LAUNCH_TIMEOUT_SECS,
        "render.launch_timeout_seconds",
        Duration::from_secs,
    )?;
    let load_timeout = non_zero_duration(
        render.load_timeout_seconds,
        DEFAULT_LOAD_TIMEOUT_SECS,
        "render.load_timeout_seconds",
        Duration::from_secs,
    )?;
    let font_timeout = non_zero_duration(
        render.font_timeout_ms,
        DEFAULT_FONT_TIMEOUT_MS,
        "render.font_timeout_ms",
        Duration::from_millis,
    )?;
    let capture_timeout = non_zero_duration(
        render.capture_timeout_seconds,
        DEFAULT_CAPTURE_TIMEOUT_SECS,
        "render.capture_timeout_seconds",
        Duration::from_secs,
    )?;

    let font_stylesheet_url = match render.font_stylesheet_url {
        None => Some(parse_font_url(DEFAULT_FONT_STYLESHEET_URL)?),
        Some(value) if value.trim().is_empty() => None,
        Some(value) => Some(parse_font_url(value.trim())?),
    };

    Ok(RenderSettings {
        chrome_path,
        sandbox: render.sandbox.unwrap_or(false),
        max_concurrent_sessions,
        launch_timeout,
        load_timeout,
        font_timeout,
        capture_timeout,
        font_stylesheet_url,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    chrome_path: Option<PathBuf>,
    sandbox: Option<bool>,
    max_concurrent_sessions: Option<u64>,
    launch_timeout_seconds: Option<u64>,
    load_timeout_seconds: Option<u64>,
    font_timeout_ms: Option<u64>,
    capture_timeout_seconds: Option<u64>,
    font_stylesheet_url: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_duration(
    value: Option<u64>,
    default: u64,
    key: &'static str,
    unit: fn(u64) -> Duration,
) -> Result<Duration, LoadError> {
    match value.unwrap_or(default) {
        0 => Err(LoadError::invalid(key, "must be greater than zero")),
        value => Ok(unit(value)),
    }
}

fn parse_font_url(value: &str) -> Result<Url, LoadError> {
    let url = Url::parse(value)
        .map_err(|err| LoadError::invalid("render.font_stylesheet_url", err.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(LoadError::invalid(
            "render.font_stylesheet_url",
            format!("unsupported scheme `{other}`"),
        )),
    }
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
