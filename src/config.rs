//! Client configuration.
//!
//! Resolution order (later wins):
//!
//! 1. Built-in defaults (`127.0.0.1:2000`, 5s timeouts, heuristic framing)
//! 2. Environment: `PROJECT_LOOKUP_HOST`, `PROJECT_LOOKUP_PORT`,
//!    `PROJECT_LOOKUP_TIMEOUT_MS` (`0` disables timeouts), `PROJECT_LOOKUP_FRAMING`
//! 3. Command-line flags: `--host`, `--port`, `--timeout-ms`, `--framing`, `--verbose`

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::lookup::{FramingKind, DEFAULT_CHUNK_SIZE};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 2000;

/// Default connect and response timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 5_000;

pub const ENV_HOST: &str = "PROJECT_LOOKUP_HOST";
pub const ENV_PORT: &str = "PROJECT_LOOKUP_PORT";
pub const ENV_TIMEOUT_MS: &str = "PROJECT_LOOKUP_TIMEOUT_MS";
pub const ENV_FRAMING: &str = "PROJECT_LOOKUP_FRAMING";

pub const USAGE: &str = "\
Usage: project-lookup [OPTIONS]

Look up an employee's project assignments on a lookup server.

Options:
  --host <HOST>         Server host [env: PROJECT_LOOKUP_HOST] [default: 127.0.0.1]
  --port <PORT>         Server port [env: PROJECT_LOOKUP_PORT] [default: 2000]
  --timeout-ms <MS>     Connect/response timeout, 0 disables [env: PROJECT_LOOKUP_TIMEOUT_MS] [default: 5000]
  --framing <KIND>      heuristic | until-close | content-length | newline [env: PROJECT_LOOKUP_FRAMING]
  -v, --verbose         Print the classified error kind on failures
  -h, --help            Print this help
";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("missing value for {0}")]
    MissingValue(String),

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// Host and port of the lookup server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
}

impl ServerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for ServerAddr {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Everything a [`crate::lookup::LookupClient`] needs. Passed by value to the
/// constructor so independently configured clients can coexist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub addr: ServerAddr,
    /// `None` waits for the OS connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Limit on sending the request and draining the response. `None` waits forever.
    pub response_timeout: Option<Duration>,
    pub framing: FramingKind,
    /// Read buffer size for each blocking read.
    pub chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: ServerAddr::default(),
            connect_timeout: Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)),
            response_timeout: Some(Duration::from_millis(DEFAULT_TIMEOUT_MS)),
            framing: FramingKind::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn new(addr: ServerAddr) -> Self {
        Self {
            addr,
            ..Self::default()
        }
    }

    /// Same timeout for connect and response; `None` disables both.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self.response_timeout = timeout;
        self
    }

    pub fn with_framing(mut self, framing: FramingKind) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    fn set_host(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let host = value.trim();
        if host.is_empty() {
            return Err(invalid(name, value, "host must not be empty"));
        }
        self.addr.host = host.to_string();
        Ok(())
    }

    fn set_port(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        self.addr.port = value
            .trim()
            .parse()
            .map_err(|_| invalid(name, value, "expected a port number 0-65535"))?;
        Ok(())
    }

    fn set_timeout(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let ms: u64 = value
            .trim()
            .parse()
            .map_err(|_| invalid(name, value, "expected milliseconds"))?;
        let timeout = (ms > 0).then(|| Duration::from_millis(ms));
        self.connect_timeout = timeout;
        self.response_timeout = timeout;
        Ok(())
    }

    fn set_framing(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        self.framing = value
            .parse()
            .map_err(|reason: String| invalid(name, value, &reason))?;
        Ok(())
    }
}

fn invalid(name: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Fully resolved startup settings for the binary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupOptions {
    pub client: ClientConfig,
    /// Expose the classified error kind on failures.
    pub verbose: bool,
    pub show_help: bool,
}

impl StartupOptions {
    /// Resolve from the real process environment and arguments.
    pub fn from_process() -> Result<Self, ConfigError> {
        Self::resolve(std::env::args().skip(1), |name| std::env::var(name).ok())
    }

    /// Resolve from explicit arguments (without the program name) and an
    /// environment lookup function.
    pub fn resolve<I, S, E>(args: I, env: E) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        E: Fn(&str) -> Option<String>,
    {
        let mut options = StartupOptions::default();
        let client = &mut options.client;

        if let Some(value) = env(ENV_HOST) {
            client.set_host(ENV_HOST, &value)?;
        }
        if let Some(value) = env(ENV_PORT) {
            client.set_port(ENV_PORT, &value)?;
        }
        if let Some(value) = env(ENV_TIMEOUT_MS) {
            client.set_timeout(ENV_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = env(ENV_FRAMING) {
            client.set_framing(ENV_FRAMING, &value)?;
        }

        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            // Accept both `--flag value` and `--flag=value`.
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => {
                    (flag.to_string(), Some(value.to_string()))
                }
                _ => (arg.clone(), None),
            };

            match flag.as_str() {
                "-h" | "--help" => options.show_help = true,
                "-v" | "--verbose" => options.verbose = true,
                "--host" | "--port" | "--timeout-ms" | "--framing" => {
                    let value = match inline {
                        Some(value) => value,
                        None => args
                            .next()
                            .ok_or_else(|| ConfigError::MissingValue(flag.clone()))?,
                    };
                    let client = &mut options.client;
                    match flag.as_str() {
                        "--host" => client.set_host(&flag, &value)?,
                        "--port" => client.set_port(&flag, &value)?,
                        "--timeout-ms" => client.set_timeout(&flag, &value)?,
                        _ => client.set_framing(&flag, &value)?,
                    }
                }
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        Ok(options)
    }
}
