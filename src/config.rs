//! Process configuration, fixed at startup for the lifetime of the run.

use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DB_PATH: &str = "metrics.duckdb";
pub const DEFAULT_UI_REMOTE_URL: &str = "http://localhost:5173";
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub ui_remote_url: String,
    pub query_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            db_path: DEFAULT_DB_PATH.into(),
            ui_remote_url: DEFAULT_UI_REMOTE_URL.into(),
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }
}

pub const USAGE: &str = "embedded-ui-proxy: single-port gateway serving a JSON-RPC
query endpoint over an embedded DuckDB file and proxying everything else to a
remote UI origin.

Options:
  --host <addr>                listen host (default: 0.0.0.0)
  -p, --port <port>            listen port (default: 8080)
  --db-path <path>             DuckDB database path (default: metrics.duckdb)
  --ui-remote-url <url>        upstream UI origin (default: http://localhost:5173)
  --query-timeout-secs <secs>  RPC query execution bound (default: 30)
  -h, --help                   print this help";

impl Config {
    /// Parses `--flag value`, `--flag=value` and the `-p` short form. The
    /// first item of `args` is the program name. Unknown flags and
    /// unparseable values fall back to defaults with a warning.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self, String> {
        let mut cfg = Config::default();
        let mut it = args.into_iter();
        let _ = it.next(); // program name
        while let Some(arg) = it.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((f, v)) => (f.to_string(), Some(v.to_string())),
                None => (arg, None),
            };
            let mut value = || inline.clone().or_else(|| it.next());
            match flag.as_str() {
                "-h" | "--help" => return Err(USAGE.to_string()),
                "--host" => {
                    if let Some(v) = value() {
                        cfg.host = v;
                    }
                }
                "-p" | "--port" => {
                    if let Some(p) = value().and_then(|v| v.parse().ok()) {
                        cfg.port = p;
                    } else {
                        tracing::warn!("invalid or missing port, using {}", cfg.port);
                    }
                }
                "--db-path" => {
                    if let Some(v) = value() {
                        cfg.db_path = v;
                    }
                }
                "--ui-remote-url" => {
                    if let Some(v) = value() {
                        cfg.ui_remote_url = v.trim_end_matches('/').to_string();
                    }
                }
                "--query-timeout-secs" => {
                    if let Some(secs) = value().and_then(|v| v.parse().ok()) {
                        cfg.query_timeout = Duration::from_secs(secs);
                    } else {
                        tracing::warn!(
                            "invalid or missing query timeout, using {:?}",
                            cfg.query_timeout
                        );
                    }
                }
                other => tracing::warn!("ignoring unknown flag {other}"),
            }
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut full = vec!["embedded-ui-proxy".to_string()];
        full.extend(args.iter().map(|s| s.to_string()));
        Config::from_args(full).expect("parse")
    }

    #[test]
    fn defaults_when_no_flags() {
        let cfg = parse(&[]);
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn port_long_short_and_assign() {
        assert_eq!(parse(&["--port", "9001"]).port, 9001);
        assert_eq!(parse(&["-p", "9002"]).port, 9002);
        assert_eq!(parse(&["--port=9003"]).port, 9003);
        assert_eq!(parse(&["--port", "not-a-port"]).port, DEFAULT_PORT);
    }

    #[test]
    fn remote_url_trailing_slash_is_stripped() {
        let cfg = parse(&["--ui-remote-url", "http://127.0.0.1:4000/"]);
        assert_eq!(cfg.ui_remote_url, "http://127.0.0.1:4000");
    }

    #[test]
    fn db_path_and_host() {
        let cfg = parse(&["--db-path", "/tmp/x.duckdb", "--host", "127.0.0.1"]);
        assert_eq!(cfg.db_path, "/tmp/x.duckdb");
        assert_eq!(cfg.host, "127.0.0.1");
    }

    #[test]
    fn help_returns_usage() {
        let err = Config::from_args(vec!["prog".to_string(), "--help".to_string()])
            .expect_err("help short-circuits");
        assert!(err.contains("--ui-remote-url"));
    }
}
