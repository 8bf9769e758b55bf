// ABOUTME: Parses the three endpoint forms accepted by Client::connect
// ABOUTME: host:port, a redis:// URL, or a bare unix socket path — hand-parsed, no URL crate

use std::fmt;
use std::path::PathBuf;

/// A parsed connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointError(String);

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid endpoint: {}", self.0)
    }
}

impl std::error::Error for EndpointError {}

impl Endpoint {
    /// Accepts, in order:
    /// 1. a bare filesystem path (`/run/redis.sock`, `./redis.sock`) — unix socket,
    /// 2. a `redis://[:password@]host[:port][/db]` URL — tcp, default port 6379,
    /// 3. a plain `host:port` pair — tcp.
    ///
    /// Discards any userinfo password or `/db` suffix on the URL form; use
    /// [`Endpoint::parse_with_auth`] to recover those.
    pub fn parse(input: &str) -> Result<Endpoint, EndpointError> {
        Ok(Endpoint::parse_with_auth(input)?.0)
    }

    /// Same three forms as [`Endpoint::parse`], additionally returning the
    /// URL form's userinfo password (lifted into `auth_pass` per §6) and its
    /// trailing `/db` path segment, if present.
    pub fn parse_with_auth(
        input: &str,
    ) -> Result<(Endpoint, Option<String>, Option<i64>), EndpointError> {
        if input.starts_with('/') || input.starts_with("./") || input.starts_with("../") {
            return Ok((Endpoint::Unix(PathBuf::from(input)), None, None));
        }

        if let Some(rest) = input.strip_prefix("redis://") {
            let (password, host_port_and_db) = match rest.rsplit_once('@') {
                Some((userinfo, after)) => {
                    let password = userinfo.strip_prefix(':').unwrap_or(userinfo);
                    (
                        (!password.is_empty()).then(|| password.to_owned()),
                        after,
                    )
                }
                None => (None, rest),
            };

            let (host_port, db) = match host_port_and_db.split_once('/') {
                Some((host_port, db_str)) if !db_str.is_empty() => {
                    let db = db_str
                        .parse()
                        .map_err(|_| EndpointError(format!("bad db {db_str:?}")))?;
                    (host_port, Some(db))
                }
                Some((host_port, _)) => (host_port, None),
                None => (host_port_and_db, None),
            };

            if host_port.is_empty() {
                return Err(EndpointError("redis:// URL has no host".into()));
            }
            let endpoint = parse_host_port(host_port, 6379)?;
            return Ok((endpoint, password, db));
        }

        Ok((parse_host_port(input, 6379)?, None, None))
    }
}

fn parse_host_port(input: &str, default_port: u16) -> Result<Endpoint, EndpointError> {
    match input.rsplit_once(':') {
        Some((host, port_str)) if !host.is_empty() => {
            let port: u16 = port_str
                .parse()
                .map_err(|_| EndpointError(format!("bad port {port_str:?}")))?;
            Ok(Endpoint::Tcp {
                host: host.to_owned(),
                port,
            })
        }
        _ => Ok(Endpoint::Tcp {
            host: input.to_owned(),
            port: default_port,
        }),
    }
}
