//! Redis connector speaking RESP2 over plain TCP.
//!
//! Each `connect()` opens a fresh TCP connection, authenticates when the
//! URL carries a password, and selects the configured database. Every
//! command round-trip is bounded by `command_timeout`.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::connection::{CacheConnection, CacheConnector};
use crate::error::{CacheError, CacheResult};
use crate::resp::{Reply, encode_command, parse_reply};
use crate::target::RedisTarget;

/// Read chunk size for replies.
const READ_CHUNK: usize = 4096;

/// Factory for Redis connections.
pub struct RedisConnector {
    target: RedisTarget,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl RedisConnector {
    pub fn new(target: RedisTarget, connect_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            target,
            connect_timeout,
            command_timeout,
        }
    }
}

#[async_trait]
impl CacheConnector for RedisConnector {
    async fn connect(&self) -> CacheResult<Box<dyn CacheConnection>> {
        let addr = (self.target.host.as_str(), self.target.port);
        let stream = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(CacheError::Connect {
                    target: self.target(),
                    reason: e.to_string(),
                });
            }
            Err(_) => return Err(CacheError::Timeout(format!("connect to {}", self.target()))),
        };
        let _ = stream.set_nodelay(true);

        let mut conn = RedisConnection {
            stream: Some(stream),
            buf: Vec::with_capacity(READ_CHUNK),
            command_timeout: self.command_timeout,
        };

        if let Some(password) = &self.target.password {
            let reply = match &self.target.username {
                Some(user) => {
                    conn.command(&[b"AUTH", user.as_bytes(), password.as_bytes()])
                        .await?
                }
                None => conn.command(&[b"AUTH", password.as_bytes()]).await?,
            };
            expect_ok(reply, "AUTH")?;
        }

        if self.target.db != 0 {
            let db = self.target.db.to_string();
            let reply = conn.command(&[b"SELECT", db.as_bytes()]).await?;
            expect_ok(reply, "SELECT")?;
        }

        debug!(cache = %self.target, "redis connection established");
        Ok(Box::new(conn))
    }

    fn target(&self) -> String {
        format!("redis://{}", self.target)
    }
}

/// One TCP connection to Redis.
struct RedisConnection {
    /// `None` once closed.
    stream: Option<TcpStream>,
    /// Bytes read but not yet decoded.
    buf: Vec<u8>,
    command_timeout: Duration,
}

impl RedisConnection {
    /// Send one command and wait for its reply, bounded by `command_timeout`.
    async fn command(&mut self, args: &[&[u8]]) -> CacheResult<Reply> {
        let name = String::from_utf8_lossy(args.first().copied().unwrap_or_default()).into_owned();
        let timeout = self.command_timeout;
        match tokio::time::timeout(timeout, self.round_trip(args)).await {
            Ok(Ok(Reply::Error(msg))) => Err(CacheError::Server(msg)),
            Ok(result) => result,
            Err(_) => {
                // The reply may still arrive; the stream is no longer in sync.
                self.close();
                Err(CacheError::Timeout(format!("redis {name}")))
            }
        }
    }

    async fn round_trip(&mut self, args: &[&[u8]]) -> CacheResult<Reply> {
        let stream = self.stream.as_mut().ok_or(CacheError::Closed)?;
        stream.write_all(&encode_command(args)).await?;

        loop {
            if let Some((reply, used)) = parse_reply(&self.buf)? {
                self.buf.drain(..used);
                return Ok(reply);
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(CacheError::Protocol("server closed connection".to_string()));
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

#[async_trait]
impl CacheConnection for RedisConnection {
    async fn get(&mut self, key: &str) -> CacheResult<Option<String>> {
        match self.command(&[b"GET", key.as_bytes()]).await? {
            Reply::Bulk(None) => Ok(None),
            Reply::Bulk(Some(data)) => String::from_utf8(data)
                .map(Some)
                .map_err(|e| CacheError::Protocol(format!("GET value is not utf-8: {e}"))),
            other => Err(CacheError::Protocol(format!("unexpected GET reply: {other:?}"))),
        }
    }

    async fn set(&mut self, key: &str, value: &str) -> CacheResult<()> {
        let reply = self
            .command(&[b"SET", key.as_bytes(), value.as_bytes()])
            .await?;
        expect_ok(reply, "SET")
    }

    fn close(&mut self) {
        // Dropping the stream closes the socket.
        if self.stream.take().is_some() {
            self.buf.clear();
        }
    }
}

fn expect_ok(reply: Reply, command: &str) -> CacheResult<()> {
    match reply {
        Reply::Simple(s) if s == "OK" => Ok(()),
        other => Err(CacheError::Protocol(format!(
            "unexpected {command} reply: {other:?}"
        ))),
    }
}
