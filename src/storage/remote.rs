//! Remote Backend
//!
//! Delegates persistence to an external in-memory database speaking RESP
//! (the Redis serialization protocol), addressed by a connection string
//! like `redis://127.0.0.1:6379` or a bare `host:port`.
//!
//! Entries travel as JSON bulk strings in the persisted snapshot layout, so
//! a remote store can be inspected with any standard client. TTL is
//! additionally delegated natively via `SET ... PX`, which lets the server
//! reclaim expired keys on its own; reads still filter liveness from the
//! entry payload so the policy matches the local backends.
//!
//! A lost connection degrades every operation to
//! [`StoreError::BackendUnavailable`] - never stale data - and the next
//! call attempts one reconnect.

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::backend::{Backend, StorageUsage};
use super::entry::{now_ms, Entry};
use super::expiry::is_live;
use crate::error::{StoreError, StoreResult};

/// A single RESP reply from the server.
#[derive(Debug, Clone, PartialEq)]
enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Bytes>),
    Array(Vec<Reply>),
}

/// Framed RESP connection. Generic over the stream so tests can drive it
/// through an in-memory duplex instead of a TCP socket.
struct RespConnection<S> {
    stream: BufReader<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> RespConnection<S> {
    fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Sends one command and reads its reply.
    async fn command(&mut self, args: &[&str]) -> io::Result<Reply> {
        self.send(args).await?;
        self.read_reply().await
    }

    async fn send(&mut self, args: &[&str]) -> io::Result<()> {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_slice(format!("*{}\r\n", args.len()).as_bytes());
        for arg in args {
            buf.put_slice(format!("${}\r\n", arg.len()).as_bytes());
            buf.put_slice(arg.as_bytes());
            buf.put_slice(b"\r\n");
        }
        self.stream.get_mut().write_all(&buf).await?;
        self.stream.get_mut().flush().await
    }

    async fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        let n = self.stream.read_line(&mut line).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            ));
        }
        Ok(line.trim_end().to_string())
    }

    async fn read_reply(&mut self) -> io::Result<Reply> {
        let line = self.read_line().await?;
        let mut chars = line.chars();
        let prefix = chars.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "empty reply line")
        })?;
        let rest = chars.as_str();

        match prefix {
            '+' => Ok(Reply::Simple(rest.to_string())),
            '-' => Ok(Reply::Error(rest.to_string())),
            ':' => {
                let n = rest.parse::<i64>().map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidData, "invalid integer reply")
                })?;
                Ok(Reply::Integer(n))
            }
            '$' => {
                let len = rest.parse::<i64>().map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidData, "invalid bulk length")
                })?;
                if len < 0 {
                    return Ok(Reply::Bulk(None));
                }
                let mut data = vec![0u8; len as usize];
                self.stream.read_exact(&mut data).await?;
                let mut crlf = [0u8; 2];
                self.stream.read_exact(&mut crlf).await?;
                Ok(Reply::Bulk(Some(Bytes::from(data))))
            }
            '*' => {
                let count = rest.parse::<i64>().map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidData, "invalid array length")
                })?;
                if count < 0 {
                    return Ok(Reply::Array(Vec::new()));
                }
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let item = Box::pin(self.read_reply()).await?;
                    items.push(item);
                }
                Ok(Reply::Array(items))
            }
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown reply prefix: {:?}", other),
            )),
        }
    }
}

/// Backing store that forwards every operation to a remote RESP server.
pub struct RemoteBackend {
    addr: String,
    conn: Mutex<Option<RespConnection<TcpStream>>>,
}

impl RemoteBackend {
    /// Connects eagerly and verifies the server with a `PING`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let addr = parse_addr(url);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| StoreError::BackendUnavailable(format!("{}: {}", addr, e)))?;
        let mut conn = RespConnection::new(stream);
        conn.command(&["PING"])
            .await
            .map_err(|e| StoreError::BackendUnavailable(e.to_string()))?;
        debug!(addr = %addr, "connected to remote store");
        Ok(Self {
            addr,
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Runs one command, reconnecting once if the connection was lost.
    ///
    /// `-ERR` replies surface as [`StoreError::Persistence`]; I/O failures
    /// drop the connection and surface as `BackendUnavailable`.
    async fn command(&self, args: &[&str]) -> StoreResult<Reply> {
        let mut guard = self.conn.lock().await;

        if guard.is_none() {
            let stream = TcpStream::connect(&self.addr)
                .await
                .map_err(|e| StoreError::BackendUnavailable(format!("{}: {}", self.addr, e)))?;
            *guard = Some(RespConnection::new(stream));
            debug!(addr = %self.addr, "reconnected to remote store");
        }
        let Some(conn) = guard.as_mut() else {
            return Err(StoreError::BackendUnavailable(self.addr.clone()));
        };

        match conn.command(args).await {
            Ok(Reply::Error(msg)) => Err(StoreError::Persistence(msg)),
            Ok(reply) => Ok(reply),
            Err(e) => {
                *guard = None;
                Err(StoreError::BackendUnavailable(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Entry>> {
        match self.command(&["GET", key]).await? {
            Reply::Bulk(Some(raw)) => {
                let entry: Entry = serde_json::from_slice(&raw)?;
                if is_live(&entry, now_ms()) {
                    Ok(Some(entry))
                } else {
                    // Shouldn't normally happen because the server expires
                    // natively, but filter anyway for one consistent policy.
                    let _ = self.command(&["DEL", key]).await;
                    Ok(None)
                }
            }
            Reply::Bulk(None) => Ok(None),
            other => Err(unexpected("GET", &other)),
        }
    }

    async fn set(&self, key: &str, entry: Entry) -> StoreResult<()> {
        let payload = serde_json::to_string(&entry)?;
        let reply = match entry.expires_at {
            Some(expires_at) => {
                let px = expires_at.saturating_sub(now_ms()).max(1).to_string();
                self.command(&["SET", key, &payload, "PX", &px]).await?
            }
            None => self.command(&["SET", key, &payload]).await?,
        };
        match reply {
            Reply::Simple(_) => Ok(()),
            other => Err(unexpected("SET", &other)),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        match self.command(&["DEL", key]).await? {
            Reply::Integer(n) => Ok(n > 0),
            other => Err(unexpected("DEL", &other)),
        }
    }

    async fn keys(&self, pattern: Option<&str>) -> StoreResult<Vec<String>> {
        let pattern = pattern.map(escape_remote_pattern);
        let pattern = pattern.as_deref().unwrap_or("*");
        match self.command(&["KEYS", pattern]).await? {
            Reply::Array(items) => {
                let mut keys = Vec::with_capacity(items.len());
                for item in items {
                    if let Reply::Bulk(Some(raw)) = item {
                        if let Ok(key) = String::from_utf8(raw.to_vec()) {
                            keys.push(key);
                        }
                    }
                }
                Ok(keys)
            }
            other => Err(unexpected("KEYS", &other)),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        match self.command(&["FLUSHDB"]).await? {
            Reply::Simple(_) => Ok(()),
            other => Err(unexpected("FLUSHDB", &other)),
        }
    }

    async fn sweep(&self) -> StoreResult<u64> {
        // Expiry is enforced server-side.
        Ok(0)
    }

    async fn flush(&self) -> StoreResult<()> {
        // Best-effort background save; "save already in progress" and
        // similar server-side refusals are not our failure.
        match self.command(&["BGSAVE"]).await {
            Ok(_) => Ok(()),
            Err(StoreError::Persistence(msg)) => {
                warn!(reason = %msg, "remote store declined background save");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn usage(&self) -> StoreResult<StorageUsage> {
        match self.command(&["DBSIZE"]).await? {
            Reply::Integer(n) => Ok(StorageUsage {
                keys: n.max(0) as u64,
                // No cheap way to size remote values; report keys only.
                approx_bytes: 0,
            }),
            other => Err(unexpected("DBSIZE", &other)),
        }
    }
}

fn unexpected(cmd: &str, reply: &Reply) -> StoreError {
    StoreError::Persistence(format!("unexpected reply to {}: {:?}", cmd, reply))
}

/// Escapes the glob characters `KEYS` interprets beyond `*` and `?`.
///
/// Our pattern language gives `[`, `]`, and `\` no special meaning, so they
/// must reach the server as literals or the remote backend would match a
/// different key set than the local ones.
fn escape_remote_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Reduces a connection string to `host:port`.
fn parse_addr(url: &str) -> String {
    let stripped = url
        .strip_prefix("redis://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);
    // Drop any trailing path such as a database index.
    let host_port = stripped.split('/').next().unwrap_or(stripped);
    if host_port.contains(':') {
        host_port.to_string()
    } else {
        format!("{}:6379", host_port)
    }
}
