//! Discord RPC over the local IPC socket
//!
//! Frame layout: `opcode: u32 LE`, `length: u32 LE`, JSON payload.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{Activity, PresenceClient};
use crate::error::{CoreError, Result};

pub const DEFAULT_CLIENT_ID: &str = "1456107266766798971";

const RPC_VERSION: u32 = 1;
const MAX_PIPES: usize = 10;
const MAX_FRAME_LEN: u32 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl Opcode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Opcode::Handshake),
            1 => Some(Opcode::Frame),
            2 => Some(Opcode::Close),
            3 => Some(Opcode::Ping),
            4 => Some(Opcode::Pong),
            _ => None,
        }
    }
}

trait IpcStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> IpcStream for T {}

fn ipc_error(message: impl std::fmt::Display) -> CoreError {
    CoreError::PresenceService(message.to_string())
}

async fn write_frame<W: AsyncWrite + Unpin>(stream: &mut W, op: Opcode, payload: &Value) -> Result<()> {
    let buf = serde_json::to_vec(payload).map_err(ipc_error)?;
    stream.write_u32_le(op as u32).await.map_err(ipc_error)?;
    stream.write_u32_le(buf.len() as u32).await.map_err(ipc_error)?;
    stream.write_all(&buf).await.map_err(ipc_error)?;
    stream.flush().await.map_err(ipc_error)?;
    Ok(())
}

async fn read_frame<R: AsyncRead + Unpin>(stream: &mut R) -> Result<(Opcode, Value)> {
    let op = stream.read_u32_le().await.map_err(ipc_error)?;
    let len = stream.read_u32_le().await.map_err(ipc_error)?;
    if len > MAX_FRAME_LEN {
        return Err(ipc_error(format!("frame too large: {} bytes", len)));
    }

    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await.map_err(ipc_error)?;

    let op = Opcode::from_u32(op).ok_or_else(|| ipc_error(format!("unknown opcode {}", op)))?;
    let payload = serde_json::from_slice(&buf).map_err(ipc_error)?;
    Ok((op, payload))
}

/// Candidate socket locations, in probe order
#[cfg(unix)]
fn candidate_paths() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .filter_map(|var| std::env::var_os(var).map(PathBuf::from))
        .collect();
    dirs.push(PathBuf::from("/tmp"));

    let mut paths = Vec::new();
    for dir in dirs {
        for sub in ["", "app/com.discordapp.Discord", "snap.discord"] {
            let base = if sub.is_empty() { dir.clone() } else { dir.join(sub) };
            for n in 0..MAX_PIPES {
                paths.push(base.join(format!("discord-ipc-{}", n)));
            }
        }
    }
    paths
}

#[cfg(windows)]
fn candidate_paths() -> Vec<PathBuf> {
    (0..MAX_PIPES)
        .map(|n| PathBuf::from(format!(r"\\.\pipe\discord-ipc-{}", n)))
        .collect()
}

#[cfg(unix)]
async fn open_stream(path: &Path) -> std::io::Result<Box<dyn IpcStream>> {
    let stream = tokio::net::UnixStream::connect(path).await?;
    Ok(Box::new(stream))
}

#[cfg(windows)]
async fn open_stream(path: &Path) -> std::io::Result<Box<dyn IpcStream>> {
    let pipe = tokio::net::windows::named_pipe::ClientOptions::new().open(path)?;
    Ok(Box::new(pipe))
}

/// Activity JSON as the RPC server expects it; empty fields are omitted
fn activity_payload(activity: &Activity) -> Value {
    let mut body = serde_json::Map::new();
    if !activity.state.is_empty() {
        body.insert("state".to_string(), json!(activity.state));
    }
    if !activity.details.is_empty() {
        body.insert("details".to_string(), json!(activity.details));
    }

    let mut assets = serde_json::Map::new();
    for (key, value) in [
        ("large_image", &activity.large_image),
        ("large_text", &activity.large_text),
        ("small_image", &activity.small_image),
        ("small_text", &activity.small_text),
    ] {
        if !value.is_empty() {
            assets.insert(key.to_string(), json!(value));
        }
    }
    if !assets.is_empty() {
        body.insert("assets".to_string(), Value::Object(assets));
    }

    Value::Object(body)
}

pub struct DiscordIpcClient {
    client_id: String,
    stream: Option<Box<dyn IpcStream>>,
}

impl DiscordIpcClient {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            stream: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn handshake(&mut self, mut stream: Box<dyn IpcStream>) -> Result<()> {
        let hello = json!({ "v": RPC_VERSION, "client_id": self.client_id });
        write_frame(&mut stream, Opcode::Handshake, &hello).await?;

        let (op, payload) = read_frame(&mut stream).await?;
        if op == Opcode::Close {
            return Err(ipc_error(format!("handshake rejected: {}", payload)));
        }
        if payload.get("evt").and_then(Value::as_str) != Some("READY") {
            return Err(ipc_error(format!("unexpected handshake reply: {}", payload)));
        }

        self.stream = Some(stream);
        Ok(())
    }

    /// Send a command frame and wait for its reply, answering pings on the way
    async fn request(&mut self, payload: &Value) -> Result<Value> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ipc_error("not connected"))?;
        write_frame(stream, Opcode::Frame, payload).await?;

        loop {
            let (op, reply) = read_frame(stream).await?;
            match op {
                Opcode::Ping => write_frame(stream, Opcode::Pong, &reply).await?,
                Opcode::Close => return Err(ipc_error(format!("connection closed by server: {}", reply))),
                _ => return Ok(reply),
            }
        }
    }
}

#[async_trait]
impl PresenceClient for DiscordIpcClient {
    async fn connect(&mut self) -> Result<()> {
        self.stream = None;

        for path in candidate_paths() {
            match open_stream(&path).await {
                Ok(stream) => {
                    tracing::debug!("Connected to IPC socket {:?}", path);
                    return self.handshake(stream).await;
                }
                Err(_) => continue,
            }
        }

        Err(ipc_error("no Discord IPC socket found"))
    }

    async fn set_activity(&mut self, activity: &Activity) -> Result<()> {
        let nonce = uuid::Uuid::now_v7().to_string();
        let command = json!({
            "cmd": "SET_ACTIVITY",
            "args": {
                "pid": std::process::id(),
                "activity": activity_payload(activity),
            },
            "nonce": nonce,
        });

        let reply = match self.request(&command).await {
            Ok(reply) => reply,
            Err(e) => {
                self.stream = None;
                return Err(e);
            }
        };

        if reply.get("evt").and_then(Value::as_str) == Some("ERROR") {
            let message = reply
                .pointer("/data/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(ipc_error(format!("SET_ACTIVITY rejected: {}", message)));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            write_frame(&mut stream, Opcode::Close, &json!({})).await?;
            stream.shutdown().await.map_err(ipc_error)?;
        }
        Ok(())
    }
}
