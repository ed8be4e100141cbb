//! Interactive shell sessions bridged over a WebSocket.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};
use warp::ws::{Message, WebSocket};

const BANNER: &str = "\r\n\x1b[1;32m== Garden Terminal ==\x1b[0m\r\n\
\x1b[1;36mCommands: kubectl, helm, sh\x1b[0m\r\n\r\n";
const SESSION_ENDED: &str = "\r\n\x1b[1;31m[Terminal session ended]\x1b[0m\r\n";

/// How terminal shells are launched.
#[derive(Debug, Clone)]
pub struct ShellSettings {
    pub shell: String,
    pub kubeconfig: Option<PathBuf>,
}

impl ShellSettings {
    fn spawn(&self) -> std::io::Result<Child> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-i")
            .env("TERM", "xterm-256color")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Ok(path) = std::env::var("PATH") {
            cmd.env("PATH", format!("{}:/usr/local/bin:/usr/bin:/bin", path));
        }
        if let Some(kubeconfig) = &self.kubeconfig {
            cmd.env("KUBECONFIG", kubeconfig);
        }
        if let Ok(dir) = std::env::current_dir() {
            cmd.current_dir(dir);
        }
        cmd.spawn()
    }
}

/// Live shell sessions keyed by pid, so shutdown can end them all.
#[derive(Default)]
pub struct Terminals {
    sessions: Mutex<HashMap<u32, oneshot::Sender<()>>>,
}

impl Terminals {
    async fn register(&self, pid: u32) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.sessions.lock().await.insert(pid, tx);
        rx
    }

    async fn unregister(&self, pid: u32) {
        self.sessions.lock().await.remove(&pid);
    }

    pub async fn active(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Signals every session to kill its shell.
    pub async fn shutdown(&self) {
        let sessions: Vec<_> = self.sessions.lock().await.drain().collect();
        if !sessions.is_empty() {
            info!("closing {} terminal session(s)", sessions.len());
        }
        for (_, kill) in sessions {
            let _ = kill.send(());
        }
    }
}

async fn pump<R>(mut reader: R, tx: mpsc::Sender<String>, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                let chunk = if is_stderr {
                    format!("\x1b[31m{}\x1b[0m", text)
                } else {
                    text.into_owned()
                };
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("terminal stream closed: {}", e);
                break;
            }
        }
    }
}

/// Runs one shell for the lifetime of the socket.
pub async fn run_session(socket: WebSocket, settings: ShellSettings, terminals: std::sync::Arc<Terminals>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    info!("terminal websocket connected, shell {}", settings.shell);

    if ws_tx.send(Message::text(BANNER)).await.is_err() {
        return;
    }

    let mut child = match settings.spawn() {
        Ok(child) => child,
        Err(e) => {
            error!("failed to spawn {}: {}", settings.shell, e);
            let _ = ws_tx
                .send(Message::text(format!("\r\n\x1b[1;31mError: {}\x1b[0m\r\n", e)))
                .await;
            let _ = ws_tx.send(Message::close()).await;
            return;
        }
    };
    let pid = child.id().unwrap_or_default();
    info!(pid, "terminal process spawned");

    let (out_tx, mut out_rx) = mpsc::channel::<String>(64);
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(pump(stdout, out_tx.clone(), false));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(pump(stderr, out_tx, true));
    }
    let mut stdin = child.stdin.take();
    let mut kill_rx = terminals.register(pid).await;
    let active = terminals.active().await;
    debug!(pid, active, "terminal session registered");

    let mut exited = false;
    loop {
        tokio::select! {
            Some(chunk) = out_rx.recv() => {
                if ws_tx.send(Message::text(chunk)).await.is_err() {
                    break;
                }
            }
            incoming = ws_rx.next() => match incoming {
                Some(Ok(msg)) if msg.is_close() => break,
                Some(Ok(msg)) => {
                    let Ok(text) = msg.to_str() else { continue };
                    if text.starts_with("resize:") {
                        continue;
                    }
                    if let Some(input) = stdin.as_mut() {
                        if let Err(e) = input.write_all(text.as_bytes()).await {
                            warn!(pid, "error writing to terminal stdin: {}", e);
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(pid, "terminal websocket error: {}", e);
                    break;
                }
                None => break,
            },
            status = child.wait() => {
                match status {
                    Ok(status) => info!(pid, code = ?status.code(), "terminal process exited"),
                    Err(e) => error!(pid, "terminal process error: {}", e),
                }
                exited = true;
                break;
            }
            _ = &mut kill_rx => break,
        }
    }

    if exited {
        while let Ok(chunk) = out_rx.try_recv() {
            let _ = ws_tx.send(Message::text(chunk)).await;
        }
        let _ = ws_tx.send(Message::text(SESSION_ENDED)).await;
        let _ = ws_tx.send(Message::close()).await;
    } else {
        if let Err(e) = child.kill().await {
            debug!(pid, "terminal kill: {}", e);
        }
        let _ = ws_tx.send(Message::close()).await;
    }
    terminals.unregister(pid).await;
    info!(pid, "terminal websocket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_signals_and_clears_sessions() {
        let terminals = Terminals::default();
        let rx = terminals.register(42).await;
        assert_eq!(terminals.active().await, 1);

        terminals.shutdown().await;
        assert!(rx.await.is_ok());
        assert_eq!(terminals.active().await, 0);
    }
}
