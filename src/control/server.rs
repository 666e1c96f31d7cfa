//! Control socket listener.

use std::io;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use crate::control::{ControlMessage, CONNECTION_DEADLINE};
use crate::lifecycle::Shutdown;

/// Unix socket server answering control messages.
pub struct ControlServer {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlServer {
    /// Bind the socket, replacing a stale socket file left by a previous run.
    pub fn bind(path: &Path) -> io::Result<Self> {
        remove_socket_file(path)?;
        let listener = UnixListener::bind(path)?;
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until `stop` fires, then remove the socket file.
    ///
    /// CLOSE and STOP only request shutdown through `shutdown`; the socket
    /// keeps answering until the owner sends on `stop`.
    pub async fn run(self, shutdown: Shutdown, mut stop: broadcast::Receiver<()>) {
        tracing::info!(path = %self.path.display(), "Control socket listening");

        loop {
            tokio::select! {
                _ = stop.recv() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let shutdown = shutdown.clone();
                        let path = self.path.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, &path, &shutdown).await {
                                tracing::warn!(error = %e, "Control connection failed");
                            }
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "Failed to accept control connection"),
                },
            }
        }

        drop(self.listener);
        if let Err(e) = remove_socket_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove control socket");
        }
        tracing::info!("Control socket closed");
    }
}

async fn handle_connection(mut stream: UnixStream, path: &Path, shutdown: &Shutdown) -> io::Result<()> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    tokio::time::timeout(CONNECTION_DEADLINE, reader.read_line(&mut line))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "control client sent nothing"))??;

    let message = match line.parse::<ControlMessage>() {
        Ok(message) => message,
        Err(unknown) => {
            tracing::warn!(message = %unknown, "Unknown control message");
            return Ok(());
        }
    };

    tracing::info!(%message, "Control message received");

    let reply = format!("{}\n", message.expected_reply());
    tokio::time::timeout(CONNECTION_DEADLINE, write_half.write_all(reply.as_bytes()))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "control client stopped reading"))??;
    let _ = write_half.shutdown().await;

    match message {
        ControlMessage::Ping => {}
        ControlMessage::Close => {
            remove_socket_file(path)?;
            shutdown.trigger();
        }
        ControlMessage::Stop => shutdown.trigger(),
    }
    Ok(())
}

fn remove_socket_file(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
