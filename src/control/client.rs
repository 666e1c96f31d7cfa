//! Control socket client used by the `ping`, `close` and `stop` commands.

use std::io;
use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::control::{ControlError, ControlMessage, CONNECTION_DEADLINE};

/// Send one message and return the server's reply.
///
/// Fails with [`ControlError::UnexpectedResponse`] unless the reply is the
/// one a running server gives for `message`.
pub async fn send_message(path: &Path, message: ControlMessage) -> Result<String, ControlError> {
    tokio::time::timeout(CONNECTION_DEADLINE, exchange(path, message))
        .await
        .map_err(|_| ControlError::Timeout(CONNECTION_DEADLINE))?
}

async fn exchange(path: &Path, message: ControlMessage) -> Result<String, ControlError> {
    let mut stream = UnixStream::connect(path).await.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => ControlError::NotRunning(e),
        _ => ControlError::Io(e),
    })?;

    stream.write_all(format!("{message}\n").as_bytes()).await?;

    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    let response = response.trim().to_string();

    if response != message.expected_reply() {
        return Err(ControlError::UnexpectedResponse(response));
    }
    Ok(response)
}
