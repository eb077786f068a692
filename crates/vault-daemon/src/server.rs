use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;

use vault_core::ensure_dir_mode;
use vault_ipc::{error, parse_request_line, MAX_LINE_BYTES};

use crate::dispatch::dispatch;
use crate::exit_codes::ExitCode;
use crate::state::AppState;

const SOCKET_MODE: u32 = 0o600;
const SOCKET_DIR_MODE: u32 = 0o700;
const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Binds the Unix domain socket, chmods it, and re-verifies the mode took
/// effect — mirrors the teacher's heartbeat state-file create-then-verify
/// discipline, applied here to a socket instead of a JSON state file.
pub fn bind_socket(socket_path: &Path) -> Result<UnixListener, ExitCode> {
    let parent = socket_path.parent().unwrap_or_else(|| Path::new("."));
    if ensure_dir_mode(parent, SOCKET_DIR_MODE).is_err() {
        return Err(ExitCode::SocketBind);
    }

    if socket_path.exists() {
        if std::fs::remove_file(socket_path).is_err() {
            return Err(ExitCode::SocketBind);
        }
    }

    let listener = UnixListener::bind(socket_path).map_err(|_| ExitCode::SocketBind)?;

    std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(SOCKET_MODE))
        .map_err(|_| ExitCode::PermissionVerify)?;
    let actual_mode = std::fs::metadata(socket_path)
        .map_err(|_| ExitCode::PermissionVerify)?
        .permissions()
        .mode()
        & 0o777;
    if actual_mode != SOCKET_MODE {
        return Err(ExitCode::PermissionVerify);
    }

    Ok(listener)
}

/// Runs the accept loop until `shutdown` resolves, then stops accepting new
/// connections, waits for in-flight handlers to finish, and unlinks the
/// socket.
pub async fn run(
    listener: UnixListener,
    socket_path: PathBuf,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()>,
) {
    let oauth_for_sweep = state.oauth.clone();
    let sweep = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            oauth_for_sweep.sweep_expired().await;
        }
    });

    let connections: Arc<Mutex<Vec<tokio::task::JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let state = state.clone();
                        let connections = connections.clone();
                        let handle = tokio::spawn(async move {
                            handle_connection(stream, &state).await;
                        });
                        connections.lock().await.push(handle);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to accept connection");
                    }
                }
            }
        }
    }

    sweep.abort();
    state.oauth.clear_cache().await;

    let handles = std::mem::take(&mut *connections.lock().await);
    for handle in handles {
        let _ = handle.await;
    }

    let _ = std::fs::remove_file(&socket_path);
}

async fn handle_connection(stream: UnixStream, state: &AppState) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                tracing::warn!(error = %err, "connection read failed");
                break;
            }
        };

        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed.is_empty() {
            continue;
        }

        tracing::debug!(line_bytes = bytes_read, "received request line");

        let response = if trimmed.len() > MAX_LINE_BYTES {
            error("line exceeds the maximum permitted size")
        } else {
            match parse_request_line(trimmed.as_bytes()) {
                Ok(request) => dispatch(state, request).await,
                Err(err) => error(err.to_string()),
            }
        };

        let mut payload = match serde_json::to_vec(&response) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize response");
                break;
            }
        };
        payload.push(b'\n');

        if let Err(err) = write_half.write_all(&payload).await {
            tracing::warn!(error = %err, "connection write failed");
            break;
        }
        if write_half.flush().await.is_err() {
            break;
        }
    }
}
