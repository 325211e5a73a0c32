//! Control socket location and permissions

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const CONTROL_SOCKET_NAME: &str = "vitalcast.sock";

/// Directory holding the control socket.
///
/// `$XDG_RUNTIME_DIR` when it exists, otherwise `<data dir>/vitalcast`
/// (created with owner-only permissions).
pub fn get_socket_dir() -> Result<PathBuf> {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        let path = PathBuf::from(runtime_dir);
        if path.exists() {
            return Ok(path);
        }
    }

    let socket_dir = dirs::data_dir()
        .context("No data directory available for the control socket")?
        .join("vitalcast");

    if !socket_dir.exists() {
        std::fs::create_dir_all(&socket_dir).context("Failed to create socket directory")?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o700);
        std::fs::set_permissions(&socket_dir, permissions)
            .context("Failed to set socket directory permissions")?;
    }

    Ok(socket_dir)
}

/// Default path of the control socket
pub fn get_control_socket_path() -> Result<PathBuf> {
    Ok(get_socket_dir()?.join(CONTROL_SOCKET_NAME))
}

/// Restrict a socket file to its owner (0600)
#[cfg(unix)]
pub fn secure_socket_permissions(socket_path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if socket_path.exists() {
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(socket_path, permissions)
            .context("Failed to set socket permissions")?;
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn secure_socket_permissions(_socket_path: &Path) -> Result<()> {
    Ok(())
}
