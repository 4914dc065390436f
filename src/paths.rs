use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub fn database_file_path(cli_value: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_value {
        return Ok(path);
    }
    if let Some(value) = env::var_os("KIOSK_RESUME_DB")
        && !value.is_empty()
    {
        return Ok(PathBuf::from(value));
    }
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("kiosk-resume").join("kiosk.db"))
}

pub fn socket_path(cli_value: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_value {
        return path;
    }
    // SAFETY: getuid has no preconditions and cannot fail.
    let uid = unsafe { libc::getuid() };
    resolve_socket_path_from_env(
        env::var_os("KIOSK_RESUME_SOCKET"),
        env::var_os("XDG_RUNTIME_DIR"),
        uid,
    )
}

pub(crate) fn resolve_socket_path_from_env(
    override_value: Option<OsString>,
    runtime_dir: Option<OsString>,
    uid: u32,
) -> PathBuf {
    match (override_value, runtime_dir) {
        (Some(value), _) if !value.is_empty() => PathBuf::from(value),
        (_, Some(dir)) if !dir.is_empty() => PathBuf::from(dir).join("mpv.sock"),
        _ => PathBuf::from(format!("/run/user/{uid}/mpv.sock")),
    }
}
