use std::{env, fs, path::{Path, PathBuf}};

use rusqlite::Connection;

use crate::errors::SyncError;

pub fn get_default_db_path() -> Result<PathBuf, SyncError> {
    let os = std::env::consts::OS;
    let v = match os {
        "windows" => "USERPROFILE",
        "linux" | "macos" => "HOME",
        x => return Err(SyncError::UnsupportedOS(x.to_string())),
    };

    let home = env::var(v).map_err(|_| SyncError::UnavailableEnvVariable(v.to_string()))?;
    let dir = Path::new(&home).join(".plsync");
    if !dir.exists() {
        fs::create_dir_all(&dir)
            .map_err(|_| SyncError::PathCreationFailed(dir.display().to_string()))?;
    }

    Ok(dir.join("data.db3"))
}

pub fn open_db(custom_path: Option<&Path>) -> Result<Connection, SyncError> {
    let path = match custom_path {
        Some(p) => {
            if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|_| SyncError::PathCreationFailed(parent.display().to_string()))?;
            }
            p.to_path_buf()
        }
        None => get_default_db_path()?,
    };
    let conn = Connection::open(path)?;

    // SQLite disables foreign keys by default, cascades depend on them
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    Ok(conn)
}
