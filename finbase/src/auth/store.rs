use std::{fs, io};

use camino::{Utf8Path, Utf8PathBuf};

use super::{AuthError, session::Session};

/// The signed-in session, persisted as JSON between invocations.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: Utf8PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// A missing or unreadable session file counts as signed out.
    #[must_use]
    pub fn load(&self) -> Option<Session> {
        let contents = fs::read_to_string(&self.path).ok()?;

        match serde_json::from_str(&contents) {
            Ok(session) => Some(session),
            Err(err) => {
                tracing::warn!(path = %self.path, "ignoring malformed session file: {err}");
                None
            }
        }
    }

    /// # Errors
    pub fn save(&self, session: &Session) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(&e))?;
        }

        let contents = serde_json::to_string_pretty(session).map_err(|e| AuthError::Other {
            message: e.to_string(),
        })?;
        fs::write(&self.path, contents).map_err(|e| self.io_error(&e))?;

        set_owner_only(&self.path).map_err(|e| self.io_error(&e))
    }

    /// # Errors
    pub fn clear(&self) -> Result<(), AuthError> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(self.io_error(&e)),
            _ => Ok(()),
        }
    }

    fn io_error(&self, err: &io::Error) -> AuthError {
        AuthError::Store {
            path: self.path.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(unix)]
fn set_owner_only(path: &Utf8Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Utf8Path) -> io::Result<()> {
    Ok(())
}
