use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::SniperError;
use crate::types::Credential;

/// Where the caller keeps the bearer credential between sessions.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Option<Credential>;

    fn save(&self, credential: &Credential) -> Result<(), SniperError>;
}

/// Token stored as a single line in a text file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<Credential> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let credential = Credential::new(contents);
                if credential.is_empty() {
                    debug!(path = %self.path.display(), "Credential file is empty");
                    None
                } else {
                    Some(credential)
                }
            }
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No stored credential");
                None
            }
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), SniperError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                SniperError::storage(format!("cannot create {}", parent.display()), e)
            })?;
        }
        fs::write(&self.path, format!("{}\n", credential.as_str())).map_err(|e| {
            SniperError::storage(format!("cannot write {}", self.path.display()), e)
        })?;
        info!(path = %self.path.display(), "Credential saved");
        Ok(())
    }
}
