use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use fitplan_core::service::FitService;
use fitplan_core::templates::TemplateLibrary;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub templates_path: PathBuf,
}

/// The single user the CLI acts as.
pub struct LocalUser {
    pub id: String,
    pub token: String,
}

impl Config {
    /// Resolve the data directory (`FITPLAN_DATA_DIR` wins over the platform
    /// default) and make sure it exists.
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os("FITPLAN_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => ProjectDirs::from("", "", "fitplan")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        Self::in_dir(&data_dir)
    }

    pub fn in_dir(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Config {
            db_path: data_dir.join("fitplan.db"),
            templates_path: data_dir.join("templates.json"),
            data_dir: data_dir.to_path_buf(),
        })
    }

    /// `templates.json` in the data directory if present, else the builtin catalog.
    pub fn load_templates(&self) -> Result<TemplateLibrary> {
        if self.templates_path.exists() {
            TemplateLibrary::load(&self.templates_path).with_context(|| {
                format!(
                    "Failed to load templates from {}",
                    self.templates_path.display()
                )
            })
        } else {
            Ok(TemplateLibrary::builtin())
        }
    }

    /// Load the local user from disk, or create one in the database.
    ///
    /// The file holds the user id and bearer token on two lines, so the same
    /// identity can be used against `fitplan serve`.
    pub fn load_or_create_local_user(&self, svc: &FitService) -> Result<LocalUser> {
        let path = self.data_dir.join("local_user");

        if path.exists() {
            let raw = std::fs::read_to_string(&path).context("Failed to read local user file")?;
            let mut lines = raw.lines().map(str::trim);
            if let (Some(id), Some(token)) = (lines.next(), lines.next()) {
                if svc.get_user(id).is_ok() {
                    return Ok(LocalUser {
                        id: id.to_string(),
                        token: token.to_string(),
                    });
                }
            }
        }

        let created = svc.create_user("me")?;
        std::fs::write(&path, format!("{}\n{}\n", created.user.id, created.token))
            .context("Failed to write local user file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set local user file permissions")?;
        }
        Ok(LocalUser {
            id: created.user.id,
            token: created.token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_user_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::in_dir(dir.path()).unwrap();
        let svc = FitService::new(&config.db_path).unwrap();

        let first = config.load_or_create_local_user(&svc).unwrap();
        let second = config.load_or_create_local_user(&svc).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(
            svc.authenticate(&first.token).unwrap().unwrap().id,
            first.id
        );
    }

    #[test]
    fn test_stale_local_user_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::in_dir(dir.path()).unwrap();
        std::fs::write(dir.path().join("local_user"), "gone\ntoken\n").unwrap();
        let svc = FitService::new(&config.db_path).unwrap();
        let user = config.load_or_create_local_user(&svc).unwrap();
        assert_ne!(user.id, "gone");
    }

    #[test]
    fn test_templates_default_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::in_dir(dir.path()).unwrap();
        assert_eq!(config.load_templates().unwrap(), TemplateLibrary::builtin());

        std::fs::write(&config.templates_path, "{ not json").unwrap();
        assert!(config.load_templates().is_err());
    }
}
