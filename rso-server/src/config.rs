use std::path::PathBuf;

use anyhow::{Context, Result};
use rso_core::ServiceConfig;

use crate::cli::Cli;

/// Runtime configuration derived from CLI/env.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub service: ServiceConfig,
}

impl ServerConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut service = match &cli.config {
            Some(path) => ServiceConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ServiceConfig::default(),
        };

        if let Some(dir) = &cli.store_dir {
            // Relative store directories are anchored at the working directory.
            let dir = if dir.is_relative() {
                std::env::current_dir()?.join(dir)
            } else {
                PathBuf::from(dir)
            };
            service = service.with_file_store(dir);
        }

        Ok(Self {
            listen_addr: cli.listen_addr.clone(),
            service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rso_core::PersistenceConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["rso-server"]);
        let cfg = ServerConfig::from_cli(&cli).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:8788");
        assert_eq!(cfg.service.persistence, PersistenceConfig::Memory);
    }

    #[test]
    fn test_store_dir_overrides_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "persistence:\n  kind: memory").unwrap();

        let cli = Cli::parse_from([
            "rso-server",
            "--config",
            file.path().to_str().unwrap(),
            "--store-dir",
            "/srv/rso",
        ]);
        let cfg = ServerConfig::from_cli(&cli).unwrap();
        assert_eq!(
            cfg.service.persistence,
            PersistenceConfig::File {
                root: PathBuf::from("/srv/rso")
            }
        );
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = Cli::parse_from(["rso-server", "--config", "/definitely/not/here.yml"]);
        assert!(ServerConfig::from_cli(&cli).is_err());
    }
}
