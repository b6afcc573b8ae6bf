//! Layered configuration: built-in defaults, then an optional `skoskeeper`
//! file (any format the `config` crate reads, e.g. `skoskeeper.toml`) in the
//! working directory, then environment variables such as
//! `SKOSKEEPER_SERVER__BIND=0.0.0.0:8080`.

use std::path::{Path, PathBuf};

// used to read the layered configuration
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;
use crate::persist::PersistenceMode;
use crate::thesaurus::Thesaurus;

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub catalog: CatalogSettings,
    pub persistence: PersistenceSettings,
    pub server: ServerSettings,
    pub log: LogSettings,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CatalogSettings {
    /// Holds `<type>/thesauri/<dname>/<fname>.rdf`.
    pub root: PathBuf,
    pub types: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Memory,
    File,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PersistenceSettings {
    pub mode: StorageMode,
    pub directory: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LogSettings {
    pub filter: String,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_file(Path::new("skoskeeper"))
    }

    /// As [`Settings::load`], with the file layer read from `path`. A missing
    /// file is not an error.
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .set_default("catalog.root", "codelist")?
            .set_default("catalog.types", vec!["external", "local"])?
            .set_default("persistence.mode", "memory")?
            .set_default("persistence.directory", "data")?
            .set_default("server.bind", "127.0.0.1:8080")?
            .set_default("log.filter", "info")?
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("SKOSKEEPER")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("catalog.types")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// How the graph of the thesaurus with this key is backed.
    pub fn persistence_mode(&self, key: &str) -> PersistenceMode {
        match self.persistence.mode {
            StorageMode::Memory => PersistenceMode::InMemory,
            StorageMode::File => {
                let path = self.persistence.directory.join(format!("{}.db", key));
                PersistenceMode::File(path.to_string_lossy().into_owned())
            }
        }
    }

    /// Directory holding the documents of one thesaurus type and
    /// distribution name.
    pub fn thesaurus_directory(&self, thesaurus_type: &str, dname: &str) -> PathBuf {
        self.catalog
            .root
            .join(thesaurus_type)
            .join("thesauri")
            .join(dname)
    }

    pub fn database_for(&self, fname: &str, thesaurus_type: &str, dname: &str) -> PersistenceMode {
        self.persistence_mode(&Thesaurus::build_key(fname, thesaurus_type, dname))
    }
}
