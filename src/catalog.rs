//! Every thesaurus found below the configured root, by key.
//!
//! Documents live at `<root>/<type>/thesauri/<dname>/<fname>.rdf`. Each
//! thesaurus sits behind its own mutex, which is how mutation gets
//! serialized per key; different thesauri never contend.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::error::{Result, SkosError};
use crate::settings::{Settings, StorageMode};
use crate::thesaurus::Thesaurus;

const DOCUMENT_EXTENSION: &str = "rdf";

pub type SharedThesaurus = Arc<Mutex<Thesaurus>>;

#[derive(Default)]
pub struct Catalog {
    thesauri: BTreeMap<String, SharedThesaurus>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens every thesaurus document below the configured root. A document
    /// that fails to load is logged and left out.
    pub fn open(settings: &Settings) -> Result<Self> {
        if settings.persistence.mode == StorageMode::File {
            fs::create_dir_all(&settings.persistence.directory)?;
        }
        let mut catalog = Self::new();
        for thesaurus_type in &settings.catalog.types {
            let type_directory = settings.catalog.root.join(thesaurus_type).join("thesauri");
            for dname in subdirectories(&type_directory)? {
                let directory = settings.thesaurus_directory(thesaurus_type, &dname);
                for fname in documents(&directory)? {
                    let mode = settings.database_for(&fname, thesaurus_type, &dname);
                    match Thesaurus::open(&fname, thesaurus_type, &dname, directory.join(&fname), &mode) {
                        Ok(thesaurus) => catalog.insert(thesaurus),
                        Err(e) => warn!(
                            fname = fname.as_str(),
                            dname = dname.as_str(),
                            thesaurus_type = thesaurus_type.as_str(),
                            error = %e,
                            "skipping thesaurus"
                        ),
                    }
                }
            }
        }
        info!(thesauri = catalog.len(), root = %settings.catalog.root.display(), "catalog opened");
        Ok(catalog)
    }

    pub fn insert(&mut self, thesaurus: Thesaurus) {
        self.thesauri
            .insert(thesaurus.key(), Arc::new(Mutex::new(thesaurus)));
    }

    pub fn get(&self, key: &str) -> Result<SharedThesaurus> {
        self.thesauri
            .get(key)
            .cloned()
            .ok_or_else(|| SkosError::UnknownThesaurus(key.to_string()))
    }

    pub fn keys(&self) -> Vec<String> {
        self.thesauri.keys().cloned().collect()
    }
    pub fn len(&self) -> usize {
        self.thesauri.len()
    }
    pub fn is_empty(&self) -> bool {
        self.thesauri.is_empty()
    }
}

// A missing directory holds nothing.
fn subdirectories(directory: &Path) -> Result<Vec<String>> {
    if !directory.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn documents(directory: &Path) -> Result<Vec<String>> {
    if !directory.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        let is_document = path.is_file()
            && path
                .extension()
                .is_some_and(|extension| extension.eq_ignore_ascii_case(DOCUMENT_EXTENSION));
        if let (true, Some(name)) = (is_document, path.file_name()) {
            names.push(name.to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}
