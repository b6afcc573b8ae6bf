//! A thesaurus: one source document, one graph and the metadata read from
//! the document when the thesaurus was opened.
//!
//! Every mutation goes through [`ConceptEditor`]; the methods here only
//! delegate. Nothing in a [`Thesaurus`] locks, callers serialize mutation
//! per thesaurus (the [`crate::catalog::Catalog`] hands out one mutex per key).

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::concept::{Concept, ConceptEditor, code_is_free, read_concept};
use crate::construct::{BoundingBox, Iri};
use crate::error::Result;
use crate::metadata::ThesaurusInfo;
use crate::persist::PersistenceMode;
use crate::query::{Engine, QueryResultsTable};
use crate::rdfxml;
use crate::store::Graph;

pub struct Thesaurus {
    fname: String,
    thesaurus_type: String,
    dname: String,
    file: PathBuf,
    info: ThesaurusInfo,
    graph: Graph,
}

impl Thesaurus {
    /// Opens the thesaurus backed by `file`. Metadata problems never fail
    /// the open; the title then defaults to the thesaurus type. A graph
    /// that already holds statements (a restored file backing) is used as
    /// is, otherwise the document is loaded into it.
    pub fn open(
        fname: &str,
        thesaurus_type: &str,
        dname: &str,
        file: impl Into<PathBuf>,
        mode: &PersistenceMode,
    ) -> Result<Self> {
        let file = file.into();
        let info = ThesaurusInfo::retrieve(&file, thesaurus_type);
        let mut graph = Graph::new(mode)?;
        if graph.is_empty() && file.exists() {
            let statements = rdfxml::load_file(&file)?;
            graph.extend(statements)?;
        }
        let thesaurus = Self {
            fname: fname.to_string(),
            thesaurus_type: thesaurus_type.to_string(),
            dname: dname.to_string(),
            file,
            info,
            graph,
        };
        info!(
            key = %thesaurus.key(),
            title = thesaurus.title(),
            statements = thesaurus.graph.len(),
            "opened thesaurus"
        );
        Ok(thesaurus)
    }

    /// `type.dname.stem`, where the stem is `fname` without its extension.
    pub fn build_key(fname: &str, thesaurus_type: &str, dname: &str) -> String {
        let stem = Path::new(fname)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(fname);
        format!("{}.{}.{}", thesaurus_type, dname, stem)
    }

    pub fn key(&self) -> String {
        Self::build_key(&self.fname, &self.thesaurus_type, &self.dname)
    }
    pub fn fname(&self) -> &str {
        &self.fname
    }
    pub fn thesaurus_type(&self) -> &str {
        &self.thesaurus_type
    }
    pub fn dname(&self) -> &str {
        &self.dname
    }
    pub fn file(&self) -> &Path {
        &self.file
    }
    pub fn title(&self) -> &str {
        self.info.title()
    }
    pub fn date(&self) -> Option<NaiveDate> {
        self.info.date()
    }
    /// The date as `yyyy-MM-dd`.
    pub fn date_string(&self) -> Option<String> {
        self.info.date().map(|date| date.format("%Y-%m-%d").to_string())
    }
    pub fn graph(&self) -> &Graph {
        &self.graph
    }
    pub fn editor(&mut self) -> ConceptEditor<'_> {
        ConceptEditor::new(&mut self.graph)
    }

    pub fn perform_request(&self, query: &str) -> Result<QueryResultsTable> {
        Engine::new(&self.graph).execute(query)
    }

    /// Writes the graph back to the source document, through a temporary
    /// file next to it.
    pub fn save(&self) -> Result<()> {
        let mut temporary = self.file.clone().into_os_string();
        temporary.push(".tmp");
        let temporary = PathBuf::from(temporary);
        {
            let mut out = BufWriter::new(File::create(&temporary)?);
            rdfxml::write_graph(&self.graph, &mut out)?;
            out.flush()?;
        }
        fs::rename(&temporary, &self.file)?;
        debug!(key = %self.key(), file = %self.file.display(), "saved thesaurus");
        Ok(())
    }

    // ------------- Concept operations -------------
    pub fn add_concept(
        &mut self,
        namespace: &str,
        code: &str,
        label: &str,
        note: &str,
        language: &str,
    ) -> Result<Iri> {
        self.editor()
            .add_concept(namespace, code, label, note, language)
    }

    pub fn add_concept_with_bbox(
        &mut self,
        namespace: &str,
        code: &str,
        label: &str,
        note: &str,
        bbox: &BoundingBox,
        language: &str,
    ) -> Result<Iri> {
        self.editor()
            .add_concept_with_bbox(namespace, code, label, note, bbox, language)
    }

    pub fn remove_concept(&mut self, subject: &Iri) -> Result<usize> {
        self.editor().remove_concept(subject)
    }

    pub fn remove_concept_code(&mut self, namespace: &str, code: &str) -> Result<usize> {
        self.editor().remove_concept_code(namespace, code)
    }

    pub fn update_label_and_note(
        &mut self,
        namespace: &str,
        code: &str,
        label: &str,
        note: &str,
        language: &str,
    ) -> Result<Iri> {
        self.editor()
            .update_label_and_note(namespace, code, label, note, language)
    }

    pub fn update_label_note_and_bbox(
        &mut self,
        namespace: &str,
        code: &str,
        label: &str,
        note: &str,
        bbox: &BoundingBox,
        language: &str,
    ) -> Result<Iri> {
        self.editor()
            .update_label_note_and_bbox(namespace, code, label, note, bbox, language)
    }

    pub fn is_free_code(&self, namespace: &str, code: &str) -> bool {
        code_is_free(&self.graph, namespace, code)
    }

    pub fn rename_code(&mut self, namespace: &str, old_code: &str, new_code: &str) -> Result<usize> {
        self.editor().rename_code(namespace, old_code, new_code)
    }

    pub fn concept(&self, namespace: &str, code: &str) -> Result<Option<Concept>> {
        read_concept(&self.graph, namespace, code)
    }
}
