//! Concept operations over a thesaurus graph.
//!
//! A concept is not stored as a record; it is whatever the graph says about
//! its IRI: an `rdf:type skos:Concept` statement, language tagged
//! `skos:prefLabel` and `skos:scopeNote` literals and optionally a
//! `gml:BoundedBy` blank node carrying an envelope. Every operation here
//! first collects the statements it has to remove and insert into one
//! [`Changeset`] and then applies it, so a failing operation changes nothing.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::construct::{BlankNode, BoundingBox, Iri, Statement, Subject, Term};
use crate::error::Result;
use crate::store::{Changeset, Graph, StatementId};
use crate::vocab::{gml, rdf, skos};

/// What the graph knows about one concept.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Concept {
    pub uri: String,
    pub code: String,
    /// Preferred labels by language; untagged labels are kept under "".
    pub labels: BTreeMap<String, String>,
    pub notes: BTreeMap<String, String>,
    pub bbox: Option<BoundingBox>,
}

pub struct ConceptEditor<'g> {
    graph: &'g mut Graph,
}

impl<'g> ConceptEditor<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        Self { graph }
    }

    fn uri(&self, namespace: &str, code: &str) -> Iri {
        self.graph.factory().uri(namespace, code)
    }
    fn skos(&self, local_name: &str) -> Iri {
        self.graph.factory().uri(skos::NS, local_name)
    }
    fn gml(&self, local_name: &str) -> Iri {
        self.graph.factory().uri(gml::NS, local_name)
    }
    fn rdf_type(&self) -> Iri {
        self.graph.factory().uri(rdf::NS, rdf::TYPE)
    }

    fn concept_statements(
        &self,
        changeset: &mut Changeset,
        subject: &Iri,
        label: &str,
        note: &str,
        language: &str,
    ) {
        let factory = self.graph.factory();
        changeset
            .add(Statement::new(
                subject.clone(),
                self.rdf_type(),
                self.skos(skos::CONCEPT),
            ))
            .add(Statement::new(
                subject.clone(),
                self.skos(skos::PREF_LABEL),
                factory.literal(label, Some(language)),
            ))
            .add(Statement::new(
                subject.clone(),
                self.skos(skos::SCOPE_NOTE),
                factory.literal(note, Some(language)),
            ));
    }

    /// Adds a concept. No uniqueness check happens here: adding a code that
    /// is already in use layers more statements onto the same subject, so
    /// callers check [`ConceptEditor::is_free_code`] first.
    pub fn add_concept(
        &mut self,
        namespace: &str,
        code: &str,
        label: &str,
        note: &str,
        language: &str,
    ) -> Result<Iri> {
        let subject = self.uri(namespace, code);
        let mut changeset = Changeset::new();
        self.concept_statements(&mut changeset, &subject, label, note, language);
        self.graph.apply(changeset)?;
        info!(concept = %subject, "added concept");
        Ok(subject)
    }

    /// Adds a concept together with an envelope node holding its corners.
    pub fn add_concept_with_bbox(
        &mut self,
        namespace: &str,
        code: &str,
        label: &str,
        note: &str,
        bbox: &BoundingBox,
        language: &str,
    ) -> Result<Iri> {
        let subject = self.uri(namespace, code);
        let factory = *self.graph.factory();
        let envelope = factory.blank_node();
        let mut changeset = Changeset::new();
        self.concept_statements(&mut changeset, &subject, label, note, language);
        changeset
            .add(Statement::new(
                subject.clone(),
                self.gml(gml::BOUNDED_BY),
                envelope,
            ))
            .add(Statement::new(
                envelope,
                self.rdf_type(),
                self.gml(gml::ENVELOPE),
            ))
            .add(Statement::new(
                envelope,
                self.gml(gml::LOWER_CORNER),
                factory.literal(&bbox.lower_corner(), None),
            ))
            .add(Statement::new(
                envelope,
                self.gml(gml::UPPER_CORNER),
                factory.literal(&bbox.upper_corner(), None),
            ))
            .add(Statement::new(
                envelope,
                self.gml(gml::SRS_NAME),
                Iri::parse(gml::EPSG_4326),
            ));
        self.graph.apply(changeset)?;
        info!(concept = %subject, envelope = %envelope, "added concept with bounding box");
        Ok(subject)
    }

    /// Removes every statement about `subject` and the statements of blank
    /// nodes it points to. Statements elsewhere that point at `subject` stay.
    pub fn remove_concept(&mut self, subject: &Iri) -> Result<usize> {
        let subject = Subject::Iri(subject.clone());
        let mut changeset = Changeset::new();
        for (id, statement) in self.graph.matches(Some(&subject), None, None).with_ids() {
            debug!(%statement, "removing");
            if let Some(node) = statement.object().as_blank() {
                let owned = Subject::Blank(node);
                changeset.remove_all(self.graph.matches(Some(&owned), None, None).ids().to_vec());
            }
            changeset.remove(id);
        }
        let removed = changeset.removals().len() as usize;
        self.graph.apply(changeset)?;
        info!(concept = %subject, removed, "removed concept");
        Ok(removed)
    }

    pub fn remove_concept_code(&mut self, namespace: &str, code: &str) -> Result<usize> {
        let subject = self.uri(namespace, code);
        self.remove_concept(&subject)
    }

    // First statement of `subject` with `predicate` whose literal carries `language`.
    fn first_in_language(&self, subject: &Subject, predicate: &Iri, language: &str) -> Option<StatementId> {
        self.graph
            .matches(Some(subject), Some(predicate), None)
            .with_ids()
            .find(|(_, statement)| {
                statement
                    .object()
                    .as_literal()
                    .is_some_and(|literal| literal.has_language(language))
            })
            .map(|(id, _)| id)
    }

    fn label_and_note_changes(
        &self,
        changeset: &mut Changeset,
        subject: &Iri,
        label: &str,
        note: &str,
        language: &str,
    ) {
        let factory = self.graph.factory();
        let pattern = Subject::Iri(subject.clone());
        let pref_label = self.skos(skos::PREF_LABEL);
        let scope_note = self.skos(skos::SCOPE_NOTE);
        if let Some(id) = self.first_in_language(&pattern, &pref_label, language) {
            changeset.remove(id);
        }
        if let Some(id) = self.first_in_language(&pattern, &scope_note, language) {
            changeset.remove(id);
        }
        changeset
            .add(Statement::new(
                subject.clone(),
                pref_label,
                factory.literal(label, Some(language)),
            ))
            .add(Statement::new(
                subject.clone(),
                scope_note,
                factory.literal(note, Some(language)),
            ));
    }

    /// Replaces the label and note of one language, leaving other languages
    /// alone. Returns the concept IRI.
    pub fn update_label_and_note(
        &mut self,
        namespace: &str,
        code: &str,
        label: &str,
        note: &str,
        language: &str,
    ) -> Result<Iri> {
        let subject = self.uri(namespace, code);
        let mut changeset = Changeset::new();
        self.label_and_note_changes(&mut changeset, &subject, label, note, language);
        self.graph.apply(changeset)?;
        debug!(concept = %subject, language, "updated label and note");
        Ok(subject)
    }

    /// As [`ConceptEditor::update_label_and_note`], and also replaces the
    /// corners of the concept's envelope. A concept without an envelope does
    /// not get one; only the labels change then.
    pub fn update_label_note_and_bbox(
        &mut self,
        namespace: &str,
        code: &str,
        label: &str,
        note: &str,
        bbox: &BoundingBox,
        language: &str,
    ) -> Result<Iri> {
        let subject = self.uri(namespace, code);
        let mut changeset = Changeset::new();
        self.label_and_note_changes(&mut changeset, &subject, label, note, language);
        if let Some(envelope) = self.envelope(&subject) {
            let factory = *self.graph.factory();
            let node = Subject::Blank(envelope);
            let lower_corner = self.gml(gml::LOWER_CORNER);
            let upper_corner = self.gml(gml::UPPER_CORNER);
            // at most one corner pair is expected, so only the first of each goes
            let matches = self.graph.matches(Some(&node), Some(&lower_corner), None);
            if let Some(id) = matches.ids().first() {
                changeset.remove(*id);
            }
            let matches = self.graph.matches(Some(&node), Some(&upper_corner), None);
            if let Some(id) = matches.ids().first() {
                changeset.remove(*id);
            }
            changeset
                .add(Statement::new(
                    envelope,
                    lower_corner,
                    factory.literal(&bbox.lower_corner(), None),
                ))
                .add(Statement::new(
                    envelope,
                    upper_corner,
                    factory.literal(&bbox.upper_corner(), None),
                ));
        } else {
            debug!(concept = %subject, "no envelope, bounding box left unset");
        }
        self.graph.apply(changeset)?;
        debug!(concept = %subject, language, "updated label, note and bounding box");
        Ok(subject)
    }

    // The first blank node the concept is bounded by.
    fn envelope(&self, subject: &Iri) -> Option<BlankNode> {
        let bounded_by = self.gml(gml::BOUNDED_BY);
        self.graph
            .matches(Some(&Subject::Iri(subject.clone())), Some(&bounded_by), None)
            .find_map(|statement| statement.object().as_blank())
    }

    /// True when the IRI minted from `namespace` and `code` is neither a
    /// subject nor an object anywhere in the graph. This is a lookup, not a
    /// reservation.
    pub fn is_free_code(&self, namespace: &str, code: &str) -> bool {
        code_is_free(&*self.graph, namespace, code)
    }

    /// Substitutes the IRI of `old_code` by the one of `new_code` in every
    /// statement, in subject and object position alike.
    pub fn rename_code(&mut self, namespace: &str, old_code: &str, new_code: &str) -> Result<usize> {
        if old_code == new_code {
            return Ok(0);
        }
        let old = self.uri(namespace, old_code);
        let new = self.uri(namespace, new_code);
        let as_subject = Subject::Iri(old.clone());
        let as_object = Term::Iri(old.clone());
        let mut affected: Vec<(StatementId, Statement)> = self
            .graph
            .matches(Some(&as_subject), None, None)
            .with_ids()
            .collect();
        affected.extend(self.graph.matches(None, None, Some(&as_object)).with_ids());
        // a statement naming the code in both positions shows up twice
        affected.sort_by_key(|(id, _)| *id);
        affected.dedup_by_key(|(id, _)| *id);

        let mut changeset = Changeset::new();
        for (id, statement) in &affected {
            let subject = if *statement.subject() == as_subject {
                Subject::Iri(new.clone())
            } else {
                statement.subject().clone()
            };
            let object = if *statement.object() == as_object {
                Term::Iri(new.clone())
            } else {
                statement.object().clone()
            };
            changeset
                .remove(*id)
                .add(Statement::new(subject, statement.predicate().clone(), object));
        }
        self.graph.apply(changeset)?;
        info!(old = %old, new = %new, statements = affected.len(), "renamed code");
        Ok(affected.len())
    }

    /// Reads the concept back; `None` when the graph holds nothing about it.
    pub fn concept(&self, namespace: &str, code: &str) -> Result<Option<Concept>> {
        read_concept(&*self.graph, namespace, code)
    }
}

/// [`ConceptEditor::is_free_code`] without needing mutable access to the graph.
pub fn code_is_free(graph: &Graph, namespace: &str, code: &str) -> bool {
    let uri = graph.factory().uri(namespace, code);
    let as_subject = Subject::Iri(uri.clone());
    let as_object = Term::Iri(uri);
    !graph.contains(Some(&as_subject), None, None) && !graph.contains(None, None, Some(&as_object))
}

/// Reads a concept without needing mutable access to the graph.
pub fn read_concept(graph: &Graph, namespace: &str, code: &str) -> Result<Option<Concept>> {
    let factory = graph.factory();
    let uri = factory.uri(namespace, code);
    let subject = Subject::Iri(uri.clone());
    let statements: Vec<Statement> = graph.matches(Some(&subject), None, None).collect();
    if statements.is_empty() {
        return Ok(None);
    }
    let pref_label = factory.uri(skos::NS, skos::PREF_LABEL);
    let scope_note = factory.uri(skos::NS, skos::SCOPE_NOTE);
    let bounded_by = factory.uri(gml::NS, gml::BOUNDED_BY);
    let mut concept = Concept {
        uri: uri.as_string(),
        code: code.to_string(),
        labels: BTreeMap::new(),
        notes: BTreeMap::new(),
        bbox: None,
    };
    let mut envelope = None;
    for statement in &statements {
        let predicate = statement.predicate();
        if let Some(literal) = statement.object().as_literal() {
            let language = literal.language().unwrap_or("").to_string();
            if *predicate == pref_label {
                concept.labels.entry(language).or_insert_with(|| literal.value().to_string());
            } else if *predicate == scope_note {
                concept.notes.entry(language).or_insert_with(|| literal.value().to_string());
            }
        } else if *predicate == bounded_by && envelope.is_none() {
            envelope = statement.object().as_blank();
        }
    }
    if let Some(envelope) = envelope {
        let node = Subject::Blank(envelope);
        let corner = |local_name: &str| {
            let predicate = factory.uri(gml::NS, local_name);
            graph
                .matches(Some(&node), Some(&predicate), None)
                .find_map(|statement| statement.object().as_literal().map(|l| l.value().to_string()))
        };
        if let (Some(lower), Some(upper)) = (corner(gml::LOWER_CORNER), corner(gml::UPPER_CORNER)) {
            concept.bbox = Some(BoundingBox::from_corners(&lower, &upper)?);
        }
    }
    Ok(Some(concept))
}
