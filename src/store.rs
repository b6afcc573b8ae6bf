//! The triple store behind every thesaurus.
//!
//! A [`Graph`] keeps statements in the same manner the rest of this crate
//! keeps things: terms are owned once by a [`TermKeeper`] that hands out
//! identities, statements are triples of those identities, and lookups from
//! subject, predicate and object identities to statement identities act as
//! indexes. The lookups hold roaring bitmaps, so a pattern with several bound
//! positions is answered by intersecting them.
//!
//! The graph is a multiset: adding the same statement twice yields two
//! statements with different identities. Mutation happens through
//! [`Changeset`]s, which are applied in one step, so no caller ever mutates
//! the graph while iterating over it; [`Matches`] are materialized up front.

// used to keep the one-to-one mapping between terms and their assigned identities
use bimap::BiMap;

use core::hash::BuildHasherDefault;
use std::collections::HashMap;
use std::hash::Hash;
use seahash::SeaHasher;

// used for sets of statement identities
use roaring::RoaringTreemap;

use tracing::debug;

use crate::construct::{Iri, Statement, Subject, Term, ValueFactory};
use crate::error::Result;
use crate::persist::{PersistenceMode, Persistor};

pub type TermId = u64;
pub type StatementId = u64;

pub type IdHasher = BuildHasherDefault<SeaHasher>;

const GENESIS: u64 = 0;

// ------------- Identities -------------
#[derive(Clone, Copy, Debug)]
pub struct IdGenerator {
    lower_bound: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { lower_bound: GENESIS }
    }
    // The retain function is necessary when restoring a persisted graph,
    // so that new identities never collide with restored ones.
    pub fn retain(&mut self, id: u64) {
        if id > self.lower_bound {
            self.lower_bound = id;
        }
    }
    pub fn generate(&mut self) -> u64 {
        self.lower_bound += 1;
        self.lower_bound
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- Triple -------------
/// A statement in identity form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Triple {
    pub subject: TermId,
    pub predicate: TermId,
    pub object: TermId,
}

// ------------- TermKeeper -------------
/// Owns the terms of the graph. A term is forgotten once the last statement
/// mentioning it is removed; its identity is not handed out again while the
/// graph lives.
#[derive(Debug, Default)]
pub struct TermKeeper {
    kept: BiMap<Term, TermId>,
    generator: IdGenerator,
}

impl TermKeeper {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn keep(&mut self, id: TermId, term: Term) {
        self.generator.retain(id);
        self.kept.insert(term, id);
    }
    pub fn identity(&self, term: &Term) -> Option<TermId> {
        self.kept.get_by_left(term).copied()
    }
    pub fn term(&self, id: TermId) -> Option<&Term> {
        self.kept.get_by_right(&id)
    }
    pub fn forget(&mut self, id: TermId) -> Option<Term> {
        self.kept.remove_by_right(&id).map(|(term, _)| term)
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

// ------------- Lookups -------------
#[derive(Debug)]
pub struct Lookup<K> {
    index: HashMap<K, RoaringTreemap, IdHasher>,
}

impl<K: Eq + Hash> Lookup<K> {
    pub fn new() -> Self {
        Self {
            index: HashMap::default(),
        }
    }
    pub fn insert(&mut self, key: K, id: StatementId) {
        self.index.entry(key).or_default().insert(id);
    }
    pub fn remove(&mut self, key: &K, id: StatementId) {
        if let Some(ids) = self.index.get_mut(key) {
            ids.remove(id);
            if ids.is_empty() {
                self.index.remove(key);
            }
        }
    }
    pub fn lookup(&self, key: &K) -> Option<&RoaringTreemap> {
        self.index.get(key)
    }
}

impl<K: Eq + Hash> Default for Lookup<K> {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- Changeset -------------
/// Removals and insertions that are applied together.
#[derive(Debug, Default, Clone)]
pub struct Changeset {
    removals: RoaringTreemap,
    additions: Vec<Statement>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn remove(&mut self, id: StatementId) -> &mut Self {
        self.removals.insert(id);
        self
    }
    pub fn remove_all(&mut self, ids: impl IntoIterator<Item = StatementId>) -> &mut Self {
        self.removals.extend(ids);
        self
    }
    pub fn add(&mut self, statement: Statement) -> &mut Self {
        self.additions.push(statement);
        self
    }
    pub fn removals(&self) -> &RoaringTreemap {
        &self.removals
    }
    pub fn additions(&self) -> &[Statement] {
        &self.additions
    }
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.additions.is_empty()
    }
}

// ------------- Matches -------------
/// Statements matching a pattern, in ascending identity order.
///
/// The identities are collected when the pattern is evaluated; statements
/// are resolved lazily as the iterator advances. Cloning or calling
/// [`Matches::rewind`] restarts the sequence.
#[derive(Clone)]
pub struct Matches<'g> {
    graph: &'g Graph,
    ids: Vec<StatementId>,
    position: usize,
}

impl<'g> Matches<'g> {
    pub fn ids(&self) -> &[StatementId] {
        &self.ids
    }
    pub fn rewind(&mut self) {
        self.position = 0;
    }
    pub fn len(&self) -> usize {
        self.ids.len()
    }
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
    /// Pairs every remaining statement with its identity.
    pub fn with_ids(self) -> impl Iterator<Item = (StatementId, Statement)> + 'g {
        let graph = self.graph;
        self.ids
            .into_iter()
            .skip(self.position)
            .filter_map(move |id| graph.statement(id).map(|statement| (id, statement)))
    }
}

impl Iterator for Matches<'_> {
    type Item = Statement;
    fn next(&mut self) -> Option<Statement> {
        while let Some(id) = self.ids.get(self.position) {
            self.position += 1;
            if let Some(statement) = self.graph.statement(*id) {
                return Some(statement);
            }
        }
        None
    }
}

// ------------- Graph -------------
pub struct Graph {
    factory: ValueFactory,
    terms: TermKeeper,
    statements: HashMap<StatementId, Triple, IdHasher>,
    statement_generator: IdGenerator,
    // owns lookups between identities (similar to database indexes)
    subject_lookup: Lookup<TermId>,
    predicate_lookup: Lookup<TermId>,
    object_lookup: Lookup<TermId>,
    everything: RoaringTreemap,
    // responsible for the optional persistence layer
    persistor: Option<Persistor>,
}

impl Graph {
    pub fn in_memory() -> Self {
        Self {
            factory: ValueFactory::new(),
            terms: TermKeeper::new(),
            statements: HashMap::default(),
            statement_generator: IdGenerator::new(),
            subject_lookup: Lookup::new(),
            predicate_lookup: Lookup::new(),
            object_lookup: Lookup::new(),
            everything: RoaringTreemap::new(),
            persistor: None,
        }
    }

    pub fn new(mode: &PersistenceMode) -> Result<Self> {
        match mode {
            PersistenceMode::InMemory => Ok(Self::in_memory()),
            PersistenceMode::File(path) => Self::with_persistor(Persistor::open(path)?),
        }
    }

    /// Restores whatever the persistor already holds.
    pub fn with_persistor(persistor: Persistor) -> Result<Self> {
        let mut graph = Self::in_memory();
        let restored = persistor.restore(&graph.factory)?;
        for (id, term) in restored.terms {
            graph.terms.keep(id, term);
        }
        for (id, triple) in restored.statements {
            graph.statement_generator.retain(id);
            graph.insert_triple(id, triple);
        }
        debug!(
            terms = graph.terms.len(),
            statements = graph.statements.len(),
            "restored graph"
        );
        graph.persistor = Some(persistor);
        Ok(graph)
    }

    pub fn factory(&self) -> &ValueFactory {
        &self.factory
    }
    pub fn persistor(&self) -> Option<&Persistor> {
        self.persistor.as_ref()
    }
    pub fn is_persistent(&self) -> bool {
        self.persistor.is_some()
    }
    pub fn len(&self) -> usize {
        self.statements.len()
    }
    /// Number of distinct terms mentioned by the statements.
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statement(&self, id: StatementId) -> Option<Statement> {
        let triple = self.statements.get(&id)?;
        let subject = self.terms.term(triple.subject)?.to_subject()?;
        let predicate = self.terms.term(triple.predicate)?.as_iri()?.clone();
        let object = self.terms.term(triple.object)?.clone();
        Some(Statement::new(subject, predicate, object))
    }

    /// Statements matching the pattern; an absent position is a wildcard.
    pub fn matches(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> Matches<'_> {
        Matches {
            graph: self,
            ids: self.matching_ids(subject, predicate, object).iter().collect(),
            position: 0,
        }
    }

    pub fn contains(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> bool {
        !self.matching_ids(subject, predicate, object).is_empty()
    }

    /// Adds a statement unconditionally, duplicates included.
    pub fn add(&mut self, statement: Statement) -> Result<StatementId> {
        let mut changeset = Changeset::new();
        changeset.add(statement);
        let added = self.apply(changeset)?;
        Ok(added.first().copied().unwrap_or(GENESIS))
    }

    pub fn extend(&mut self, statements: impl IntoIterator<Item = Statement>) -> Result<usize> {
        let mut changeset = Changeset::new();
        for statement in statements {
            changeset.add(statement);
        }
        Ok(self.apply(changeset)?.len())
    }

    /// Removes every statement matching the pattern and returns how many
    /// went away. Matching nothing is not an error.
    pub fn remove(
        &mut self,
        subject: Option<&Subject>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> Result<usize> {
        let ids = self.matching_ids(subject, predicate, object);
        let count = ids.len() as usize;
        if count > 0 {
            let mut changeset = Changeset::new();
            changeset.remove_all(ids);
            self.apply(changeset)?;
        }
        Ok(count)
    }

    /// Applies removals and insertions as one unit and returns the identities
    /// of the inserted statements. When persistence fails the graph is left
    /// exactly as it was.
    pub fn apply(&mut self, changeset: Changeset) -> Result<Vec<StatementId>> {
        let Changeset { removals, additions } = changeset;
        let removals: RoaringTreemap = removals
            .iter()
            .filter(|id| self.statements.contains_key(id))
            .collect();

        // plan identities without touching the keepers
        let mut term_generator = self.terms.generator;
        let mut statement_generator = self.statement_generator;
        let mut pending: HashMap<Term, TermId> = HashMap::new();
        let mut new_terms: Vec<(TermId, Term)> = Vec::new();
        let mut added: Vec<(StatementId, Triple)> = Vec::with_capacity(additions.len());
        for statement in additions {
            let mut identify = |term: Term| -> TermId {
                if let Some(id) = self.terms.identity(&term) {
                    return id;
                }
                *pending.entry(term.clone()).or_insert_with(|| {
                    let id = term_generator.generate();
                    new_terms.push((id, term));
                    id
                })
            };
            let triple = Triple {
                subject: identify(statement.subject().to_term()),
                predicate: identify(Term::Iri(statement.predicate().clone())),
                object: identify(statement.object().clone()),
            };
            added.push((statement_generator.generate(), triple));
        }

        let reclaimed = self.unreferenced_after(&removals, &added);

        if let Some(persistor) = self.persistor.as_mut() {
            persistor.persist(&new_terms, &removals, &added, &reclaimed)?;
        }

        // nothing below can fail
        self.terms.generator = term_generator;
        self.statement_generator = statement_generator;
        for (id, term) in new_terms {
            self.terms.keep(id, term);
        }
        for id in removals.iter() {
            self.remove_triple(id);
        }
        for (id, triple) in &added {
            self.insert_triple(*id, *triple);
        }
        for id in &reclaimed {
            self.terms.forget(*id);
        }
        debug!(
            removed = removals.len(),
            added = added.len(),
            reclaimed = reclaimed.len(),
            statements = self.statements.len(),
            "applied changeset"
        );
        Ok(added.into_iter().map(|(id, _)| id).collect())
    }

    // Terms of removed statements that no remaining or added statement mentions.
    fn unreferenced_after(&self, removals: &RoaringTreemap, added: &[(StatementId, Triple)]) -> Vec<TermId> {
        let mut candidates: Vec<TermId> = removals
            .iter()
            .filter_map(|id| self.statements.get(&id))
            .flat_map(|triple| [triple.subject, triple.predicate, triple.object])
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        candidates.retain(|term| {
            let still_used = [&self.subject_lookup, &self.predicate_lookup, &self.object_lookup]
                .iter()
                .filter_map(|lookup| lookup.lookup(term))
                .any(|ids| !ids.is_subset(removals));
            let reused = added.iter().any(|(_, triple)| {
                triple.subject == *term || triple.predicate == *term || triple.object == *term
            });
            !still_used && !reused
        });
        candidates
    }

    fn matching_ids(
        &self,
        subject: Option<&Subject>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> RoaringTreemap {
        let mut bounds: Vec<&RoaringTreemap> = Vec::with_capacity(3);
        let positions = [
            (subject.map(Subject::to_term), &self.subject_lookup),
            (predicate.map(|iri| Term::Iri(iri.clone())), &self.predicate_lookup),
            (object.cloned(), &self.object_lookup),
        ];
        for (term, lookup) in positions {
            if let Some(term) = term {
                match self.terms.identity(&term).and_then(|id| lookup.lookup(&id)) {
                    Some(ids) => bounds.push(ids),
                    None => return RoaringTreemap::new(),
                }
            }
        }
        bounds.sort_by_key(|ids| ids.len());
        match bounds.split_first() {
            None => self.everything.clone(),
            Some((smallest, rest)) => {
                let mut ids = (*smallest).clone();
                for other in rest {
                    ids &= *other;
                }
                ids
            }
        }
    }

    fn insert_triple(&mut self, id: StatementId, triple: Triple) {
        self.subject_lookup.insert(triple.subject, id);
        self.predicate_lookup.insert(triple.predicate, id);
        self.object_lookup.insert(triple.object, id);
        self.everything.insert(id);
        self.statements.insert(id, triple);
    }

    fn remove_triple(&mut self, id: StatementId) {
        if let Some(triple) = self.statements.remove(&id) {
            self.subject_lookup.remove(&triple.subject, id);
            self.predicate_lookup.remove(&triple.predicate, id);
            self.object_lookup.remove(&triple.object, id);
            self.everything.remove(id);
        }
    }
}
