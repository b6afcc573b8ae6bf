//! Skoskeeper – keeper of SKOS thesaurus graphs.
//!
//! A thesaurus is a controlled vocabulary: concepts identified by a namespace
//! and a code, carrying a preferred label and a scope note per language and
//! optionally a bounding box. Concepts are not stored as records; they are
//! derived from the statements of a graph:
//! * `(concept, rdf:type, skos:Concept)`
//! * `(concept, skos:prefLabel, "label"@lang)` and `(concept, skos:scopeNote, "note"@lang)`
//! * `(concept, gml:BoundedBy, _:envelope)`, the envelope carrying
//!   `gml:lowerCorner "west south"`, `gml:upperCorner "east north"` and its
//!   `gml:srsName`.
//!
//! ## Modules
//! * [`construct`] – IRIs, blank nodes, literals, statements and the [`construct::ValueFactory`].
//! * [`store`] – The [`store::Graph`], a multiset of statements with keeper and lookup indexes.
//! * [`persist`] – Optional SQLite backing of a graph.
//! * [`rdfxml`] – Loading RDF/XML documents into statements and writing graphs back.
//! * [`metadata`] – Title and date of a thesaurus, with date format fallback.
//! * [`concept`] – The concept operations: add, update, remove, rename, free code check.
//! * [`query`] – A small query language returning a [`query::QueryResultsTable`].
//! * [`thesaurus`] – A document, its graph and its metadata under one key.
//! * [`catalog`] – Every thesaurus found below a root directory.
//! * [`settings`] – Layered configuration.
//! * [`server`] – HTTP routes over a catalog.
//!
//! ## Atomicity
//! Every concept operation computes a [`store::Changeset`] first and applies
//! it in one step. With a file backing the changeset is written in a single
//! SQLite transaction before memory is touched, so a failed write leaves the
//! graph as it was.
//!
//! ## Quick Start
//! ```
//! use skoskeeper::store::Graph;
//! use skoskeeper::concept::ConceptEditor;
//! let mut graph = Graph::in_memory();
//! let mut editor = ConceptEditor::new(&mut graph);
//! let ns = "http://example.org/regions#";
//! assert!(editor.is_free_code(ns, "k1"));
//! editor.add_concept(ns, "k1", "Lake", "A body of water", "en").unwrap();
//! assert!(!editor.is_free_code(ns, "k1"));
//! assert_eq!(graph.len(), 3);
//! ```

pub mod catalog;
pub mod concept;
pub mod construct;
pub mod error;
pub mod metadata;
pub mod persist;
pub mod query;
pub mod rdfxml;
pub mod server;
pub mod settings;
pub mod store;
pub mod thesaurus;
pub mod vocab;

pub use error::{Result, SkosError};
