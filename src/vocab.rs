//! Vocabulary namespaces and terms used by thesaurus graphs.
//!
//! Constants are organized by vocabulary, each module carrying its namespace
//! (`NS`) and the local names this crate reads or writes.

/// RDF vocabulary constants
pub mod rdf {
    pub const NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    pub const PREFIX: &str = "rdf";

    pub const TYPE: &str = "type";

    // syntax names only meaningful inside RDF/XML documents
    pub const RDF: &str = "RDF";
    pub const DESCRIPTION: &str = "Description";
    pub const ABOUT: &str = "about";
    pub const ID: &str = "ID";
    pub const NODE_ID: &str = "nodeID";
    pub const RESOURCE: &str = "resource";
    pub const DATATYPE: &str = "datatype";
    pub const PARSE_TYPE: &str = "parseType";
}

/// SKOS core vocabulary constants
pub mod skos {
    pub const NS: &str = "http://www.w3.org/2004/02/skos/core#";
    pub const PREFIX: &str = "skos";

    pub const CONCEPT: &str = "Concept";
    pub const CONCEPT_SCHEME: &str = "ConceptScheme";
    pub const PREF_LABEL: &str = "prefLabel";
    pub const SCOPE_NOTE: &str = "scopeNote";
}

/// GML vocabulary constants, as used by thesaurus bounding boxes
pub mod gml {
    pub const NS: &str = "http://www.opengis.net/gml#";
    pub const PREFIX: &str = "gml";

    /// Capitalized in the thesaurus documents this crate reads.
    pub const BOUNDED_BY: &str = "BoundedBy";
    pub const ENVELOPE: &str = "Envelope";
    pub const LOWER_CORNER: &str = "lowerCorner";
    pub const UPPER_CORNER: &str = "upperCorner";
    pub const SRS_NAME: &str = "srsName";

    /// Spatial reference system of every envelope written by this crate.
    pub const EPSG_4326: &str = "http://www.opengis.net/gml/srs/epsg.xml#epsg:4326";
}

/// Dublin Core elements
pub mod dc {
    pub const NS: &str = "http://purl.org/dc/elements/1.1/";
    pub const PREFIX: &str = "dc";

    pub const TITLE: &str = "title";
}

/// Dublin Core terms
pub mod dcterms {
    pub const NS: &str = "http://purl.org/dc/terms/";
    pub const PREFIX: &str = "dcterms";

    pub const ISSUED: &str = "issued";
    pub const MODIFIED: &str = "modified";
}

/// XML namespace, bound implicitly to the `xml` prefix
pub mod xml {
    pub const NS: &str = "http://www.w3.org/XML/1998/namespace";

    pub const LANG: &str = "lang";
    pub const BASE: &str = "base";
}

/// Prefixes known without declaration, in the order they are written out.
pub const WELL_KNOWN_PREFIXES: [(&str, &str); 5] = [
    (rdf::PREFIX, rdf::NS),
    (skos::PREFIX, skos::NS),
    (gml::PREFIX, gml::NS),
    (dc::PREFIX, dc::NS),
    (dcterms::PREFIX, dcterms::NS),
];
