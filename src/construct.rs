use std::sync::Arc;
use std::sync::atomic::{self, AtomicU64};

// identity of an Iri is its full text
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

// used to print out readable forms of a construct
use std::fmt;

// used when parsing corner coordinates
use std::str::FromStr;

use crate::error::{Result, SkosError};

// ------------- Iri -------------
/// An identifier, kept as its full text together with the position where
/// the local name starts.
///
/// Equality, hashing and ordering only look at the full text, so an IRI
/// minted from `("http://example.org/codes/", "water/lake")` equals the one
/// [`Iri::parse`] reads back, even though parsing splits it after the last
/// `#`, `/` or `:`. The split only matters when an IRI is written with a
/// prefix.
#[derive(Clone, Debug)]
pub struct Iri {
    iri: Arc<str>,
    local_start: usize,
}

impl Iri {
    pub fn new(namespace: &str, local_name: &str) -> Self {
        Self {
            iri: Arc::from(format!("{}{}", namespace, local_name)),
            local_start: namespace.len(),
        }
    }
    pub fn parse(iri: &str) -> Self {
        let local_start = iri
            .rfind('#')
            .or_else(|| iri.rfind('/'))
            .or_else(|| iri.rfind(':'))
            .map(|position| position + 1)
            .unwrap_or(0);
        Self {
            iri: Arc::from(iri),
            local_start,
        }
    }
    pub fn namespace(&self) -> &str {
        &self.iri[..self.local_start]
    }
    pub fn local_name(&self) -> &str {
        &self.iri[self.local_start..]
    }
    pub fn as_str(&self) -> &str {
        &self.iri
    }
    pub fn as_string(&self) -> String {
        self.iri.to_string()
    }
}
impl PartialEq for Iri {
    fn eq(&self, other: &Self) -> bool {
        self.iri == other.iri
    }
}
impl Eq for Iri {}
impl Hash for Iri {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.iri.hash(state);
    }
}
impl Ord for Iri {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iri.cmp(&other.iri)
    }
}
impl PartialOrd for Iri {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.iri)
    }
}

// ------------- BlankNode -------------
/// An anonymous node. Only the [`ValueFactory`] creates them, so every blank
/// node in the process is distinct from every other one.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlankNode(u64);

impl BlankNode {
    pub fn id(&self) -> u64 {
        self.0
    }
    pub fn label(&self) -> String {
        format!("b{}", self.0)
    }
}
impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "_:b{}", self.0)
    }
}

// ------------- Literal -------------
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Literal {
    value: Arc<str>,
    language: Option<Arc<str>>,
}

impl Literal {
    pub fn value(&self) -> &str {
        &self.value
    }
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
    /// True when the literal is tagged with exactly this language. Untagged
    /// literals never match.
    pub fn has_language(&self, language: &str) -> bool {
        self.language.as_deref() == Some(language)
    }
}
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"{}\"", self.value.replace('\\', "\\\\").replace('"', "\\\""))?;
        if let Some(language) = &self.language {
            write!(f, "@{}", language)?;
        }
        Ok(())
    }
}

// ------------- Term -------------
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Term {
    Iri(Iri),
    Blank(BlankNode),
    Literal(Literal),
}

impl Term {
    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }
    pub fn as_blank(&self) -> Option<BlankNode> {
        match self {
            Term::Blank(node) => Some(*node),
            _ => None,
        }
    }
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(literal) => Some(literal),
            _ => None,
        }
    }
    /// Literals cannot be subjects.
    pub fn to_subject(&self) -> Option<Subject> {
        match self {
            Term::Iri(iri) => Some(Subject::Iri(iri.clone())),
            Term::Blank(node) => Some(Subject::Blank(*node)),
            Term::Literal(_) => None,
        }
    }
    /// The plain lexical form: IRI text, blank node label or literal value.
    pub fn lexical(&self) -> String {
        match self {
            Term::Iri(iri) => iri.as_string(),
            Term::Blank(node) => node.label(),
            Term::Literal(literal) => literal.value().to_string(),
        }
    }
}
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::Blank(node) => write!(f, "{}", node),
            Term::Literal(literal) => write!(f, "{}", literal),
        }
    }
}
impl From<Iri> for Term {
    fn from(iri: Iri) -> Self {
        Term::Iri(iri)
    }
}
impl From<BlankNode> for Term {
    fn from(node: BlankNode) -> Self {
        Term::Blank(node)
    }
}
impl From<Literal> for Term {
    fn from(literal: Literal) -> Self {
        Term::Literal(literal)
    }
}

// ------------- Subject -------------
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Subject {
    Iri(Iri),
    Blank(BlankNode),
}

impl Subject {
    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Subject::Iri(iri) => Some(iri),
            Subject::Blank(_) => None,
        }
    }
    pub fn as_blank(&self) -> Option<BlankNode> {
        match self {
            Subject::Blank(node) => Some(*node),
            Subject::Iri(_) => None,
        }
    }
    pub fn to_term(&self) -> Term {
        match self {
            Subject::Iri(iri) => Term::Iri(iri.clone()),
            Subject::Blank(node) => Term::Blank(*node),
        }
    }
}
impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Subject::Iri(iri) => write!(f, "<{}>", iri),
            Subject::Blank(node) => write!(f, "{}", node),
        }
    }
}
impl From<Iri> for Subject {
    fn from(iri: Iri) -> Self {
        Subject::Iri(iri)
    }
}
impl From<BlankNode> for Subject {
    fn from(node: BlankNode) -> Self {
        Subject::Blank(node)
    }
}
impl From<Subject> for Term {
    fn from(subject: Subject) -> Self {
        match subject {
            Subject::Iri(iri) => Term::Iri(iri),
            Subject::Blank(node) => Term::Blank(node),
        }
    }
}

// ------------- Statement -------------
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Statement {
    subject: Subject,
    predicate: Iri,
    object: Term,
}

impl Statement {
    pub fn new(subject: impl Into<Subject>, predicate: Iri, object: impl Into<Term>) -> Self {
        Self {
            subject: subject.into(),
            predicate,
            object: object.into(),
        }
    }
    pub fn subject(&self) -> &Subject {
        &self.subject
    }
    pub fn predicate(&self) -> &Iri {
        &self.predicate
    }
    pub fn object(&self) -> &Term {
        &self.object
    }
}
impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} <{}> {} .", self.subject, self.predicate, self.object)
    }
}

// ------------- ValueFactory -------------
// Blank node identities are handed out process wide, starting above zero.
static NEXT_BLANK_NODE: AtomicU64 = AtomicU64::new(1);

/// Mints IRIs, blank nodes and literals.
#[derive(Clone, Copy, Debug, Default)]
pub struct ValueFactory;

impl ValueFactory {
    pub fn new() -> Self {
        Self
    }
    pub fn uri(&self, namespace: &str, local_name: &str) -> Iri {
        Iri::new(namespace, local_name)
    }
    pub fn blank_node(&self) -> BlankNode {
        BlankNode(NEXT_BLANK_NODE.fetch_add(1, atomic::Ordering::Relaxed))
    }
    pub fn literal(&self, value: &str, language: Option<&str>) -> Literal {
        Literal {
            value: Arc::from(value),
            language: language.map(Arc::from),
        }
    }
}

// ------------- BoundingBox -------------
/// A west/south/east/north rectangle in EPSG:4326 degrees.
///
/// Coordinates are not validated; whatever is given is written out.
#[derive(Clone, Copy, PartialEq, Debug, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self { west, south, east, north }
    }
    pub fn lower_corner(&self) -> String {
        format!("{} {}", self.west, self.south)
    }
    pub fn upper_corner(&self) -> String {
        format!("{} {}", self.east, self.north)
    }
    pub fn from_corners(lower_corner: &str, upper_corner: &str) -> Result<Self> {
        let (west, south) = parse_corner(lower_corner)?;
        let (east, north) = parse_corner(upper_corner)?;
        Ok(Self { west, south, east, north })
    }
}

fn parse_corner(corner: &str) -> Result<(f64, f64)> {
    let coordinates = corner
        .split_whitespace()
        .map(f64::from_str)
        .collect::<std::result::Result<Vec<f64>, _>>()
        .map_err(|e| SkosError::MalformedInput(format!("corner '{}': {}", corner, e)))?;
    match coordinates.as_slice() {
        [x, y] => Ok((*x, *y)),
        _ => Err(SkosError::MalformedInput(format!(
            "corner '{}' must hold exactly two coordinates",
            corner
        ))),
    }
}
