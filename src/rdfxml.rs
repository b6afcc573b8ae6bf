//! RDF/XML reading and writing for thesaurus documents.
//!
//! The reader covers the striped syntax thesaurus files are written in:
//! - `rdf:Description` and typed node elements (`<skos:Concept rdf:about=…>`)
//! - `rdf:about`, `rdf:ID` and `rdf:nodeID` subjects, anonymous nodes otherwise
//! - property elements with `rdf:resource`, `rdf:nodeID`, text content, a
//!   nested node element, or `rdf:parseType="Resource"`
//! - property attributes on node and empty property elements
//! - `xml:lang` inheritance and `xml:base`, relative references resolve
//!   against the base
//!
//! Datatypes are dropped since literals carry a language tag only; a typed
//! literal does not inherit `xml:lang`. Blank node
//! labels are local to one document; every label gets a fresh node.
//!
//! The writer emits one node element per subject, blank nodes by
//! `rdf:nodeID`, which the reader accepts again.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::Path;

// used to check predicate local names before writing them as element names
use lazy_static::lazy_static;
use regex::Regex;

use quick_xml::NsReader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use tracing::{debug, trace};

use crate::construct::{BlankNode, Iri, Statement, Subject, Term, ValueFactory};
use crate::error::{Result, SkosError};
use crate::store::Graph;
use crate::vocab::{WELL_KNOWN_PREFIXES, rdf, xml};

/// Reads the RDF/XML document at `path`.
pub fn load_file(path: &Path) -> Result<Vec<Statement>> {
    let document = fs::read_to_string(path)?;
    let statements = parse_str(&document, None)?;
    debug!(path = %path.display(), statements = statements.len(), "loaded RDF/XML document");
    Ok(statements)
}

/// Parses an RDF/XML document. Relative references are resolved against
/// `base`, or against `xml:base` on the root element when present.
pub fn parse_str(document: &str, base: Option<&str>) -> Result<Vec<Statement>> {
    let mut parser = Parser {
        factory: ValueFactory::new(),
        base: base.map(str::to_string),
        blank_nodes: HashMap::new(),
        statements: Vec::new(),
        stack: Vec::new(),
    };
    let mut reader = NsReader::from_str(document);
    loop {
        let (resolved, event) = reader.read_resolved_event()?;
        let namespace = match resolved {
            ResolveResult::Bound(namespace) => {
                Some(String::from_utf8_lossy(namespace.into_inner()).into_owned())
            }
            ResolveResult::Unbound => None,
            ResolveResult::Unknown(prefix) => {
                return Err(SkosError::Document(format!(
                    "undeclared prefix '{}'",
                    String::from_utf8_lossy(&prefix)
                )));
            }
        };
        match event {
            Event::Start(ref element) => {
                let attributes = read_attributes(&reader, element)?;
                parser.start(element_iri(namespace, element)?, attributes, false)?;
            }
            Event::Empty(ref element) => {
                let attributes = read_attributes(&reader, element)?;
                parser.start(element_iri(namespace, element)?, attributes, true)?;
            }
            Event::Text(ref text) => parser.text(&text.unescape()?),
            Event::CData(ref data) => parser.text(&String::from_utf8_lossy(data)),
            Event::End(_) => parser.end(),
            Event::Eof => break,
            _ => (),
        }
    }
    Ok(parser.statements)
}

// ------------- Reading -------------
#[derive(Debug, Default)]
struct Attributes {
    about: Option<String>,
    id: Option<String>,
    node_id: Option<String>,
    resource: Option<String>,
    parse_type: Option<String>,
    rdf_type: Option<String>,
    datatype: Option<String>,
    // Some("") resets an inherited language
    language: Option<String>,
    base: Option<String>,
    properties: Vec<(Iri, String)>,
}

enum Frame {
    Root {
        language: Option<String>,
    },
    Node {
        subject: Subject,
        language: Option<String>,
    },
    Property {
        subject: Subject,
        predicate: Iri,
        language: Option<String>,
        object: Option<Subject>,
        properties: Vec<(Iri, String)>,
        text: String,
        nested: bool,
    },
}

impl Frame {
    fn language(&self) -> Option<&String> {
        match self {
            Frame::Root { language } => language.as_ref(),
            Frame::Node { language, .. } => language.as_ref(),
            Frame::Property { language, .. } => language.as_ref(),
        }
    }
}

struct Parser {
    factory: ValueFactory,
    base: Option<String>,
    blank_nodes: HashMap<String, BlankNode>,
    statements: Vec<Statement>,
    stack: Vec<Frame>,
}

impl Parser {
    fn start(&mut self, element: Iri, attributes: Attributes, empty: bool) -> Result<()> {
        let inherited = self.stack.last().and_then(Frame::language).cloned();
        let language = match attributes.language.as_deref() {
            Some("") => None,
            Some(language) => Some(language.to_string()),
            None => inherited,
        };
        let is_rdf_root = element.namespace() == rdf::NS && element.local_name() == rdf::RDF;
        match self.stack.last() {
            None if is_rdf_root => {
                if let Some(base) = attributes.base {
                    self.base = Some(base);
                }
                if !empty {
                    self.stack.push(Frame::Root { language });
                }
                Ok(())
            }
            None | Some(Frame::Root { .. }) | Some(Frame::Property { .. }) => {
                self.node_element(element, attributes, language, empty)
            }
            Some(Frame::Node { subject, .. }) => {
                let subject = subject.clone();
                self.property_element(subject, element, attributes, language, empty)
            }
        }
    }

    fn node_element(
        &mut self,
        element: Iri,
        attributes: Attributes,
        language: Option<String>,
        empty: bool,
    ) -> Result<()> {
        let subject = if let Some(about) = &attributes.about {
            Subject::Iri(Iri::parse(&self.resolve(about)))
        } else if let Some(id) = &attributes.id {
            Subject::Iri(Iri::parse(&self.resolve(&format!("#{}", id))))
        } else if let Some(label) = &attributes.node_id {
            Subject::Blank(self.blank_node(label))
        } else {
            Subject::Blank(self.factory.blank_node())
        };
        if let Some(Frame::Property {
            subject: parent,
            predicate,
            nested,
            ..
        }) = self.stack.last_mut()
        {
            self.statements.push(Statement::new(
                parent.clone(),
                predicate.clone(),
                subject.clone(),
            ));
            *nested = true;
        }
        let rdf_type = self.factory.uri(rdf::NS, rdf::TYPE);
        if !(element.namespace() == rdf::NS && element.local_name() == rdf::DESCRIPTION) {
            self.statements
                .push(Statement::new(subject.clone(), rdf_type.clone(), element));
        }
        if let Some(class) = &attributes.rdf_type {
            self.statements.push(Statement::new(
                subject.clone(),
                rdf_type,
                Iri::parse(&self.resolve(class)),
            ));
        }
        self.property_attributes(&subject, attributes.properties, language.as_deref());
        if !empty {
            self.stack.push(Frame::Node { subject, language });
        }
        Ok(())
    }

    fn property_element(
        &mut self,
        subject: Subject,
        predicate: Iri,
        attributes: Attributes,
        language: Option<String>,
        empty: bool,
    ) -> Result<()> {
        // a typed literal carries no language, the datatype itself is dropped
        let language = match &attributes.datatype {
            Some(datatype) => {
                trace!(%datatype, "ignoring literal datatype");
                None
            }
            None => language,
        };
        if let Some(parse_type) = attributes.parse_type.as_deref() {
            if parse_type != "Resource" {
                return Err(SkosError::Document(format!(
                    "rdf:parseType=\"{}\" is not supported",
                    parse_type
                )));
            }
            let node = self.factory.blank_node();
            self.statements
                .push(Statement::new(subject, predicate, node));
            if !empty {
                self.stack.push(Frame::Node {
                    subject: Subject::Blank(node),
                    language,
                });
            }
            return Ok(());
        }
        let object = if let Some(resource) = &attributes.resource {
            Some(Subject::Iri(Iri::parse(&self.resolve(resource))))
        } else {
            attributes
                .node_id
                .as_ref()
                .map(|label| Subject::Blank(self.blank_node(label)))
        };
        if empty {
            self.finish_property(
                subject,
                predicate,
                object,
                attributes.properties,
                String::new(),
                language,
            );
        } else {
            self.stack.push(Frame::Property {
                subject,
                predicate,
                language,
                object,
                properties: attributes.properties,
                text: String::new(),
                nested: false,
            });
        }
        Ok(())
    }

    fn finish_property(
        &mut self,
        subject: Subject,
        predicate: Iri,
        object: Option<Subject>,
        properties: Vec<(Iri, String)>,
        text: String,
        language: Option<String>,
    ) {
        let object = match object {
            Some(object) => Some(object),
            None if !properties.is_empty() => Some(Subject::Blank(self.factory.blank_node())),
            None => None,
        };
        match object {
            Some(object) => {
                self.statements
                    .push(Statement::new(subject, predicate, object.clone()));
                self.property_attributes(&object, properties, language.as_deref());
            }
            None => {
                let literal = self.factory.literal(&text, language.as_deref());
                self.statements
                    .push(Statement::new(subject, predicate, literal));
            }
        }
    }

    fn property_attributes(
        &mut self,
        subject: &Subject,
        properties: Vec<(Iri, String)>,
        language: Option<&str>,
    ) {
        for (predicate, value) in properties {
            let literal = self.factory.literal(&value, language);
            self.statements
                .push(Statement::new(subject.clone(), predicate, literal));
        }
    }

    fn text(&mut self, content: &str) {
        if let Some(Frame::Property { text, .. }) = self.stack.last_mut() {
            text.push_str(content);
        }
    }

    fn end(&mut self) {
        if let Some(Frame::Property {
            subject,
            predicate,
            language,
            object,
            properties,
            text,
            nested,
        }) = self.stack.pop()
        {
            if !nested {
                self.finish_property(subject, predicate, object, properties, text, language);
            }
        }
    }

    fn blank_node(&mut self, label: &str) -> BlankNode {
        let factory = self.factory;
        *self
            .blank_nodes
            .entry(label.to_string())
            .or_insert_with(|| factory.blank_node())
    }

    fn resolve(&self, reference: &str) -> String {
        let Some(base) = &self.base else {
            return reference.to_string();
        };
        let document = base.split('#').next().unwrap_or(base.as_str());
        if has_scheme(reference) {
            reference.to_string()
        } else if reference.is_empty() {
            document.to_string()
        } else if reference.starts_with('#') {
            format!("{}{}", document, reference)
        } else if let Some(authority) = reference.strip_prefix("//") {
            let scheme = document.split(':').next().unwrap_or("http");
            format!("{}://{}", scheme, authority)
        } else if reference.starts_with('/') {
            format!("{}{}", origin(document), reference)
        } else {
            // relative paths replace the last segment of the base path
            let origin = origin(document);
            match document[origin.len()..].rfind('/') {
                Some(slash) => format!("{}{}", &document[..origin.len() + slash + 1], reference),
                None => format!("{}/{}", origin, reference),
            }
        }
    }
}

fn has_scheme(reference: &str) -> bool {
    match reference.split_once(':') {
        Some((scheme, _)) => {
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

// scheme and authority of an absolute IRI, e.g. `http://example.org`
fn origin(iri: &str) -> &str {
    match iri.find("://") {
        Some(position) => {
            let authority = position + 3;
            match iri[authority..].find('/') {
                Some(slash) => &iri[..authority + slash],
                None => iri,
            }
        }
        None => iri.find(':').map_or(iri, |colon| &iri[..colon + 1]),
    }
}

fn element_iri(namespace: Option<String>, element: &BytesStart) -> Result<Iri> {
    let local_name = String::from_utf8_lossy(element.local_name().into_inner()).into_owned();
    match namespace {
        Some(namespace) => Ok(Iri::new(&namespace, &local_name)),
        None => Err(SkosError::Document(format!(
            "element '{}' has no namespace",
            local_name
        ))),
    }
}

fn read_attributes<R>(reader: &NsReader<R>, element: &BytesStart) -> Result<Attributes> {
    let mut attributes = Attributes::default();
    for attribute in element.attributes() {
        let attribute = attribute?;
        let key = attribute.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let value = attribute.unescape_value()?.into_owned();
        if let Some(local) = key.strip_prefix(b"xml:") {
            match std::str::from_utf8(local) {
                Ok(xml::LANG) => attributes.language = Some(value),
                Ok(xml::BASE) => attributes.base = Some(value),
                _ => (),
            }
            continue;
        }
        let (resolved, local_name) = reader.resolve_attribute(attribute.key);
        let local_name = String::from_utf8_lossy(local_name.into_inner()).into_owned();
        let namespace = match resolved {
            ResolveResult::Bound(namespace) => {
                Some(String::from_utf8_lossy(namespace.into_inner()).into_owned())
            }
            _ => None,
        };
        match namespace.as_deref() {
            // unqualified syntax attributes are still accepted as RDF ones
            Some(rdf::NS) | None => match local_name.as_str() {
                rdf::ABOUT => attributes.about = Some(value),
                rdf::ID => attributes.id = Some(value),
                rdf::NODE_ID => attributes.node_id = Some(value),
                rdf::RESOURCE => attributes.resource = Some(value),
                rdf::PARSE_TYPE => attributes.parse_type = Some(value),
                rdf::TYPE => attributes.rdf_type = Some(value),
                rdf::DATATYPE => attributes.datatype = Some(value),
                _ if namespace.is_some() => attributes
                    .properties
                    .push((Iri::new(rdf::NS, &local_name), value)),
                _ => trace!(attribute = %local_name, "ignoring unqualified attribute"),
            },
            Some(xml::NS) => (),
            Some(namespace) => attributes
                .properties
                .push((Iri::new(namespace, &local_name), value)),
        }
    }
    Ok(attributes)
}

// ------------- Writing -------------
/// Writes every statement of `graph` as RDF/XML, one node element per
/// subject. A subject with an `rdf:type` that can be written as an element
/// name becomes a typed node (`<skos:Concept rdf:about=…>`), everything else
/// an `rdf:Description`.
pub fn write_graph(graph: &Graph, out: &mut impl Write) -> Result<()> {
    let mut subjects: BTreeMap<Subject, Vec<Statement>> = BTreeMap::new();
    for statement in graph.matches(None, None, None) {
        subjects
            .entry(statement.subject().clone())
            .or_default()
            .push(statement);
    }

    let mut prefixes: Vec<(String, String)> = WELL_KNOWN_PREFIXES
        .iter()
        .map(|(prefix, namespace)| (prefix.to_string(), namespace.to_string()))
        .collect();
    for statement in subjects.values().flatten() {
        let namespace = statement.predicate().namespace();
        if !prefixes.iter().any(|(_, known)| known == namespace) {
            let prefix = format!("ns{}", prefixes.len() - WELL_KNOWN_PREFIXES.len());
            prefixes.push((prefix, namespace.to_string()));
        }
    }
    let qualified = |iri: &Iri| -> Option<String> {
        let (prefix, _) = prefixes
            .iter()
            .find(|(_, namespace)| namespace == iri.namespace())?;
        is_xml_name(iri.local_name()).then(|| format!("{}:{}", prefix, iri.local_name()))
    };
    let rdf_type = Iri::new(rdf::NS, rdf::TYPE);

    writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    write!(out, "<rdf:RDF")?;
    for (prefix, namespace) in &prefixes {
        write!(out, "\n    xmlns:{}=\"{}\"", prefix, escape(namespace))?;
    }
    writeln!(out, ">")?;
    for (subject, statements) in &subjects {
        // the first type that has a qualified name names the element
        let typed = statements.iter().position(|statement| {
            *statement.predicate() == rdf_type
                && statement.object().as_iri().and_then(|class| qualified(class)).is_some()
        });
        let element = typed
            .and_then(|position| statements[position].object().as_iri())
            .and_then(|class| qualified(class))
            .unwrap_or_else(|| String::from("rdf:Description"));
        match subject {
            Subject::Iri(iri) => writeln!(
                out,
                "  <{} rdf:about=\"{}\">",
                element,
                escape(&iri.as_string())
            )?,
            Subject::Blank(node) => {
                writeln!(out, "  <{} rdf:nodeID=\"{}\">", element, node.label())?
            }
        }
        for (position, statement) in statements.iter().enumerate() {
            if Some(position) == typed {
                continue;
            }
            let predicate = statement.predicate();
            let name = qualified(predicate).ok_or_else(|| {
                SkosError::Document(format!(
                    "predicate {} cannot be written as an element name",
                    predicate
                ))
            })?;
            match statement.object() {
                Term::Iri(iri) => writeln!(
                    out,
                    "    <{} rdf:resource=\"{}\"/>",
                    name,
                    escape(&iri.as_string())
                )?,
                Term::Blank(node) => {
                    writeln!(out, "    <{} rdf:nodeID=\"{}\"/>", name, node.label())?
                }
                Term::Literal(literal) => match literal.language() {
                    Some(language) => writeln!(
                        out,
                        "    <{} xml:lang=\"{}\">{}</{}>",
                        name,
                        escape(language),
                        escape(literal.value()),
                        name
                    )?,
                    None => writeln!(out, "    <{}>{}</{}>", name, escape(literal.value()), name)?,
                },
            }
        }
        writeln!(out, "  </{}>", element)?;
    }
    writeln!(out, "</rdf:RDF>")?;
    Ok(())
}

lazy_static! {
    // local names that can follow a prefix in an element name
    static ref XML_NAME: Regex = Regex::new(r"^[\p{L}_][\p{L}\p{N}_.\-]*$").unwrap();
}

fn is_xml_name(name: &str) -> bool {
    XML_NAME.is_match(name)
}
