use skoskeeper::SkosError;
use skoskeeper::concept::{ConceptEditor, read_concept};
use skoskeeper::construct::{BoundingBox, Subject, Term};
use skoskeeper::metadata::ThesaurusInfo;
use skoskeeper::rdfxml;
use skoskeeper::store::Graph;
use skoskeeper::vocab::{rdf, skos};

const NS: &str = "http://example.org/regions#";

const DOCUMENT: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:skos="http://www.w3.org/2004/02/skos/core#"
         xmlns:gml="http://www.opengis.net/gml#"
         xmlns:dc="http://purl.org/dc/elements/1.1/"
         xmlns:dcterms="http://purl.org/dc/terms/"
         xml:base="http://example.org/regions">
  <skos:ConceptScheme rdf:about="http://example.org/regions">
    <dc:title>Regions &amp; waters</dc:title>
    <dcterms:issued>2020-01-15</dcterms:issued>
  </skos:ConceptScheme>
  <skos:Concept rdf:about="http://example.org/regions#lake">
    <skos:prefLabel xml:lang="en">Lake</skos:prefLabel>
    <skos:prefLabel xml:lang="fr">Lac</skos:prefLabel>
    <skos:scopeNote xml:lang="en">A body of water</skos:scopeNote>
    <gml:BoundedBy>
      <gml:Envelope>
        <gml:lowerCorner>10 20</gml:lowerCorner>
        <gml:upperCorner>30 40</gml:upperCorner>
        <gml:srsName rdf:resource="http://www.opengis.net/gml/srs/epsg.xml#epsg:4326"/>
      </gml:Envelope>
    </gml:BoundedBy>
  </skos:Concept>
  <rdf:Description rdf:ID="river" xml:lang="en">
    <rdf:type rdf:resource="http://www.w3.org/2004/02/skos/core#Concept"/>
    <skos:prefLabel>River</skos:prefLabel>
    <skos:related rdf:resource="#lake"/>
  </rdf:Description>
</rdf:RDF>"##;

fn load(document: &str) -> Graph {
    let mut graph = Graph::in_memory();
    graph
        .extend(rdfxml::parse_str(document, None).expect("parsed"))
        .expect("loaded");
    graph
}

#[test]
fn thesaurus_document_loads_into_statements() {
    let graph = load(DOCUMENT);
    assert_eq!(graph.len(), 15);

    let factory = graph.factory();
    let concept = Term::Iri(factory.uri(skos::NS, skos::CONCEPT));
    let rdf_type = factory.uri(rdf::NS, rdf::TYPE);
    assert_eq!(graph.matches(None, Some(&rdf_type), Some(&concept)).count(), 2);

    let lake = read_concept(&graph, NS, "lake").unwrap().expect("lake");
    assert_eq!(lake.labels.get("en").map(String::as_str), Some("Lake"));
    assert_eq!(lake.labels.get("fr").map(String::as_str), Some("Lac"));
    assert_eq!(lake.notes.get("en").map(String::as_str), Some("A body of water"));
    assert_eq!(lake.bbox, Some(BoundingBox::new(10.0, 20.0, 30.0, 40.0)));

    // rdf:ID and relative references resolve against xml:base, xml:lang is inherited
    let river = read_concept(&graph, NS, "river").unwrap().expect("river");
    assert_eq!(river.labels.get("en").map(String::as_str), Some("River"));
    let related = factory.uri(skos::NS, "related");
    let river_subject = Subject::Iri(factory.uri(NS, "river"));
    let lake_term = Term::Iri(factory.uri(NS, "lake"));
    assert!(graph.contains(Some(&river_subject), Some(&related), Some(&lake_term)));
}

#[test]
fn loaded_concepts_can_be_edited() {
    let mut graph = load(DOCUMENT);
    let mut editor = ConceptEditor::new(&mut graph);
    assert!(!editor.is_free_code(NS, "lake"));
    editor
        .update_label_note_and_bbox(NS, "lake", "Big lake", "Lots of water", &BoundingBox::new(0.0, 1.0, 2.0, 3.0), "en")
        .unwrap();
    let lake = editor.concept(NS, "lake").unwrap().expect("lake");
    assert_eq!(lake.labels.get("en").map(String::as_str), Some("Big lake"));
    assert_eq!(lake.labels.get("fr").map(String::as_str), Some("Lac"));
    assert_eq!(lake.bbox, Some(BoundingBox::new(0.0, 1.0, 2.0, 3.0)));
    assert_eq!(editor.remove_concept_code(NS, "lake").unwrap(), 9);
    assert_eq!(graph.len(), 6);
}

#[test]
fn written_documents_read_back_the_same() {
    let mut graph = load(DOCUMENT);
    ConceptEditor::new(&mut graph)
        .add_concept_with_bbox(NS, "pond", "Pond <small>", "Water & mud", &BoundingBox::new(-1.5, 2.0, 3.0, 4.0), "en")
        .unwrap();
    let mut written = Vec::new();
    rdfxml::write_graph(&graph, &mut written).expect("written");
    let text = String::from_utf8(written).expect("utf-8");
    assert!(text.contains("<skos:ConceptScheme rdf:about=\"http://example.org/regions\">"));

    let reread = load(&text);
    assert_eq!(reread.len(), graph.len());
    for code in ["lake", "river", "pond"] {
        assert_eq!(
            read_concept(&reread, NS, code).unwrap(),
            read_concept(&graph, NS, code).unwrap()
        );
    }
    let info = ThesaurusInfo::from_document(&text, "external");
    assert_eq!(info.title(), "Regions & waters");
}

#[test]
fn blank_node_labels_are_local_to_a_document() {
    let document = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                               xmlns:gml="http://www.opengis.net/gml#">
      <rdf:Description rdf:about="http://example.org/regions#a">
        <gml:BoundedBy rdf:nodeID="box"/>
      </rdf:Description>
      <rdf:Description rdf:nodeID="box">
        <gml:lowerCorner>1 2</gml:lowerCorner>
        <gml:upperCorner>3 4</gml:upperCorner>
      </rdf:Description>
    </rdf:RDF>"#;
    let first = load(document);
    let second = load(document);
    let a = read_concept(&first, NS, "a").unwrap().expect("a");
    assert_eq!(a.bbox, Some(BoundingBox::new(1.0, 2.0, 3.0, 4.0)));

    let blank = |graph: &Graph| {
        graph
            .matches(None, None, None)
            .find_map(|statement| statement.subject().as_blank())
            .expect("blank node")
    };
    assert_ne!(blank(&first), blank(&second));
}

#[test]
fn parse_type_resource_and_property_attributes() {
    let document = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                               xmlns:skos="http://www.w3.org/2004/02/skos/core#"
                               xmlns:gml="http://www.opengis.net/gml#">
      <skos:Concept rdf:about="http://example.org/regions#bay" skos:prefLabel="Bay" xml:lang="en">
        <gml:BoundedBy rdf:parseType="Resource">
          <gml:lowerCorner>5 6</gml:lowerCorner>
          <gml:upperCorner>7 8</gml:upperCorner>
        </gml:BoundedBy>
      </skos:Concept>
    </rdf:RDF>"#;
    let graph = load(document);
    let bay = read_concept(&graph, NS, "bay").unwrap().expect("bay");
    assert_eq!(bay.labels.get("en").map(String::as_str), Some("Bay"));
    assert_eq!(bay.bbox, Some(BoundingBox::new(5.0, 6.0, 7.0, 8.0)));
}

#[test]
fn malformed_documents_are_errors() {
    assert!(matches!(
        rdfxml::parse_str("<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\"><x:y/></rdf:RDF>", None),
        Err(SkosError::Document(_))
    ));
    assert!(matches!(
        rdfxml::parse_str(
            "<rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\"><rdf:Description></rdf:RDF>",
            None
        ),
        Err(SkosError::Document(_))
    ));
}

#[test]
fn codes_containing_separators_survive_a_reload() {
    let codes = "http://example.org/codes/";
    let mut graph = Graph::in_memory();
    ConceptEditor::new(&mut graph)
        .add_concept(codes, "water/lake", "Lake", "A body of water", "en")
        .unwrap();
    let mut written = Vec::new();
    rdfxml::write_graph(&graph, &mut written).expect("written");
    let mut reloaded = load(&String::from_utf8(written).expect("utf-8"));

    assert!(!skoskeeper::concept::code_is_free(&reloaded, codes, "water/lake"));
    let lake = read_concept(&reloaded, codes, "water/lake").unwrap().expect("lake");
    assert_eq!(lake.uri, "http://example.org/codes/water/lake");

    let table = skoskeeper::query::Engine::new(&reloaded)
        .execute("select ?label where { <http://example.org/codes/water/lake> skos:prefLabel ?label }")
        .expect("query ok");
    assert_eq!(table.row_count(), 1);

    let mut editor = ConceptEditor::new(&mut reloaded);
    assert_eq!(editor.rename_code(codes, "water/lake", "water/pond").unwrap(), 3);
    assert!(editor.is_free_code(codes, "water/lake"));
}

#[test]
fn relative_references_and_typed_literals() {
    let document = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                               xmlns:skos="http://www.w3.org/2004/02/skos/core#"
                               xml:base="http://example.org/regions/" xml:lang="en">
      <skos:Concept rdf:about="lake">
        <skos:prefLabel>Lake</skos:prefLabel>
        <skos:notation rdf:datatype="http://www.w3.org/2001/XMLSchema#string">L1</skos:notation>
        <skos:related rdf:resource="/waters/pond"/>
      </skos:Concept>
    </rdf:RDF>"#;
    let graph = load(document);
    let codes = "http://example.org/regions/";
    let lake = read_concept(&graph, codes, "lake").unwrap().expect("lake");
    assert_eq!(lake.uri, "http://example.org/regions/lake");
    assert_eq!(lake.labels.get("en").map(String::as_str), Some("Lake"));

    let factory = graph.factory();
    let subject = Subject::Iri(factory.uri(codes, "lake"));
    let notation = factory.uri(skos::NS, "notation");
    let untagged = Term::Literal(factory.literal("L1", None));
    assert!(graph.contains(Some(&subject), Some(&notation), Some(&untagged)));
    let tagged = Term::Literal(factory.literal("L1", Some("en")));
    assert!(!graph.contains(Some(&subject), Some(&notation), Some(&tagged)));

    let related = factory.uri(skos::NS, "related");
    let pond = Term::Iri(factory.uri("http://example.org/waters/", "pond"));
    assert!(graph.contains(Some(&subject), Some(&related), Some(&pond)));
}
