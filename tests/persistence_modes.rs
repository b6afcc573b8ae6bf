use std::path::PathBuf;

use skoskeeper::concept::ConceptEditor;
use skoskeeper::construct::{BoundingBox, Subject};
use skoskeeper::persist::{PersistenceMode, Persistor};
use skoskeeper::store::Graph;

const NS: &str = "http://example.org/regions#";

fn temp_db(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("skoskeeper_{}_{}.db", name, std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

#[test]
fn in_memory_mode_has_no_persistor() {
    let mut graph = Graph::new(&PersistenceMode::InMemory).expect("graph");
    ConceptEditor::new(&mut graph)
        .add_concept(NS, "k1", "Lake", "Water", "en")
        .unwrap();
    assert!(!graph.is_persistent());
    assert_eq!(graph.len(), 3);
}

#[test]
fn file_mode_restores_on_reopen() {
    let path = temp_db("reopen");
    let mode = PersistenceMode::File(path.to_string_lossy().into_owned());
    {
        let mut graph = Graph::new(&mode).expect("graph");
        let mut editor = ConceptEditor::new(&mut graph);
        editor
            .add_concept_with_bbox(NS, "c1", "Label", "Note", &BoundingBox::new(10.0, 20.0, 30.0, 40.0), "en")
            .unwrap();
        editor.add_concept(NS, "c2", "Other", "Other note", "en").unwrap();
        editor.rename_code(NS, "c2", "c3").unwrap();
        assert_eq!(graph.len(), 11);
        assert_eq!(graph.persistor().expect("persistor").statement_count().unwrap(), 11);
    }

    let mut graph = Graph::new(&mode).expect("graph");
    assert!(graph.is_persistent());
    assert_eq!(graph.len(), 11);
    let c2 = Subject::Iri(graph.factory().uri(NS, "c2"));
    assert!(!graph.contains(Some(&c2), None, None));

    let mut editor = ConceptEditor::new(&mut graph);
    assert!(!editor.is_free_code(NS, "c3"));
    let concept = editor.concept(NS, "c1").unwrap().expect("concept");
    assert_eq!(concept.bbox, Some(BoundingBox::new(10.0, 20.0, 30.0, 40.0)));

    // identities keep growing after a restore
    editor.remove_concept_code(NS, "c1").unwrap();
    editor.add_concept(NS, "c4", "New", "Added after restore", "fr").unwrap();
    drop(editor);
    assert_eq!(graph.len(), 6);
    drop(graph);

    let graph = Graph::new(&mode).expect("graph");
    assert_eq!(graph.len(), 6);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn persistor_can_back_a_graph_in_memory() {
    let persistor = Persistor::in_memory().expect("persistor");
    let mut graph = Graph::with_persistor(persistor).expect("graph");
    ConceptEditor::new(&mut graph)
        .add_concept(NS, "k1", "Lake", "Water", "en")
        .unwrap();
    let k1 = Subject::Iri(graph.factory().uri(NS, "k1"));
    let removed = graph.remove(Some(&k1), None, None).unwrap();
    assert_eq!(removed, 3);
    assert_eq!(graph.persistor().expect("persistor").statement_count().unwrap(), 0);
}

#[test]
fn removed_concepts_leave_no_terms_behind() {
    let path = temp_db("reclaim");
    let mode = PersistenceMode::File(path.to_string_lossy().into_owned());
    let mut graph = Graph::new(&mode).expect("graph");
    let mut editor = ConceptEditor::new(&mut graph);
    for n in 0..100 {
        let code = format!("c{}", n);
        editor
            .add_concept_with_bbox(NS, &code, "Label", "Note", &BoundingBox::new(1.0, 2.0, 3.0, 4.0), "en")
            .unwrap();
        editor.update_label_and_note(NS, &code, "Other label", "Other note", "en").unwrap();
        editor.remove_concept_code(NS, &code).unwrap();
    }
    drop(editor);
    assert!(graph.is_empty());
    assert_eq!(graph.term_count(), 0);
    let persistor = graph.persistor().expect("persistor");
    assert_eq!(persistor.term_count().unwrap(), 0);
    assert_eq!(persistor.statement_count().unwrap(), 0);
    drop(graph);
    let _ = std::fs::remove_file(&path);
}
