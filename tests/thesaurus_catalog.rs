use std::fs;
use std::path::{Path, PathBuf};

use skoskeeper::SkosError;
use skoskeeper::catalog::Catalog;
use skoskeeper::construct::BoundingBox;
use skoskeeper::persist::PersistenceMode;
use skoskeeper::settings::{
    CatalogSettings, LogSettings, PersistenceSettings, ServerSettings, Settings, StorageMode,
};
use skoskeeper::thesaurus::Thesaurus;

const NS: &str = "http://example.org/regions#";

const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:skos="http://www.w3.org/2004/02/skos/core#"
         xmlns:dc="http://purl.org/dc/elements/1.1/"
         xmlns:dcterms="http://purl.org/dc/terms/">
  <skos:ConceptScheme rdf:about="http://example.org/regions">
    <dc:title>Regions</dc:title>
    <dcterms:issued>2020-01-15</dcterms:issued>
  </skos:ConceptScheme>
  <skos:Concept rdf:about="http://example.org/regions#lake">
    <skos:prefLabel xml:lang="en">Lake</skos:prefLabel>
    <skos:scopeNote xml:lang="en">A body of water</skos:scopeNote>
  </skos:Concept>
</rdf:RDF>"#;

// A catalog root holding external/thesauri/theme/regions.rdf, plus a
// document that does not parse.
fn setup(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("skoskeeper_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&root);
    let theme = root.join("external").join("thesauri").join("theme");
    fs::create_dir_all(&theme).expect("theme directory");
    fs::write(theme.join("regions.rdf"), DOCUMENT).expect("document");
    fs::write(theme.join("broken.rdf"), "<rdf:RDF><x:unclosed>").expect("document");
    fs::write(theme.join("notes.txt"), "not a thesaurus").expect("document");
    fs::create_dir_all(root.join("local").join("thesauri").join("place")).expect("local directory");
    root
}

fn settings(root: &Path, mode: StorageMode) -> Settings {
    Settings {
        catalog: CatalogSettings {
            root: root.to_path_buf(),
            types: vec!["external".to_string(), "local".to_string()],
        },
        persistence: PersistenceSettings {
            mode,
            directory: root.join("data"),
        },
        server: ServerSettings {
            bind: "127.0.0.1:0".to_string(),
        },
        log: LogSettings {
            filter: "info".to_string(),
        },
    }
}

#[test]
fn keys_are_type_dname_and_stem() {
    assert_eq!(Thesaurus::build_key("regions.rdf", "external", "theme"), "external.theme.regions");
    assert_eq!(Thesaurus::build_key("regions", "local", "place"), "local.place.regions");
}

#[test]
fn thesaurus_opens_with_metadata_and_concepts() {
    let root = setup("open");
    let file = root.join("external/thesauri/theme/regions.rdf");
    let mut thesaurus =
        Thesaurus::open("regions.rdf", "external", "theme", &file, &PersistenceMode::InMemory)
            .expect("thesaurus");
    assert_eq!(thesaurus.key(), "external.theme.regions");
    assert_eq!(thesaurus.title(), "Regions");
    assert_eq!(thesaurus.date_string().as_deref(), Some("2020-01-15"));
    assert_eq!(thesaurus.graph().len(), 6);

    assert!(!thesaurus.is_free_code(NS, "lake"));
    assert!(thesaurus.is_free_code(NS, "river"));
    thesaurus.add_concept(NS, "river", "River", "Flowing water", "en").unwrap();
    let table = thesaurus
        .perform_request(r#"select ?label where { ?c a skos:Concept . ?c skos:prefLabel ?label } order by ?label"#)
        .expect("query ok");
    assert_eq!(table.to_string(), "label\n\"Lake\"@en\n\"River\"@en\n");
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn saved_thesaurus_reopens_with_edits() {
    let root = setup("save");
    let file = root.join("external/thesauri/theme/regions.rdf");
    {
        let mut thesaurus =
            Thesaurus::open("regions.rdf", "external", "theme", &file, &PersistenceMode::InMemory)
                .expect("thesaurus");
        thesaurus
            .add_concept_with_bbox(NS, "bay", "Bay", "Coastal water", &BoundingBox::new(1.0, 2.0, 3.0, 4.0), "en")
            .unwrap();
        thesaurus.rename_code(NS, "lake", "pond").unwrap();
        thesaurus.save().expect("saved");
    }
    assert!(!root.join("external/thesauri/theme/regions.rdf.tmp").exists());

    let thesaurus =
        Thesaurus::open("regions.rdf", "external", "theme", &file, &PersistenceMode::InMemory)
            .expect("thesaurus");
    assert_eq!(thesaurus.title(), "Regions");
    assert_eq!(thesaurus.date_string().as_deref(), Some("2020-01-15"));
    assert_eq!(thesaurus.graph().len(), 14);
    assert!(thesaurus.concept(NS, "lake").unwrap().is_none());
    let pond = thesaurus.concept(NS, "pond").unwrap().expect("pond");
    assert_eq!(pond.labels.get("en").map(String::as_str), Some("Lake"));
    let bay = thesaurus.concept(NS, "bay").unwrap().expect("bay");
    assert_eq!(bay.bbox, Some(BoundingBox::new(1.0, 2.0, 3.0, 4.0)));
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn catalog_scans_the_root_and_skips_broken_documents() {
    let root = setup("catalog");
    let catalog = Catalog::open(&settings(&root, StorageMode::Memory)).expect("catalog");
    assert_eq!(catalog.keys(), vec!["external.theme.regions".to_string()]);

    let shared = catalog.get("external.theme.regions").expect("thesaurus");
    {
        let mut thesaurus = shared.lock().expect("lock");
        thesaurus.remove_concept_code(NS, "lake").unwrap();
    }
    // every lookup of a key hands out the same thesaurus
    let again = catalog.get("external.theme.regions").expect("thesaurus");
    assert_eq!(again.lock().expect("lock").graph().len(), 3);

    assert!(matches!(
        catalog.get("external.theme.missing"),
        Err(SkosError::UnknownThesaurus(_))
    ));
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn file_storage_keeps_edits_across_catalog_opens() {
    let root = setup("storage");
    let settings = settings(&root, StorageMode::File);
    assert_eq!(
        settings.database_for("regions.rdf", "external", "theme"),
        PersistenceMode::File(root.join("data").join("external.theme.regions.db").to_string_lossy().into_owned())
    );
    {
        let catalog = Catalog::open(&settings).expect("catalog");
        let shared = catalog.get("external.theme.regions").expect("thesaurus");
        let mut thesaurus = shared.lock().expect("lock");
        thesaurus.add_concept(NS, "river", "River", "Flowing water", "en").unwrap();
    }
    // the document is unchanged, the backing database holds the edit
    let catalog = Catalog::open(&settings).expect("catalog");
    let shared = catalog.get("external.theme.regions").expect("thesaurus");
    let thesaurus = shared.lock().expect("lock");
    assert_eq!(thesaurus.graph().len(), 9);
    assert!(!thesaurus.is_free_code(NS, "river"));
    let _ = fs::remove_dir_all(&root);
}

#[test]
fn settings_file_layers_over_defaults() {
    let root = setup("settings");
    let path = root.join("skoskeeper.toml");
    fs::write(
        &path,
        format!(
            "[catalog]\nroot = \"{}\"\ntypes = [\"external\"]\n\n[persistence]\nmode = \"file\"\n",
            root.display()
        ),
    )
    .expect("settings file");
    let settings = Settings::from_file(&path).expect("settings");
    assert_eq!(settings.catalog.root, root);
    assert_eq!(settings.catalog.types, vec!["external".to_string()]);
    assert_eq!(settings.persistence.mode, StorageMode::File);
    assert_eq!(settings.persistence.directory, PathBuf::from("data"));
    assert_eq!(settings.server.bind, "127.0.0.1:8080");
    let _ = fs::remove_dir_all(&root);
}
