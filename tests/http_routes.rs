use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use skoskeeper::catalog::Catalog;
use skoskeeper::persist::PersistenceMode;
use skoskeeper::server::router;
use skoskeeper::thesaurus::Thesaurus;

const KEY: &str = "external.theme.regions";
const NS: &str = "http://example.org/regions#";
// NS as a query string value
const NS_PARAM: &str = "http%3A%2F%2Fexample.org%2Fregions%23";

const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:skos="http://www.w3.org/2004/02/skos/core#"
         xmlns:dc="http://purl.org/dc/elements/1.1/">
  <skos:ConceptScheme rdf:about="http://example.org/regions">
    <dc:title>Regions</dc:title>
  </skos:ConceptScheme>
  <skos:Concept rdf:about="http://example.org/regions#lake">
    <skos:prefLabel xml:lang="en">Lake</skos:prefLabel>
    <skos:scopeNote xml:lang="en">A body of water</skos:scopeNote>
  </skos:Concept>
</rdf:RDF>"#;

fn app(name: &str) -> (Router, PathBuf) {
    let directory = std::env::temp_dir().join(format!("skoskeeper_http_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&directory);
    fs::create_dir_all(&directory).expect("directory");
    let file = directory.join("regions.rdf");
    fs::write(&file, DOCUMENT).expect("document");
    let thesaurus = Thesaurus::open("regions.rdf", "external", "theme", &file, &PersistenceMode::InMemory)
        .expect("thesaurus");
    let mut catalog = Catalog::new();
    catalog.insert(thesaurus);
    (router(Arc::new(catalog)), directory)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

fn concept_uri(code: &str) -> String {
    format!("/v1/thesauri/{}/concept?namespace={}&code={}", KEY, NS_PARAM, code)
}

#[tokio::test]
async fn adding_a_taken_code_is_a_conflict() {
    let (app, directory) = app("add");
    let uri = format!("/v1/thesauri/{}/concepts", KEY);
    let river = json!({
        "namespace": NS, "code": "river", "label": "River", "note": "Flowing water", "language": "en"
    });
    let (status, body) = send(&app, Method::POST, &uri, Some(river.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["uri"], "http://example.org/regions#river");

    let (status, body) = send(&app, Method::POST, &uri, Some(river)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");

    let (status, body) = send(&app, Method::GET, &concept_uri("river"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["labels"]["en"], "River");
    assert_eq!(body["bbox"], Value::Null);
    let _ = fs::remove_dir_all(&directory);
}

#[tokio::test]
async fn bounding_boxes_are_added_and_updated() {
    let (app, directory) = app("bbox");
    let uri = format!("/v1/thesauri/{}/concepts", KEY);
    let bay = json!({
        "namespace": NS, "code": "bay", "label": "Bay", "note": "Coastal water", "language": "en",
        "bbox": { "west": 1.0, "south": 2.0, "east": 3.0, "north": 4.0 }
    });
    let (status, _) = send(&app, Method::POST, &uri, Some(bay)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, body) = send(&app, Method::GET, &concept_uri("bay"), None).await;
    assert_eq!(body["bbox"], json!({ "west": 1.0, "south": 2.0, "east": 3.0, "north": 4.0 }));

    let moved = json!({
        "namespace": NS, "code": "bay", "label": "Big bay", "note": "More water", "language": "en",
        "bbox": { "west": -5.0, "south": 6.0, "east": 7.0, "north": 8.0 }
    });
    let (status, body) = send(&app, Method::PUT, &uri, Some(moved)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uri"], "http://example.org/regions#bay");
    let (_, body) = send(&app, Method::GET, &concept_uri("bay"), None).await;
    assert_eq!(body["labels"]["en"], "Big bay");
    assert_eq!(body["bbox"], json!({ "west": -5.0, "south": 6.0, "east": 7.0, "north": 8.0 }));

    // without a bbox only label and note change
    let relabelled = json!({
        "namespace": NS, "code": "lake", "label": "Big lake", "note": "Lots of water", "language": "en"
    });
    let (status, _) = send(&app, Method::PUT, &uri, Some(relabelled)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, Method::GET, &concept_uri("lake"), None).await;
    assert_eq!(body["labels"]["en"], "Big lake");
    assert_eq!(body["notes"]["en"], "Lots of water");
    assert_eq!(body["bbox"], Value::Null);
    let _ = fs::remove_dir_all(&directory);
}

#[tokio::test]
async fn unknown_keys_and_concepts_are_not_found() {
    let (app, directory) = app("missing");
    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/thesauri/external.theme.missing/query",
        Some(json!({ "query": "select ?c where { ?c a skos:Concept }" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");

    let uri = format!("/v1/thesauri/external.theme.missing/concept?namespace={}&code=lake", NS_PARAM);
    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::GET, &concept_uri("river"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "no such concept");
    let _ = fs::remove_dir_all(&directory);
}

#[tokio::test]
async fn queries_answer_rows_or_bad_request() {
    let (app, directory) = app("query");
    let uri = format!("/v1/thesauri/{}/query", KEY);
    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(json!({ "query": "select ?label where { ?c a skos:Concept . ?c skos:prefLabel ?label }" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["columns"], json!(["label"]));
    assert_eq!(body["row_count"], 1);
    assert_eq!(body["rows"], json!([["\"Lake\"@en"]]));

    let (status, body) = send(&app, Method::POST, &uri, Some(json!({ "query": "select where {" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    let _ = fs::remove_dir_all(&directory);
}

#[tokio::test]
async fn codes_are_checked_renamed_and_removed() {
    let (app, directory) = app("codes");
    let free = |code: &str| format!("/v1/thesauri/{}/concepts/free?namespace={}&code={}", KEY, NS_PARAM, code);
    let (status, body) = send(&app, Method::GET, &free("lake"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["free"], false);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/v1/thesauri/{}/concepts/rename", KEY),
        Some(json!({ "namespace": NS, "old_code": "lake", "new_code": "pond" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["renamed"], 3);
    let (_, body) = send(&app, Method::GET, &free("lake"), None).await;
    assert_eq!(body["free"], true);

    let removal = format!("/v1/thesauri/{}/concepts?namespace={}&code=pond", KEY, NS_PARAM);
    let (status, body) = send(&app, Method::DELETE, &removal, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 3);

    let (status, body) = send(&app, Method::GET, "/v1/thesauri", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["key"], KEY);
    assert_eq!(body[0]["title"], "Regions");
    assert_eq!(body[0]["statements"], 2);

    let (status, _) = send(&app, Method::POST, &format!("/v1/thesauri/{}/save", KEY), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let saved = fs::read_to_string(directory.join("regions.rdf")).expect("saved document");
    assert!(!saved.contains("pond"));
    let _ = fs::remove_dir_all(&directory);
}
