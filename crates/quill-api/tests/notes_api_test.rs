//! Note endpoint integration tests.

mod common;

use common::{tag_names, token, TestApp};
use serde_json::{json, Value};

const ALICE: &str = "user_alice";
const BOB: &str = "user_bob";

// =============================================================================
// AUTHENTICATION
// =============================================================================

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(app.url("/api/note")).send().await.unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn test_bad_token_is_unauthorized() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .get(app.url("/api/note"))
        .bearer_auth("not.a.token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let forged = quill_api::SessionVerifier::new("wrong-secret")
        .sign(&quill_api::SessionClaims::new(ALICE, chrono::Utc::now().timestamp() + 60))
        .unwrap();
    let resp = app
        .client
        .get(app.url("/api/note"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_session_cookie_is_accepted() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .get(app.url("/api/note"))
        .header("cookie", format!("theme=dark; __session={}", token(ALICE)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

// =============================================================================
// CREATE / GET
// =============================================================================

#[tokio::test]
async fn test_create_note_links_each_tag_once() {
    let app = TestApp::spawn().await;

    let created = app.create_note(ALICE, "Groceries", &["a", "b"]).await;
    assert_eq!(created["title"], "Groceries");
    assert_eq!(created["userId"], ALICE);
    assert_eq!(created["isPinned"], false);
    assert_eq!(tag_names(&created), vec!["a", "b"]);

    let id = created["id"].as_str().unwrap();
    let fetched: Value = app
        .get(&format!("/api/note/{}", id), ALICE)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tag_names(&fetched), vec!["a", "b"]);
}

#[tokio::test]
async fn test_create_note_normalizes_tags() {
    let app = TestApp::spawn().await;

    let created = app.create_note(ALICE, "Dupes", &["a", "a", " b ", ""]).await;
    assert_eq!(tag_names(&created), vec!["a", "b"]);
    assert_eq!(app.store.tag_count(ALICE), 2);
}

#[tokio::test]
async fn test_create_note_reuses_existing_tags() {
    let app = TestApp::spawn().await;

    app.create_note(ALICE, "One", &["work"]).await;
    app.create_note(ALICE, "Two", &["work", "home"]).await;
    assert_eq!(app.store.tag_count(ALICE), 2);
}

#[tokio::test]
async fn test_create_note_rejects_overlong_tag() {
    let app = TestApp::spawn().await;

    let resp = app
        .post("/api/note/create", ALICE)
        .json(&json!({ "title": "t", "content": "", "tags": ["x".repeat(101)] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(app.store.note_count(), 0);
}

#[tokio::test]
async fn test_create_note_defaults() {
    let app = TestApp::spawn().await;

    let resp = app
        .post("/api/note/create", ALICE)
        .json(&json!({ "title": "Only a title" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let note: Value = resp.json().await.unwrap();
    assert_eq!(note["content"], "");
    assert!(note["recording"].is_null());
    assert!(note["tags"].as_array().unwrap().is_empty());
}

// =============================================================================
// OWNERSHIP
// =============================================================================

#[tokio::test]
async fn test_foreign_note_is_forbidden() {
    let app = TestApp::spawn().await;
    let note = app.create_note(ALICE, "Private", &[]).await;
    let path = format!("/api/note/{}", note["id"].as_str().unwrap());

    let get = app.get(&path, BOB).send().await.unwrap();
    assert_eq!(get.status(), 403);

    let patch = app
        .patch(&path, BOB)
        .json(&json!({ "title": "hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(patch.status(), 403);

    let delete = app.delete(&path, BOB).send().await.unwrap();
    assert_eq!(delete.status(), 403);

    // Untouched
    let fetched: Value = app.get(&path, ALICE).send().await.unwrap().json().await.unwrap();
    assert_eq!(fetched["title"], "Private");
}

#[tokio::test]
async fn test_missing_note_is_not_found() {
    let app = TestApp::spawn().await;
    let path = format!("/api/note/{}", uuid::Uuid::now_v7());

    assert_eq!(app.get(&path, ALICE).send().await.unwrap().status(), 404);
    assert_eq!(
        app.patch(&path, ALICE)
            .json(&json!({ "title": "x" }))
            .send()
            .await
            .unwrap()
            .status(),
        404
    );
    let resp = app.delete(&path, ALICE).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Note not found");
}

#[tokio::test]
async fn test_pin_foreign_or_missing_note_is_forbidden() {
    let app = TestApp::spawn().await;
    let note = app.create_note(ALICE, "Mine", &[]).await;

    let foreign = app
        .patch(&format!("/api/note/pin/{}", note["id"].as_str().unwrap()), BOB)
        .json(&json!({ "isPinned": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(foreign.status(), 403);

    let missing = app
        .patch(&format!("/api/note/pin/{}", uuid::Uuid::now_v7()), ALICE)
        .json(&json!({ "isPinned": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 403);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized");
}

// =============================================================================
// UPDATE / PIN / DELETE
// =============================================================================

#[tokio::test]
async fn test_patch_updates_present_fields_only() {
    let app = TestApp::spawn().await;
    let note = app.create_note(ALICE, "Draft", &["x"]).await;
    let path = format!("/api/note/{}", note["id"].as_str().unwrap());

    let updated: Value = app
        .patch(&path, ALICE)
        .json(&json!({ "content": "<p>edited</p>" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["title"], "Draft");
    assert_eq!(updated["content"], "<p>edited</p>");
    assert_eq!(tag_names(&updated), vec!["x"]);
}

#[tokio::test]
async fn test_patch_replaces_tag_set() {
    let app = TestApp::spawn().await;
    let note = app.create_note(ALICE, "Tagged", &["old", "keep"]).await;
    let path = format!("/api/note/{}", note["id"].as_str().unwrap());

    let updated: Value = app
        .patch(&path, ALICE)
        .json(&json!({ "tags": ["keep", "new", "new"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tag_names(&updated), vec!["keep", "new"]);

    // Autosave repeats the same body
    let again: Value = app
        .patch(&path, ALICE)
        .json(&json!({ "tags": ["keep", "new", "new"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tag_names(&again), vec!["keep", "new"]);
}

#[tokio::test]
async fn test_patch_null_recording_clears_it() {
    let app = TestApp::spawn().await;
    let resp = app
        .post("/api/note/create", ALICE)
        .json(&json!({ "title": "Memo", "recording": "http://cdn.example/r.wav" }))
        .send()
        .await
        .unwrap();
    let note: Value = resp.json().await.unwrap();
    assert_eq!(note["recording"], "http://cdn.example/r.wav");
    let path = format!("/api/note/{}", note["id"].as_str().unwrap());

    let kept: Value = app
        .patch(&path, ALICE)
        .json(&json!({ "title": "Memo 2" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(kept["recording"], "http://cdn.example/r.wav");

    let cleared: Value = app
        .patch(&path, ALICE)
        .json(&json!({ "recording": null }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(cleared["recording"].is_null());
}

#[tokio::test]
async fn test_pin_and_unpin() {
    let app = TestApp::spawn().await;
    let note = app.create_note(ALICE, "Pin me", &[]).await;
    let path = format!("/api/note/pin/{}", note["id"].as_str().unwrap());

    let pinned: Value = app
        .patch(&path, ALICE)
        .json(&json!({ "isPinned": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pinned["isPinned"], true);

    let unpinned: Value = app
        .patch(&path, ALICE)
        .json(&json!({ "isPinned": false }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unpinned["isPinned"], false);
}

#[tokio::test]
async fn test_delete_note() {
    let app = TestApp::spawn().await;
    let note = app.create_note(ALICE, "Bye", &["t"]).await;
    let path = format!("/api/note/{}", note["id"].as_str().unwrap());

    let resp = app.delete(&path, ALICE).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Note deleted successfully");

    assert_eq!(app.get(&path, ALICE).send().await.unwrap().status(), 404);
}

// =============================================================================
// LISTING
// =============================================================================

async fn list(app: &TestApp, query: &str) -> Vec<String> {
    let notes: Vec<Value> = app
        .get(&format!("/api/note{}", query), ALICE)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    notes
        .iter()
        .map(|n| n["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_list_pinned_first_then_newest() {
    let app = TestApp::spawn().await;
    let first = app.create_note(ALICE, "first", &[]).await;
    app.create_note(ALICE, "second", &[]).await;
    app.create_note(ALICE, "third", &[]).await;
    app.create_note(BOB, "bob's", &[]).await;

    app.patch(
        &format!("/api/note/pin/{}", first["id"].as_str().unwrap()),
        ALICE,
    )
    .json(&json!({ "isPinned": true }))
    .send()
    .await
    .unwrap();

    assert_eq!(list(&app, "").await, vec!["first", "third", "second"]);
}

#[tokio::test]
async fn test_list_filters_and_title_sort() {
    let app = TestApp::spawn().await;
    app.create_note(ALICE, "Meeting notes", &["work"]).await;
    app.create_note(ALICE, "groceries", &["home"]).await;
    app.create_note(ALICE, "Budget", &["work"]).await;

    assert_eq!(list(&app, "?q=MEET").await, vec!["Meeting notes"]);
    assert_eq!(
        list(&app, "?tag=work&sort=title").await,
        vec!["Budget", "Meeting notes"]
    );
    assert_eq!(
        list(&app, "?sort=title").await,
        vec!["Budget", "groceries", "Meeting notes"]
    );
    assert!(list(&app, "?tag=Work").await.is_empty());
}

#[tokio::test]
async fn test_list_rejects_unknown_sort() {
    let app = TestApp::spawn().await;
    let resp = app.get("/api/note?sort=size", ALICE).send().await.unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_tags_are_scoped_to_user() {
    let app = TestApp::spawn().await;
    app.create_note(ALICE, "a", &["work", "alpha"]).await;
    app.create_note(BOB, "b", &["bob-only", "work"]).await;

    let tags: Value = app
        .get("/api/note/tags", ALICE)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tags, json!([{ "name": "alpha" }, { "name": "work" }]));
}

#[tokio::test]
async fn test_dashboard_groups_new_notes_under_today() {
    let app = TestApp::spawn().await;
    app.create_note(ALICE, "fresh", &[]).await;

    let sections: Vec<Value> = app
        .get("/api/note/dashboard?tzOffset=0", ALICE)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let labels: Vec<&str> = sections
        .iter()
        .map(|s| s["label"].as_str().unwrap())
        .collect();
    assert_eq!(
        labels,
        vec!["Today", "Yesterday", "Previous 7 days", "Previous 30 days"]
    );
    let today = sections[0]["notes"].as_array().unwrap();
    assert_eq!(today.len(), 1);
    assert_eq!(today[0]["title"], "fresh");
    assert_eq!(today[0]["preview"], "fresh");
}

#[tokio::test]
async fn test_dashboard_rejects_out_of_range_offset() {
    let app = TestApp::spawn().await;
    let resp = app
        .get("/api/note/dashboard?tzOffset=100000", ALICE)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

// =============================================================================
// MALFORMED INPUT
// =============================================================================

async fn assert_json_bad_request(resp: reqwest::Response) {
    assert_eq!(resp.status(), 400);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    let body: Value = resp.json().await.unwrap();
    assert!(!body["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_non_uuid_note_id_is_json_bad_request() {
    let app = TestApp::spawn().await;

    assert_json_bad_request(app.get("/api/note/not-a-uuid", ALICE).send().await.unwrap()).await;
    assert_json_bad_request(
        app.delete("/api/note/not-a-uuid", ALICE)
            .send()
            .await
            .unwrap(),
    )
    .await;
}

#[tokio::test]
async fn test_malformed_json_body_is_json_bad_request() {
    let app = TestApp::spawn().await;

    let resp = app
        .post("/api/note/create", ALICE)
        .header("content-type", "application/json")
        .body("{bad")
        .send()
        .await
        .unwrap();
    assert_json_bad_request(resp).await;

    let wrong_type = app
        .post("/api/note/create", ALICE)
        .header("content-type", "application/json")
        .body(r#"{"title": 42}"#)
        .send()
        .await
        .unwrap();
    assert_json_bad_request(wrong_type).await;
}

#[tokio::test]
async fn test_non_numeric_offset_is_json_bad_request() {
    let app = TestApp::spawn().await;

    let resp = app
        .get("/api/note/dashboard?tzOffset=abc", ALICE)
        .send()
        .await
        .unwrap();
    assert_json_bad_request(resp).await;
}
