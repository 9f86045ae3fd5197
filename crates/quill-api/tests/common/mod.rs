//! Shared helpers for API integration tests.
//!
//! The router runs on `127.0.0.1:0` against in-memory repositories and a
//! filesystem storage backend in a temporary directory.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use quill_api::{
    build_router, AppState, GlobalRateLimiter, HttpSettings, IdentityProvider, IdentityUser,
    SessionClaims, SessionVerifier,
};
use quill_core::{
    new_v7, CreateNoteRequest, Error, GenerationBackend, NewUser, Note, NoteRepository, Result,
    Tag, TagRepository, UpdateNoteRequest, User, UserRepository,
};
use quill_db::{FilesystemBackend, StorageBackend};

pub const SECRET: &str = "integration-test-secret";

// =============================================================================
// IN-MEMORY REPOSITORIES
// =============================================================================

#[derive(Default)]
struct StoreInner {
    notes: HashMap<Uuid, Note>,
    /// note id -> linked tag ids
    links: HashMap<Uuid, Vec<Uuid>>,
    tags: Vec<Tag>,
    users: HashMap<String, User>,
}

impl StoreInner {
    fn upsert_tag(&mut self, user_id: &str, name: &str) -> Tag {
        if let Some(tag) = self
            .tags
            .iter()
            .find(|t| t.user_id == user_id && t.name == name)
        {
            return tag.clone();
        }
        let tag = Tag {
            id: new_v7(),
            name: name.to_string(),
            user_id: user_id.to_string(),
        };
        self.tags.push(tag.clone());
        tag
    }

    fn link(&mut self, note_id: Uuid, user_id: &str, names: &[String]) {
        let ids: Vec<Uuid> = names
            .iter()
            .map(|name| self.upsert_tag(user_id, name).id)
            .collect();
        self.links.insert(note_id, ids);
    }

    fn assemble(&self, id: Uuid) -> Result<Note> {
        let mut note = self.notes.get(&id).cloned().ok_or(Error::NoteNotFound(id))?;
        let linked = self.links.get(&id).cloned().unwrap_or_default();
        let mut tags: Vec<Tag> = self
            .tags
            .iter()
            .filter(|t| linked.contains(&t.id))
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        note.tags = tags;
        Ok(note)
    }
}

/// Repositories backed by one shared in-memory store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl InMemoryStore {
    pub fn tag_count(&self, user_id: &str) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.tags.iter().filter(|t| t.user_id == user_id).count()
    }

    pub fn user(&self, id: &str) -> Option<User> {
        self.inner.lock().unwrap().users.get(id).cloned()
    }

    pub fn note_count(&self) -> usize {
        self.inner.lock().unwrap().notes.len()
    }
}

#[async_trait]
impl NoteRepository for InMemoryStore {
    async fn insert(&self, req: CreateNoteRequest) -> Result<Note> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let id = new_v7();
        inner.notes.insert(
            id,
            Note {
                id,
                title: req.title,
                content: req.content,
                recording: req.recording,
                is_pinned: false,
                date: now,
                updated_at: now,
                user_id: req.user_id.clone(),
                tags: Vec::new(),
            },
        );
        inner.link(id, &req.user_id, &req.tags);
        inner.assemble(id)
    }

    async fn fetch(&self, id: Uuid) -> Result<Note> {
        self.inner.lock().unwrap().assemble(id)
    }

    async fn owner_of(&self, id: Uuid) -> Result<Option<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.notes.get(&id).map(|n| n.user_id.clone()))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Note>> {
        let inner = self.inner.lock().unwrap();
        let mut notes = inner
            .notes
            .values()
            .filter(|n| n.user_id == user_id)
            .map(|n| inner.assemble(n.id))
            .collect::<Result<Vec<_>>>()?;
        notes.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(notes)
    }

    async fn update(&self, id: Uuid, req: UpdateNoteRequest) -> Result<Note> {
        let mut inner = self.inner.lock().unwrap();
        let note = inner.notes.get_mut(&id).ok_or(Error::NoteNotFound(id))?;
        if let Some(title) = req.title {
            note.title = title;
        }
        if let Some(content) = req.content {
            note.content = content;
        }
        if let Some(recording) = req.recording {
            note.recording = recording;
        }
        note.updated_at = Utc::now();
        let owner = note.user_id.clone();
        if let Some(tags) = req.tags {
            inner.link(id, &owner, &tags);
        }
        inner.assemble(id)
    }

    async fn set_pinned(&self, id: Uuid, pinned: bool) -> Result<Note> {
        let mut inner = self.inner.lock().unwrap();
        let note = inner.notes.get_mut(&id).ok_or(Error::NoteNotFound(id))?;
        note.is_pinned = pinned;
        inner.assemble(id)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.notes.remove(&id).ok_or(Error::NoteNotFound(id))?;
        inner.links.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl TagRepository for InMemoryStore {
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Tag>> {
        let inner = self.inner.lock().unwrap();
        let mut tags: Vec<Tag> = inner
            .tags
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn fetch(&self, id: &str) -> Result<Option<User>> {
        Ok(self.user(id))
    }

    async fn insert_if_absent(&self, user: NewUser) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.contains_key(&user.id) {
            return Ok(false);
        }
        inner.users.insert(
            user.id.clone(),
            User {
                id: user.id,
                email: user.email,
                full_name: user.full_name,
                created_at: Utc::now(),
            },
        );
        Ok(true)
    }
}

// =============================================================================
// IDENTITY PROVIDER
// =============================================================================

/// Identity provider serving a fixed set of profiles.
#[derive(Default)]
pub struct FakeIdentity {
    users: HashMap<String, IdentityUser>,
}

impl FakeIdentity {
    pub fn with_user(mut self, user: IdentityUser) -> Self {
        self.users.insert(user.id.clone(), user);
        self
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn get_user(&self, user_id: &str) -> Result<IdentityUser> {
        self.users
            .get(user_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("User not found: {}", user_id)))
    }
}

pub fn identity_user(id: &str, email: &str, first: &str, last: &str) -> IdentityUser {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "email_addresses": [{ "id": "idn_1", "email_address": email }],
        "first_name": first,
        "last_name": last,
    }))
    .unwrap()
}

// =============================================================================
// TEST SERVER
// =============================================================================

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub store: InMemoryStore,
    pub storage: Arc<FilesystemBackend>,
    pub files: tempfile::TempDir,
}

/// Builder for a running test server.
#[derive(Default)]
pub struct TestAppBuilder {
    identity: Option<Arc<dyn IdentityProvider>>,
    generator: Option<Arc<dyn GenerationBackend>>,
    rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

impl TestAppBuilder {
    pub fn identity(mut self, identity: impl IdentityProvider + 'static) -> Self {
        self.identity = Some(Arc::new(identity));
        self
    }

    pub fn generator(mut self, generator: impl GenerationBackend + 'static) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    pub fn rate_limiter(mut self, limiter: Option<Arc<GlobalRateLimiter>>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    pub async fn spawn(self) -> TestApp {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let files = tempfile::tempdir().unwrap();
        let storage = Arc::new(FilesystemBackend::new(
            files.path(),
            format!("{}/files", base_url),
        ));
        let store = InMemoryStore::default();

        let mut state = AppState::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            storage.clone() as Arc<dyn StorageBackend>,
            SessionVerifier::new(SECRET),
        )
        .with_rate_limiter(self.rate_limiter);
        if let Some(identity) = self.identity {
            state = state.with_identity(identity);
        }
        if let Some(generator) = self.generator {
            state = state.with_generator(generator);
        }

        let router = build_router(state, HttpSettings::default());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        TestApp {
            base_url,
            client: reqwest::Client::new(),
            store,
            storage,
            files,
        }
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        TestAppBuilder::default().spawn().await
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token(user))
    }

    pub fn post(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token(user))
    }

    pub fn patch(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.client.patch(self.url(path)).bearer_auth(token(user))
    }

    pub fn delete(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token(user))
    }

    /// Create a note through the API and return its JSON.
    pub async fn create_note(&self, user: &str, title: &str, tags: &[&str]) -> serde_json::Value {
        let resp = self
            .post("/api/note/create", user)
            .json(&serde_json::json!({
                "title": title,
                "content": format!("<p>{}</p>", title),
                "tags": tags,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }
}

/// A session token for `user_id` valid for an hour.
pub fn token(user_id: &str) -> String {
    SessionVerifier::new(SECRET)
        .sign(&SessionClaims::new(user_id, Utc::now().timestamp() + 3600))
        .unwrap()
}

pub fn tag_names(note: &serde_json::Value) -> Vec<String> {
    note["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect()
}
