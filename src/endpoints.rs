// Notes API served by the binary
//
// A small in-memory service that exercises each binding style: path
// parameters, query catch-all, JSON/form keywords and the request argument.

use routebind::error::ApiError;
use routebind::{BoundArgs, Endpoint, HandlerError, Reply, Signature};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Application retcode: no note with the requested id
pub const ENOTE_NOT_FOUND: i32 = 2001;

#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub id: u64,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
}

#[derive(Default)]
pub struct NoteStore {
    notes: RwLock<BTreeMap<u64, Note>>,
    next_id: AtomicU64,
}

impl NoteStore {
    async fn insert(&self, title: String, body: String, tags: Vec<String>) -> Note {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let note = Note {
            id,
            title,
            body,
            tags,
        };
        self.notes.write().await.insert(id, note.clone());
        note
    }
}

/// Every endpoint of the notes API, ready for `Router::register_all`
pub fn all(store: &Arc<NoteStore>) -> Vec<Endpoint> {
    let list_store = Arc::clone(store);
    let get_store = Arc::clone(store);
    let create_store = Arc::clone(store);
    let update_store = Arc::clone(store);

    vec![
        Endpoint::get("/api/health", Signature::new("health"), health),
        Endpoint::get("/api/whoami", Signature::new("whoami").request(), whoami),
        Endpoint::get(
            "/api/notes",
            Signature::new("list_notes").var_keyword("kw"),
            move |args: BoundArgs| list_notes(Arc::clone(&list_store), args),
        ),
        Endpoint::get(
            "/api/notes/{id}",
            Signature::new("get_note").positional("id"),
            move |args: BoundArgs| get_note(Arc::clone(&get_store), args),
        ),
        Endpoint::post(
            "/api/notes",
            Signature::new("create_note")
                .request()
                .keyword("title")
                .keyword_with_default("body")
                .keyword_with_default("tags"),
            move |args: BoundArgs| create_note(Arc::clone(&create_store), args),
        ),
        Endpoint::post(
            "/api/notes/{id}",
            Signature::new("update_note").positional("id").var_keyword("kw"),
            move |args: BoundArgs| update_note(Arc::clone(&update_store), args),
        ),
    ]
}

async fn health(_args: BoundArgs) -> Result<Reply, HandlerError> {
    Ok(json!({"status": "ok"}))
}

async fn whoami(args: BoundArgs) -> Result<Reply, HandlerError> {
    let request = args
        .request()
        .ok_or_else(|| ApiError::missing_argument("request"))?;
    Ok(json!({
        "method": request.method().as_str(),
        "path": request.path(),
        "user_agent": request.header("user-agent"),
    }))
}

/// `GET /api/notes?tag=a&tag=b&limit=10`
async fn list_notes(store: Arc<NoteStore>, args: BoundArgs) -> Result<Reply, HandlerError> {
    let tags: Vec<String> = args.take("tag")?.unwrap_or_default();
    let limit = match args.str("limit") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|e| ApiError::invalid_argument("limit", e))?,
        None => usize::MAX,
    };

    let notes = store.notes.read().await;
    let matching: Vec<&Note> = notes
        .values()
        .filter(|note| tags.iter().all(|t| note.tags.contains(t)))
        .take(limit)
        .collect();
    Ok(json!({"notes": matching}))
}

async fn get_note(store: Arc<NoteStore>, args: BoundArgs) -> Result<Reply, HandlerError> {
    let id = note_id(&args)?;
    let notes = store.notes.read().await;
    let note = notes.get(&id).ok_or_else(|| not_found(id))?;
    Ok(json!({"note": note}))
}

async fn create_note(store: Arc<NoteStore>, args: BoundArgs) -> Result<Reply, HandlerError> {
    let title: String = args.require("title")?;
    let body: String = args.take("body")?.unwrap_or_default();
    let tags = parse_tags(&args)?;

    if let Some(request) = args.request() {
        tracing::debug!(path = request.path(), "creating note {title:?}");
    }
    let note = store.insert(title, body, tags).await;
    Ok(json!({"note": note}))
}

/// Partial update; the id always comes from the path
async fn update_note(store: Arc<NoteStore>, args: BoundArgs) -> Result<Reply, HandlerError> {
    let id = note_id(&args)?;
    let mut notes = store.notes.write().await;
    let note = notes.get_mut(&id).ok_or_else(|| not_found(id))?;

    if let Some(title) = args.take::<String>("title")? {
        note.title = title;
    }
    if let Some(body) = args.take::<String>("body")? {
        note.body = body;
    }
    if args.contains("tags") {
        note.tags = parse_tags(&args)?;
    }
    Ok(json!({"note": note}))
}

fn note_id(args: &BoundArgs) -> Result<u64, ApiError> {
    let raw = args.str("id").ok_or_else(|| ApiError::missing_argument("id"))?;
    raw.parse().map_err(|e| ApiError::invalid_argument("id", e))
}

/// Tags arrive as a JSON list or as one comma separated form field
fn parse_tags(args: &BoundArgs) -> Result<Vec<String>, ApiError> {
    match args.get("tags") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(raw)) => Ok(raw
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
            .collect()),
        Some(_) => args.require("tags"),
    }
}

fn not_found(id: u64) -> ApiError {
    ApiError::new(ENOTE_NOT_FOUND, format!("Note {id} not found"))
}
