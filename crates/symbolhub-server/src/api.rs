use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        multipart::{Field, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use symbolhub_shared::constants::APP_NAME;
use symbolhub_shared::{
    parse_id, parse_offset, AssetProperties, Credentials, NewAsset, NewPost, PostEdit, RawTags,
    SearchFields, ValidationError,
};
use symbolhub_store::{Post, SearchHit, TagUsage, UserPosts, UserProfile};

use crate::auth::{resolve_acting_user, IssuedSession, SessionKeys};
use crate::config::ServerConfig;
use crate::db::Db;
use crate::error::ServerError;
use crate::object_store::{ObjectKind, ObjectStore, SignedUrl};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub objects: Arc<ObjectStore>,
    pub sessions: Arc<SessionKeys>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    // Asset, preview and the text fields of one upload.
    let body_limit = state
        .config
        .max_upload_size
        .saturating_mul(2)
        .saturating_add(64 * 1024);

    Router::new()
        .route("/health", get(health_check))
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/search", get(search_posts))
        .route("/posts/:id", get(get_post).put(edit_post))
        .route("/posts/:id/download", get(download_post))
        .route("/users/:id/posts", get(list_user_posts))
        .route("/tags", get(list_tags))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/objects/:key", get(get_object))
        .route("/previews/:key", get(get_preview))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    name: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct ListQuery {
    offset: Option<String>,
}

#[derive(Deserialize)]
struct SearchQueryParams {
    q: Option<String>,
    cols: Option<String>,
}

#[derive(Deserialize)]
struct ObjectQuery {
    expires: i64,
    sig: String,
}

#[derive(Serialize)]
struct AuthResponse {
    user: UserProfile,
    #[serde(flatten)]
    session: IssuedSession,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: APP_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─── Catalog reads ───

async fn list_posts(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Post>>, ServerError> {
    let Query(query) = query?;
    let offset = parse_offset(query.offset.as_deref())?;
    let posts = state.db.run(move |db| db.list_posts(offset)).await?;
    Ok(Json(posts))
}

async fn search_posts(
    State(state): State<AppState>,
    query: Result<Query<SearchQueryParams>, QueryRejection>,
) -> Result<Json<Vec<SearchHit>>, ServerError> {
    let Query(query) = query?;
    let fields = SearchFields::parse_list(query.cols.as_deref().unwrap_or(""))?;
    let hits = state
        .db
        .run(move |db| db.search_posts(query.q.as_deref(), fields))
        .await?;
    Ok(Json(hits))
}

async fn get_post(
    State(state): State<AppState>,
    raw_id: Result<Path<String>, PathRejection>,
) -> Result<Json<Post>, ServerError> {
    let Path(raw_id) = raw_id?;
    let id = parse_id(&raw_id)?;
    let post = state.db.run(move |db| db.get_post(id)).await?;
    Ok(Json(post))
}

async fn list_user_posts(
    State(state): State<AppState>,
    raw_id: Result<Path<String>, PathRejection>,
) -> Result<Json<UserPosts>, ServerError> {
    let Path(raw_id) = raw_id?;
    let id = parse_id(&raw_id)?;
    let listing = state.db.run(move |db| db.list_posts_by_user(id)).await?;
    Ok(Json(listing))
}

async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagUsage>>, ServerError> {
    let tags = state.db.run(|db| db.list_tags()).await?;
    Ok(Json(tags))
}

// ─── Catalog writes ───

/// Fields of a `POST /posts` multipart form.
#[derive(Default)]
struct PostForm {
    file: Option<Bytes>,
    preview: Option<Bytes>,
    title: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    name: Option<String>,
    sound: Option<u32>,
    layers: Option<u32>,
}

impl PostForm {
    async fn read(multipart: &mut Multipart) -> Result<Self, ServerError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "file" => form.file = Some(field_bytes(field).await?),
                "preview" => form.preview = Some(field_bytes(field).await?),
                "title" => form.title = Some(field_text(field).await?),
                "description" => form.description = Some(field_text(field).await?),
                "tags" => form.tags.push(field_text(field).await?),
                "name" => form.name = Some(field_text(field).await?).filter(|s| !s.is_empty()),
                "sound" => form.sound = parse_number("sound", &field_text(field).await?)?,
                "layers" => form.layers = parse_number("layers", &field_text(field).await?)?,
                other => debug!(field = other, "Ignoring unknown multipart field"),
            }
        }

        Ok(form)
    }
}

async fn field_bytes(field: Field<'_>) -> Result<Bytes, ServerError> {
    field
        .bytes()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))
}

async fn field_text(field: Field<'_>) -> Result<String, ServerError> {
    field
        .text()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))
}

/// Empty means absent.
fn parse_number(field: &str, raw: &str) -> Result<Option<u32>, ServerError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| ServerError::BadRequest(format!("{field} must be a non-negative integer")))
}

/// Objects written ahead of the catalog transaction that does not exist yet.
///
/// Unless [`PendingObjects::keep`] is called the objects are removed again:
/// explicitly through [`PendingObjects::discard`] on an error path, or from
/// `Drop` when the request future is dropped mid-upload.
struct PendingObjects {
    objects: Arc<ObjectStore>,
    written: Vec<(ObjectKind, String)>,
}

impl PendingObjects {
    fn new(objects: Arc<ObjectStore>) -> Self {
        Self {
            objects,
            written: Vec::new(),
        }
    }

    /// The key is tracked before the write so a partial file is also removed.
    async fn put(&mut self, kind: ObjectKind, key: &str, data: &[u8]) -> Result<(), ServerError> {
        self.written.push((kind, key.to_string()));
        self.objects.put(kind, key, data).await
    }

    /// The catalog now references the objects.
    fn keep(mut self) {
        self.written.clear();
    }

    async fn discard(mut self) {
        for (kind, key) in std::mem::take(&mut self.written) {
            discard_object(&self.objects, kind, &key).await;
        }
    }
}

impl Drop for PendingObjects {
    fn drop(&mut self) {
        if self.written.is_empty() {
            return;
        }
        let written = std::mem::take(&mut self.written);
        let objects = Arc::clone(&self.objects);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(count = written.len(), "Removing objects of an abandoned upload");
                handle.spawn(async move {
                    for (kind, key) in written {
                        discard_object(&objects, kind, &key).await;
                    }
                });
            }
            Err(_) => warn!(count = written.len(), "Objects of an abandoned upload left behind"),
        }
    }
}

/// Store the uploaded objects, then run the catalog write. Objects written
/// for a request whose catalog write fails, or that is abandoned before the
/// write completes, are removed again.
async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Post>), ServerError> {
    let acting = resolve_acting_user(&headers, &state.sessions)?;
    let mut multipart = multipart?;
    let form = PostForm::read(&mut multipart).await?;

    let file = form.file.ok_or(ValidationError::MissingField("file"))?;
    let preview = form.preview.ok_or(ValidationError::MissingField("preview"))?;

    let asset_key = ObjectStore::new_key();
    let preview_key = ObjectStore::new_key();
    let new_post = NewPost {
        asset: NewAsset {
            storage_key: asset_key.clone(),
            preview_url: state.objects.preview_url(&preview_key),
            properties: AssetProperties {
                name: form.name,
                sound: form.sound,
                layers: form.layers,
            },
        },
        title: form.title.unwrap_or_default(),
        description: form.description,
        tags: RawTags::List(form.tags),
    };
    new_post.validate()?;

    let mut pending = PendingObjects::new(Arc::clone(&state.objects));
    for (kind, key, data) in [
        (ObjectKind::Asset, &asset_key, &file),
        (ObjectKind::Preview, &preview_key, &preview),
    ] {
        if let Err(e) = pending.put(kind, key, data).await {
            pending.discard().await;
            return Err(e);
        }
    }

    let owner = acting.user_id();
    match state.db.run(move |db| db.create_post(owner, &new_post)).await {
        Ok(post) => {
            pending.keep();
            info!(
                post_id = post.id,
                user_id = owner,
                size = file.len(),
                "Post created via API"
            );
            Ok((StatusCode::CREATED, Json(post)))
        }
        Err(e) => {
            pending.discard().await;
            Err(e)
        }
    }
}

async fn discard_object(objects: &ObjectStore, kind: ObjectKind, key: &str) {
    if let Err(e) = objects.delete(kind, key).await {
        warn!(key, error = %e, "Failed to remove orphaned object");
    }
}

/// Only the owner may edit a post; anonymous callers act as the anonymous
/// user and so can only edit anonymous posts.
async fn edit_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    raw_id: Result<Path<String>, PathRejection>,
    edit: Result<Json<PostEdit>, JsonRejection>,
) -> Result<Json<Post>, ServerError> {
    let Path(raw_id) = raw_id?;
    let id = parse_id(&raw_id)?;
    let Json(edit) = edit?;
    edit.validate()?;
    let actor = resolve_acting_user(&headers, &state.sessions)?.user_id();

    let post = state
        .db
        .run(move |db| {
            if db.post_owner(id)? != actor {
                return Err(ServerError::Forbidden(
                    "only the owner can edit this post".into(),
                ));
            }
            Ok(db.edit_post(id, &edit)?)
        })
        .await?;

    info!(post_id = id, user_id = actor, "Post edited via API");
    Ok(Json(post))
}

// ─── Objects ───

async fn download_post(
    State(state): State<AppState>,
    raw_id: Result<Path<String>, PathRejection>,
) -> Result<Json<SignedUrl>, ServerError> {
    let Path(raw_id) = raw_id?;
    let id = parse_id(&raw_id)?;
    let key = state.db.run(move |db| db.asset_key_for_post(id)).await?;
    Ok(Json(
        state
            .objects
            .signed_url(&key, state.config.download_url_ttl_secs),
    ))
}

async fn get_object(
    State(state): State<AppState>,
    key: Result<Path<String>, PathRejection>,
    query: Result<Query<ObjectQuery>, QueryRejection>,
) -> Result<Response, ServerError> {
    let Path(key) = key?;
    let Query(query) = query?;
    if !state.objects.verify_signature(&key, query.expires, &query.sig) {
        return Err(ServerError::Forbidden("invalid or expired download link".into()));
    }
    let data = state.objects.get(ObjectKind::Asset, &key).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{key}.sar\""))
        .map_err(|e| ServerError::Internal(format!("bad header: {e}")))?;
    let mut response = data.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}

async fn get_preview(
    State(state): State<AppState>,
    key: Result<Path<String>, PathRejection>,
) -> Result<Response, ServerError> {
    let Path(key) = key?;
    let data = state.objects.get(ObjectKind::Preview, &key).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], data).into_response())
}

// ─── Accounts ───

async fn signup(
    State(state): State<AppState>,
    creds: Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ServerError> {
    let Json(creds) = creds?;
    if !state.config.registration_open {
        return Err(ServerError::Forbidden("registration is closed".into()));
    }

    let user = state.db.run(move |db| db.create_user(&creds)).await?;
    let session = state.sessions.issue(user.id);

    info!(user_id = user.id, "Account registered via API");
    Ok((StatusCode::CREATED, Json(AuthResponse { user, session })))
}

async fn login(
    State(state): State<AppState>,
    creds: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<AuthResponse>, ServerError> {
    let Json(creds) = creds?;
    let user = state
        .db
        .run(move |db| db.verify_credentials(&creds))
        .await?
        .ok_or_else(|| ServerError::Unauthorized("invalid username or password".into()))?;
    let session = state.sessions.issue(user.id);

    debug!(user_id = user.id, "Session issued");
    Ok(Json(AuthResponse { user, session }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
