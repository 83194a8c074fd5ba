//! HTTP + WebSocket gateway.
//!
//! REST surface over the article service and users repository, plus the
//! `/ws` event stream that forwards every published change event to each
//! connected client. All responses carry a `success` envelope; the error
//! taxonomy maps onto 400/401/403/404/500.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use futures_util::{sink::SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

use crate::auth::{hash_password, verify_password, AuthClaims, TokenService};
use crate::error::{PortalError, PortalResult};
use crate::events::EventBroadcaster;
use crate::media::{FileMediaStore, MediaStore};
use crate::policy::{authorize, NewsAction};
use crate::service::{CreateArticle, NewsService};
use crate::store::NewsStore;
use crate::types::{Article, ArticleUpdate, Comment, Role, UserView};
use crate::users::{NewUser, UserStore};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: String,
    pub data_file: PathBuf,
    pub uploads_dir: PathBuf,
    pub token_secret: String,
    pub channel_capacity: usize,
}

pub struct GatewayState {
    pub service: NewsService,
    pub users: Arc<UserStore>,
    pub tokens: TokenService,
    pub media: Arc<dyn MediaStore>,
    pub events: Arc<EventBroadcaster>,
    uploads_dir: PathBuf,
}

/// Wire up stores, service and broadcaster from the config.
pub fn build_state(config: &GatewayConfig) -> Arc<GatewayState> {
    let events = Arc::new(EventBroadcaster::new(config.channel_capacity));
    let store = Arc::new(NewsStore::open(&config.data_file));
    let service = NewsService::new(store, events.clone());
    Arc::new(GatewayState {
        service,
        users: Arc::new(UserStore::seeded()),
        tokens: TokenService::new(config.token_secret.clone().into_bytes()),
        media: Arc::new(FileMediaStore::new(&config.uploads_dir, "/uploads")),
        events,
        uploads_dir: config.uploads_dir.clone(),
    })
}

pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/users", get(users_list_handler))
        .route("/api/users/me", get(users_me_handler))
        .route("/api/users/:id", delete(users_delete_handler))
        .route("/api/news", get(news_list_handler).post(news_create_handler))
        .route(
            "/api/news/breaking-news",
            get(breaking_news_handler).post(set_breaking_news_handler),
        )
        .route("/api/news/upload", post(upload_handler))
        .route(
            "/api/news/:id",
            get(news_get_handler)
                .put(news_update_handler)
                .delete(news_delete_handler),
        )
        .route("/api/news/:id/view", post(news_view_handler))
        .route("/api/news/:id/like", post(news_like_handler))
        .route("/api/news/:id/featured", patch(news_featured_handler))
        .route("/api/news/:id/comments", post(comment_add_handler))
        .route(
            "/api/news/:id/comments/:comment_id",
            delete(comment_delete_handler),
        )
        .route("/ws", get(ws_handler))
        .route("/uploads/:file", get(uploads_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start(config: GatewayConfig) -> anyhow::Result<()> {
    let state = build_state(&config);
    let router = build_router(state);
    let listener = TcpListener::bind(config.bind_addr.as_str()).await?;
    info!(addr = %config.bind_addr, "newswire gateway listening");
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = match &self {
            PortalError::Validation(_) => StatusCode::BAD_REQUEST,
            PortalError::Authentication(_) => StatusCode::UNAUTHORIZED,
            PortalError::Forbidden(_) => StatusCode::FORBIDDEN,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(%self, "request failed on persistence");
        }
        (
            status,
            Json(ErrorBody {
                success: false,
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Ids arrive as path segments; anything that is not a number can never
/// resolve to a record, so it reports as not-found rather than a parse error.
fn parse_id<T: std::str::FromStr>(raw: &str) -> PortalResult<T> {
    raw.parse()
        .map_err(|_| PortalError::NotFound(format!("no record with id {}", raw)))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Claims when a token is present and valid, `None` when absent, 401 when
/// present but invalid. Routes that require authentication rely on the
/// policy to reject the `None` case.
fn optional_claims(state: &GatewayState, headers: &HeaderMap) -> PortalResult<Option<AuthClaims>> {
    match bearer_token(headers) {
        Some(token) => state.tokens.verify(token).map(Some),
        None => Ok(None),
    }
}

fn require_claims(state: &GatewayState, headers: &HeaderMap) -> PortalResult<AuthClaims> {
    optional_claims(state, headers)?.ok_or_else(|| {
        PortalError::Authentication("access denied, no token provided".to_string())
    })
}

// ---------------------------------------------------------------------------
// Auth routes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    success: bool,
    message: String,
    token: String,
    user: UserView,
}

async fn login_handler(
    State(state): State<Arc<GatewayState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, PortalError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(PortalError::Validation(
            "email and password are required".to_string(),
        ));
    }
    let user = state.users.find_by_email(&payload.email)?;
    let user = match user {
        Some(user) if verify_password(&payload.password, &user.password_hash) => user,
        _ => {
            debug!(email = %payload.email, "login rejected");
            return Err(PortalError::Authentication(
                "invalid credentials".to_string(),
            ));
        }
    };
    let token = state.tokens.issue(&user)?;
    info!(user_id = user.id, "login succeeded");
    Ok(Json(LoginResponse {
        success: true,
        message: "login succeeded".to_string(),
        token,
        user: UserView::from(&user),
    }))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    role: String,
    sector: Option<String>,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    success: bool,
    message: String,
    user: UserView,
}

fn parse_role(role: &str, sector: Option<String>) -> PortalResult<Role> {
    match role {
        "chief-editor" => Ok(Role::ChiefEditor),
        "sectorial-editor" => {
            let sector = sector
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    PortalError::Validation("sectorial editors need a sector".to_string())
                })?;
            Ok(Role::SectorialEditor { sector })
        }
        other => Err(PortalError::Validation(format!("unknown role: {}", other))),
    }
}

async fn register_handler(
    State(state): State<Arc<GatewayState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), PortalError> {
    if payload.name.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.password.is_empty()
        || payload.role.trim().is_empty()
    {
        return Err(PortalError::Validation(
            "name, email, password and role are required".to_string(),
        ));
    }
    let role = parse_role(&payload.role, payload.sector)?;
    let salt = uuid::Uuid::new_v4().simple().to_string();
    let user = state.users.create(NewUser {
        name: payload.name,
        email: payload.email,
        password_hash: hash_password(&payload.password, &salt),
        role,
    })?;
    info!(user_id = user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "user created".to_string(),
            user: UserView::from(&user),
        }),
    ))
}

// ---------------------------------------------------------------------------
// User routes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct UsersResponse {
    success: bool,
    users: Vec<UserView>,
}

async fn users_list_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<Json<UsersResponse>, PortalError> {
    let claims = require_claims(&state, &headers)?;
    authorize(Some(&claims.actor()), &NewsAction::ListUsers)?;
    let users = state.users.list()?;
    Ok(Json(UsersResponse {
        success: true,
        users: users.iter().map(UserView::from).collect(),
    }))
}

#[derive(Debug, Serialize)]
struct UserResponse {
    success: bool,
    user: UserView,
}

async fn users_me_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, PortalError> {
    let claims = require_claims(&state, &headers)?;
    authorize(Some(&claims.actor()), &NewsAction::ReadSelf)?;
    let user = state
        .users
        .find_by_id(claims.sub)?
        .ok_or_else(|| PortalError::NotFound(format!("user {}", claims.sub)))?;
    Ok(Json(UserResponse {
        success: true,
        user: UserView::from(&user),
    }))
}

#[derive(Debug, Serialize)]
struct DeletedResponse {
    success: bool,
    message: String,
}

async fn users_delete_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, PortalError> {
    let id: u64 = parse_id(&id)?;
    let claims = require_claims(&state, &headers)?;
    authorize(Some(&claims.actor()), &NewsAction::DeleteUser { target_id: id })?;
    if !state.users.delete(id)? {
        return Err(PortalError::NotFound(format!("user {}", id)));
    }
    info!(user_id = id, deleted_by = claims.sub, "user deleted");
    Ok(Json(DeletedResponse {
        success: true,
        message: "user deleted".to_string(),
    }))
}

// ---------------------------------------------------------------------------
// News routes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ListQuery {
    category: Option<String>,
    search: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewsListResponse {
    success: bool,
    news: Vec<Article>,
}

async fn news_list_handler(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<ListQuery>,
) -> Json<NewsListResponse> {
    let news = state
        .service
        .list(params.category.as_deref(), params.search.as_deref())
        .await;
    Json(NewsListResponse {
        success: true,
        news,
    })
}

#[derive(Debug, Serialize)]
struct NewsItemResponse {
    success: bool,
    news: Article,
}

async fn news_get_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<Json<NewsItemResponse>, PortalError> {
    let news = state.service.get(parse_id(&id)?).await?;
    Ok(Json(NewsItemResponse {
        success: true,
        news,
    }))
}

#[derive(Debug, Serialize)]
struct ViewsResponse {
    success: bool,
    views: u64,
}

async fn news_view_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<Json<ViewsResponse>, PortalError> {
    let article = state.service.increment_views(parse_id(&id)?).await?;
    Ok(Json(ViewsResponse {
        success: true,
        views: article.views,
    }))
}

#[derive(Debug, Deserialize)]
struct CreateNewsRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    excerpt: String,
    #[serde(default)]
    content: String,
    image: Option<String>,
    author: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewsMutationResponse {
    success: bool,
    message: String,
    news: Article,
}

async fn news_create_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateNewsRequest>,
) -> Result<(StatusCode, Json<NewsMutationResponse>), PortalError> {
    let claims = optional_claims(&state, &headers)?;
    let author = payload
        .author
        .filter(|a| !a.trim().is_empty())
        .or_else(|| claims.as_ref().map(|c| c.name.clone()))
        .unwrap_or_default();
    let actor = claims.as_ref().map(AuthClaims::actor);
    let created = state
        .service
        .create(
            actor.as_ref(),
            CreateArticle {
                title: payload.title,
                category: payload.category,
                excerpt: payload.excerpt,
                content: payload.content,
                image: payload.image.filter(|i| !i.trim().is_empty()),
                author,
            },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(NewsMutationResponse {
            success: true,
            message: "article created".to_string(),
            news: created,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct UpdateNewsRequest {
    title: Option<String>,
    category: Option<String>,
    excerpt: Option<String>,
    content: Option<String>,
    image: Option<String>,
    author: Option<String>,
}

async fn news_update_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<UpdateNewsRequest>,
) -> Result<Json<NewsMutationResponse>, PortalError> {
    let id: u64 = parse_id(&id)?;
    let claims = optional_claims(&state, &headers)?;
    let actor = claims.as_ref().map(AuthClaims::actor);
    // Blank strings mean "leave unchanged", same as absent fields.
    let updates = ArticleUpdate {
        title: payload.title.filter(|s| !s.trim().is_empty()),
        category: payload.category.filter(|s| !s.trim().is_empty()),
        excerpt: payload.excerpt.filter(|s| !s.trim().is_empty()),
        content: payload.content.filter(|s| !s.trim().is_empty()),
        image: payload.image.filter(|s| !s.trim().is_empty()),
        author: payload.author.filter(|s| !s.trim().is_empty()),
    };
    let updated = state.service.update(actor.as_ref(), id, updates).await?;
    Ok(Json(NewsMutationResponse {
        success: true,
        message: "article updated".to_string(),
        news: updated,
    }))
}

async fn news_delete_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, PortalError> {
    let id: u64 = parse_id(&id)?;
    let claims = optional_claims(&state, &headers)?;
    let actor = claims.as_ref().map(AuthClaims::actor);
    state.service.delete(actor.as_ref(), id).await?;
    Ok(Json(DeletedResponse {
        success: true,
        message: "article deleted".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
struct FeaturedRequest {
    #[serde(default)]
    featured: bool,
}

async fn news_featured_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<FeaturedRequest>,
) -> Result<Json<NewsMutationResponse>, PortalError> {
    let id: u64 = parse_id(&id)?;
    let claims = optional_claims(&state, &headers)?;
    let actor = claims.as_ref().map(AuthClaims::actor);
    let updated = state
        .service
        .set_featured(actor.as_ref(), id, payload.featured)
        .await?;
    let message = if payload.featured {
        "article featured".to_string()
    } else {
        "article unfeatured".to_string()
    };
    Ok(Json(NewsMutationResponse {
        success: true,
        message,
        news: updated,
    }))
}

#[derive(Debug, Deserialize)]
struct BreakingNewsRequest {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BreakingNewsResponse {
    success: bool,
    breaking_news: String,
}

async fn breaking_news_handler(
    State(state): State<Arc<GatewayState>>,
) -> Json<BreakingNewsResponse> {
    Json(BreakingNewsResponse {
        success: true,
        breaking_news: state.service.breaking_news().await,
    })
}

async fn set_breaking_news_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(payload): Json<BreakingNewsRequest>,
) -> Result<Json<BreakingNewsResponse>, PortalError> {
    let claims = optional_claims(&state, &headers)?;
    let actor = claims.as_ref().map(AuthClaims::actor);
    let text = state
        .service
        .set_breaking_news(actor.as_ref(), payload.text.unwrap_or_default())
        .await?;
    Ok(Json(BreakingNewsResponse {
        success: true,
        breaking_news: text,
    }))
}

#[derive(Debug, Serialize)]
struct LikesResponse {
    success: bool,
    likes: u64,
}

async fn news_like_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<Json<LikesResponse>, PortalError> {
    let article = state.service.like(parse_id(&id)?).await?;
    Ok(Json(LikesResponse {
        success: true,
        likes: article.likes,
    }))
}

#[derive(Debug, Deserialize)]
struct CommentRequest {
    #[serde(default)]
    author: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct CommentResponse {
    success: bool,
    comment: Comment,
}

async fn comment_add_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), PortalError> {
    let comment = state
        .service
        .add_comment(parse_id(&id)?, payload.author, payload.text)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            success: true,
            comment,
        }),
    ))
}

async fn comment_delete_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Path((id, comment_id)): Path<(String, String)>,
) -> Result<Json<DeletedResponse>, PortalError> {
    let id: u64 = parse_id(&id)?;
    let comment_id: i64 = parse_id(&comment_id)?;
    let claims = optional_claims(&state, &headers)?;
    let actor = claims.as_ref().map(AuthClaims::actor);
    state
        .service
        .delete_comment(actor.as_ref(), id, comment_id)
        .await?;
    Ok(Json(DeletedResponse {
        success: true,
        message: "comment deleted".to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    success: bool,
    image_url: String,
}

async fn upload_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, PortalError> {
    let claims = require_claims(&state, &headers)?;
    authorize(Some(&claims.actor()), &NewsAction::Upload)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| PortalError::Validation(format!("unreadable multipart body: {}", err)))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let original_name = field.file_name().unwrap_or("upload.bin").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| PortalError::Validation(format!("unreadable upload: {}", err)))?;
        let image_url = state.media.store(&original_name, &bytes).await?;
        return Ok(Json(UploadResponse {
            success: true,
            image_url,
        }));
    }
    Err(PortalError::Validation(
        "an image field is required".to_string(),
    ))
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit('.').next().map(|ext| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        Some(ext) if ext == "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

async fn uploads_handler(
    State(state): State<Arc<GatewayState>>,
    Path(file): Path<String>,
) -> Response {
    // Stored names are flat uuid.ext; anything else never resolves.
    if file.contains('/') || file.contains("..") {
        return PortalError::NotFound(file).into_response();
    }
    match tokio::fs::read(state.uploads_dir.join(&file)).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(&file))],
            bytes,
        )
            .into_response(),
        Err(_) => PortalError::NotFound(file).into_response(),
    }
}

// ---------------------------------------------------------------------------
// Event stream
// ---------------------------------------------------------------------------

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket(socket, state))
}

async fn websocket(ws: WebSocket, state: Arc<GatewayState>) {
    debug!("websocket observer connected");
    let (mut sender, mut receiver) = ws.split();
    let mut rx = state.events.subscribe();

    // One select loop per connection: forward events, watch for close.
    loop {
        tokio::select! {
            biased;
            maybe = rx.recv() => {
                match maybe {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(err) => {
                                warn!(%err, "dropping unserializable event");
                                continue;
                            }
                        };
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // The observer fell behind; it reconciles over the
                        // read path on its next fetch.
                        warn!(skipped, "websocket observer lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }
    debug!("websocket observer disconnected");
}
