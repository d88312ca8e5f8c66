use std::{net::SocketAddr, sync::Arc, time::Duration as StdDuration};

use anyhow::{Context, Result};
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Path, Query, State},
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use gigpal_api as wire;
use gigpal_core::{chat, db, events, pool, swipe, users, Error as CoreError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{self, AuthUser, LoginRateLimiter},
    catalog::{EventCatalog, MemoryCatalog, TicketmasterCatalog},
    config::Config,
    convert,
    error::{ApiError, ApiResult},
};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Config,
    pub jwt_secret: Arc<Vec<u8>>,
    pub catalog: Arc<dyn EventCatalog>,
    pub login_limiter: LoginRateLimiter,
}

impl AppState {
    /// Open the database under `data_dir` and pick a catalog from the config.
    pub async fn new(config: Config) -> Result<Self> {
        let catalog: Arc<dyn EventCatalog> = match &config.catalog.ticketmaster_key {
            Some(key) => Arc::new(TicketmasterCatalog::new(
                key.clone(),
                config.catalog.dma_id.clone(),
            )?),
            None => {
                warn!("no ticketmaster key configured, event catalog is empty");
                Arc::new(MemoryCatalog::default())
            }
        };
        Self::with_catalog(config, catalog).await
    }

    pub async fn with_catalog(config: Config, catalog: Arc<dyn EventCatalog>) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .with_context(|| format!("creating {}", config.data_dir.display()))?;
        let manager = SqliteConnectionManager::file(config.db_path()).with_init(|c| db::configure(c));
        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .context("opening database pool")?;
        {
            let conn = pool.get()?;
            db::prepare(&conn).context("preparing schema")?;
        }
        let jwt_secret =
            auth::load_or_create_secret(config.jwt_secret.as_deref(), &config.data_dir).await?;
        Ok(Self {
            pool,
            config,
            jwt_secret: Arc::new(jwt_secret),
            catalog,
            login_limiter: LoginRateLimiter::new(5, StdDuration::from_secs(60)),
        })
    }

    /// Run `f` on a pooled connection off the async runtime.
    async fn db<T, F>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&mut Connection) -> gigpal_core::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn).map_err(ApiError::from)
        })
        .await?
    }
}

/// JSON body extractor whose rejections use the common error body with status 400.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, B, T> FromRequest<S, B> for ApiJson<T>
where
    Json<T>: FromRequest<S, B, Rejection = JsonRejection>,
    S: Send + Sync,
    B: Send + 'static,
{
    type Rejection = ApiError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(CoreError::validation(rejection.body_text()).into()),
        }
    }
}

/// Cross-origin policy for the browser client. No configured origins allows any.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid cors origin");
                None
            }
        }))
    };
    CorsLayer::new()
        .allow_origin(allow)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(StdDuration::from_secs(60 * 60))
}

/// Build the HTTP application router.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let protected = Router::new()
        .route("/api/profile", get(get_profile).patch(patch_profile))
        .route("/api/events", get(list_events))
        .route("/api/matchmake", post(join_pool))
        .route("/api/matchmake/:event_id", delete(leave_pool))
        .route("/api/matchmaking/pools", get(list_pools))
        .route(
            "/api/matchmaking/potential-matches/:event_id",
            get(potential_matches),
        )
        .route("/api/matchmaking/swipe", post(record_swipe))
        .route("/api/matches", get(list_matches))
        .route("/api/matches/unread", get(unread))
        .route("/api/:match_id/messages", get(get_messages).post(send_message))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));
    Router::new()
        .route("/api/health", get(health))
        .route("/api/signup", post(signup))
        .route("/api/login", post(login))
        .merge(protected)
        .with_state(state)
        .layer(cors)
}

async fn health() -> &'static str {
    "ok"
}

async fn auth_middleware<B>(
    State(state): State<AppState>,
    mut req: Request<B>,
    next: Next<B>,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized("missing bearer token"))?;
    let user_id = auth::verify_jwt(&state.jwt_secret, token)
        .and_then(|claims| claims.user_id())
        .map_err(|_| ApiError::Unauthorized("invalid or expired token"))?;
    req.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(req).await)
}

async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<wire::SignupReq>,
) -> ApiResult<impl IntoResponse> {
    if req.password.len() < 8 {
        return Err(CoreError::validation("password must be at least 8 characters").into());
    }
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || auth::hash_password(&password)).await??;
    let new = users::NewUser {
        username: req.user_name,
        email: req.email,
        password_hash,
        date_of_birth: req.date_of_birth,
    };
    let user = state.db(move |conn| users::create_user(conn, new)).await?;
    Ok((
        StatusCode::CREATED,
        Json(wire::SignupResp {
            message: "User registered successfully".into(),
            user_id: user.id,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<wire::LoginReq>,
) -> ApiResult<Json<wire::LoginResp>> {
    let email = auth::normalize_key(&req.email);
    if !state.login_limiter.check(&email).await {
        warn!(%email, "login rate limited");
        return Err(ApiError::RateLimited);
    }
    let found = {
        let email = email.clone();
        state
            .db(move |conn| users::find_credentials(conn, &email))
            .await?
    };
    let valid = match found {
        Some((user_id, hash)) => {
            let password = req.password;
            tokio::task::spawn_blocking(move || auth::verify_password(&password, &hash))
                .await?
                .then_some(user_id)
        }
        None => None,
    };
    let Some(user_id) = valid else {
        warn!(%email, "rejected login");
        return Err(ApiError::Unauthorized("Invalid email or password"));
    };
    let token = auth::issue_jwt(&state.jwt_secret, user_id, auth::TOKEN_TTL)?;
    Ok(Json(wire::LoginResp {
        message: "Login successful".into(),
        token,
        user_id,
    }))
}

async fn get_profile(
    State(state): State<AppState>,
    Extension(AuthUser(me)): Extension<AuthUser>,
) -> ApiResult<Json<wire::Profile>> {
    let user = state.db(move |conn| users::get_user(conn, me)).await?;
    Ok(Json(convert::profile(user)))
}

async fn patch_profile(
    State(state): State<AppState>,
    Extension(AuthUser(me)): Extension<AuthUser>,
    ApiJson(update): ApiJson<wire::ProfileUpdate>,
) -> ApiResult<Json<wire::Profile>> {
    let update = convert::profile_update(update);
    let user = state
        .db(move |conn| users::update_profile(conn, me, &update))
        .await?;
    Ok(Json(convert::profile(user)))
}

#[derive(Deserialize)]
struct EventsQuery {
    query: Option<String>,
}

async fn list_events(
    State(state): State<AppState>,
    Query(q): Query<EventsQuery>,
) -> ApiResult<Json<wire::EventsResp>> {
    let found = state.catalog.search(q.query.as_deref()).await?;
    Ok(Json(wire::EventsResp {
        events: found.into_iter().map(convert::event).collect(),
    }))
}

async fn join_pool(
    State(state): State<AppState>,
    Extension(AuthUser(me)): Extension<AuthUser>,
    ApiJson(req): ApiJson<wire::JoinPoolReq>,
) -> ApiResult<impl IntoResponse> {
    let event_id = req.event_id.trim().to_owned();
    if event_id.is_empty() {
        return Err(CoreError::validation("eventId is required").into());
    }
    let cached = {
        let id = event_id.clone();
        state.db(move |conn| events::get_event(conn, &id)).await?
    };
    let event = match cached {
        Some(event) => event,
        None => state
            .catalog
            .lookup(&event_id)
            .await?
            .ok_or(CoreError::NotFound("event"))?,
    };
    state
        .db(move |conn| pool::join_pool(conn, me, &event))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(wire::MessageResp {
            message: "Joined matchmaking pool".into(),
        }),
    ))
}

async fn leave_pool(
    State(state): State<AppState>,
    Extension(AuthUser(me)): Extension<AuthUser>,
    Path(event_id): Path<String>,
) -> ApiResult<StatusCode> {
    state
        .db(move |conn| pool::leave_pool(conn, me, &event_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_pools(
    State(state): State<AppState>,
    Extension(AuthUser(me)): Extension<AuthUser>,
) -> ApiResult<Json<wire::PoolsResp>> {
    let pools = state.db(move |conn| pool::list_pools(conn, me)).await?;
    Ok(Json(wire::PoolsResp {
        pools: pools.into_iter().map(convert::membership).collect(),
    }))
}

async fn potential_matches(
    State(state): State<AppState>,
    Extension(AuthUser(me)): Extension<AuthUser>,
    Path(event_id): Path<String>,
) -> ApiResult<Json<wire::CandidatesResp>> {
    let id = event_id.clone();
    let candidates = state
        .db(move |conn| pool::list_candidates(conn, me, &id))
        .await?;
    Ok(Json(wire::CandidatesResp {
        event_id,
        matches: candidates.into_iter().map(convert::candidate).collect(),
    }))
}

async fn record_swipe(
    State(state): State<AppState>,
    Extension(AuthUser(me)): Extension<AuthUser>,
    ApiJson(req): ApiJson<wire::SwipeReq>,
) -> ApiResult<Json<wire::SwipeResp>> {
    let direction = convert::direction(req.direction);
    let outcome = state
        .db(move |conn| swipe::record_swipe(conn, me, req.match_user_id, &req.event_id, direction))
        .await?;
    let message = if outcome.matched {
        "It's a match!"
    } else {
        "Swipe recorded"
    };
    Ok(Json(wire::SwipeResp {
        message: message.into(),
        matched: outcome.matched,
        match_id: outcome.match_id,
    }))
}

async fn list_matches(
    State(state): State<AppState>,
    Extension(AuthUser(me)): Extension<AuthUser>,
) -> ApiResult<Json<wire::MatchesResp>> {
    let matches = state.db(move |conn| chat::list_matches(conn, me)).await?;
    Ok(Json(wire::MatchesResp {
        matches: matches.into_iter().map(convert::match_summary).collect(),
    }))
}

async fn unread(
    State(state): State<AppState>,
    Extension(AuthUser(me)): Extension<AuthUser>,
) -> ApiResult<Json<wire::UnreadResp>> {
    let unread = state.db(move |conn| chat::unread_total(conn, me)).await?;
    Ok(Json(wire::UnreadResp { unread }))
}

fn match_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| CoreError::NotFound("match").into())
}

async fn get_messages(
    State(state): State<AppState>,
    Extension(AuthUser(me)): Extension<AuthUser>,
    Path(raw): Path<String>,
) -> ApiResult<Json<wire::MessagesResp>> {
    let id = match_id(&raw)?;
    let thread = state
        .db(move |conn| chat::list_messages(conn, id, me))
        .await?;
    Ok(Json(wire::MessagesResp {
        messages: thread.into_iter().map(convert::thread_message).collect(),
    }))
}

async fn send_message(
    State(state): State<AppState>,
    Extension(AuthUser(me)): Extension<AuthUser>,
    Path(raw): Path<String>,
    ApiJson(req): ApiJson<wire::SendMessageReq>,
) -> ApiResult<impl IntoResponse> {
    let id = match_id(&raw)?;
    let sent = state
        .db(move |conn| chat::send_message(conn, id, me, &req.content))
        .await?;
    Ok((StatusCode::CREATED, Json(convert::message(sent))))
}

/// Run the HTTP server until ctrl-c.
pub async fn run_http_server(config: Config) -> Result<()> {
    let addr: SocketAddr = config
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind))?;
    let state = AppState::new(config).await?;
    info!(%addr, "gigpal listening");
    axum::Server::try_bind(&addr)
        .with_context(|| format!("binding {addr}"))?
        .serve(build_router(state).into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}
