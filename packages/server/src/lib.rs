#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the canopy map application.
//!
//! Serves classified trees and clusters for map viewports and keeps one
//! maintenance route per map session. The threshold profile, zoom
//! ladder, point store and router are chosen at startup from environment
//! variables (see [`ServerConfig`]).

mod handlers;
mod sessions;

use std::path::PathBuf;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use canopy_map_aggregation::{AggregationError, ZoomLadder, registry};
use canopy_map_aggregation_models::NoisePolicy;
use canopy_map_health::ConfigError;
use canopy_map_health::profiles::{self, NamedProfile};
use canopy_map_health_models::SelectionPolicy;
use canopy_map_route::osrm::{DEFAULT_BASE_URL, OsrmRouter};
use canopy_map_route::{RouteSession, Router};
use canopy_map_route_models::TravelMode;
use canopy_map_store::memory::MemoryStore;
use canopy_map_store::supabase::SupabaseStore;
use canopy_map_store::{PointStore, StoreError, ViewportService};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::sessions::SessionMap;

/// Number of viewport and of route sessions kept when
/// `CANOPY_MAX_SESSIONS` is unset.
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Errors that can occur while configuring the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// An environment variable has an unusable value.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// Threshold profile lookup failed.
    #[error(transparent)]
    Profile(#[from] ConfigError),

    /// Zoom ladder lookup failed.
    #[error(transparent)]
    Ladder(#[from] AggregationError),

    /// The point store could not be set up.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which point store backs the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum StoreKind {
    /// Trees loaded into memory from a JSON seed file.
    #[default]
    Memory,
    /// A Supabase project with the cluster functions installed.
    Supabase,
}

/// Startup configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address to bind (`BIND_ADDR`).
    pub bind_addr: String,
    /// Port to bind (`PORT`).
    pub port: u16,
    /// Threshold profile id (`CANOPY_PROFILE`).
    pub profile: String,
    /// Zoom ladder id (`CANOPY_LADDER`).
    pub ladder: String,
    /// Density-clustering noise handling (`CANOPY_NOISE_POLICY`).
    pub noise: NoisePolicy,
    /// Representative-reading policy (`CANOPY_SELECTION`).
    pub selection: SelectionPolicy,
    /// Point store (`CANOPY_STORE`).
    pub store: StoreKind,
    /// Seed file of the memory store (`CANOPY_TREES_PATH`).
    pub trees_path: Option<PathBuf>,
    /// Supabase project URL (`SUPABASE_URL`).
    pub supabase_url: Option<String>,
    /// Supabase API key (`SUPABASE_KEY`).
    pub supabase_key: Option<String>,
    /// OSRM base URL (`OSRM_URL`).
    pub osrm_url: String,
    /// Router profile (`CANOPY_TRAVEL_MODE`).
    pub travel_mode: TravelMode,
    /// Sessions kept per kind before the least recently used is evicted
    /// (`CANOPY_MAX_SESSIONS`).
    pub max_sessions: usize,
}

fn parse_var<T: std::str::FromStr>(name: &str, value: Option<String>) -> Result<Option<T>, ServerError> {
    value
        .map(|v| {
            v.parse().map_err(|_| ServerError::Config {
                message: format!("{name}={v} is not valid"),
            })
        })
        .transpose()
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if a variable has an unusable value.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `get`, which maps variable names to
    /// values.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if a variable has an unusable value.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let selection = match get("CANOPY_SELECTION").as_deref() {
            None | Some("latest") => SelectionPolicy::Latest,
            Some("summer") => SelectionPolicy::summer(),
            Some(other) => {
                return Err(ServerError::Config {
                    message: format!("CANOPY_SELECTION={other} is not valid"),
                });
            }
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_var("PORT", get("PORT"))?.unwrap_or(8080),
            profile: get("CANOPY_PROFILE").unwrap_or_else(|| "ndvi_sparse".to_string()),
            ladder: get("CANOPY_LADDER").unwrap_or_else(|| "grid".to_string()),
            noise: parse_var("CANOPY_NOISE_POLICY", get("CANOPY_NOISE_POLICY"))?.unwrap_or_default(),
            selection,
            store: parse_var("CANOPY_STORE", get("CANOPY_STORE"))?.unwrap_or_default(),
            trees_path: get("CANOPY_TREES_PATH").map(PathBuf::from),
            supabase_url: get("SUPABASE_URL"),
            supabase_key: get("SUPABASE_KEY"),
            osrm_url: get("OSRM_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            travel_mode: parse_var("CANOPY_TRAVEL_MODE", get("CANOPY_TRAVEL_MODE"))?
                .unwrap_or_default(),
            max_sessions: parse_var("CANOPY_MAX_SESSIONS", get("CANOPY_MAX_SESSIONS"))?
                .unwrap_or(DEFAULT_MAX_SESSIONS),
        })
    }

    /// Names of the set variables that the chosen store does not use.
    ///
    /// The Supabase store clusters and selects readings inside the
    /// database, so noise and selection policies only apply in memory.
    #[must_use]
    pub fn ignored_settings(&self) -> Vec<&'static str> {
        let mut ignored = Vec::new();
        if self.store == StoreKind::Supabase {
            if self.noise != NoisePolicy::default() {
                ignored.push("CANOPY_NOISE_POLICY");
            }
            if self.selection != SelectionPolicy::Latest {
                ignored.push("CANOPY_SELECTION");
            }
        }
        ignored
    }
}

/// Shared application state.
pub struct AppState {
    /// Source of tree readings.
    pub store: Arc<dyn PointStore>,
    /// Zoom ladder used to choose plans.
    pub ladder: ZoomLadder,
    /// Threshold profile used to classify.
    pub profile: NamedProfile,
    /// Router for maintenance routes.
    pub router: Arc<dyn Router>,
    /// Router profile.
    pub travel_mode: TravelMode,
    viewports: SessionMap<ViewportService>,
    routes: SessionMap<RouteSession>,
}

impl AppState {
    /// Creates state with no sessions, keeping at most
    /// [`DEFAULT_MAX_SESSIONS`] of each kind.
    #[must_use]
    pub fn new(
        store: Arc<dyn PointStore>,
        ladder: ZoomLadder,
        profile: NamedProfile,
        router: Arc<dyn Router>,
        travel_mode: TravelMode,
    ) -> Self {
        Self {
            store,
            ladder,
            profile,
            router,
            travel_mode,
            viewports: SessionMap::new(DEFAULT_MAX_SESSIONS),
            routes: SessionMap::new(DEFAULT_MAX_SESSIONS),
        }
    }

    /// Limits the number of live viewport and route sessions.
    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.viewports = SessionMap::new(max_sessions);
        self.routes = SessionMap::new(max_sessions);
        self
    }

    /// Resolves the profile and ladder and builds the store and router.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if the profile or ladder id is unknown, or
    /// the store cannot be set up.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let profile = profiles::profile(&config.profile)?;
        let ladder = registry::ladder(&config.ladder)?;

        let store: Arc<dyn PointStore> = match config.store {
            StoreKind::Memory => match &config.trees_path {
                Some(path) => Arc::new(MemoryStore::from_json_file(
                    path,
                    config.selection.clone(),
                    config.noise,
                )?),
                None => {
                    log::warn!("CANOPY_TREES_PATH is not set; serving an empty memory store");
                    Arc::new(MemoryStore::new(
                        Vec::new(),
                        config.selection.clone(),
                        config.noise,
                    ))
                }
            },
            StoreKind::Supabase => {
                let (Some(url), Some(key)) = (&config.supabase_url, &config.supabase_key) else {
                    return Err(ServerError::Config {
                        message: "SUPABASE_URL and SUPABASE_KEY are required for the supabase store"
                            .to_string(),
                    });
                };
                Arc::new(SupabaseStore::new(url.clone(), key.clone()))
            }
        };

        for name in config.ignored_settings() {
            log::warn!("{name} has no effect with the {} store", config.store);
        }

        log::info!(
            "Using profile '{}', ladder '{}', {} store, {} routing",
            profile.id,
            ladder.id(),
            store.name(),
            config.travel_mode
        );

        Ok(Self::new(
            store,
            ladder,
            profile,
            Arc::new(OsrmRouter::new(config.osrm_url.clone())),
            config.travel_mode,
        )
        .with_max_sessions(config.max_sessions))
    }

    /// The viewport service for a load.
    ///
    /// Loads of one session supersede each other. Without a session the
    /// load gets a service of its own, so it never discards or is discarded
    /// by another client's load.
    pub async fn viewport(&self, session: Option<&str>) -> Arc<ViewportService> {
        let create = || {
            ViewportService::new(self.store.clone(), self.ladder.clone(), self.profile.thresholds)
        };
        match session {
            Some(session) => self.viewports.get_or_insert_with(session, create).await,
            None => Arc::new(create()),
        }
    }

    /// The route session of `session`, created on first use.
    pub async fn route_session(&self, session: &str) -> Arc<RouteSession> {
        self.routes
            .get_or_insert_with(session, || {
                RouteSession::new(self.router.clone(), self.travel_mode)
            })
            .await
    }

    /// The route session of `session`, if it exists.
    pub async fn existing_route_session(&self, session: &str) -> Option<Arc<RouteSession>> {
        self.routes.get(session).await
    }

    /// Forgets `session`'s route session, returning it if it existed.
    pub async fn remove_route_session(&self, session: &str) -> Option<Arc<RouteSession>> {
        self.routes.remove(session).await
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/profiles", web::get().to(handlers::profiles))
            .route("/ladders", web::get().to(handlers::ladders))
            .route("/plan", web::get().to(handlers::plan))
            .route("/trees", web::get().to(handlers::trees))
            .route("/route", web::post().to(handlers::create_route))
            .route("/route/{session}", web::get().to(handlers::get_route))
            .route("/route/{session}", web::delete().to(handlers::clear_route)),
    );
}

/// Starts the canopy map API server.
///
/// Reads [`ServerConfig`] from the environment, builds the shared
/// [`AppState`] and starts the Actix-Web HTTP server. The caller is
/// responsible for providing the async runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the configuration is invalid,
/// or the HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = ServerConfig::from_env().map_err(std::io::Error::other)?;
    let state = web::Data::new(AppState::from_config(&config).map_err(std::io::Error::other)?);

    let ServerConfig { bind_addr, port, .. } = config;

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
