//! The single active route of a map session.
//!
//! Planning a new route replaces the previous one in one step: the old
//! route is removed as soon as planning starts, and a plan whose router
//! call finishes after a newer plan started (or after [`RouteSession::clear`])
//! is discarded.

use std::sync::Arc;

use canopy_map_route_models::{ActiveRoute, RouteStop, StartPolicy, TravelMode};
use tokio::sync::Mutex;

use crate::Router;
use crate::planner::plan_route;

/// Lifecycle of a session's route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RouteState {
    /// No route.
    #[default]
    Idle,
    /// A plan is waiting for router geometry.
    Planning,
    /// A route is shown.
    Routed,
}

/// Result of [`RouteSession::replace`].
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// The new route is active.
    Active(ActiveRoute),
    /// Nothing to visit; the session is idle.
    Empty,
    /// A newer plan or a clear arrived first.
    Superseded,
}

#[derive(Debug, Default)]
struct Inner {
    ticket: u64,
    state: RouteState,
    active: Option<ActiveRoute>,
}

/// Owns the active route of one map session.
pub struct RouteSession {
    router: Arc<dyn Router>,
    mode: TravelMode,
    inner: Mutex<Inner>,
}

impl RouteSession {
    /// Creates an idle session.
    #[must_use]
    pub fn new(router: Arc<dyn Router>, mode: TravelMode) -> Self {
        Self {
            router,
            mode,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> RouteState {
        self.inner.lock().await.state
    }

    /// The active route, if any.
    pub async fn active(&self) -> Option<ActiveRoute> {
        self.inner.lock().await.active.clone()
    }

    /// Plans a route through `stops` and makes it the active one.
    ///
    /// An empty `stops` clears the session without calling the router.
    /// Router failures are logged and leave the route active without
    /// geometry.
    pub async fn replace(&self, stops: &[RouteStop]) -> RouteOutcome {
        let plan = plan_route(stops, StartPolicy::FirstInput);

        if plan.is_empty() {
            log::info!("No trees need attention");
            self.clear().await;
            return RouteOutcome::Empty;
        }

        let ticket = {
            let mut inner = self.inner.lock().await;
            inner.ticket += 1;
            inner.state = RouteState::Planning;
            inner.active = None;
            inner.ticket
        };

        let geometry = if plan.len() < 2 {
            None
        } else {
            match self.router.route(&plan.coordinates(), self.mode).await {
                Ok(geometry) => Some(geometry),
                Err(e) => {
                    log::error!("Routing via {} failed: {e}", self.router.name());
                    None
                }
            }
        };

        let mut inner = self.inner.lock().await;
        if inner.ticket != ticket {
            log::debug!("Discarding superseded route through {} trees", plan.len());
            return RouteOutcome::Superseded;
        }

        match &geometry {
            Some(g) => log::info!(
                "Route: {} trees, {:.2} km, ~{} min",
                plan.len(),
                g.distance_km(),
                g.minutes()
            ),
            None => log::info!("Route: {} trees, no path available", plan.len()),
        }

        let route = ActiveRoute { plan, geometry };
        inner.state = RouteState::Routed;
        inner.active = Some(route.clone());

        RouteOutcome::Active(route)
    }

    /// Removes the active route and cancels any plan in progress.
    ///
    /// Returns `true` if a route was shown or being planned.
    pub async fn clear(&self) -> bool {
        let mut inner = self.inner.lock().await;
        let had_route = inner.state != RouteState::Idle;
        inner.ticket += 1;
        inner.state = RouteState::Idle;
        inner.active = None;
        had_route
    }
}
