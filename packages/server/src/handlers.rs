//! HTTP handler functions for the canopy map API.

use actix_web::{HttpResponse, web};
use canopy_map_aggregation::registry::all_ladders;
use canopy_map_aggregation_models::{BoundingBox, ViewportQuery};
use canopy_map_health::AttentionCutoff;
use canopy_map_health::profiles::all_profiles;
use canopy_map_health_models::HealthTier;
use canopy_map_route::{RouteOutcome, select_flagged};
use canopy_map_route_models::{ActiveRoute, RouteStop};
use canopy_map_server_models::{
    ApiBracket, ApiFeature, ApiHealth, ApiLadder, ApiPlan, ApiProfile, ApiRoute, ApiTreesResponse,
    ApiViewportStatus, PlanQueryParams, RouteRequest, TreesQueryParams,
};
use canopy_map_store::ViewportOutcome;

use crate::AppState;

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.store.name().to_string(),
    })
}

/// `GET /api/profiles`
///
/// Lists the embedded threshold profiles and marks the active one.
pub async fn profiles(state: web::Data<AppState>) -> HttpResponse {
    let profiles: Vec<ApiProfile> = all_profiles()
        .into_iter()
        .map(|p| ApiProfile {
            active: p.id == state.profile.id,
            very_bad: p.thresholds.very_bad(),
            bad: p.thresholds.bad(),
            good: p.thresholds.good(),
            id: p.id,
            name: p.name,
            description: p.description,
        })
        .collect();

    HttpResponse::Ok().json(profiles)
}

/// `GET /api/ladders`
///
/// Lists the embedded zoom ladders and marks the active one.
pub async fn ladders(state: web::Data<AppState>) -> HttpResponse {
    let ladders: Vec<ApiLadder> = all_ladders()
        .iter()
        .map(|l| ApiLadder {
            id: l.id().to_string(),
            name: l.name().to_string(),
            description: l.description().map(String::from),
            min_zoom: l.min_zoom(),
            max_zoom: l.max_zoom(),
            individual_zoom: l.individual_zoom(),
            brackets: l
                .brackets()
                .iter()
                .map(|b| ApiBracket {
                    up_to: b.up_to,
                    plan: b.plan,
                })
                .collect(),
            active: l.id() == state.ladder.id(),
        })
        .collect();

    HttpResponse::Ok().json(ladders)
}

/// `GET /api/plan?zoom=Z`
pub async fn plan(state: web::Data<AppState>, params: web::Query<PlanQueryParams>) -> HttpResponse {
    HttpResponse::Ok().json(ApiPlan {
        ladder: state.ladder.id().to_string(),
        zoom: params.zoom,
        plan: state.ladder.select_plan(params.zoom),
    })
}

/// `GET /api/trees?bbox=west,south,east,north&zoom=Z`
///
/// Returns classified trees or clusters for the viewport. Store failures
/// are reported as an empty `failed` result, not an HTTP error. A newer
/// load of the same `session` supersedes an older one; loads without a
/// session are independent.
pub async fn trees(state: web::Data<AppState>, params: web::Query<TreesQueryParams>) -> HttpResponse {
    let Some(bounds) = parse_bbox(&params.bbox) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "bbox must be west,south,east,north"
        }));
    };

    let service = state.viewport(params.session.as_deref()).await;
    let query = ViewportQuery {
        bounds,
        zoom: params.zoom,
    };

    let outcome = service.load(query).await;
    let status = match &outcome {
        ViewportOutcome::Features(_) => ApiViewportStatus::Features,
        ViewportOutcome::Empty => ApiViewportStatus::Empty,
        ViewportOutcome::Failed => ApiViewportStatus::Failed,
        ViewportOutcome::Superseded => ApiViewportStatus::Superseded,
    };

    HttpResponse::Ok().json(ApiTreesResponse {
        zoom: params.zoom,
        plan: service.ladder().select_plan(params.zoom),
        status,
        features: outcome.features().iter().map(ApiFeature::from).collect(),
    })
}

/// `POST /api/route`
///
/// Plans a route through the submitted trees that need attention and
/// makes it the session's active route.
pub async fn create_route(
    state: web::Data<AppState>,
    body: web::Json<RouteRequest>,
) -> HttpResponse {
    let cutoff = match body.below.map(HealthTier::from_value) {
        None => AttentionCutoff::default(),
        Some(Ok(below)) => AttentionCutoff { below },
        Some(Err(e)) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": e.to_string()
            }));
        }
    };

    let candidates: Vec<RouteStop> = body.trees.iter().map(|t| t.to_stop()).collect();
    let flagged = select_flagged(&candidates, cutoff);

    let session = state.route_session(&body.session).await;
    match session.replace(&flagged).await {
        RouteOutcome::Active(route) => HttpResponse::Ok().json(ApiRoute::new(&body.session, route)),
        RouteOutcome::Empty => {
            HttpResponse::Ok().json(ApiRoute::new(&body.session, ActiveRoute::default()))
        }
        RouteOutcome::Superseded => HttpResponse::Conflict().json(serde_json::json!({
            "error": "Superseded by a newer route request"
        })),
    }
}

/// `GET /api/route/{session}`
pub async fn get_route(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let session = path.into_inner();
    let active = match state.existing_route_session(&session).await {
        Some(route_session) => route_session.active().await,
        None => None,
    };

    match active {
        Some(route) => HttpResponse::Ok().json(ApiRoute::new(session, route)),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "error": "No active route"
        })),
    }
}

/// `DELETE /api/route/{session}`
///
/// Clears the route and forgets the session.
pub async fn clear_route(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    if let Some(route_session) = state.remove_route_session(&path).await {
        route_session.clear().await;
    }
    HttpResponse::NoContent().finish()
}

/// Parses `"west,south,east,north"`. Any part that is not a number
/// rejects the whole box.
fn parse_bbox(s: &str) -> Option<BoundingBox> {
    let parts = s
        .split(',')
        .map(|part| part.trim().parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts[..] {
        [west, south, east, north] => Some(BoundingBox::new(west, south, east, north)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::{App, test};
    use async_trait::async_trait;
    use canopy_map_aggregation::registry::ladder;
    use canopy_map_aggregation_models::{AggregationPlan, ClusterSummary, Coordinate, NoisePolicy};
    use canopy_map_health::profiles::profile;
    use canopy_map_health_models::{Observation, SelectionPolicy, Tree};
    use canopy_map_route::{Router, RoutingError};
    use canopy_map_route_models::{RouteGeometry, TravelMode};
    use canopy_map_store::memory::MemoryStore;
    use canopy_map_store::{PointStore, RawPoint, StoreError};
    use serde_json::{Value, json};

    use super::*;
    use crate::configure;

    struct FailingStore;

    #[async_trait]
    impl PointStore for FailingStore {
        fn name(&self) -> &str {
            "failing"
        }

        async fn query_raw(&self, _: &BoundingBox, _: u32) -> Result<Vec<RawPoint>, StoreError> {
            Err(StoreError::Parse {
                message: "boom".to_string(),
            })
        }

        async fn query_aggregate(
            &self,
            _: &BoundingBox,
            _: &AggregationPlan,
        ) -> Result<Vec<ClusterSummary>, StoreError> {
            Err(StoreError::Parse {
                message: "boom".to_string(),
            })
        }
    }

    /// Answers raw queries with one tree at the box's south-west corner
    /// after `west / 10` seconds.
    struct SlowStore;

    #[async_trait]
    impl PointStore for SlowStore {
        fn name(&self) -> &str {
            "slow"
        }

        async fn query_raw(&self, bounds: &BoundingBox, _: u32) -> Result<Vec<RawPoint>, StoreError> {
            tokio::time::sleep(Duration::from_secs_f64(bounds.west / 10.0)).await;
            Ok(vec![RawPoint {
                id: Some(1),
                lat: bounds.south,
                lng: bounds.west,
                index: Some(0.5),
                timestamp: None,
            }])
        }

        async fn query_aggregate(
            &self,
            _: &BoundingBox,
            _: &AggregationPlan,
        ) -> Result<Vec<ClusterSummary>, StoreError> {
            Ok(Vec::new())
        }
    }

    struct LineRouter;

    #[async_trait]
    impl Router for LineRouter {
        fn name(&self) -> &str {
            "line"
        }

        async fn route(
            &self,
            waypoints: &[Coordinate],
            _: TravelMode,
        ) -> Result<RouteGeometry, RoutingError> {
            Ok(RouteGeometry {
                coordinates: waypoints.iter().map(|c| [c.lng, c.lat]).collect(),
                total_distance: 800.0,
                total_time: 600.0,
                bounds: BoundingBox::new(13.0, 52.0, 14.0, 53.0),
            })
        }
    }

    fn tree(id: i64, lat: f64, lng: f64, index: f64) -> Tree {
        Tree {
            id,
            lat,
            lng,
            species: None,
            name: None,
            observations: vec![Observation {
                index,
                timestamp: "2024-07-01T00:00:00Z".parse().unwrap(),
            }],
        }
    }

    fn state(store: Arc<dyn PointStore>) -> web::Data<AppState> {
        web::Data::new(AppState::new(
            store,
            ladder("grid").unwrap(),
            profile("ndvi_sparse").unwrap(),
            Arc::new(LineRouter),
            TravelMode::Walking,
        ))
    }

    fn memory_state() -> web::Data<AppState> {
        state(Arc::new(MemoryStore::new(
            vec![
                tree(1, 52.501, 13.401, 0.001),
                tree(2, 52.502, 13.402, 0.005),
                tree(3, 52.503, 13.403, 0.5),
            ],
            SelectionPolicy::Latest,
            NoisePolicy::Drop,
        )))
    }

    #[actix_web::test]
    async fn health_reports_store() {
        let app = test::init_service(App::new().app_data(memory_state()).configure(configure)).await;
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["healthy"], true);
        assert_eq!(body["store"], "memory");
    }

    #[actix_web::test]
    async fn low_zoom_returns_clusters() {
        let app = test::init_service(App::new().app_data(memory_state()).configure(configure)).await;
        let req = test::TestRequest::get()
            .uri("/api/trees?bbox=13.3,52.4,13.5,52.6&zoom=8")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "features");
        assert_eq!(body["plan"]["type"], "grid_bin");
        let features = body["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["isCluster"], true);
        assert_eq!(features[0]["treeCount"], 3);
    }

    #[actix_web::test]
    async fn high_zoom_returns_trees() {
        let app = test::init_service(App::new().app_data(memory_state()).configure(configure)).await;
        let req = test::TestRequest::get()
            .uri("/api/trees?bbox=13.3,52.4,13.5,52.6&zoom=17")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        let features = body["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0]["isCluster"], false);
        assert_eq!(features[0]["health"], 1);
        assert_eq!(features[2]["health"], 4);
    }

    #[actix_web::test]
    async fn store_failure_is_an_empty_result() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(FailingStore)))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/api/trees?bbox=13.3,52.4,13.5,52.6&zoom=8")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "failed");
        assert_eq!(body["features"], json!([]));
    }

    #[actix_web::test]
    async fn malformed_bbox_is_bad_request() {
        let app = test::init_service(App::new().app_data(memory_state()).configure(configure)).await;
        let req = test::TestRequest::get()
            .uri("/api/trees?bbox=13.3,52.4&zoom=8")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn bbox_with_a_non_numeric_part_is_bad_request() {
        let app = test::init_service(App::new().app_data(memory_state()).configure(configure)).await;
        let req = test::TestRequest::get()
            .uri("/api/trees?bbox=1,x,2,3,4&zoom=8")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[::core::prelude::v1::test]
    fn parse_bbox_needs_exactly_four_numbers() {
        assert_eq!(
            parse_bbox(" 13.3, 52.4,13.5 ,52.6"),
            Some(BoundingBox::new(13.3, 52.4, 13.5, 52.6))
        );
        assert_eq!(parse_bbox("1,x,2,3,4"), None);
        assert_eq!(parse_bbox("1,2,3"), None);
        assert_eq!(parse_bbox("1,2,3,4,5"), None);
        assert_eq!(parse_bbox(""), None);
    }

    #[actix_web::test]
    async fn loads_without_a_session_are_independent() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(SlowStore)))
                .configure(configure),
        )
        .await;
        let slow = test::TestRequest::get()
            .uri("/api/trees?bbox=3,0,4,1&zoom=17")
            .to_request();
        let fast = test::TestRequest::get()
            .uri("/api/trees?bbox=0,0,1,1&zoom=17")
            .to_request();

        let (slow, fast): (Value, Value) = tokio::join!(
            test::call_and_read_body_json(&app, slow),
            test::call_and_read_body_json(&app, fast)
        );

        assert_eq!(slow["status"], "features");
        assert_eq!(slow["features"][0]["lng"], 3.0);
        assert_eq!(fast["status"], "features");
        assert_eq!(fast["features"][0]["lng"], 0.0);
    }

    #[actix_web::test]
    async fn newer_load_of_a_session_supersedes_older() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(SlowStore)))
                .configure(configure),
        )
        .await;
        let slow = test::TestRequest::get()
            .uri("/api/trees?bbox=3,0,4,1&zoom=17&session=map-1")
            .to_request();
        let fast = test::TestRequest::get()
            .uri("/api/trees?bbox=0,0,1,1&zoom=17&session=map-1")
            .to_request();

        let (slow, fast): (Value, Value) = tokio::join!(
            test::call_and_read_body_json(&app, slow),
            test::call_and_read_body_json(&app, fast)
        );

        assert_eq!(slow["status"], "superseded");
        assert_eq!(slow["features"], json!([]));
        assert_eq!(fast["status"], "features");
    }

    #[actix_web::test]
    async fn plan_follows_the_ladder() {
        let app = test::init_service(App::new().app_data(memory_state()).configure(configure)).await;
        let req = test::TestRequest::get().uri("/api/plan?zoom=16").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["ladder"], "grid");
        assert_eq!(body["plan"], json!({"type": "raw", "limit": 1000}));
    }

    #[actix_web::test]
    async fn lists_profiles_and_ladders_with_active_flag() {
        let app = test::init_service(App::new().app_data(memory_state()).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/profiles").to_request();
        let profiles: Value = test::call_and_read_body_json(&app, req).await;
        let active: Vec<&Value> = profiles
            .as_array()
            .unwrap()
            .iter()
            .filter(|p| p["active"] == true)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["id"], "ndvi_sparse");

        let req = test::TestRequest::get().uri("/api/ladders").to_request();
        let ladders: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(ladders.as_array().unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn route_lifecycle() {
        let app = test::init_service(App::new().app_data(memory_state()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/route")
            .set_json(json!({
                "session": "map-1",
                "trees": [
                    {"id": 1, "lat": 52.50, "lng": 13.40, "health": 1},
                    {"id": 2, "lat": 52.60, "lng": 13.40, "health": 2},
                    {"id": 3, "lat": 52.51, "lng": 13.40, "health": 4},
                    {"id": 4, "lat": 52.52, "lng": 13.40, "health": 2}
                ]
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["orderedTreeIds"], json!([1, 4, 2]));
        assert_eq!(body["geometry"]["totalDistance"], 800.0);

        let req = test::TestRequest::get().uri("/api/route/map-1").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["orderedTreeIds"], json!([1, 4, 2]));

        let req = test::TestRequest::delete().uri("/api/route/map-1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NO_CONTENT);

        let req = test::TestRequest::get().uri("/api/route/map-1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn clearing_a_route_forgets_the_session() {
        let state = memory_state();
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/api/route")
            .set_json(json!({
                "session": "map-3",
                "trees": [{"id": 1, "lat": 52.50, "lng": 13.40, "health": 1}]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
        assert!(state.existing_route_session("map-3").await.is_some());

        let req = test::TestRequest::delete().uri("/api/route/map-3").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NO_CONTENT);
        assert!(state.existing_route_session("map-3").await.is_none());
    }

    #[actix_web::test]
    async fn healthy_trees_give_an_empty_route() {
        let app = test::init_service(App::new().app_data(memory_state()).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/api/route")
            .set_json(json!({
                "session": "map-2",
                "trees": [{"id": 3, "lat": 52.51, "lng": 13.40, "health": 4}]
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["orderedTreeIds"], json!([]));
        assert_eq!(body["geometry"], Value::Null);
    }

    #[actix_web::test]
    async fn invalid_cutoff_is_bad_request() {
        let app = test::init_service(App::new().app_data(memory_state()).configure(configure)).await;
        let req = test::TestRequest::post()
            .uri("/api/route")
            .set_json(json!({"session": "s", "trees": [], "below": 9}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
