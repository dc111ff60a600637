//! HTTP API routes
//!
//! Defines all REST API endpoints for the server.

use crate::coord::datum::{convert, Conversion, TargetDatum};
use crate::coord::{DeviceCoordinate, VendorCoordinate};
use crate::error::Error;
use crate::geo::{
    AddressResult, CacheStats, PoiSearchOptions, PointOfInterest, RegeoOptions, RouteOptions,
    RouteResult, SuggestDatatype, SuggestOptions, TravelMode, Transport,
};
use crate::server::state::AppState;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router<T: Transport + 'static>(state: Arc<AppState<T>>) -> Router {
    Router::new()
        .route("/api/status", get(status_handler::<T>))
        .route("/api/regeo", get(regeo_handler::<T>))
        .route("/api/poi", get(poi_handler::<T>))
        .route("/api/tips", get(tips_handler::<T>))
        .route("/api/route", get(route_handler::<T>))
        .route("/api/convert", get(convert_handler))
        .route("/api/cache", get(cache_handler::<T>).delete(cache_clear_handler::<T>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "INVALID_COORDINATES" | "INVALID_PARAMETER" => StatusCode::BAD_REQUEST,
            "REMOTE_SERVICE_ERROR" => StatusCode::BAD_GATEWAY,
            "NETWORK_ERROR" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidCoordinates(_) => "INVALID_COORDINATES",
            Error::Config(_) => "INVALID_PARAMETER",
            Error::RemoteService { .. } => "REMOTE_SERVICE_ERROR",
            e if e.is_network() => "NETWORK_ERROR",
            _ => "INTERNAL_ERROR",
        };
        ApiError {
            error: err.to_string(),
            code: code.to_string(),
        }
    }
}

/// Status response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Server is running
    pub running: bool,
    /// Server version
    pub version: String,
    /// Configured map backend
    pub map_backend: String,
    /// Live geocode cache entries
    pub cache_size: usize,
    /// Uptime in seconds
    pub uptime_secs: u64,
}

/// Server status endpoint
///
/// GET /api/status
async fn status_handler<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
) -> Json<StatusResponse> {
    let map_backend = state.config.read().await.map.backend.clone();

    Json(StatusResponse {
        running: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        map_backend,
        cache_size: state.client().cache_stats().size,
        uptime_secs: state.uptime_secs(),
    })
}

/// Reverse geocode query
#[derive(Debug, Deserialize)]
pub struct RegeoQuery {
    pub lon: f64,
    pub lat: f64,
    /// Coordinates are raw GPS (WGS-84)
    #[serde(default)]
    pub device: bool,
    pub radius: Option<u32>,
}

/// Reverse geocode a coordinate
///
/// GET /api/regeo?lon=..&lat=..
async fn regeo_handler<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Query(q): Query<RegeoQuery>,
) -> Result<Json<AddressResult>, ApiError> {
    let mut opts = RegeoOptions::default();
    if let Some(radius) = q.radius {
        opts.radius = radius;
    }

    let address = if q.device {
        let coord = DeviceCoordinate::checked(q.lon, q.lat)?;
        state.client().reverse_geocode_device(coord, opts).await?
    } else {
        let coord = VendorCoordinate::checked(q.lon, q.lat)?;
        state.client().reverse_geocode(coord, opts).await?
    };

    Ok(Json(address))
}

/// POI search query
#[derive(Debug, Deserialize)]
pub struct PoiQuery {
    pub keyword: String,
    pub city: Option<String>,
    /// "lon,lat" search center
    pub near: Option<String>,
    pub page: Option<u32>,
}

/// Search points of interest
///
/// GET /api/poi?keyword=..&city=..
async fn poi_handler<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Query(q): Query<PoiQuery>,
) -> Result<Json<Vec<PointOfInterest>>, ApiError> {
    let opts = PoiSearchOptions {
        city: q.city,
        location: q.near.as_deref().map(VendorCoordinate::parse_lnglat).transpose()?,
        page: q.page.unwrap_or(1),
        ..Default::default()
    };

    let pois = state.client().search_poi(&q.keyword, &opts).await?;
    Ok(Json(pois))
}

/// Input tips query
#[derive(Debug, Deserialize)]
pub struct TipsQuery {
    pub keyword: String,
    pub city: Option<String>,
    pub datatype: Option<String>,
}

/// Autocomplete suggestions
///
/// GET /api/tips?keyword=..
async fn tips_handler<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Query(q): Query<TipsQuery>,
) -> Result<Json<Vec<PointOfInterest>>, ApiError> {
    let datatype = match q.datatype.as_deref() {
        Some(d) => d.parse::<SuggestDatatype>().map_err(Error::Config)?,
        None => SuggestDatatype::default(),
    };
    let opts = SuggestOptions {
        location: None,
        city: q.city,
        datatype,
    };

    let tips = state.client().input_suggest(&q.keyword, &opts).await?;
    Ok(Json(tips))
}

/// Route planning query
#[derive(Debug, Deserialize)]
pub struct RouteQuery {
    /// Origin "lon,lat"
    pub from: String,
    /// Destination "lon,lat"
    pub to: String,
    pub mode: Option<String>,
}

/// Plan a route
///
/// GET /api/route?from=..&to=..&mode=..
async fn route_handler<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Query(q): Query<RouteQuery>,
) -> Result<Json<RouteResult>, ApiError> {
    let origin = VendorCoordinate::parse_lnglat(&q.from)?;
    let destination = VendorCoordinate::parse_lnglat(&q.to)?;
    let mode = match q.mode.as_deref() {
        Some(m) => m.parse::<TravelMode>().map_err(Error::Config)?,
        None => TravelMode::default(),
    };
    let opts = RouteOptions {
        mode,
        ..Default::default()
    };

    let route = state.client().plan_route(origin, destination, &opts).await?;
    Ok(Json(route))
}

/// Datum conversion query
#[derive(Debug, Deserialize)]
pub struct ConvertQuery {
    pub lon: f64,
    pub lat: f64,
    /// "vendor" (default) or "device"
    pub to: Option<String>,
}

/// Convert a coordinate between datums
///
/// GET /api/convert?lon=..&lat=..&to=vendor
async fn convert_handler(Query(q): Query<ConvertQuery>) -> Result<Json<Conversion>, ApiError> {
    let target = match q.to.as_deref() {
        Some(t) => t.parse::<TargetDatum>()?,
        None => TargetDatum::Vendor,
    };
    Ok(Json(convert(q.lon, q.lat, target)?))
}

/// Geocode cache contents
///
/// GET /api/cache
async fn cache_handler<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
) -> Json<CacheStats> {
    Json(state.client().cache_stats())
}

/// Drop every cached geocode
///
/// DELETE /api/cache
async fn cache_clear_handler<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
) -> StatusCode {
    state.client().clear_cache();
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::geo::test_support::StubTransport;
    use crate::geo::{GeocodeCache, GeocodingClient, ManualClock};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const REGEO_BODY: &str = r#"{"status":"1","info":"OK","infocode":"10000","regeocode":{
        "formatted_address":"北京市朝阳区望京街道望京SOHO",
        "addressComponent":{"province":"北京市","city":[],"district":"朝阳区",
                            "township":"望京街道","adcode":"110105","citycode":"010"}}}"#;

    fn create_test_app(stub: &StubTransport) -> Router {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let client = GeocodingClient::new(
            stub.clone(),
            "https://restapi.amap.com/v3",
            "0123456789abcdef",
            GeocodeCache::new(clock),
        );
        create_router(Arc::new(AppState::new(Config::default(), Arc::new(client))))
    }

    async fn get_json<R: serde::de::DeserializeOwned>(app: Router, uri: &str) -> (StatusCode, R) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let app = create_test_app(&StubTransport::new());

        let (status, body): (_, StatusResponse) = get_json(app, "/api/status").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.running);
        assert_eq!(body.map_backend, "surface");
        assert_eq!(body.cache_size, 0);
    }

    #[tokio::test]
    async fn test_regeo_endpoint_fills_cache() {
        let stub = StubTransport::new().with_body(REGEO_BODY);
        let app = create_test_app(&stub);

        let (status, address): (_, AddressResult) =
            get_json(app.clone(), "/api/regeo?lon=116.481488&lat=39.990464").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(address.district, "朝阳区");

        let (_, again): (_, AddressResult) =
            get_json(app.clone(), "/api/regeo?lon=116.481488&lat=39.990464").await;
        assert_eq!(again, address);
        assert_eq!(stub.call_count(), 1);

        let (_, stats): (_, CacheStats) = get_json(app, "/api/cache").await;
        assert_eq!(stats.keys, vec!["116.481488,39.990464".to_string()]);
    }

    #[tokio::test]
    async fn test_regeo_invalid_coordinates() {
        let stub = StubTransport::new();
        let app = create_test_app(&stub);

        let (status, err): (_, ApiError) = get_json(app, "/api/regeo?lon=116.4&lat=91").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "INVALID_COORDINATES");
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn test_vendor_error_maps_to_bad_gateway() {
        let stub = StubTransport::new()
            .with_body(r#"{"status":"0","info":"INVALID_USER_KEY","infocode":"10001"}"#);
        let app = create_test_app(&stub);

        let (status, err): (_, ApiError) = get_json(app, "/api/regeo?lon=116.4&lat=39.9").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.code, "REMOTE_SERVICE_ERROR");
        assert!(err.error.contains("10001"));
    }

    #[tokio::test]
    async fn test_non_json_vendor_reply_maps_to_bad_gateway() {
        let stub = StubTransport::new().with_body("<html>captive portal</html>");
        let app = create_test_app(&stub);

        let (status, err): (_, ApiError) = get_json(app, "/api/regeo?lon=116.4&lat=39.9").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.code, "REMOTE_SERVICE_ERROR");
        assert!(err.error.contains("INVALID_RESPONSE"));
    }

    #[tokio::test]
    async fn test_network_error_maps_to_unavailable() {
        let stub = StubTransport::new().with_network_error("connection refused");
        let app = create_test_app(&stub);

        let (status, err): (_, ApiError) = get_json(app, "/api/poi?keyword=cat").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code, "NETWORK_ERROR");
    }

    #[tokio::test]
    async fn test_route_endpoint() {
        let stub = StubTransport::new().with_body(
            r#"{"status":"1","info":"OK","infocode":"10000","route":{"paths":[
                {"distance":"1500","duration":"1200","polyline":"116.48,39.99;116.47,39.98"}]}}"#,
        );
        let app = create_test_app(&stub);

        let (status, route): (_, RouteResult) = get_json(
            app,
            "/api/route?from=116.48,39.99&to=116.47,39.98&mode=walking",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(route.distance_meters, 1500.0);
        assert!(stub.calls()[0].contains("/direction/walking?"));
    }

    #[tokio::test]
    async fn test_route_bad_mode() {
        let app = create_test_app(&StubTransport::new());

        let (status, err): (_, ApiError) =
            get_json(app, "/api/route?from=116.48,39.99&to=116.47,39.98&mode=teleport").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "INVALID_PARAMETER");
    }

    #[tokio::test]
    async fn test_convert_endpoint() {
        let app = create_test_app(&StubTransport::new());

        let (status, body): (_, serde_json::Value) =
            get_json(app, "/api/convert?lon=116.3975&lat=39.9087").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["to"], "gcj02");
        assert_eq!(body["shifted"], true);
    }

    #[tokio::test]
    async fn test_cache_clear() {
        let stub = StubTransport::new().with_body(REGEO_BODY);
        let app = create_test_app(&stub);
        let _: (_, AddressResult) = get_json(app.clone(), "/api/regeo?lon=116.4&lat=39.9").await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/cache")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let (_, stats): (_, CacheStats) = get_json(app, "/api/cache").await;
        assert_eq!(stats.size, 0);
    }
}
