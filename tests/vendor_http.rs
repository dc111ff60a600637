//! End-to-end geocoding over real HTTP against a local mock vendor.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use rescue_geo::coord::VendorCoordinate;
use rescue_geo::geo::ip_location::IpLocator;
use rescue_geo::geo::{GeocodeCache, GeocodingClient, ManualClock, RegeoOptions, ReqwestTransport};
use rescue_geo::Error;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const KEY: &str = "0123456789abcdef";

#[derive(Default)]
struct Vendor {
    regeo_hits: AtomicUsize,
}

fn address(i: usize) -> serde_json::Value {
    json!({
        "formatted_address": format!("上海市黄浦区外滩{}号", i),
        "addressComponent": {
            "province": "上海市", "city": [], "district": "黄浦区",
            "township": "外滩街道", "adcode": "310101", "citycode": "021",
            "streetNumber": {"street": "中山东一路", "number": format!("{}号", i)}
        }
    })
}

async fn regeo(
    State(vendor): State<Arc<Vendor>>,
    Query(q): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    vendor.regeo_hits.fetch_add(1, Ordering::SeqCst);

    if q.get("key").map(String::as_str) != Some(KEY) {
        let body = json!({"status": "0", "info": "INVALID_USER_KEY", "infocode": "10001"});
        return (StatusCode::OK, body.to_string());
    }

    let location = q.get("location").cloned().unwrap_or_default();
    let body = if q.get("batch").map(String::as_str) == Some("true") {
        let regeocodes: Vec<_> = location.split('|').enumerate().map(|(i, _)| address(i)).collect();
        json!({"status": "1", "info": "OK", "infocode": "10000", "regeocodes": regeocodes})
    } else {
        json!({"status": "1", "info": "OK", "infocode": "10000", "regeocode": address(1)})
    };
    (StatusCode::OK, body.to_string())
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn ip() -> String {
    json!({"status": "success", "lat": 31.2304, "lon": 121.4737,
           "city": "Shanghai", "regionName": "Shanghai", "country": "China"})
    .to_string()
}

async fn spawn_vendor() -> (String, Arc<Vendor>) {
    let vendor = Arc::new(Vendor::default());
    let app = Router::new()
        .route("/v3/geocode/regeo", get(regeo))
        .route("/broken/geocode/regeo", get(broken))
        .route("/json", get(ip))
        .with_state(vendor.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), vendor)
}

fn client(base_url: String, key: &str) -> GeocodingClient {
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
    let cache = GeocodeCache::new(Arc::new(ManualClock::new(1_700_000_000_000)));
    GeocodingClient::new(transport, base_url, key, cache)
}

#[tokio::test]
async fn test_reverse_geocode_over_http_is_cached() {
    let (root, vendor) = spawn_vendor().await;
    let client = client(format!("{}/v3", root), KEY);
    let coord = VendorCoordinate::new(121.490_317, 31.241_701);

    let first = client.reverse_geocode(coord, RegeoOptions::default()).await.unwrap();
    let second = client.reverse_geocode(coord, RegeoOptions::default()).await.unwrap();

    assert_eq!(first.formatted_address, "上海市黄浦区外滩1号");
    assert_eq!(first.street.as_deref(), Some("中山东一路"));
    assert_eq!(first.city, "");
    assert_eq!(first, second);
    assert_eq!(vendor.regeo_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bad_key_surfaces_vendor_code() {
    let (root, _vendor) = spawn_vendor().await;
    let client = client(format!("{}/v3", root), "wrong-key-000000");

    let err = client
        .reverse_geocode(VendorCoordinate::new(121.49, 31.24), RegeoOptions::default())
        .await
        .unwrap_err();

    match err {
        Error::RemoteService { code, message } => {
            assert_eq!(code, "10001");
            assert_eq!(message, "INVALID_USER_KEY");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(client.cache_stats().size, 0);
}

#[tokio::test]
async fn test_http_failure_status() {
    let (root, _vendor) = spawn_vendor().await;
    let client = client(format!("{}/broken", root), KEY);

    let err = client
        .reverse_geocode(VendorCoordinate::new(121.49, 31.24), RegeoOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::RemoteService { ref code, .. } if code == "HTTP_500"));
}

#[tokio::test]
async fn test_unreachable_vendor_is_network_error() {
    // bind and drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(format!("http://{}/v3", addr), KEY);
    let err = client
        .reverse_geocode(VendorCoordinate::new(121.49, 31.24), RegeoOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_network(), "got {}", err);
}

#[tokio::test]
async fn test_batch_over_http_splits_requests() {
    let (root, vendor) = spawn_vendor().await;
    let client = client(format!("{}/v3", root), KEY);
    let coords: Vec<_> = (0..45)
        .map(|i| VendorCoordinate::new(121.40 + i as f64 * 0.001, 31.20))
        .collect();

    let results = client.reverse_geocode_batch(&coords).await;

    assert_eq!(results.len(), 45);
    assert_eq!(vendor.regeo_hits.load(Ordering::SeqCst), 3);
    assert_eq!(results[20].source_coordinate, coords[20]);
}

#[tokio::test]
async fn test_ip_locator_over_http() {
    let (root, _vendor) = spawn_vendor().await;
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
    let locator = IpLocator::without_cache(transport).with_url(format!("{}/json", root));

    let fix = locator.locate().await.unwrap();

    assert_eq!(fix.coordinate.longitude, 121.4737);
    assert_eq!(fix.display_name, "Shanghai, Shanghai, China");
}
