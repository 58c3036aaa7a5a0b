mod common;

use std::sync::Arc;
use std::time::Duration;

use common::TestApp;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;
use storefront_api::{
    entities::{Carrier, CarrierCity, CarrierRegion, PickupPoint},
    errors::ServiceError,
    gateways::delivery::NovaPoshtaClient,
    services::delivery_sync::ReferenceDataSync,
};
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

const PAGE_SIZE: u32 = 2;

fn sync_against(app: &TestApp, base_url: String) -> ReferenceDataSync {
    let client = NovaPoshtaClient::new(
        "test-api-key".to_string(),
        base_url,
        Duration::from_secs(2),
    )
    .unwrap();

    ReferenceDataSync::new(
        app.state.db.clone(),
        client,
        Arc::new(app.state.event_sender.clone()),
        PAGE_SIZE,
    )
}

fn data_response(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": data }))
}

/// One region, three cities (two pages), three warehouses (two pages).
async fn mount_full_hierarchy(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "calledMethod": "getAreas" })))
        .respond_with(data_response(json!([
            { "Ref": "area-1", "Description": "Kyivska" }
        ])))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(
            json!({ "calledMethod": "getCities", "methodProperties": { "Page": "1" } }),
        ))
        .respond_with(data_response(json!([
            { "Ref": "city-1", "Description": "Kyiv", "Area": "area-1", "SettlementTypeDescription": "city" },
            { "Ref": "city-2", "Description": "Brovary", "Area": "area-1", "SettlementTypeDescription": "city" }
        ])))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(
            json!({ "calledMethod": "getCities", "methodProperties": { "Page": "2" } }),
        ))
        .respond_with(data_response(json!([
            { "Ref": "city-3", "Description": "Irpin", "Area": "area-1", "SettlementTypeDescription": "city" }
        ])))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(
            json!({ "calledMethod": "getWarehouses", "methodProperties": { "Page": "1" } }),
        ))
        .respond_with(data_response(json!([
            { "Ref": "wh-1", "ShortAddress": "1 Peremohy Ave", "Description": "Branch 1",
              "CityRef": "city-1", "Number": "1", "Phone": "+380441111111" },
            { "Ref": "wh-2", "ShortAddress": "2 Soborna St", "Description": "Branch 2",
              "CityRef": "city-2", "Number": "2", "Phone": "+380442222222" }
        ])))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(
            json!({ "calledMethod": "getWarehouses", "methodProperties": { "Page": "2" } }),
        ))
        .respond_with(data_response(json!([
            { "Ref": "wh-3", "ShortAddress": "3 Tsentralna St", "Description": "Branch 3",
              "CityRef": "city-3", "Number": "3", "Phone": "+380443333333" }
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn sync_populates_the_reference_cache() {
    let app = TestApp::new().await;
    let server = MockServer::start().await;
    mount_full_hierarchy(&server).await;

    let sync = sync_against(&app, server.uri());
    let report = sync.run().await.unwrap();

    assert_eq!(report.regions, 1);
    assert_eq!(report.cities, 3);
    assert_eq!(report.pickup_points, 3);

    assert_eq!(CarrierRegion::find().count(&*app.state.db).await.unwrap(), 1);
    assert_eq!(CarrierCity::find().count(&*app.state.db).await.unwrap(), 3);
    assert_eq!(PickupPoint::find().count(&*app.state.db).await.unwrap(), 3);
}

#[tokio::test]
async fn rerunning_the_sync_upserts_instead_of_duplicating() {
    let app = TestApp::new().await;
    let server = MockServer::start().await;
    mount_full_hierarchy(&server).await;

    let sync = sync_against(&app, server.uri());
    sync.run().await.unwrap();
    let report = sync.run().await.unwrap();

    assert_eq!(report.cities, 3);
    assert_eq!(CarrierRegion::find().count(&*app.state.db).await.unwrap(), 1);
    assert_eq!(CarrierCity::find().count(&*app.state.db).await.unwrap(), 3);
    assert_eq!(PickupPoint::find().count(&*app.state.db).await.unwrap(), 3);
}

#[tokio::test]
async fn a_failed_fetch_leaves_the_cache_intact() {
    let app = TestApp::new().await;

    let healthy = MockServer::start().await;
    mount_full_hierarchy(&healthy).await;
    sync_against(&app, healthy.uri()).run().await.unwrap();

    // The carrier API now fails before returning anything.
    let broken = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;

    let err = sync_against(&app, broken.uri()).run().await.unwrap_err();
    assert!(matches!(err, ServiceError::GatewayError(_)));

    // Previously cached entries all survive.
    assert_eq!(CarrierRegion::find().count(&*app.state.db).await.unwrap(), 1);
    assert_eq!(CarrierCity::find().count(&*app.state.db).await.unwrap(), 3);
    assert_eq!(PickupPoint::find().count(&*app.state.db).await.unwrap(), 3);
}

#[tokio::test]
async fn a_failure_after_the_city_stage_keeps_earlier_stages() {
    let app = TestApp::new().await;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "calledMethod": "getAreas" })))
        .respond_with(data_response(json!([
            { "Ref": "area-1", "Description": "Kyivska" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "calledMethod": "getCities" })))
        .respond_with(data_response(json!([
            { "Ref": "city-1", "Description": "Kyiv", "Area": "area-1", "SettlementTypeDescription": "city" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "calledMethod": "getWarehouses" })))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = sync_against(&app, server.uri()).run().await.unwrap_err();
    assert!(matches!(err, ServiceError::GatewayError(_)));

    // Regions and cities landed; no pickup points were written.
    assert_eq!(CarrierRegion::find().count(&*app.state.db).await.unwrap(), 1);
    assert_eq!(CarrierCity::find().count(&*app.state.db).await.unwrap(), 1);
    assert_eq!(PickupPoint::find().count(&*app.state.db).await.unwrap(), 0);
}

#[tokio::test]
async fn gateway_listings_read_from_the_cache() {
    let app = TestApp::new().await;
    let server = MockServer::start().await;
    mount_full_hierarchy(&server).await;
    sync_against(&app, server.uri()).run().await.unwrap();

    let gateway = app
        .state
        .services
        .delivery_gateways
        .resolve(Carrier::NovaPoshta)
        .unwrap();

    let regions = gateway.list_regions().await.unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].name, "Kyivska");

    let cities = gateway.list_cities(regions[0].id).await.unwrap();
    assert_eq!(cities.len(), 3);

    let kyiv = cities.iter().find(|city| city.name == "Kyiv").unwrap();
    let points = gateway.list_pickup_points(kyiv.id).await.unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].address_line, "1 Peremohy Ave");
}
