use actix_web::{http::StatusCode, web, web::ServiceConfig};
use dispatch_engine::{
    db_types::{Candidate, NewOrder, NewVendor, Order, OrderStatusType, Vendor},
    events::EventProducers,
    test_utils::prepare_env::{fresh_database, tear_down},
    Dispatcher,
    OrderFlowApi,
    SearchConfig,
    SqliteDatabase,
};
use serde_json::json;

use super::helpers::{get_request, post_request, put_request, valid_token};
use crate::{
    auth::Role,
    data_objects::ExpiredOffersResult,
    routes::{
        AssignOrderRoute,
        DispatchOrderRoute,
        ExpireOffersRoute,
        NewOrderRoute,
        OrderCandidatesRoute,
        UpdateOrderStatusRoute,
        UpsertVendorRoute,
    },
};

fn configure(db: SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let producers = EventProducers::default();
        let dispatcher = Dispatcher::new(db.clone(), SearchConfig::default(), producers.clone());
        let flow = OrderFlowApi::new(db, producers);
        cfg.service(OrderCandidatesRoute::<SqliteDatabase>::new())
            .service(DispatchOrderRoute::<SqliteDatabase>::new())
            .service(AssignOrderRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(ExpireOffersRoute::<SqliteDatabase>::new())
            .service(NewOrderRoute::<SqliteDatabase>::new())
            .service(UpsertVendorRoute::<SqliteDatabase>::new())
            .app_data(web::Data::new(dispatcher))
            .app_data(web::Data::new(flow));
    }
}

/// Two approved vendors near a paid order.
async fn seeded_database() -> SqliteDatabase {
    let db = fresh_database().await;
    let flow = OrderFlowApi::new(db.clone(), EventProducers::default());
    flow.upsert_vendor(NewVendor::approved("V1".into(), "Sparks & Co", 12.9108, 77.60)).await.unwrap();
    flow.upsert_vendor(NewVendor::approved("V2".into(), "Pipe Dreams", 12.86942, 77.60)).await.unwrap();
    flow.ingest_order(NewOrder::new("1001".into(), "alice", 12.90, 77.60)).await.unwrap();
    flow.modify_status(&"1001".into(), OrderStatusType::AwaitingAssignment, "payments").await.unwrap();
    db
}

#[actix_web::test]
async fn customers_cannot_use_admin_routes() {
    let _ = env_logger::try_init().ok();
    let db = seeded_database().await;
    let token = valid_token("alice", Role::Customer);
    let (status, body) = post_request(&token, "/orders/1001/dispatch", json!({}), configure(db.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("not available to the customer role"));
    let token = valid_token("V1", Role::Vendor);
    let (status, _) = get_request(&token, "/orders/1001/candidates", configure(db.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    tear_down(db).await;
}

#[actix_web::test]
async fn ingest_order_and_vendor() {
    let _ = env_logger::try_init().ok();
    let db = fresh_database().await;
    let token = valid_token("ops", Role::Admin);
    let order = json!({"id": "2002", "customer_id": "bob", "latitude": 12.95, "longitude": 77.58});
    let (status, body) = post_request(&token, "/orders", order.clone(), configure(db.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let order_out: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order_out.status, OrderStatusType::PendingPayment);
    assert_eq!(order_out.customer_id, "bob");

    let (status, _) = post_request(&token, "/orders", order, configure(db.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let vendor = json!({"name": "Sparks & Co", "approval_status": "approved", "latitude": 12.95, "longitude": 77.59});
    let (status, body) = put_request(&token, "/vendors/V7", vendor, configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let vendor: Vendor = serde_json::from_str(&body).unwrap();
    assert_eq!(vendor.id.as_str(), "V7");
    assert!(vendor.is_dispatchable());
    tear_down(db).await;
}

#[actix_web::test]
async fn candidates_and_dispatch() {
    let _ = env_logger::try_init().ok();
    let db = seeded_database().await;
    let token = valid_token("ops", Role::Admin);
    let (status, body) = get_request(&token, "/orders/1001/candidates", configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let candidates: Vec<Candidate> = serde_json::from_str(&body).unwrap();
    let ids = candidates.iter().map(|c| c.vendor_id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["V1", "V2"], "Nearest vendor first");

    let (status, body) =
        get_request(&token, "/orders/1001/candidates?radius_km=2", configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let candidates: Vec<Candidate> = serde_json::from_str(&body).unwrap();
    assert_eq!(candidates.len(), 1);

    let (status, _) = get_request(&token, "/orders/1001/candidates?radius_km=-1", configure(db.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_request(&token, "/orders/1001/dispatch", json!({}), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let offered: Vec<Candidate> = serde_json::from_str(&body).unwrap();
    assert_eq!(offered.len(), 2);

    // Offers already open are not made twice
    let (status, body) = post_request(&token, "/orders/1001/dispatch", json!({}), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");

    let (status, _) = post_request(&token, "/orders/9999/dispatch", json!({}), configure(db.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    tear_down(db).await;
}

#[actix_web::test]
async fn force_assign_and_override_status() {
    let _ = env_logger::try_init().ok();
    let db = seeded_database().await;
    let token = valid_token("ops", Role::Admin);
    let (status, _) = post_request(&token, "/orders/1001/dispatch", json!({}), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        post_request(&token, "/orders/1001/assign", json!({"vendor_id": "V2"}), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatusType::Assigned);
    assert_eq!(order.assigned_vendor_id.as_ref().map(|v| v.as_str()), Some("V2"));

    let (status, _) =
        post_request(&token, "/orders/1001/status", json!({"status": "completed"}), configure(db.clone())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) =
        post_request(&token, "/orders/1001/status", json!({"status": "cancelled"}), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatusType::Cancelled);
    tear_down(db).await;
}

#[actix_web::test]
async fn expire_offers_on_demand() {
    let _ = env_logger::try_init().ok();
    let db = seeded_database().await;
    let token = valid_token("ops", Role::Admin);
    let (status, _) = post_request(&token, "/orders/1001/dispatch", json!({}), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_request(&token, "/orders/1001/expire_offers", json!({}), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let result: ExpiredOffersResult = serde_json::from_str(&body).unwrap();
    assert_eq!(result.expired.len(), 2);

    let (status, body) = post_request(&token, "/orders/1001/expire_offers", json!({}), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let result: ExpiredOffersResult = serde_json::from_str(&body).unwrap();
    assert!(result.expired.is_empty());
    tear_down(db).await;
}
