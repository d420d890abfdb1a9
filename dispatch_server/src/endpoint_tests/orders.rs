use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{Duration, Utc};
use dispatch_engine::{
    db_types::{Assignment, OfferStatus, Order, OrderHistoryEntry, OrderId, OrderStatusType, VendorId},
    traits::OrderDetails,
    OrderQueryApi,
};
use log::debug;

use super::{
    helpers::{get_request, issue_token, valid_token},
    mocks::MockOrderStore,
};
use crate::{auth::Role, routes::OrderByIdRoute};

#[actix_web::test]
async fn fetch_order_no_token() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("", "/orders/1001", configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authentication Error. No bearer token was provided."}"#);
}

#[actix_web::test]
async fn fetch_order_as_admin() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("ops", Role::Admin);
    let (status, body) = get_request(&token, "/orders/1001", configure).await;
    assert_eq!(status, StatusCode::OK);
    let details: OrderDetails = serde_json::from_str(&body).unwrap();
    assert_eq!(details.order.id.as_str(), "1001");
    assert_eq!(details.assignments.len(), 2);
    assert_eq!(details.history.len(), 1);
}

#[actix_web::test]
async fn fetch_own_order_as_customer() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("alice", Role::Customer);
    let (status, body) = get_request(&token, "/orders/1001", configure).await;
    assert_eq!(status, StatusCode::OK);
    let details: OrderDetails = serde_json::from_str(&body).unwrap();
    assert_eq!(details.order.customer_id, "alice");
    assert_eq!(details.assignments.len(), 2);
    assert!(details.history.is_empty(), "Customers do not see the audit trail");
}

#[actix_web::test]
async fn try_fetch_another_customers_order() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("bob", Role::Customer);
    let (status, _) = get_request(&token, "/orders/1001", configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn fetch_offered_order_as_vendor() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("V1", Role::Vendor);
    let (status, body) = get_request(&token, "/orders/1001", configure).await;
    assert_eq!(status, StatusCode::OK);
    let details: OrderDetails = serde_json::from_str(&body).unwrap();
    assert_eq!(details.assignments.len(), 1, "Vendors only see their own offer");
    assert_eq!(details.assignments[0].vendor_id, VendorId::from("V1"));
    assert!(details.history.is_empty());
}

#[actix_web::test]
async fn try_fetch_order_never_offered_to_vendor() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("V9", Role::Vendor);
    let (status, _) = get_request(&token, "/orders/1001", configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn fetch_unknown_order() {
    let _ = env_logger::try_init().ok();
    let token = valid_token("ops", Role::Admin);
    let (status, body) = get_request(&token, "/orders/2002", configure).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Order #2002"));
}

#[actix_web::test]
async fn fetch_order_expired_token() {
    let _ = env_logger::try_init().ok();
    let token = issue_token("ops", Role::Admin, Duration::minutes(-5));
    let (status, body) = get_request(&token, "/orders/1001", configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authentication Error. Access token has expired."}"#);
}

#[actix_web::test]
async fn fetch_order_invalid_sig() {
    let _ = env_logger::try_init().ok();
    let mut token = valid_token("ops", Role::Admin);
    token.replace_range(token.len() - 10..token.len() - 5, "AAAAA");
    debug!("Calling /orders/1001 with invalid token {token}");
    let (status, body) = get_request(&token, "/orders/1001", configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("signature is invalid"));
}

fn configure(cfg: &mut ServiceConfig) {
    let mut store = MockOrderStore::new();
    store.expect_fetch_order().returning(|id| Ok((id.as_str() == "1001").then(sample_order)));
    store.expect_fetch_assignments_for_order().returning(|id| {
        let offers = vec![offer(1, id, "V1", OfferStatus::Pending), offer(2, id, "V2", OfferStatus::Rejected)];
        Ok(offers)
    });
    store.expect_fetch_order_history().returning(|id| {
        Ok(vec![OrderHistoryEntry {
            id: 1,
            order_id: id.clone(),
            from_status: Some(OrderStatusType::PendingPayment),
            to_status: OrderStatusType::AwaitingAssignment,
            actor: "payments".into(),
            note: None,
            created_at: Utc::now(),
        }])
    });
    let api = OrderQueryApi::new(store);
    cfg.service(OrderByIdRoute::<MockOrderStore>::new()).app_data(web::Data::new(api));
}

fn sample_order() -> Order {
    let now = Utc::now();
    Order {
        id: OrderId::from("1001"),
        customer_id: "alice".into(),
        status: OrderStatusType::AwaitingAssignment,
        latitude: 12.90,
        longitude: 77.60,
        service_area: Some("560001".into()),
        assigned_vendor_id: None,
        created_at: now,
        updated_at: now,
        assigned_at: None,
        accepted_at: None,
        started_at: None,
        completed_at: None,
        cancelled_at: None,
    }
}

fn offer(id: i64, order_id: &OrderId, vendor: &str, status: OfferStatus) -> Assignment {
    let now = Utc::now();
    Assignment {
        id,
        order_id: order_id.clone(),
        vendor_id: VendorId::from(vendor),
        status,
        distance_km: Some(1.2),
        reason: None,
        offered_at: now,
        responded_at: None,
        updated_at: now,
    }
}
