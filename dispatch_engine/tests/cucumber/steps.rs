use std::str::FromStr;

use cucumber::{given, then, when};
use dispatch_engine::{
    db_types::{NewVendor, OfferStatus, OrderId, OrderStatusType, VendorId},
    DispatchError,
    OrderManagement,
};
use futures_util::future::join_all;

use crate::{cucumber::DispatchWorld, support::harness::ORDER_LON};

#[given(expr = "an approved vendor {word} at latitude {float}")]
async fn approved_vendor(world: &mut DispatchWorld, id: String, lat: f64) {
    let vendor = NewVendor::approved(VendorId::from(id.as_str()), id.as_str(), lat, ORDER_LON);
    world.system().await.vendor(vendor).await;
}

#[given(expr = "a blocked vendor {word} at latitude {float}")]
async fn blocked_vendor(world: &mut DispatchWorld, id: String, lat: f64) {
    let vendor = NewVendor::approved(VendorId::from(id.as_str()), id.as_str(), lat, ORDER_LON).blocked();
    world.system().await.vendor(vendor).await;
}

#[given(expr = "a paid order {word} at latitude {float}")]
async fn paid_order(world: &mut DispatchWorld, id: String, lat: f64) {
    world.system().await.paid_order(&id, lat, ORDER_LON).await;
}

#[when(expr = "order {word} is dispatched")]
async fn dispatch(world: &mut DispatchWorld, id: String) {
    world.sys().dispatcher.dispatch_order(&OrderId::from(id), None).await.expect("Error dispatching order");
}

#[when(expr = "vendors {word} and {word} accept order {word} at the same time")]
async fn race(world: &mut DispatchWorld, a: String, b: String, id: String) {
    let order_id = OrderId::from(id);
    let vendors = [VendorId::from(a.as_str()), VendorId::from(b.as_str())];
    let results = join_all(vendors.iter().map(|v| world.sys().coordinator.accept(&order_id, v))).await;
    world.results = [a, b].into_iter().zip(results).collect();
}

#[when(expr = "vendor {word} accepts order {word}")]
async fn accept(world: &mut DispatchWorld, vendor: String, id: String) {
    let result = world.sys().coordinator.accept(&OrderId::from(id), &VendorId::from(vendor.as_str())).await;
    world.last_error = result.as_ref().err().cloned();
    world.results.insert(vendor, result);
}

#[when(expr = "vendor {word} rejects order {word}")]
async fn reject(world: &mut DispatchWorld, vendor: String, id: String) {
    world
        .sys()
        .coordinator
        .reject(&OrderId::from(id), &VendorId::from(vendor), Some("Too busy".into()))
        .await
        .expect("Error rejecting offer");
}

#[when(expr = "vendor {word} sets order {word} to {word}")]
async fn vendor_status(world: &mut DispatchWorld, vendor: String, id: String, status: String) {
    let status = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let result = world.sys().coordinator.update_status(&OrderId::from(id), &VendorId::from(vendor), status).await;
    world.last_error = result.err();
}

#[when(expr = "order {word} is cancelled by {word}")]
async fn cancel(world: &mut DispatchWorld, id: String, actor: String) {
    world
        .sys()
        .flow
        .modify_status(&OrderId::from(id), OrderStatusType::Cancelled, &actor)
        .await
        .expect("Error cancelling order");
}

#[then("exactly one vendor wins the order")]
async fn one_winner(world: &mut DispatchWorld) {
    let winners = world.results.values().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "{:?}", world.results);
    assert!(world.results.values().filter_map(|r| r.as_ref().err()).all(DispatchError::is_lost_race));
}

#[then(expr = "order {word} is {word}")]
async fn order_status(world: &mut DispatchWorld, id: String, status: String) {
    let expected = OrderStatusType::from_str(&status).expect("Not a valid order status");
    let order = world.sys().db.fetch_order(&OrderId::from(id)).await.expect("Error fetching order");
    assert_eq!(order.expect("Order does not exist").status, expected);
}

#[then(expr = "order {word} is assigned to the winner")]
async fn assigned_to_winner(world: &mut DispatchWorld, id: String) {
    let winner = world.results.iter().find_map(|(v, r)| r.as_ref().ok().map(|_| v.clone())).expect("No winner");
    let order = world.sys().db.fetch_order(&OrderId::from(id)).await.expect("Error fetching order").unwrap();
    assert_eq!(order.assigned_vendor_id, Some(VendorId::from(winner.as_str())));
}

#[then(expr = "vendor {word} has a {word} offer for order {word}")]
async fn offer_status(world: &mut DispatchWorld, vendor: String, status: String, id: String) {
    let offers = world.sys().db.fetch_assignments_for_order(&OrderId::from(id)).await.expect("Error fetching offers");
    let offer = offers.iter().find(|o| o.vendor_id.as_str() == vendor).expect("Vendor has no offer");
    assert_eq!(offer.status.to_string(), status);
}

#[then(expr = "vendor {word} has no offer for order {word}")]
async fn no_offer(world: &mut DispatchWorld, vendor: String, id: String) {
    let offers = world.sys().db.fetch_assignments_for_order(&OrderId::from(id)).await.expect("Error fetching offers");
    assert!(offers.iter().all(|o| o.vendor_id.as_str() != vendor));
}

#[then(expr = "order {word} has {int} pending offers")]
async fn pending_offers(world: &mut DispatchWorld, id: String, count: usize) {
    let offers = world.sys().db.fetch_assignments_for_order(&OrderId::from(id)).await.expect("Error fetching offers");
    assert_eq!(offers.iter().filter(|o| o.status == OfferStatus::Pending).count(), count);
}

#[then("the request is turned away as a lost race")]
async fn lost_race(world: &mut DispatchWorld) {
    let err = world.last_error.as_ref().expect("Expected the last request to fail");
    assert!(err.is_lost_race(), "{err:?}");
}

#[then("the request is refused as unauthorized")]
async fn unauthorized(world: &mut DispatchWorld) {
    let err = world.last_error.as_ref().expect("Expected the last request to fail");
    assert!(matches!(err, DispatchError::AuthorizationDenied(_)), "{err:?}");
}
