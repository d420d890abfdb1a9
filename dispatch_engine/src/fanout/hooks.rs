use log::*;

use crate::{
    events::{DispatchEvent, EventHooks},
    fanout::{FanoutHub, GroupKey, ServerMessage},
};

/// The groups that must hear about an event, and what they are told.
pub fn route_event(event: &DispatchEvent) -> Vec<(GroupKey, ServerMessage)> {
    match event {
        DispatchEvent::OfferCreated { order_id, vendor_id, latitude, longitude, distance_km } => vec![(
            GroupKey::Vendor(vendor_id.clone()),
            ServerMessage::NewOrderOffer {
                order_id: order_id.clone(),
                latitude: *latitude,
                longitude: *longitude,
                distance_km: *distance_km,
            },
        )],
        DispatchEvent::OrderAccepted { order, vendor_id } => vec![(
            GroupKey::Order(order.id.clone()),
            ServerMessage::OrderAccepted { order_id: order.id.clone(), vendor_id: vendor_id.clone() },
        )],
        DispatchEvent::OrderAssigned { order, vendor_id } => {
            let msg = ServerMessage::OrderAssigned { order_id: order.id.clone(), vendor_id: vendor_id.clone() };
            vec![(GroupKey::Order(order.id.clone()), msg.clone()), (GroupKey::Vendor(vendor_id.clone()), msg)]
        },
        DispatchEvent::OfferWithdrawn { order_id, vendor_id, reason } => vec![(
            GroupKey::Vendor(vendor_id.clone()),
            ServerMessage::OfferWithdrawn { order_id: order_id.clone(), reason: reason.to_string() },
        )],
        DispatchEvent::OfferRejected { order_id, vendor_id, .. } => vec![(
            GroupKey::Order(order_id.clone()),
            ServerMessage::OfferRejected { order_id: order_id.clone(), vendor_id: vendor_id.clone() },
        )],
        DispatchEvent::OrderStatusChanged { order, .. } => vec![(
            GroupKey::Order(order.id.clone()),
            ServerMessage::OrderStatusUpdate { order_id: order.id.clone(), status: order.status },
        )],
    }
}

/// Registers a hook that forwards every dispatch event to the connections in the relevant groups.
pub fn add_fanout_hook(hooks: &mut EventHooks, hub: FanoutHub) {
    hooks.on_dispatch_event(move |event| {
        let hub = hub.clone();
        Box::pin(async move {
            for (group, msg) in route_event(&event) {
                let n = hub.broadcast(&group, &msg);
                debug!("📡️ {} for order {} sent to {n} connections in {group}", event.name(), event.order_id());
            }
        })
    });
}
