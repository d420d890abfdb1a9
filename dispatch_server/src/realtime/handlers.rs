use dispatch_engine::{
    db_types::{Order, VendorId},
    fanout::{ClientMessage, ConnectionId, GroupKey, ServerMessage},
    DispatchDatabase,
    DispatchError,
    LockProvider,
};
use log::*;

use crate::{
    auth::{JwtClaims, Role},
    realtime::RealtimeContext,
};

/// An authenticated connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub connection: ConnectionId,
    pub claims: JwtClaims,
}

impl Session {
    pub fn new(connection: ConnectionId, claims: JwtClaims) -> Self {
        Self { connection, claims }
    }

    /// Vendors may only speak for themselves.
    fn authorise_vendor(&self, vendor_id: &VendorId) -> Result<(), DispatchError> {
        match self.claims.vendor_id() {
            Some(me) if &me == vendor_id => Ok(()),
            Some(me) => Err(DispatchError::AuthorizationDenied(format!("Connected as vendor {me}, not {vendor_id}"))),
            None => Err(DispatchError::AuthorizationDenied(format!(
                "A {} connection cannot act for a vendor",
                self.claims.role
            ))),
        }
    }

    /// Customers may follow their own orders, vendors the orders assigned to them, and administrators any order.
    fn may_follow(&self, order: &Order) -> bool {
        match self.claims.role {
            Role::Admin => true,
            Role::Customer => order.customer_id == self.claims.sub,
            Role::Vendor => self.claims.vendor_id().is_some_and(|v| order.is_assigned_to(&v)),
        }
    }
}

/// Parses a text frame and handles it. Frames that do not parse get an `ERROR` reply and the connection stays open.
pub async fn handle_frame<B, L>(ctx: &RealtimeContext<B, L>, session: &Session, frame: &str) -> ServerMessage
where
    B: DispatchDatabase,
    L: LockProvider,
{
    match ClientMessage::parse(frame) {
        Ok(msg) => handle_message(ctx, session, msg).await,
        Err(e) => {
            debug!("📡️ Malformed frame on connection {}. {e}", session.connection);
            ServerMessage::error(format!("Malformed message. {e}"))
        },
    }
}

/// Runs one client request against the engine and returns the direct reply. Notifications for other parties are
/// published as engine events and reach them through the fanout hub.
pub async fn handle_message<B, L>(ctx: &RealtimeContext<B, L>, session: &Session, msg: ClientMessage) -> ServerMessage
where
    B: DispatchDatabase,
    L: LockProvider,
{
    if let Some(vendor_id) = msg.vendor_id() {
        if let Err(e) = session.authorise_vendor(vendor_id) {
            info!("📡️ Refused {msg:?} from {}. {e}", session.claims.sub);
            return failure(msg, e);
        }
    }
    match msg {
        ClientMessage::AcceptOrder { order_id, vendor_id } => {
            match ctx.coordinator.accept(&order_id, &vendor_id).await {
                Ok(_) => {
                    ctx.hub.join(session.connection, GroupKey::Order(order_id.clone()));
                    ServerMessage::AcceptOrderSuccess { order_id }
                },
                Err(e) => ServerMessage::AcceptOrderFailed { order_id, reason: e.to_string() },
            }
        },
        ClientMessage::RejectOrder { order_id, vendor_id, reason } => {
            match ctx.coordinator.reject(&order_id, &vendor_id, reason).await {
                Ok(_) => ServerMessage::RejectOrderSuccess { order_id },
                Err(e) => ServerMessage::RejectOrderFailed { order_id, reason: e.to_string() },
            }
        },
        ClientMessage::UpdateOrderStatus { order_id, vendor_id, status } => {
            match ctx.coordinator.update_status(&order_id, &vendor_id, status).await {
                Ok(order) => ServerMessage::UpdateStatusSuccess { order_id, status: order.status },
                Err(e) => ServerMessage::UpdateStatusFailed { order_id, reason: e.to_string() },
            }
        },
        ClientMessage::SubscribeOrder { order_id } => match ctx.queries.fetch_order(&order_id).await {
            Ok(Some(order)) if session.may_follow(&order) => {
                ctx.hub.join(session.connection, GroupKey::Order(order_id.clone()));
                ServerMessage::Subscribed { order_id }
            },
            Ok(Some(_)) => {
                let reason = DispatchError::AuthorizationDenied(format!("You may not follow order {order_id}"));
                ServerMessage::SubscribeFailed { order_id, reason: reason.to_string() }
            },
            Ok(None) => {
                let reason = DispatchError::OrderNotFound(order_id.clone()).to_string();
                ServerMessage::SubscribeFailed { order_id, reason }
            },
            Err(e) => ServerMessage::SubscribeFailed { order_id, reason: e.to_string() },
        },
    }
}

fn failure(msg: ClientMessage, e: DispatchError) -> ServerMessage {
    let reason = e.to_string();
    match msg {
        ClientMessage::AcceptOrder { order_id, .. } => ServerMessage::AcceptOrderFailed { order_id, reason },
        ClientMessage::RejectOrder { order_id, .. } => ServerMessage::RejectOrderFailed { order_id, reason },
        ClientMessage::UpdateOrderStatus { order_id, .. } => ServerMessage::UpdateStatusFailed { order_id, reason },
        ClientMessage::SubscribeOrder { order_id } => ServerMessage::SubscribeFailed { order_id, reason },
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use dispatch_engine::{
        db_types::{NewOrder, NewVendor, OrderId, OrderStatusType},
        events::{EventHandlers, EventHooks},
        fanout::{add_fanout_hook, FanoutHub},
        locks::MemoryLockProvider,
        test_utils::prepare_env::{fresh_database, tear_down},
        AcceptanceCoordinator,
        Dispatcher,
        LockConfig,
        OrderFlowApi,
        OrderManagement,
        OrderQueryApi,
        SearchConfig,
        SqliteDatabase,
    };
    use futures::future::join;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::{auth::TokenVerifier, config::AuthConfig};

    struct TestSystem {
        db: SqliteDatabase,
        ctx: RealtimeContext<SqliteDatabase, MemoryLockProvider>,
        dispatcher: Dispatcher<SqliteDatabase>,
    }

    impl TestSystem {
        async fn new() -> Self {
            let db = fresh_database().await;
            let hub = FanoutHub::new();
            let mut hooks = EventHooks::default();
            add_fanout_hook(&mut hooks, hub.clone());
            let handlers = EventHandlers::new(64, hooks);
            let producers = handlers.producers();
            handlers.start_handlers().await;
            let flow = OrderFlowApi::new(db.clone(), producers.clone());
            for (id, lat) in [("V1", 12.9108), ("V2", 12.86942)] {
                flow.upsert_vendor(NewVendor::approved(id.into(), id, lat, 77.60)).await.unwrap();
            }
            flow.ingest_order(NewOrder::new("1001".into(), "alice", 12.90, 77.60)).await.unwrap();
            flow.modify_status(&"1001".into(), OrderStatusType::AwaitingAssignment, "payments").await.unwrap();
            let dispatcher = Dispatcher::new(db.clone(), SearchConfig::default(), producers.clone());
            let coordinator =
                AcceptanceCoordinator::new(db.clone(), MemoryLockProvider::new(), LockConfig::default(), producers);
            let auth = AuthConfig::new("realtime-handler-tests-secret-value").unwrap();
            let ctx = RealtimeContext::new(coordinator, OrderQueryApi::new(db.clone()), hub, TokenVerifier::new(&auth));
            Self { db, ctx, dispatcher }
        }

        fn connect(&self, role: Role, sub: &str) -> (Session, UnboundedReceiver<ServerMessage>) {
            let (id, rx) = self.ctx.hub.register();
            if role == Role::Vendor {
                self.ctx.hub.join(id, GroupKey::Vendor(sub.into()));
            }
            (Session::new(id, JwtClaims::new(sub, role)), rx)
        }

        async fn dispatch(&self) {
            let offered = self.dispatcher.dispatch_order(&order(), None).await.unwrap();
            assert_eq!(offered.len(), 2);
        }
    }

    fn order() -> OrderId {
        OrderId::from("1001")
    }

    fn accept(vendor: &str) -> ClientMessage {
        ClientMessage::AcceptOrder { order_id: order(), vendor_id: vendor.into() }
    }

    async fn next_message(rx: &mut UnboundedReceiver<ServerMessage>) -> Option<ServerMessage> {
        tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.ok().flatten()
    }

    /// Skips notifications until one matches.
    async fn wait_for<F>(rx: &mut UnboundedReceiver<ServerMessage>, pred: F) -> Option<ServerMessage>
    where F: Fn(&ServerMessage) -> bool {
        while let Some(msg) = next_message(rx).await {
            if pred(&msg) {
                return Some(msg);
            }
        }
        None
    }

    #[tokio::test]
    async fn vendors_receive_offers_and_one_accept_wins() {
        let sys = TestSystem::new().await;
        let (v1, mut rx1) = sys.connect(Role::Vendor, "V1");
        let (v2, mut rx2) = sys.connect(Role::Vendor, "V2");
        sys.dispatch().await;
        for rx in [&mut rx1, &mut rx2] {
            let offer = next_message(rx).await.expect("Expected an offer notification");
            assert!(matches!(offer, ServerMessage::NewOrderOffer { ref order_id, .. } if order_id == &order()));
        }

        let (r1, r2) =
            join(handle_message(&sys.ctx, &v1, accept("V1")), handle_message(&sys.ctx, &v2, accept("V2"))).await;
        let wins = [&r1, &r2].iter().filter(|r| matches!(r, ServerMessage::AcceptOrderSuccess { .. })).count();
        assert_eq!(wins, 1, "{r1:?} {r2:?}");
        assert!([&r1, &r2].iter().any(|r| matches!(r, ServerMessage::AcceptOrderFailed { .. })));
        assert_eq!(sys.ctx.hub.group_size(&GroupKey::Order(order())), 1);

        let stored = sys.db.fetch_order(&order()).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatusType::Assigned);
        tear_down(sys.db).await;
    }

    #[tokio::test]
    async fn vendors_only_act_for_themselves() {
        let sys = TestSystem::new().await;
        sys.dispatch().await;
        let (v2, _rx) = sys.connect(Role::Vendor, "V2");
        let reply = handle_message(&sys.ctx, &v2, accept("V1")).await;
        match reply {
            ServerMessage::AcceptOrderFailed { reason, .. } => assert!(reason.contains("Not authorised"), "{reason}"),
            other => panic!("Unexpected reply {other:?}"),
        }
        let (alice, _rx) = sys.connect(Role::Customer, "alice");
        assert!(handle_message(&sys.ctx, &alice, accept("V1")).await.is_failure());
        let stored = sys.db.fetch_order(&order()).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatusType::AwaitingAssignment);
        tear_down(sys.db).await;
    }

    #[tokio::test]
    async fn rejecting_and_progressing() {
        let sys = TestSystem::new().await;
        sys.dispatch().await;
        let (v1, _rx1) = sys.connect(Role::Vendor, "V1");
        let (v2, _rx2) = sys.connect(Role::Vendor, "V2");
        let reject = ClientMessage::RejectOrder { order_id: order(), vendor_id: "V2".into(), reason: None };
        assert_eq!(handle_message(&sys.ctx, &v2, reject.clone()).await, ServerMessage::RejectOrderSuccess {
            order_id: order()
        });
        assert!(matches!(handle_message(&sys.ctx, &v2, reject).await, ServerMessage::RejectOrderFailed { .. }));

        assert_eq!(handle_message(&sys.ctx, &v1, accept("V1")).await, ServerMessage::AcceptOrderSuccess {
            order_id: order()
        });
        let progress = |vendor: &str, status| ClientMessage::UpdateOrderStatus {
            order_id: order(),
            vendor_id: vendor.into(),
            status,
        };
        let reply = handle_message(&sys.ctx, &v2, progress("V2", OrderStatusType::VendorAccepted)).await;
        assert!(matches!(reply, ServerMessage::UpdateStatusFailed { .. }));
        let reply = handle_message(&sys.ctx, &v1, progress("V1", OrderStatusType::VendorAccepted)).await;
        assert_eq!(reply, ServerMessage::UpdateStatusSuccess { order_id: order(), status: OrderStatusType::VendorAccepted });
        let reply = handle_message(&sys.ctx, &v1, progress("V1", OrderStatusType::Completed)).await;
        match reply {
            ServerMessage::UpdateStatusFailed { reason, .. } => assert!(reason.contains("cannot move"), "{reason}"),
            other => panic!("Unexpected reply {other:?}"),
        }
        tear_down(sys.db).await;
    }

    #[tokio::test]
    async fn subscriptions_are_restricted() {
        let sys = TestSystem::new().await;
        let subscribe = |id: &str| ClientMessage::SubscribeOrder { order_id: id.into() };
        let (alice, mut alice_rx) = sys.connect(Role::Customer, "alice");
        let (bob, _bob_rx) = sys.connect(Role::Customer, "bob");
        let (admin, _admin_rx) = sys.connect(Role::Admin, "ops");
        let (v1, _v1_rx) = sys.connect(Role::Vendor, "V1");

        assert_eq!(handle_message(&sys.ctx, &alice, subscribe("1001")).await, ServerMessage::Subscribed {
            order_id: order()
        });
        let refused = |m: &ServerMessage| matches!(m, ServerMessage::SubscribeFailed { .. });
        assert!(refused(&handle_message(&sys.ctx, &bob, subscribe("1001")).await));
        assert!(refused(&handle_message(&sys.ctx, &v1, subscribe("1001")).await));
        assert!(!refused(&handle_message(&sys.ctx, &admin, subscribe("1001")).await));
        assert!(refused(&handle_message(&sys.ctx, &admin, subscribe("404")).await));
        assert_eq!(sys.ctx.hub.group_size(&GroupKey::Order(order())), 2);

        // The customer hears about the winning vendor
        sys.dispatch().await;
        handle_message(&sys.ctx, &v1, accept("V1")).await;
        let note = wait_for(&mut alice_rx, |m| matches!(m, ServerMessage::OrderAccepted { .. }))
            .await
            .expect("Expected an acceptance notification");
        assert_eq!(note, ServerMessage::OrderAccepted { order_id: order(), vendor_id: "V1".into() });
        assert!(matches!(handle_message(&sys.ctx, &v1, subscribe("1001")).await, ServerMessage::Subscribed { .. }));
        tear_down(sys.db).await;
    }

    #[tokio::test]
    async fn malformed_frames_get_an_error_reply() {
        let sys = TestSystem::new().await;
        let (v1, _rx) = sys.connect(Role::Vendor, "V1");
        let reply = handle_frame(&sys.ctx, &v1, "{not json").await;
        assert!(matches!(reply, ServerMessage::Error { .. }));
        let reply = handle_frame(&sys.ctx, &v1, r#"{"event":"ACCEPT_ORDER","data":{"orderId":"1001"}}"#).await;
        assert!(matches!(reply, ServerMessage::Error { .. }));
        let reply = handle_frame(&sys.ctx, &v1, r#"{"event":"SUBSCRIBE_ORDER","data":{"orderId":"1001"}}"#).await;
        assert!(matches!(reply, ServerMessage::SubscribeFailed { .. }));
        tear_down(sys.db).await;
    }
}
