use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use dispatch_engine::{
    db_types::{NewOrder, NewVendor, OrderId, OrderStatusType, VendorId},
    events::{DispatchEvent, EventHandlers, EventHooks, EventProducers},
    locks::MemoryLockProvider,
    AcceptanceCoordinator,
    Dispatcher,
    LockConfig,
    LockProvider,
    OrderFlowApi,
    SearchConfig,
    test_utils::prepare_env::{fresh_database, tear_down},
    SqliteDatabase,
};

pub const ORDER_LAT: f64 = 12.90;
pub const ORDER_LON: f64 = 77.60;

/// Records every event the engine publishes, in the order the handler saw them.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<DispatchEvent>>>,
}

impl EventLog {
    pub fn hooks(&self) -> EventHooks {
        let mut hooks = EventHooks::default();
        let events = self.events.clone();
        hooks.on_dispatch_event(move |ev| {
            let events = events.clone();
            Box::pin(async move {
                events.lock().unwrap().push(ev);
            })
        });
        hooks
    }

    pub fn snapshot(&self) -> Vec<DispatchEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Waits (briefly) until at least `n` events have been handled.
    pub async fn wait_for(&self, n: usize) -> Vec<DispatchEvent> {
        for _ in 0..100 {
            if self.events.lock().unwrap().len() >= n {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.snapshot()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.snapshot().iter().map(|e| e.name()).collect()
    }
}

pub struct Harness {
    pub db: SqliteDatabase,
    pub locks: MemoryLockProvider,
    pub producers: EventProducers,
    pub events: EventLog,
    pub flow: OrderFlowApi<SqliteDatabase>,
    pub dispatcher: Dispatcher<SqliteDatabase>,
    pub coordinator: AcceptanceCoordinator<SqliteDatabase, MemoryLockProvider>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_lock_config(LockConfig::default()).await
    }

    pub async fn with_lock_config(config: LockConfig) -> Self {
        let db = fresh_database().await;
        let events = EventLog::default();
        let handlers = EventHandlers::new(64, events.hooks());
        let producers = handlers.producers();
        handlers.start_handlers().await;
        let locks = MemoryLockProvider::new();
        let flow = OrderFlowApi::new(db.clone(), producers.clone());
        let dispatcher = Dispatcher::new(db.clone(), SearchConfig::default(), producers.clone());
        let coordinator = AcceptanceCoordinator::new(db.clone(), locks.clone(), config, producers.clone());
        Self { db, locks, producers, events, flow, dispatcher, coordinator }
    }

    pub fn coordinator_with<L: LockProvider>(&self, locks: L) -> AcceptanceCoordinator<SqliteDatabase, L> {
        AcceptanceCoordinator::new(self.db.clone(), locks, LockConfig::default(), self.producers.clone())
    }

    /// Stores an order and moves it to `awaiting_assignment`.
    pub async fn paid_order(&self, id: &str, lat: f64, lon: f64) -> OrderId {
        let order = NewOrder::new(OrderId::from(id), "alice", lat, lon);
        let order = self.flow.ingest_order(order).await.expect("Error ingesting order");
        self.flow
            .modify_status(&order.id, OrderStatusType::AwaitingAssignment, "payments")
            .await
            .expect("Error marking order as paid");
        order.id
    }

    pub async fn vendor(&self, vendor: NewVendor) -> VendorId {
        self.flow.upsert_vendor(vendor).await.expect("Error saving vendor").id
    }

    /// Order 1001 at (12.90, 77.60) with V1 1.2 km away, V2 3.4 km away and a blocked V3 0.5 km away. Offers have been
    /// made.
    pub async fn scenario(&self) -> OrderId {
        self.vendor(NewVendor::approved("V1".into(), "Vendor One", 12.9108, ORDER_LON)).await;
        self.vendor(NewVendor::approved("V2".into(), "Vendor Two", 12.86942, ORDER_LON)).await;
        self.vendor(NewVendor::approved("V3".into(), "Vendor Three", 12.9045, ORDER_LON).blocked()).await;
        let order_id = self.paid_order("1001", ORDER_LAT, ORDER_LON).await;
        let offered = self.dispatcher.dispatch_order(&order_id, None).await.expect("Error dispatching order");
        assert_eq!(offered.len(), 2);
        order_id
    }

    pub async fn finish(self) {
        tear_down(self.db).await;
    }
}
