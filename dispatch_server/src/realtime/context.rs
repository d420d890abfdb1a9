use dispatch_engine::{fanout::FanoutHub, locks::LockBackend, AcceptanceCoordinator, OrderQueryApi, SqliteDatabase};

use crate::auth::TokenVerifier;

/// Everything a real-time connection needs, constructed once at start-up and shared by reference.
pub struct RealtimeContext<B, L> {
    pub coordinator: AcceptanceCoordinator<B, L>,
    pub queries: OrderQueryApi<B>,
    pub hub: FanoutHub,
    pub verifier: TokenVerifier,
}

impl<B, L> RealtimeContext<B, L> {
    pub fn new(
        coordinator: AcceptanceCoordinator<B, L>,
        queries: OrderQueryApi<B>,
        hub: FanoutHub,
        verifier: TokenVerifier,
    ) -> Self {
        Self { coordinator, queries, hub, verifier }
    }
}

/// The context the production server runs with.
pub type LiveContext = RealtimeContext<SqliteDatabase, LockBackend>;
