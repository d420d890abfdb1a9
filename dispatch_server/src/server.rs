use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use dispatch_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    fanout::{add_fanout_hook, FanoutHub},
    locks::LockBackend,
    AcceptanceCoordinator,
    Dispatcher,
    OrderFlowApi,
    OrderQueryApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    auth::TokenVerifier,
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    middleware::JwtMiddlewareFactory,
    realtime::{run_realtime_server, RealtimeContext},
    routes::{
        health,
        AssignOrderRoute,
        DispatchOrderRoute,
        ExpireOffersRoute,
        NewOrderRoute,
        OrderByIdRoute,
        OrderCandidatesRoute,
        UpdateOrderStatusRoute,
        UpsertVendorRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 256;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let locks = LockBackend::from_url(config.redis_url.as_ref().map(|s| s.reveal().as_str()))
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🚀️ Using the {} lock store", locks.name());

    let hub = FanoutHub::new();
    let mut hooks = EventHooks::default();
    add_fanout_hook(&mut hooks, hub.clone());
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let dispatcher = Dispatcher::new(db.clone(), config.search, producers.clone());
    let _worker = start_expiry_worker(dispatcher, config.offer_timeout, config.expiry_sweep_interval);

    let coordinator = AcceptanceCoordinator::new(db.clone(), locks, config.lock.clone(), producers.clone());
    let ctx = RealtimeContext::new(coordinator, OrderQueryApi::new(db.clone()), hub, TokenVerifier::new(&config.auth));
    let (ws_host, ws_port) = (config.host.clone(), config.ws_port);
    tokio::spawn(async move {
        if let Err(e) = run_realtime_server(Arc::new(ctx), &ws_host, ws_port).await {
            error!("📡️ The real-time channel has stopped. {e}");
        }
    });

    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let queries = OrderQueryApi::new(db.clone());
        let dispatcher = Dispatcher::new(db.clone(), config.search, producers.clone());
        let flow = OrderFlowApi::new(db.clone(), producers.clone());
        let log_format =
            if config.use_x_forwarded_for { "%t (%D ms) %s %{r}a %{Host}i %U" } else { "%t (%D ms) %s %a %{Host}i %U" };
        let api_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(TokenVerifier::new(&config.auth)))
            .service(OrderCandidatesRoute::<SqliteDatabase>::new())
            .service(DispatchOrderRoute::<SqliteDatabase>::new())
            .service(AssignOrderRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(ExpireOffersRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(NewOrderRoute::<SqliteDatabase>::new())
            .service(UpsertVendorRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new(log_format).log_target("vds::access_log"))
            .app_data(web::Data::new(queries))
            .app_data(web::Data::new(dispatcher))
            .app_data(web::Data::new(flow))
            .service(health)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
