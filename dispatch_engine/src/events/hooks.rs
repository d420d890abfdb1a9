use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{DispatchEvent, EventHandler, EventProducer, Handler};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub dispatch_producers: Vec<EventProducer<DispatchEvent>>,
}

impl EventProducers {
    /// Sends the event to every registered handler.
    pub async fn publish(&self, event: DispatchEvent) {
        trace!("📬️ Publishing {} for order {}", event.name(), event.order_id());
        for producer in &self.dispatch_producers {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_all<I: IntoIterator<Item = DispatchEvent>>(&self, events: I) {
        for event in events {
            self.publish(event).await;
        }
    }

    /// Queues the events without waiting on slow handlers. An event that does not fit in a handler's queue is dropped
    /// for that handler. Returns the number of dropped deliveries.
    pub fn try_publish_all<I: IntoIterator<Item = DispatchEvent>>(&self, events: I) -> usize {
        let mut dropped = 0;
        for event in events {
            trace!("📬️ Queueing {} for order {}", event.name(), event.order_id());
            for producer in &self.dispatch_producers {
                if !producer.try_publish_event(event.clone()) {
                    dropped += 1;
                }
            }
        }
        if dropped > 0 {
            warn!("📬️ {dropped} event deliveries were dropped because a handler could not keep up");
        }
        dropped
    }
}

pub struct EventHandlers {
    pub on_dispatch_event: Vec<EventHandler<DispatchEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_dispatch_event =
            hooks.on_dispatch_event.into_iter().map(|f| EventHandler::new(buffer_size, f)).collect();
        Self { on_dispatch_event }
    }

    pub fn producers(&self) -> EventProducers {
        let dispatch_producers = self.on_dispatch_event.iter().map(|h| h.subscribe()).collect();
        EventProducers { dispatch_producers }
    }

    pub async fn start_handlers(self) {
        for handler in self.on_dispatch_event {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_dispatch_event: Vec<Handler<DispatchEvent>>,
}

impl EventHooks {
    pub fn on_dispatch_event<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DispatchEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_dispatch_event.push(Arc::new(f));
        self
    }
}
