//! Event dispatch: `send_event` blocks until every
//! matching handler has run; `post_event` hands delivery to the bounded
//! worker pool and returns immediately.
//!
//! Handlers are not tracked in a private subscription list: they
//! register as ordinary services under [`EVENT_HANDLER_INTERFACE`],
//! declaring interest via the [`TOPICS_KEY`] property (required) and
//! optionally narrowing with [`FILTER_KEY`], an LDAP filter matched
//! against the event's own properties. `EventAdmin` is just another
//! consumer of the service registry.

use std::sync::Arc;

use forge_abi::{ErasedService, HeaderValue, Properties};
use forge_async::BoundedTaskPool;

use super::topic;
use crate::bundle::BundleId;
use crate::service::{Filter, Registry as ServiceRegistry, ServiceId, ServiceRegistration};

/// Well-known interface name event handlers register under.
pub const EVENT_HANDLER_INTERFACE: &str = "forge.event.EventHandler";
/// Required property: a list of topic patterns (`Event::topic` syntax)
/// the handler is interested in.
pub const TOPICS_KEY: &str = "event.topics";
/// Optional property: an LDAP filter matched against the delivered
/// event's own properties.
pub const FILTER_KEY: &str = "event.filter";

/// The pseudo-bundle `EventAdmin` borrows handler instances as, since it
/// is framework machinery rather than a bundle consumer.
const SYSTEM_BUNDLE: BundleId = 0;

/// A single published event.
#[derive(Debug, Clone)]
pub struct Event {
    pub topic: String,
    pub properties: Properties,
}

impl Event {
    pub fn new(topic: impl Into<String>, properties: Properties) -> Self {
        Self {
            topic: topic.into(),
            properties,
        }
    }
}

/// Receives events whose topic matches a subscription
///.
pub trait EventHandler: Send + Sync {
    fn handle_event(&self, event: &Event);
}

/// Wraps a handler trait object so it can be stored in the registry's
/// `Any`-erased slot and downcast back out.
struct HandlerBox(Arc<dyn EventHandler>);

/// Topic-based publish/subscribe dispatcher, backed by the service
/// registry rather than a private subscriber list.
pub struct EventAdmin {
    services: Arc<ServiceRegistry>,
    pool: Arc<BoundedTaskPool>,
}

impl EventAdmin {
    pub fn new(services: Arc<ServiceRegistry>, pool: Arc<BoundedTaskPool>) -> Arc<Self> {
        Arc::new(Self { services, pool })
    }

    /// Registers `handler` as a service under [`EVENT_HANDLER_INTERFACE`].
    /// `topics` must be non-empty; `filter`, if given, must parse as a
    /// valid filter expression.
    pub fn register_handler(
        &self,
        bundle_id: BundleId,
        topics: Vec<String>,
        filter: Option<String>,
        handler: Arc<dyn EventHandler>,
    ) -> ServiceRegistration {
        let mut properties = Properties::new();
        properties.insert(
            TOPICS_KEY.to_owned(),
            HeaderValue::List(topics.into_iter().map(HeaderValue::String).collect()),
        );
        if let Some(filter) = filter {
            properties.insert(FILTER_KEY.to_owned(), HeaderValue::String(filter));
        }
        self.services.register(
            bundle_id,
            vec![EVENT_HANDLER_INTERFACE.to_owned()],
            Arc::new(HandlerBox(handler)) as ErasedService,
            properties,
        )
    }

    /// Every currently-registered handler whose `event.topics` contains a
    /// pattern matching `event.topic` and whose optional `event.filter`
    /// matches `event.properties`, borrowed for the duration of this
    /// delivery.
    fn matching_handlers(&self, event: &Event) -> Vec<(ServiceId, Arc<dyn EventHandler>)> {
        self.services
            .find(EVENT_HANDLER_INTERFACE, None)
            .into_iter()
            .filter(|reference| {
                reference
                    .properties
                    .get(TOPICS_KEY)
                    .and_then(HeaderValue::as_list)
                    .map(|patterns| {
                        patterns
                            .iter()
                            .filter_map(HeaderValue::as_str)
                            .any(|pattern| topic::matches(pattern, &event.topic))
                    })
                    .unwrap_or(false)
            })
            .filter(|reference| {
                reference
                    .properties
                    .get(FILTER_KEY)
                    .and_then(HeaderValue::as_str)
                    .and_then(|f| Filter::parse(f).ok())
                    .map(|filter| filter.matches(&event.properties))
                    .unwrap_or(true)
            })
            .filter_map(|reference| {
                let service_id = reference.service_id;
                let erased = self.services.get_service(SYSTEM_BUNDLE, service_id)?;
                let boxed: Arc<HandlerBox> = erased.downcast().ok()?;
                Some((service_id, boxed.0.clone()))
            })
            .collect()
    }

    /// Delivers `event` to every matching handler synchronously, in
    /// registry ranking order, on the calling task.
    pub fn send_event(&self, event: Event) {
        for (service_id, handler) in self.matching_handlers(&event) {
            handler.handle_event(&event);
            self.services.unget_service(SYSTEM_BUNDLE, service_id);
        }
    }

    /// Delivers `event` to every matching handler on the bounded worker
    /// pool and returns once all deliveries have been submitted, not once
    /// they've run.
    pub async fn post_event(&self, event: Event) {
        let event = Arc::new(event);
        for (service_id, handler) in self.matching_handlers(&event) {
            let event = event.clone();
            let services = self.services.clone();
            self.pool
                .spawn(async move {
                    handler.handle_event(&event);
                    services.unget_service(SYSTEM_BUNDLE, service_id);
                })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler(AtomicUsize);

    impl EventHandler for CountingHandler {
        fn handle_event(&self, _event: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pool() -> Arc<BoundedTaskPool> {
        Arc::new(BoundedTaskPool::new(std::num::NonZeroUsize::new(2).unwrap()))
    }

    #[test]
    fn send_event_delivers_synchronously_to_matching_handlers() {
        let admin = EventAdmin::new(ServiceRegistry::new(), pool());
        let handler = Arc::new(CountingHandler(AtomicUsize::new(0)));
        admin.register_handler(1, vec!["com/example/*".to_owned()], None, handler.clone());

        admin.send_event(Event::new("com/example/widget", Properties::new()));
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);

        admin.send_event(Event::new("org/other/widget", Properties::new()));
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn post_event_delivers_asynchronously() {
        let admin = EventAdmin::new(ServiceRegistry::new(), pool());
        let handler = Arc::new(CountingHandler(AtomicUsize::new(0)));
        admin.register_handler(1, vec!["com/example/widget".to_owned()], None, handler.clone());

        admin.post_event(Event::new("com/example/widget", Properties::new())).await;
        admin.pool.shutdown().await;

        assert_eq!(handler.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregistered_handler_is_not_delivered_to() {
        let admin = EventAdmin::new(ServiceRegistry::new(), pool());
        let handler = Arc::new(CountingHandler(AtomicUsize::new(0)));
        let registration = admin.register_handler(1, vec!["topic".to_owned()], None, handler.clone());
        registration.unregister();

        admin.send_event(Event::new("topic", Properties::new()));
        assert_eq!(handler.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn event_filter_narrows_delivery() {
        let admin = EventAdmin::new(ServiceRegistry::new(), pool());
        let handler = Arc::new(CountingHandler(AtomicUsize::new(0)));
        admin.register_handler(
            1,
            vec!["com/example/widget".to_owned()],
            Some("(severity=high)".to_owned()),
            handler.clone(),
        );

        let mut low = Properties::new();
        low.insert("severity".to_owned(), HeaderValue::String("low".to_owned()));
        admin.send_event(Event::new("com/example/widget", low));
        assert_eq!(handler.0.load(Ordering::SeqCst), 0);

        let mut high = Properties::new();
        high.insert("severity".to_owned(), HeaderValue::String("high".to_owned()));
        admin.send_event(Event::new("com/example/widget", high));
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);
    }
}
