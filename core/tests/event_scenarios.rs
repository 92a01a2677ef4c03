//! Black-box scenario for ordering between asynchronous `post_event`
//! and synchronous `send_event` delivery.

use std::sync::Mutex;
use std::sync::Arc;

use forge_core::config::FrameworkConfig;
use forge_core::event::{Event, EventHandler};
use forge_core::Framework;

struct RecordingHandler {
    received: Mutex<Vec<String>>,
}

impl EventHandler for RecordingHandler {
    fn handle_event(&self, event: &Event) {
        self.received.lock().unwrap().push(event.topic.clone());
    }
}

#[tokio::test]
async fn send_event_is_ordered_ahead_of_earlier_posted_events() {
    let framework = Framework::new(&FrameworkConfig::default());
    let handler = Arc::new(RecordingHandler {
        received: Mutex::new(Vec::new()),
    });
    framework
        .events()
        .register_handler(1, vec!["a/*".to_owned()], None, handler.clone());

    framework
        .events()
        .post_event(Event::new("a/b", Default::default()))
        .await;
    framework
        .events()
        .post_event(Event::new("a/c", Default::default()))
        .await;
    framework.events().send_event(Event::new("a/d", Default::default()));

    // send_event only returns once every matching handler has run, so
    // the synchronously-delivered topic is visible immediately even
    // though it was submitted last.
    assert!(handler.received.lock().unwrap().contains(&"a/d".to_owned()));

    framework.worker_pool().shutdown().await;

    let received = handler.received.lock().unwrap().clone();
    assert_eq!(received.len(), 3);
    assert!(received.contains(&"a/b".to_owned()));
    assert!(received.contains(&"a/c".to_owned()));
    assert!(received.contains(&"a/d".to_owned()));
}
