//! In-process insertion bus.
//!
//! Renderers announce every fragment they are about to add to a page
//! container; subscribers get a chance to rewrite the fragment first.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use super::node::Node;

pub trait InsertionSubscriber: Send + Sync {
    fn name(&self) -> &str;

    /// Containers this subscriber watches. Empty means all.
    fn containers(&self) -> Vec<String>;

    fn on_inserted(&self, container: &str, fragment: &mut Node);
}

#[derive(Clone, Default)]
pub struct InsertionBus {
    subscribers: Arc<RwLock<Vec<Arc<dyn InsertionSubscriber>>>>,
}

impl InsertionBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, subscriber: Arc<dyn InsertionSubscriber>) {
        info!(
            subscriber.name = %subscriber.name(),
            subscriber.containers = ?subscriber.containers(),
            "Registered insertion subscriber"
        );
        self.subscribers.write().await.push(subscriber);
    }

    /// Announces `fragment` as inserted into `container`. Returns how many
    /// subscribers saw it.
    pub async fn publish(&self, container: &str, fragment: &mut Node) -> usize {
        let subscribers = self.subscribers.read().await;
        let mut delivered = 0;
        for subscriber in subscribers.iter() {
            if Self::is_interested(&subscriber.containers(), container) {
                subscriber.on_inserted(container, fragment);
                delivered += 1;
            }
        }
        debug!(container, delivered, "fragment published");
        delivered
    }

    fn is_interested(watched: &[String], container: &str) -> bool {
        watched.is_empty() || watched.iter().any(|c| c == container)
    }
}
