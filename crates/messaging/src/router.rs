//! Message router.
//!
//! The router owns the table of routes built at startup. Each route is a
//! consumer group on one topic with one handler. Deliveries are handled
//! under a deadline; the result decides between ack, nack with backoff and
//! the poison topic. A panicking handler poisons the message and the route
//! keeps consuming.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{
    Delivery, HandlerError, HandlerOutcome, Message, MessageHandler, Publisher, Result,
    RetryPolicy, Subscriber, Subscription,
};

/// Topic that receives messages which could not be handled.
pub const POISON_TOPIC: &str = "poison";

/// Metadata keys set on poisoned messages.
pub const META_POISONED_TOPIC: &str = "poisoned_topic";
pub const META_POISONED_HANDLER: &str = "poisoned_handler";
pub const META_POISONED_REASON: &str = "poisoned_reason";
pub const META_POISONED_ATTEMPTS: &str = "poisoned_attempts";

/// Router settings.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Deadline for one handler invocation.
    pub handler_timeout: Duration,
    pub retry: RetryPolicy,
    pub poison_topic: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            poison_topic: POISON_TOPIC.to_string(),
        }
    }
}

struct Route {
    name: String,
    topic: String,
    handler: Arc<dyn MessageHandler>,
}

/// Dispatches messages from topics to handlers.
pub struct Router {
    subscriber: Arc<dyn Subscriber>,
    publisher: Arc<dyn Publisher>,
    config: RouterConfig,
    routes: Vec<Route>,
}

impl Router {
    /// Creates a router with no routes.
    pub fn new(
        subscriber: Arc<dyn Subscriber>,
        publisher: Arc<dyn Publisher>,
        config: RouterConfig,
    ) -> Self {
        Self {
            subscriber,
            publisher,
            config,
            routes: Vec::new(),
        }
    }

    /// Adds a route. `name` is also the consumer group, so two routes on one
    /// topic each see every message.
    pub fn add_handler(
        &mut self,
        name: impl Into<String>,
        topic: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> &mut Self {
        self.routes.push(Route {
            name: name.into(),
            topic: topic.into(),
            handler,
        });
        self
    }

    /// Returns `(name, topic)` for every route.
    pub fn routes(&self) -> Vec<(&str, &str)> {
        self.routes
            .iter()
            .map(|r| (r.name.as_str(), r.topic.as_str()))
            .collect()
    }

    /// Subscribes every route and starts consuming.
    ///
    /// All subscriptions exist when this returns, so messages published
    /// afterwards are not missed.
    pub async fn start(self) -> Result<RouterHandle> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = Arc::new(self.config);

        let mut subscriptions = Vec::with_capacity(self.routes.len());
        for route in self.routes {
            let subscription = self.subscriber.subscribe(&route.topic, &route.name).await?;
            subscriptions.push((route, subscription));
        }

        let mut tasks = Vec::with_capacity(subscriptions.len());
        for (route, subscription) in subscriptions {
            let span = info_span!("route", handler = %route.name, topic = %route.topic);
            let consumer = Consumer {
                route,
                subscription,
                publisher: self.publisher.clone(),
                config: config.clone(),
            };
            tasks.push(tokio::spawn(
                consumer.run(shutdown_rx.clone()).instrument(span),
            ));
        }

        info!(routes = tasks.len(), "Router started");
        Ok(RouterHandle {
            shutdown: shutdown_tx,
            tasks,
        })
    }
}

/// Handle to a running router.
pub struct RouterHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RouterHandle {
    /// Stops consuming and waits for in-flight messages to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Route task failed");
            }
        }
        info!("Router stopped");
    }
}

struct Consumer {
    route: Route,
    subscription: Box<dyn Subscription>,
    publisher: Arc<dyn Publisher>,
    config: Arc<RouterConfig>,
}

impl Consumer {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let delivery = tokio::select! {
                _ = shutdown.changed() => break,
                delivery = self.subscription.next() => match delivery {
                    Some(delivery) => delivery,
                    None => break,
                },
            };
            self.process(delivery).await;
        }
        debug!("Route stopped");
    }

    async fn process(&mut self, delivery: Delivery) {
        let started = Instant::now();
        let timeout = self.config.handler_timeout;

        let call = AssertUnwindSafe(self.route.handler.handle(&delivery.message)).catch_unwind();
        let result = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => {
                metrics::counter!(
                    "message_handler_panics_total",
                    "handler" => self.route.name.clone()
                )
                .increment(1);
                Err(HandlerError::Fatal(format!(
                    "handler panicked: {}",
                    panic_message(panic.as_ref())
                )))
            }
            Err(_) => Err(HandlerError::Transient(format!(
                "handler timed out after {timeout:?}"
            ))),
        };

        metrics::histogram!(
            "message_handler_duration_seconds",
            "handler" => self.route.name.clone()
        )
        .record(started.elapsed().as_secs_f64());

        match result {
            Ok(outcome) => self.succeeded(delivery, outcome).await,
            Err(HandlerError::Transient(reason))
                if self.config.retry.should_retry(delivery.attempt) =>
            {
                self.retry(delivery, reason).await
            }
            Err(err) => self.poison(delivery, err).await,
        }
    }

    async fn succeeded(&mut self, delivery: Delivery, outcome: HandlerOutcome) {
        debug!(
            message_id = %delivery.message.id,
            attempt = delivery.attempt,
            outcome = outcome.as_str(),
            "Message handled"
        );
        metrics::counter!(
            "messages_handled_total",
            "handler" => self.route.name.clone(),
            "outcome" => outcome.as_str()
        )
        .increment(1);

        if let Err(e) = self.subscription.ack(&delivery).await {
            warn!(message_id = %delivery.message.id, error = %e, "Failed to ack message");
        }
    }

    async fn retry(&mut self, delivery: Delivery, reason: String) {
        let backoff = self.config.retry.backoff(delivery.attempt);
        warn!(
            message_id = %delivery.message.id,
            attempt = delivery.attempt,
            ?backoff,
            %reason,
            "Handler failed, message will be redelivered"
        );
        metrics::counter!("messages_retried_total", "handler" => self.route.name.clone())
            .increment(1);

        tokio::time::sleep(backoff).await;
        if let Err(e) = self.subscription.nack(delivery).await {
            error!(error = %e, "Failed to nack message");
        }
    }

    async fn poison(&mut self, delivery: Delivery, err: HandlerError) {
        error!(
            message_id = %delivery.message.id,
            attempt = delivery.attempt,
            error = %err,
            "Message poisoned"
        );

        let poisoned: Message = delivery
            .message
            .clone()
            .with_metadata(META_POISONED_TOPIC, self.route.topic.clone())
            .with_metadata(META_POISONED_HANDLER, self.route.name.clone())
            .with_metadata(META_POISONED_REASON, err.to_string())
            .with_metadata(META_POISONED_ATTEMPTS, delivery.attempt.to_string());

        match self
            .publisher
            .publish(&self.config.poison_topic, poisoned)
            .await
        {
            Ok(()) => {
                metrics::counter!("messages_poisoned_total", "handler" => self.route.name.clone())
                    .increment(1);
                if let Err(e) = self.subscription.ack(&delivery).await {
                    warn!(message_id = %delivery.message.id, error = %e, "Failed to ack message");
                }
            }
            Err(e) => {
                // Never drop a message: keep it on the topic until it can be poisoned.
                error!(error = %e, "Failed to publish to poison topic");
                tokio::time::sleep(self.config.retry.max_backoff).await;
                if let Err(e) = self.subscription.nack(delivery).await {
                    error!(error = %e, "Failed to nack message");
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
