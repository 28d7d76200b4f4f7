use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::router::{ActorHandle, ActorKind, RoutingError};

/// Source of "now" handed to actors. Swapped out in tests to move time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// State owned by exactly one task.
///
/// `handle` is synchronous: a message is processed to completion before the
/// next one is taken from the mailbox, which is what makes every lifecycle
/// transition atomic.
pub trait Actor: Send + 'static {
    type Config: Send + Sync + 'static;
    type Message: Send + 'static;
    type Reply: Send + 'static;

    fn new(handle: &ActorHandle, config: &Self::Config) -> Self;

    fn handle(&mut self, message: Self::Message, now: DateTime<Utc>) -> Self::Reply;

    /// Period of the cleanup alarm, if the actor wants one.
    fn alarm_interval(&self) -> Option<Duration> {
        None
    }

    fn on_alarm(&mut self, _now: DateTime<Utc>) {}
}

#[derive(Debug, Clone, Copy)]
pub struct HostSettings {
    pub call_timeout: Duration,
    pub mailbox_size: usize,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_millis(5000),
            mailbox_size: 256,
        }
    }
}

struct Envelope<A: Actor> {
    message: A::Message,
    reply: oneshot::Sender<A::Reply>,
}

/// Registry and dispatcher for all instances of one actor kind.
///
/// Instances are spawned lazily on first call and live until the host is shut
/// down. An instance whose task has died is evicted and respawned empty on the
/// next call.
pub struct ActorHost<A: Actor> {
    kind: ActorKind,
    config: Arc<A::Config>,
    settings: HostSettings,
    clock: Clock,
    instances: Mutex<HashMap<String, mpsc::Sender<Envelope<A>>>>,
}

impl<A: Actor> ActorHost<A> {
    pub fn new(kind: ActorKind, config: A::Config, settings: HostSettings, clock: Clock) -> Self {
        Self {
            kind,
            config: Arc::new(config),
            settings,
            clock,
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub fn kind(&self) -> ActorKind {
        self.kind
    }

    pub fn config(&self) -> &A::Config {
        &self.config
    }

    /// Send a message and wait for the reply.
    ///
    /// A timeout or a task that died mid-message yields `ActorUnavailable`; the
    /// message may or may not have been applied.
    pub async fn call(
        &self,
        handle: &ActorHandle,
        message: A::Message,
    ) -> Result<A::Reply, RoutingError> {
        if handle.kind != self.kind {
            return Err(RoutingError::InvalidKeyFormat(format!(
                "{} handle sent to {} host",
                handle.kind, self.kind
            )));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            message,
            reply: reply_tx,
        };

        let deadline = self.settings.call_timeout;
        let result = tokio::time::timeout(deadline, async {
            let sender = self.deliver(handle, envelope).await?;
            match reply_rx.await {
                Ok(reply) => Ok(reply),
                Err(_) => {
                    self.evict_channel(&handle.instance_name, &sender).await;
                    Err(RoutingError::ActorUnavailable(format!(
                        "{} {} stopped before replying",
                        self.kind, handle.instance_name
                    )))
                }
            }
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    "Call to {} {} timed out after {:?}",
                    self.kind,
                    handle.instance_name,
                    deadline
                );
                Err(RoutingError::ActorUnavailable(format!(
                    "{} {} timed out",
                    self.kind, handle.instance_name
                )))
            }
        }
    }

    /// Number of live instances.
    pub async fn instance_count(&self) -> usize {
        self.instances.lock().await.len()
    }

    /// Drop an instance; its task stops once its mailbox drains.
    pub async fn evict(&self, instance_name: &str) -> bool {
        let removed = self.instances.lock().await.remove(instance_name).is_some();
        if removed {
            tracing::debug!("Evicted {} {}", self.kind, instance_name);
        }
        removed
    }

    /// Stop every instance.
    pub async fn shutdown(&self) {
        let mut instances = self.instances.lock().await;
        tracing::info!("Stopping {} {} actors", instances.len(), self.kind);
        instances.clear();
    }

    /// Evict `instance_name` only while it is still served by `failed`.
    ///
    /// Callers whose envelopes died with an old task must not remove an
    /// instance that someone else has already respawned.
    async fn evict_channel(&self, instance_name: &str, failed: &mpsc::Sender<Envelope<A>>) -> bool {
        let mut instances = self.instances.lock().await;
        let current = instances
            .get(instance_name)
            .is_some_and(|sender| sender.same_channel(failed));
        if current {
            instances.remove(instance_name);
            tracing::debug!("Evicted {} {}", self.kind, instance_name);
        }
        current
    }

    /// Hand `envelope` to the instance and return the sender that accepted it.
    async fn deliver(
        &self,
        handle: &ActorHandle,
        envelope: Envelope<A>,
    ) -> Result<mpsc::Sender<Envelope<A>>, RoutingError> {
        let sender = self.sender_for(handle).await;
        let envelope = match sender.send(envelope).await {
            Ok(()) => return Ok(sender),
            // Task gone, message never delivered: hand it to a fresh instance
            Err(mpsc::error::SendError(envelope)) => envelope,
        };

        self.evict_channel(&handle.instance_name, &sender).await;
        let sender = self.sender_for(handle).await;
        match sender.send(envelope).await {
            Ok(()) => Ok(sender),
            Err(_) => {
                self.evict_channel(&handle.instance_name, &sender).await;
                Err(RoutingError::ActorUnavailable(format!(
                    "{} {} could not be started",
                    self.kind, handle.instance_name
                )))
            }
        }
    }

    async fn sender_for(&self, handle: &ActorHandle) -> mpsc::Sender<Envelope<A>> {
        let mut instances = self.instances.lock().await;
        if let Some(sender) = instances.get(&handle.instance_name) {
            if !sender.is_closed() {
                return sender.clone();
            }
        }

        let (sender, inbox) = mpsc::channel(self.settings.mailbox_size.max(1));
        let actor = A::new(handle, &self.config);
        tracing::debug!(
            "Spawning {} {} (hint {:?})",
            self.kind,
            handle.instance_name,
            handle.location_hint
        );
        tokio::spawn(run(
            actor,
            inbox,
            self.clock.clone(),
            handle.instance_name.clone(),
        ));
        instances.insert(handle.instance_name.clone(), sender.clone());
        sender
    }
}

async fn run<A: Actor>(
    mut actor: A,
    mut inbox: mpsc::Receiver<Envelope<A>>,
    clock: Clock,
    instance_name: String,
) {
    let mut alarm = actor
        .alarm_interval()
        .filter(|period| !period.is_zero())
        .map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

    loop {
        tokio::select! {
            envelope = inbox.recv() => {
                let Some(Envelope { message, reply }) = envelope else {
                    break;
                };
                let answer = actor.handle(message, clock());
                if reply.send(answer).is_err() {
                    tracing::debug!("Caller of {} went away before the reply", instance_name);
                }
            }
            _ = next_alarm(&mut alarm) => {
                actor.on_alarm(clock());
            }
        }
    }

    tracing::debug!("Actor {} stopped", instance_name);
}

async fn next_alarm(alarm: &mut Option<Interval>) {
    match alarm {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
