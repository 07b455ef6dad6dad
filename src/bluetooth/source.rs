//! Event subscription plumbing shared by all event sources.

use std::future::Future;

use futures::future::BoxFuture;
use log::debug;
use tokio::{
   sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
   task::JoinSet,
};

use crate::{error::Result, event::BroadcastEvent};

/// Something that can deliver Bluetooth notifications.
pub trait EventSource {
   /// Starts listening. The returned subscription cannot be restarted once
   /// released; subscribe again instead.
   fn subscribe(&self) -> impl Future<Output = Result<Subscription>> + Send;
}

/// A live stream of [`BroadcastEvent`]s.
///
/// Producer tasks are owned by the subscription and aborted on
/// [`release`](Self::release) or drop.
pub struct Subscription {
   events: UnboundedReceiver<BroadcastEvent>,
   tasks: JoinSet<()>,
   unsubscribe: Option<BoxFuture<'static, Result<()>>>,
}

impl Subscription {
   /// Creates an empty subscription together with the sender its
   /// producers push into.
   pub fn channel() -> (UnboundedSender<BroadcastEvent>, Self) {
      let (tx, rx) = mpsc::unbounded_channel();
      (
         tx,
         Self {
            events: rx,
            tasks: JoinSet::new(),
            unsubscribe: None,
         },
      )
   }

   /// Runs `task` for as long as the subscription is alive.
   pub fn spawn<F>(&mut self, task: F)
   where
      F: Future<Output = ()> + Send + 'static,
   {
      self.tasks.spawn(task);
   }

   /// Registers the action that undoes the subscription at the source.
   pub fn on_release<F>(&mut self, unsubscribe: F)
   where
      F: Future<Output = Result<()>> + Send + 'static,
   {
      self.unsubscribe = Some(Box::pin(unsubscribe));
   }

   /// Waits for the next event. `None` once every producer has gone away.
   pub async fn next(&mut self) -> Option<BroadcastEvent> {
      self.events.recv().await
   }

   /// Tears the subscription down. Never fails: an error while
   /// unsubscribing is logged and dropped.
   pub async fn release(mut self) {
      self.tasks.abort_all();
      self.events.close();
      if let Some(unsubscribe) = self.unsubscribe.take()
         && let Err(e) = unsubscribe.await
      {
         debug!("Ignoring failed unsubscribe: {e}");
      }
   }
}

impl Drop for Subscription {
   fn drop(&mut self) {
      self.tasks.abort_all();
   }
}
