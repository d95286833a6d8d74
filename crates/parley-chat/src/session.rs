//! [`ChatSession`] — the session-scoped chat service.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, atomic::AtomicBool};

use parley_core::backend::ChatBackend;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{
  listener::Listener,
  state::{ActiveConversation, ChatSnapshot, ChatState},
  Result,
};

/// Chat state and subscriptions for one logged-in user.
///
/// Created with [`ChatSession::start`] on login and torn down with
/// [`ChatSession::shutdown`] on logout or identity change. Cloning is cheap
/// and every clone shares the same state; subscriptions are also released
/// once the last clone is dropped.
pub struct ChatSession<B: ChatBackend> {
  pub(crate) shared: Arc<Shared<B>>,
}

pub(crate) struct Shared<B: ChatBackend> {
  pub backend:  Arc<B>,
  pub user_id:  Uuid,
  pub state:    RwLock<ChatState>,
  /// Set while a send from this session's compose box is in flight.
  pub sending:  AtomicBool,
  pub listener: Mutex<Listener>,
  /// Bumped after every pushed change has been applied.
  pub changes:  watch::Sender<u64>,
}

impl<B: ChatBackend> Clone for ChatSession<B> {
  fn clone(&self) -> Self { Self { shared: Arc::clone(&self.shared) } }
}

impl<B> ChatSession<B>
where
  B: ChatBackend + 'static,
{
  /// Start a session for `user_id`: subscribe to conversation updates, then
  /// load the directory and the unread count concurrently.
  pub async fn start(backend: Arc<B>, user_id: Uuid) -> Result<Self> {
    let session = Self {
      shared: Arc::new(Shared {
        backend,
        user_id,
        state: RwLock::new(ChatState::default()),
        sending: AtomicBool::new(false),
        listener: Mutex::new(Listener::default()),
        changes: watch::Sender::new(0),
      }),
    };

    tracing::info!(%user_id, "starting chat session");
    session.listen_for_conversation_updates().await?;

    let (conversations, unread) =
      tokio::join!(session.refresh_conversations(), session.refresh_unread());
    conversations?;
    unread?;

    Ok(session)
  }

  /// Release every subscription and drop all local state.
  pub async fn shutdown(&self) {
    let mut state = self.shared.state.write().await;
    *state = ChatState::default();
    self.listener().stop_all();
    drop(state);
    tracing::info!(user_id = %self.shared.user_id, "chat session closed");
  }

  pub fn user_id(&self) -> Uuid { self.shared.user_id }

  /// Wakes whenever a pushed change has been applied to local state.
  pub fn changes(&self) -> watch::Receiver<u64> { self.shared.changes.subscribe() }

  pub fn backend(&self) -> &Arc<B> { &self.shared.backend }

  pub async fn active(&self) -> ActiveConversation { self.shared.state.read().await.active }

  pub async fn snapshot(&self) -> ChatSnapshot {
    ChatSnapshot::from(&*self.shared.state.read().await)
  }

  pub(crate) fn listener(&self) -> MutexGuard<'_, Listener> {
    self
      .shared
      .listener
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }
}
