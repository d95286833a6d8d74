//! Session-scoped conversation sync for the assessment marketplace.
//!
//! A [`ChatSession`] is created when a user logs in and shut down when they
//! log out. It keeps a read-through/write-through view of the user's
//! conversations, the active conversation's messages and their unread count,
//! over any [`ChatBackend`](parley_core::backend::ChatBackend), and keeps that
//! view current from the backend's push subscriptions.
//!
//! ```rust,ignore
//! let session = ChatSession::start(backend, user_id).await?;
//! session.select_conversation(conversation_id).await?;
//! session.send_message("Is Thursday OK for the inspection?").await?;
//! session.shutdown().await;
//! ```

mod directory;
mod listener;
mod messages;
mod read;
mod session;
mod state;
mod timeline;

pub mod error;

pub use error::{ChatError, Result};
pub use messages::Outgoing;
pub use session::ChatSession;
pub use state::{ActiveConversation, ChatSnapshot};
pub use timeline::{ChatMessage, Timeline};
