//! Subcommand implementations, generic over the backend.

use std::collections::HashSet;

use anyhow::{Context as _, Result};
use parley_chat::{ChatMessage, ChatSession};
use parley_core::{
  assessment::{AssessmentStatus, AssessmentSummary},
  backend::ChatBackend,
  conversation::{ConversationSummary, NewConversation},
  profile::{Profile, Role},
};
use parley_store_sqlite::SqliteStore;
use uuid::Uuid;

// ─── Directory ───────────────────────────────────────────────────────────────

pub async fn conversations<B>(session: &ChatSession<B>, search: Option<&str>) -> Result<()>
where
  B: ChatBackend + 'static,
{
  let entries = match search {
    Some(query) => session.search(query).await,
    None => session.conversations().await,
  };

  if entries.is_empty() {
    println!("No conversations.");
    return Ok(());
  }
  for entry in &entries {
    println!("{}", directory_line(entry, session.user_id()));
  }
  Ok(())
}

fn directory_line(entry: &ConversationSummary, user_id: Uuid) -> String {
  let with = entry
    .counterpart(user_id)
    .map(|p| p.display_name.as_str())
    .unwrap_or("(unassigned)");
  format!(
    "{}  {}  {:<32}  with {}",
    entry.conversation.id,
    entry.conversation.updated_at.format("%Y-%m-%d %H:%M"),
    entry.title(),
    with,
  )
}

// ─── Messages ────────────────────────────────────────────────────────────────

fn message_line(entry: &ChatMessage) -> String {
  format!(
    "[{}] {}: {}",
    entry.message.created_at.format("%Y-%m-%d %H:%M:%S"),
    entry.sender_name(),
    entry.message.body,
  )
}

pub async fn messages<B>(session: &ChatSession<B>, conversation_id: Uuid) -> Result<()>
where
  B: ChatBackend + 'static,
{
  let loaded = session
    .select_conversation(conversation_id)
    .await
    .with_context(|| format!("failed to open conversation {conversation_id}"))?;

  if loaded.is_empty() {
    println!("No messages yet.");
  }
  for entry in &loaded {
    println!("{}", message_line(entry));
  }
  Ok(())
}

pub async fn send<B>(session: &ChatSession<B>, conversation_id: Uuid, text: &str) -> Result<()>
where
  B: ChatBackend + 'static,
{
  session
    .select_conversation(conversation_id)
    .await
    .with_context(|| format!("failed to open conversation {conversation_id}"))?;

  let sent = session.send_message(text).await.context("failed to send message")?;
  println!("{}", message_line(&sent));
  Ok(())
}

pub async fn read<B>(session: &ChatSession<B>, conversation_id: Uuid) -> Result<()>
where
  B: ChatBackend + 'static,
{
  let recorded = session
    .mark_conversation_read(conversation_id)
    .await
    .with_context(|| format!("failed to mark {conversation_id} read"))?;
  println!("{recorded} message(s) marked read; {} unread", session.unread_count().await);
  Ok(())
}

pub async fn unread<B>(session: &ChatSession<B>) -> Result<()>
where
  B: ChatBackend + 'static,
{
  let count = session.refresh_unread().await.context("failed to load unread count")?;
  println!("{count}");
  Ok(())
}

/// Print the history, then every new message until Ctrl-C. Incoming
/// messages are marked read as they are shown.
pub async fn watch<B>(session: &ChatSession<B>, conversation_id: Uuid) -> Result<()>
where
  B: ChatBackend + 'static,
{
  let mut seen = HashSet::new();
  let mut changes = session.changes();
  let loaded = session
    .select_conversation(conversation_id)
    .await
    .with_context(|| format!("failed to open conversation {conversation_id}"))?;
  for entry in &loaded {
    seen.insert(entry.message.id);
    println!("{}", message_line(entry));
  }
  eprintln!("Watching {conversation_id}; Ctrl-C to stop.");

  let ctrl_c = tokio::signal::ctrl_c();
  tokio::pin!(ctrl_c);
  loop {
    tokio::select! {
      _ = &mut ctrl_c => break,
      changed = changes.changed() => if changed.is_err() { break },
    }

    let mut incoming = false;
    for entry in session.messages().await {
      if seen.insert(entry.message.id) {
        incoming |= !entry.is_from(session.user_id());
        println!("{}", message_line(&entry));
      }
    }

    if incoming && let Err(err) = session.mark_conversation_read(conversation_id).await {
      tracing::warn!(error = %err, "failed to mark watched conversation read");
    }
  }
  Ok(())
}

// ─── Seed ────────────────────────────────────────────────────────────────────

/// Create a customer, an assessor, an assessment and its conversation, and
/// print their ids.
pub async fn seed(store: &SqliteStore) -> Result<()> {
  let customer = store
    .add_profile(Profile {
      id:           Uuid::new_v4(),
      display_name: "Casey Customer".into(),
      email:        "casey@example.com".into(),
      phone:        None,
      role:         Role::Customer,
    })
    .await
    .context("failed to add customer")?;

  let assessor = store
    .add_profile(Profile {
      id:           Uuid::new_v4(),
      display_name: "Avery Assessor".into(),
      email:        "avery@example.com".into(),
      phone:        Some("+44 7700 900123".into()),
      role:         Role::Assessor,
    })
    .await
    .context("failed to add assessor")?;

  let assessment = store
    .add_assessment(AssessmentSummary {
      id:           Uuid::new_v4(),
      title:        "2019 Volkswagen Golf GTI".into(),
      registration: Some("KX19 ABC".into()),
      status:       AssessmentStatus::Matched,
    })
    .await
    .context("failed to add assessment")?;

  let conversation = store
    .open_conversation(NewConversation {
      customer_id:   customer.id,
      assessor_id:   Some(assessor.id),
      assessment_id: assessment.id,
    })
    .await
    .context("failed to open conversation")?;

  println!("customer      {}", customer.id);
  println!("assessor      {}", assessor.id);
  println!("assessment    {}", assessment.id);
  println!("conversation  {}", conversation.id);
  Ok(())
}
