//! SQL schema for the Parley SQLite store.
//!
//! Mirrors the hosted collections column for column so records decode the
//! same way from either backend.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS profiles (
    id          TEXT PRIMARY KEY,
    full_name   TEXT NOT NULL,
    email       TEXT NOT NULL,
    phone       TEXT,
    role        TEXT NOT NULL    -- 'customer' | 'assessor' | 'admin'
);

CREATE TABLE IF NOT EXISTS assessments (
    id           TEXT PRIMARY KEY,
    title        TEXT NOT NULL,
    registration TEXT,
    status       TEXT NOT NULL DEFAULT 'pending'
);

-- One conversation per assessment.
CREATE TABLE IF NOT EXISTS conversations (
    id            TEXT PRIMARY KEY,
    customer_id   TEXT NOT NULL REFERENCES profiles(id),
    assessor_id   TEXT REFERENCES profiles(id),
    assessment_id TEXT NOT NULL UNIQUE REFERENCES assessments(id),
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

-- Messages are never updated or deleted.
CREATE TABLE IF NOT EXISTS messages (
    id              TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(id),
    sender_id       TEXT NOT NULL REFERENCES profiles(id),
    content         TEXT NOT NULL,
    message_type    TEXT NOT NULL DEFAULT 'text',
    attachment_url  TEXT,
    created_at      TEXT NOT NULL   -- fixed-width RFC 3339, sorts as text
);

CREATE TABLE IF NOT EXISTS read_receipts (
    message_id  TEXT NOT NULL REFERENCES messages(id),
    user_id     TEXT NOT NULL REFERENCES profiles(id),
    read_at     TEXT NOT NULL,
    PRIMARY KEY (message_id, user_id)
);

CREATE INDEX IF NOT EXISTS conversations_customer_idx ON conversations(customer_id);
CREATE INDEX IF NOT EXISTS conversations_assessor_idx ON conversations(assessor_id);
CREATE INDEX IF NOT EXISTS messages_conversation_idx  ON messages(conversation_id, created_at);

PRAGMA user_version = 1;
";

/// The unread-count aggregate, equivalent to the hosted `get_unread_count`
/// function.
pub const UNREAD_COUNT: &str = "
SELECT COUNT(*)
FROM messages m
JOIN conversations c ON c.id = m.conversation_id
WHERE (c.customer_id = ?1 OR c.assessor_id = ?1)
  AND m.sender_id != ?1
  AND NOT EXISTS (
    SELECT 1 FROM read_receipts r
    WHERE r.message_id = m.id AND r.user_id = ?1
  )
";
