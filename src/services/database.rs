use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task;

use crate::models::{Conversation, ConversationId, Message, Role};

#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn open(path: &Path) -> Result<Self> {
        let path = path.to_path_buf();
        task::spawn_blocking(move || {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory: {}", parent.display())
                })?;
            }

            let conn = Connection::open(&path)
                .with_context(|| format!("Failed to open database at {}", path.display()))?;
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

            Self::from_connection(conn)
        })
        .await?
    }

    /// Create an in-memory database (used for testing)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
        conn.lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = Self::lock(&self.conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );",
        )?;

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .context("Failed to read schema version")?;

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE conversations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    deleted_at TEXT
                );

                CREATE TABLE messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    conversation_id INTEGER NOT NULL,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    deleted_at TEXT,
                    FOREIGN KEY (conversation_id) REFERENCES conversations(id)
                );

                CREATE INDEX idx_conversations_updated ON conversations(updated_at DESC);
                CREATE INDEX idx_conversations_deleted ON conversations(deleted_at);
                CREATE INDEX idx_messages_conversation ON messages(conversation_id, created_at);
                CREATE INDEX idx_messages_deleted ON messages(deleted_at);

                INSERT INTO schema_version (version) VALUES (1);",
            )?;
        }

        Ok(())
    }

    // --- Conversation CRUD ---

    pub async fn insert_conversation(&self, title: &str) -> Result<Conversation> {
        let conn = self.conn.clone();
        let title = title.to_string();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            let now = Utc::now();
            conn.execute(
                "INSERT INTO conversations (title, created_at, updated_at) VALUES (?1, ?2, ?2)",
                params![title, timestamp(&now)],
            )?;
            Ok(Conversation {
                id: conn.last_insert_rowid(),
                title,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            })
        })
        .await?
    }

    pub async fn get_conversation(&self, id: ConversationId) -> Result<Option<Conversation>> {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            let mut stmt = conn.prepare(
                "SELECT id, title, created_at, updated_at, deleted_at
                 FROM conversations WHERE id = ?1 AND deleted_at IS NULL",
            )?;
            let result = stmt
                .query_row(params![id], |row| Ok(Self::row_to_conversation(row)))
                .optional()?;
            result.transpose()
        })
        .await?
    }

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            let mut stmt = conn.prepare(
                "SELECT id, title, created_at, updated_at, deleted_at
                 FROM conversations WHERE deleted_at IS NULL
                 ORDER BY updated_at DESC, id DESC",
            )?;
            let conversations = stmt
                .query_map([], |row| Ok(Self::row_to_conversation(row)))?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?;
            Ok(conversations)
        })
        .await?
    }

    /// Soft-delete a conversation together with its messages.
    pub async fn delete_conversation(&self, id: ConversationId) -> Result<bool> {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let mut conn = Self::lock(&conn)?;
            let now = timestamp(&Utc::now());
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE conversations SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                params![now, id],
            )?;
            tx.execute(
                "UPDATE messages SET deleted_at = ?1 WHERE conversation_id = ?2 AND deleted_at IS NULL",
                params![now, id],
            )?;
            tx.commit()?;
            Ok(changed > 0)
        })
        .await?
    }

    // --- Message CRUD ---

    /// Append a message and bump the owning conversation's `updated_at` in
    /// the same transaction.
    pub async fn insert_message(
        &self,
        conversation_id: ConversationId,
        role: Role,
        content: &str,
    ) -> Result<Message> {
        let conn = self.conn.clone();
        let content = content.to_string();
        task::spawn_blocking(move || {
            let mut conn = Self::lock(&conn)?;
            let now = Utc::now();
            let stamp = timestamp(&now);
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (conversation_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![conversation_id, role.as_str(), content, stamp],
            )?;
            let id = tx.last_insert_rowid();
            tx.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![stamp, conversation_id],
            )?;
            tx.commit()?;

            Ok(Message {
                id,
                conversation_id,
                role,
                content,
                created_at: now,
                deleted_at: None,
            })
        })
        .await?
    }

    pub async fn list_messages(&self, conversation_id: ConversationId) -> Result<Vec<Message>> {
        let conn = self.conn.clone();
        task::spawn_blocking(move || {
            let conn = Self::lock(&conn)?;
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, created_at, deleted_at
                 FROM messages WHERE conversation_id = ?1 AND deleted_at IS NULL
                 ORDER BY created_at ASC, id ASC",
            )?;
            let messages = stmt
                .query_map(params![conversation_id], |row| {
                    Ok(Self::row_to_message(row))
                })?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?;
            Ok(messages)
        })
        .await?
    }

    // --- Row helpers ---

    fn row_to_conversation(row: &rusqlite::Row) -> Result<Conversation> {
        let created_str: String = row.get(2)?;
        let updated_str: String = row.get(3)?;
        let deleted_str: Option<String> = row.get(4)?;

        Ok(Conversation {
            id: row.get(0)?,
            title: row.get(1)?,
            created_at: parse_timestamp(&created_str)?,
            updated_at: parse_timestamp(&updated_str)?,
            deleted_at: deleted_str.as_deref().map(parse_timestamp).transpose()?,
        })
    }

    fn row_to_message(row: &rusqlite::Row) -> Result<Message> {
        let role_str: String = row.get(2)?;
        let created_str: String = row.get(4)?;
        let deleted_str: Option<String> = row.get(5)?;

        Ok(Message {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            role: Role::parse(&role_str),
            content: row.get(3)?,
            created_at: parse_timestamp(&created_str)?,
            deleted_at: deleted_str.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

/// Fixed-width UTC stamps so that SQLite's text ordering is chronological.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}
