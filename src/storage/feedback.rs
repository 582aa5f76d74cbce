//! Feedback store: user-submitted (or in-progress) form records and the
//! files users attach to them.
//!
//! Invariant: at most one unsubmitted feedback per chat. `create` enforces
//! it destructively — starting a new flow deletes the prior in-progress
//! record outright, no merge, no resume.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::error::{AppError, AppResult};
use crate::core::types::{FeedbackField, FeedbackType};

/// One feedback form instance.
#[derive(Debug, Clone)]
pub struct Feedback {
    pub id: i64,
    /// UTC creation timestamp, `%Y-%m-%d %H:%M:%S`
    pub created_at: String,
    pub chat_id: i64,
    /// Id of the last prompt the bot sent, for clearing stale button rows
    pub sent_message_id: Option<i32>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name: Option<String>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub inn: Option<String>,
    pub text: Option<String>,
    pub feedback_type: FeedbackType,
    /// Set by staff in the admin surface once handled
    pub processed: bool,
    pub submitted: bool,
    pub comment: Option<String>,
    /// The field still awaited from the user
    pub next_field: Option<FeedbackField>,
}

/// A file the user attached during the files step.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub id: i64,
    pub feedback_id: i64,
    /// User-facing name, extension already rewritten at intake
    pub file_name: String,
    /// On-disk location under FILES_ROOT/user_uploads
    pub stored_path: String,
    pub size_bytes: u64,
}

const FEEDBACK_COLUMNS: &str = "id, created_at, telegram_chat_id, telegram_sent_message_id, telegram_username, \
     telegram_first_name, telegram_last_name, name, contact_number, email, company, inn, text, \
     type, processed, submitted, comment, next_field";

fn feedback_from_row(row: &Row<'_>) -> rusqlite::Result<Feedback> {
    Ok(Feedback {
        id: row.get(0)?,
        created_at: row.get(1)?,
        chat_id: row.get(2)?,
        sent_message_id: row.get(3)?,
        username: row.get(4)?,
        first_name: row.get(5)?,
        last_name: row.get(6)?,
        name: row.get(7)?,
        contact_number: row.get(8)?,
        email: row.get(9)?,
        company: row.get(10)?,
        inn: row.get(11)?,
        text: row.get(12)?,
        feedback_type: row.get(13)?,
        processed: row.get(14)?,
        submitted: row.get(15)?,
        comment: row.get(16)?,
        next_field: row.get(17)?,
    })
}

/// Text column a form field is stored in. The files step has no column —
/// its data lives in `uploaded_files`.
fn field_column(field: FeedbackField) -> Option<&'static str> {
    match field {
        FeedbackField::Company => Some("company"),
        FeedbackField::Inn => Some("inn"),
        FeedbackField::Name => Some("name"),
        FeedbackField::Email => Some("email"),
        FeedbackField::ContactNumber => Some("contact_number"),
        FeedbackField::Text => Some("text"),
        FeedbackField::Files => None,
    }
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Option<Feedback>> {
    let feedback = conn
        .query_row(
            &format!("SELECT {} FROM feedback WHERE id = ?1", FEEDBACK_COLUMNS),
            params![id],
            feedback_from_row,
        )
        .optional()?;
    Ok(feedback)
}

/// The chat's in-progress form, if any.
pub fn get_unsubmitted(conn: &Connection, chat_id: i64) -> AppResult<Option<Feedback>> {
    let feedback = conn
        .query_row(
            &format!(
                "SELECT {} FROM feedback WHERE telegram_chat_id = ?1 AND submitted = 0",
                FEEDBACK_COLUMNS
            ),
            params![chat_id],
            feedback_from_row,
        )
        .optional()?;
    Ok(feedback)
}

/// Deletes the chat's unsubmitted feedback (if any) together with its
/// uploaded-file rows; returns the stored paths so the caller can unlink
/// the payloads from disk.
pub fn delete_unsubmitted(conn: &Connection, chat_id: i64) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT uf.stored_path FROM uploaded_files uf
         JOIN feedback f ON f.id = uf.feedback_id
         WHERE f.telegram_chat_id = ?1 AND f.submitted = 0",
    )?;
    let rows = stmt.query_map(params![chat_id], |row| row.get::<_, String>(0))?;
    let mut paths = Vec::new();
    for row in rows {
        paths.push(row?);
    }

    conn.execute(
        "DELETE FROM feedback WHERE telegram_chat_id = ?1 AND submitted = 0",
        params![chat_id],
    )?;
    Ok(paths)
}

/// Creates a fresh form for the chat, destroying any unsubmitted
/// predecessor first (the at-most-one invariant). Returns the new record
/// and the stored paths of the destroyed one's uploads.
pub fn create(conn: &Connection, chat_id: i64, feedback_type: FeedbackType) -> AppResult<(Feedback, Vec<String>)> {
    let orphaned = delete_unsubmitted(conn, chat_id)?;

    let created_at = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    conn.execute(
        "INSERT INTO feedback (created_at, telegram_chat_id, type, next_field) VALUES (?1, ?2, ?3, ?4)",
        params![created_at, chat_id, feedback_type, feedback_type.first_field()],
    )?;
    let id = conn.last_insert_rowid();
    let feedback = get(conn, id)?.ok_or(AppError::FeedbackNotFound(chat_id))?;
    Ok((feedback, orphaned))
}

/// Records the sender's Telegram identity, captured on first inbound
/// message of the flow.
pub fn set_identity(
    conn: &Connection,
    id: i64,
    username: Option<&str>,
    first_name: &str,
    last_name: Option<&str>,
) -> AppResult<()> {
    conn.execute(
        "UPDATE feedback SET telegram_username = ?1, telegram_first_name = ?2, telegram_last_name = ?3 WHERE id = ?4",
        params![username, first_name, last_name, id],
    )?;
    Ok(())
}

pub fn set_sent_message(conn: &Connection, id: i64, message_id: i32) -> AppResult<()> {
    conn.execute(
        "UPDATE feedback SET telegram_sent_message_id = ?1 WHERE id = ?2",
        params![message_id, id],
    )?;
    Ok(())
}

/// Stores the user's answer into the column of `field`. The files step has
/// no text column and rejects this call.
pub fn store_field(conn: &Connection, id: i64, field: FeedbackField, value: &str) -> AppResult<()> {
    let column = field_column(field)
        .ok_or_else(|| AppError::Validation(format!("field '{}' does not store text", field)))?;
    conn.execute(
        &format!("UPDATE feedback SET {} = ?1 WHERE id = ?2", column),
        params![value, id],
    )?;
    Ok(())
}

pub fn set_next_field(conn: &Connection, id: i64, field: FeedbackField) -> AppResult<()> {
    conn.execute(
        "UPDATE feedback SET next_field = ?1 WHERE id = ?2",
        params![field, id],
    )?;
    Ok(())
}

pub fn set_submitted(conn: &Connection, id: i64) -> AppResult<()> {
    conn.execute("UPDATE feedback SET submitted = 1 WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn add_uploaded_file(
    conn: &Connection,
    feedback_id: i64,
    file_name: &str,
    stored_path: &str,
    size_bytes: u64,
) -> AppResult<UploadedFile> {
    conn.execute(
        "INSERT INTO uploaded_files (feedback_id, file_name, stored_path, size_bytes) VALUES (?1, ?2, ?3, ?4)",
        params![feedback_id, file_name, stored_path, size_bytes as i64],
    )?;
    let id = conn.last_insert_rowid();
    Ok(UploadedFile {
        id,
        feedback_id,
        file_name: file_name.to_string(),
        stored_path: stored_path.to_string(),
        size_bytes,
    })
}

pub fn uploaded_files(conn: &Connection, feedback_id: i64) -> AppResult<Vec<UploadedFile>> {
    let mut stmt = conn.prepare(
        "SELECT id, feedback_id, file_name, stored_path, size_bytes FROM uploaded_files
         WHERE feedback_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![feedback_id], |row| {
        Ok(UploadedFile {
            id: row.get(0)?,
            feedback_id: row.get(1)?,
            file_name: row.get(2)?,
            stored_path: row.get(3)?,
            size_bytes: row.get::<_, i64>(4)? as u64,
        })
    })?;
    let mut files = Vec::new();
    for row in rows {
        files.push(row?);
    }
    Ok(files)
}

/// Total bytes already attached to a feedback, for the aggregate quota.
pub fn total_uploaded_size(conn: &Connection, feedback_id: i64) -> AppResult<u64> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(size_bytes), 0) FROM uploaded_files WHERE feedback_id = ?1",
        params![feedback_id],
        |row| row.get(0),
    )?;
    Ok(total as u64)
}
