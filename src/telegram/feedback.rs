//! Feedback form flow: sequential field collection, file intake with
//! quota enforcement, and the cancel/submit transitions.
//!
//! The per-chat position in the form lives in the record itself
//! (`next_field`); the session's `entering_feedback` flag only decides
//! whether inbound plain messages are routed here at all.

use std::path::Path;

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::types::{FeedbackField, FeedbackType};
use crate::storage::feedback as feedback_store;
use crate::storage::feedback::Feedback;
use crate::storage::get_connection;
use crate::storage::nodes;
use crate::telegram::handlers::HandlerDeps;
use crate::telegram::navigation;

pub const CANCEL_CALLBACK: &str = "cancel_feedback";
pub const SUBMIT_CALLBACK: &str = "submit_feedback";

const CANCEL_LABEL: &str = "Отмена";
const SUBMIT_LABEL: &str = "Отправить";

const TEXT_AT_FILES_STEP: &str = "На этом этапе можно загрузить только файлы, текст записан не будет.";
const FILES_COME_LATER: &str = "Файлы можно будет прикрепить в конце обращения, пока что можно ввести только текст.";
const NO_FILES_IN_FORM: &str = "Файлы можно прикрепить только в разделе \"Обратная связь\"";
const FORM_CLOSED: &str = "Дополнить обращение уже нельзя, можно только отправить новое.";
const BAD_EXTENSION: &str = "Файл с таким расширением не допустим";
const CANCELLED: &str = "Отправка обращения отменена";
const PLEASE_WAIT: &str = "Подождите немного, отправляем ваше обращение...";

/// Executable extensions never accepted as attachments.
const BLOCKED_EXTENSIONS: [&str; 4] = [".exe", ".bat", ".com", ".cmd"];

/// Prompt shown while waiting for a field.
pub fn prompt_for(field: FeedbackField) -> String {
    match field {
        FeedbackField::Company => "Введите название компании:".to_string(),
        FeedbackField::Inn => "Введите ИНН компании:".to_string(),
        FeedbackField::Name => "Введите ФИО:".to_string(),
        FeedbackField::Email => "Введите контактный email:".to_string(),
        FeedbackField::ContactNumber => "Введите контактный номер телефона:".to_string(),
        FeedbackField::Text => "Введите ваш запрос:".to_string(),
        FeedbackField::Files => format!(
            "Можете прикрепить файлы (по одному, весом не больше {}Мб каждый и {}Мб суммарно) или отправить обращение.",
            *config::uploads::MAX_FILE_SIZE_MB,
            *config::uploads::MAX_TOTAL_SIZE_MB
        ),
    }
}

/// Starts a fresh form for the chat. Any unsent predecessor is destroyed
/// outright, together with its stored uploads.
pub async fn start(bot: &Bot, deps: &HandlerDeps, chat_id: ChatId, feedback_type: FeedbackType) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let (feedback, orphaned) = feedback_store::create(&conn, chat_id.0, feedback_type)?;
    drop(conn);

    remove_stored_files(&orphaned).await;
    deps.sessions.set_entering_feedback(chat_id, true);

    request_next_input(bot, deps, &feedback).await
}

/// Best-effort removal of upload payloads whose rows are already gone.
async fn remove_stored_files(paths: &[String]) {
    for relative in paths {
        let path = config::files_path(relative);
        if let Err(e) = fs_err::tokio::remove_file(&path).await {
            log::warn!("Failed to remove orphaned upload {}: {}", path.display(), e);
        }
    }
}

/// Prompts for the currently awaited field: clears the previous prompt's
/// button row (best-effort), sends the prompt with Отмена — plus Отправить
/// on the terminal field — and remembers the new message id.
async fn request_next_input(bot: &Bot, deps: &HandlerDeps, feedback: &Feedback) -> AppResult<()> {
    let chat_id = ChatId(feedback.chat_id);

    if let Some(message_id) = feedback.sent_message_id {
        if let Err(e) = bot.edit_message_reply_markup(chat_id, MessageId(message_id)).await {
            log::warn!("Exception while editing message in chat {}: {}", chat_id, e);
        }
    }

    let field = feedback
        .next_field
        .ok_or_else(|| AppError::Validation(format!("feedback {} awaits no field", feedback.id)))?;

    let mut rows = vec![vec![InlineKeyboardButton::callback(CANCEL_LABEL, CANCEL_CALLBACK)]];
    if feedback.feedback_type.is_last(field) {
        rows.push(vec![InlineKeyboardButton::callback(SUBMIT_LABEL, SUBMIT_CALLBACK)]);
    }

    let sent = bot
        .send_message(chat_id, prompt_for(field))
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;

    let conn = get_connection(&deps.db_pool)?;
    feedback_store::set_sent_message(&conn, feedback.id, sent.id.0)?;
    Ok(())
}

/// Handles an inbound message while the chat is filling the form: stores
/// the answer (or routes attachments to file intake), advances the
/// sequence, and re-renders the prompt.
pub async fn handle_feedback_message(bot: &Bot, deps: &HandlerDeps, msg: &Message) -> AppResult<()> {
    let chat_id = msg.chat.id;

    let conn = get_connection(&deps.db_pool)?;
    let Some(feedback) = feedback_store::get_unsubmitted(&conn, chat_id.0)? else {
        // The record vanished under the flag (admin delete, restart race).
        log::warn!("Chat {} is marked as entering feedback but has no open record", chat_id);
        deps.sessions.set_entering_feedback(chat_id, false);
        return Ok(());
    };

    if feedback.first_name.is_none() {
        if let Some(user) = msg.from.as_ref() {
            feedback_store::set_identity(
                &conn,
                feedback.id,
                user.username.as_deref(),
                &user.first_name,
                user.last_name.as_deref(),
            )?;
        }
    }

    let field = feedback
        .next_field
        .ok_or_else(|| AppError::Validation(format!("feedback {} awaits no field", feedback.id)))?;
    drop(conn);

    if field == FeedbackField::Files {
        if let Some(document) = msg.document() {
            let declared_name = document
                .file_name
                .clone()
                .unwrap_or_else(|| document.file.id.0.clone());
            process_file(bot, deps, document.file.id.clone(), &declared_name, chat_id).await?;
        }

        if let Some(photos) = msg.photo() {
            if let Some(photo) = photos.last() {
                let declared_name = photo.file.id.0.clone();
                process_file(bot, deps, photo.file.id.clone(), &declared_name, chat_id).await?;
            }
        }

        if msg.caption().is_some() || msg.text().is_some() {
            bot.send_message(chat_id, TEXT_AT_FILES_STEP).await?;
        }
    } else if msg.document().is_some() || msg.photo().is_some() {
        let warning = if feedback.feedback_type.has_files_step() {
            FILES_COME_LATER
        } else {
            NO_FILES_IN_FORM
        };
        bot.send_message(chat_id, warning).await?;
    } else {
        match feedback.feedback_type.next_field(field) {
            Some(next) => {
                let conn = get_connection(&deps.db_pool)?;
                feedback_store::store_field(&conn, feedback.id, field, msg.text().unwrap_or_default())?;
                feedback_store::set_next_field(&conn, feedback.id, next)?;
            }
            None => {
                bot.send_message(chat_id, FORM_CLOSED).await?;
            }
        }
    }

    // Re-render the prompt for the (possibly advanced) current field.
    let conn = get_connection(&deps.db_pool)?;
    let Some(feedback) = feedback_store::get_unsubmitted(&conn, chat_id.0)? else {
        return Ok(());
    };
    drop(conn);
    request_next_input(bot, deps, &feedback).await
}

/// Takes in one attached file: rewrites the declared extension with the
/// one the gateway reports for the actual payload, applies the denylist
/// and both size caps, then downloads and records the attachment.
async fn process_file(bot: &Bot, deps: &HandlerDeps, file_id: FileId, declared_name: &str, chat_id: ChatId) -> AppResult<()> {
    let file = bot.get_file(file_id).await?;

    let extension = Path::new(&file.path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    let stem = Path::new(declared_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("file");
    let file_name = format!("{}{}", stem, extension);

    if BLOCKED_EXTENSIONS.iter().any(|blocked| extension.eq_ignore_ascii_case(blocked)) {
        bot.send_message(chat_id, BAD_EXTENSION).await?;
        return Ok(());
    }

    let size = u64::from(file.size);
    if size > config::uploads::max_file_size_bytes() {
        bot.send_message(
            chat_id,
            format!(
                "Файл под названием {} не может быть загружен, т.к. его размер превышает {}Мб.",
                file_name,
                *config::uploads::MAX_FILE_SIZE_MB
            ),
        )
        .await?;
        return Ok(());
    }

    let conn = get_connection(&deps.db_pool)?;
    let feedback =
        feedback_store::get_unsubmitted(&conn, chat_id.0)?.ok_or(AppError::FeedbackNotFound(chat_id.0))?;
    let existing_size = feedback_store::total_uploaded_size(&conn, feedback.id)?;
    drop(conn);

    if existing_size + size > config::uploads::max_total_size_bytes() {
        bot.send_message(
            chat_id,
            format!(
                "Все файлы в обращении не могут превышать {}Мб.",
                *config::uploads::MAX_TOTAL_SIZE_MB
            ),
        )
        .await?;
        return Ok(());
    }

    let relative = format!("user_uploads/{}_{}", Uuid::new_v4(), file_name);
    let dest = config::files_path(&relative);
    if let Some(parent) = dest.parent() {
        fs_err::tokio::create_dir_all(parent).await?;
    }
    let mut destination = fs_err::tokio::File::create(&dest).await?;
    bot.download_file(&file.path, &mut destination).await?;
    destination.flush().await?;

    let conn = get_connection(&deps.db_pool)?;
    feedback_store::add_uploaded_file(&conn, feedback.id, &file_name, &relative, size)?;
    drop(conn);

    bot.send_message(chat_id, format!("Ваш файл {} добавлен к обращению.", file_name))
        .await?;
    Ok(())
}

/// Отмена: drop the flow and hand the chat back to navigation at the
/// node the form was entered from.
pub async fn handle_cancel_callback(bot: &Bot, deps: &HandlerDeps, q: &CallbackQuery) -> AppResult<()> {
    let _ = bot.answer_callback_query(q.id.clone()).await;

    let Some(message) = q.message.as_ref() else {
        log::warn!("Cancel callback without an attached message");
        return Ok(());
    };
    let chat_id = message.chat().id;

    if let Err(e) = bot.edit_message_reply_markup(chat_id, message.id()).await {
        log::warn!("Exception while editing message in chat {}: {}", chat_id, e);
    }
    bot.send_message(chat_id, CANCELLED).await?;

    deps.sessions.set_entering_feedback(chat_id, false);
    finish_input(bot, deps, chat_id).await
}

/// Отправить: close the form and deliver it.
pub async fn handle_submit_callback(bot: &Bot, deps: &HandlerDeps, q: &CallbackQuery) -> AppResult<()> {
    let _ = bot.answer_callback_query(q.id.clone()).await;

    let Some(message) = q.message.as_ref() else {
        log::warn!("Submit callback without an attached message");
        return Ok(());
    };
    let chat_id = message.chat().id;

    let conn = get_connection(&deps.db_pool)?;
    let Some(feedback) = feedback_store::get_unsubmitted(&conn, chat_id.0)? else {
        log::warn!("Submit pressed in chat {} with no open feedback", chat_id);
        return Ok(());
    };
    drop(conn);

    if let Some(message_id) = feedback.sent_message_id {
        if let Err(e) = bot.edit_message_reply_markup(chat_id, MessageId(message_id)).await {
            log::warn!("Exception while editing message in chat {}: {}", chat_id, e);
        }
    }

    finish(bot, deps, feedback).await
}

/// Marks the record submitted, attempts the staff notification (failures
/// are logged and swallowed — the record is durably saved regardless),
/// confirms with the reference number, and returns to navigation.
async fn finish(bot: &Bot, deps: &HandlerDeps, feedback: Feedback) -> AppResult<()> {
    let chat_id = ChatId(feedback.chat_id);

    let conn = get_connection(&deps.db_pool)?;
    feedback_store::set_submitted(&conn, feedback.id)?;
    let files = feedback_store::uploaded_files(&conn, feedback.id)?;
    drop(conn);

    let placeholder = bot.send_message(chat_id, PLEASE_WAIT).await?;
    let reference = config::format_feedback_id(feedback.id);

    if let Err(e) = deps.notifier.send_feedback(&feedback, &files).await {
        log::error!("Exception while sending mail for {}: {}", reference, e);
    }

    bot.edit_message_text(
        chat_id,
        placeholder.id,
        format!("Спасибо, ваш запрос принят!\nНомер обращения: {}", reference),
    )
    .await?;
    log::info!("Accepted feedback {}", reference);

    deps.sessions.set_entering_feedback(chat_id, false);
    finish_input(bot, deps, chat_id).await
}

/// Hands control back to the navigation engine at the session's return
/// node (the root when the session has none), rendering only the
/// navigation row.
async fn finish_input(bot: &Bot, deps: &HandlerDeps, chat_id: ChatId) -> AppResult<()> {
    let return_node = deps.sessions.return_node(chat_id);

    let conn = get_connection(&deps.db_pool)?;
    let node = match return_node {
        Some(node_id) => nodes::get(&conn, node_id)?,
        None => nodes::root(&conn)?,
    };
    drop(conn);

    match node {
        Some(node) => navigation::send_navigation(bot, deps, chat_id, &node).await,
        None => {
            log::error!("No node to return to after input in chat {}", chat_id);
            Ok(())
        }
    }
}
