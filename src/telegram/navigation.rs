//! Menu-tree navigation: the token codec for inline-button payloads and
//! the engine that renders nodes, child buttons, and breadcrumbs.

use std::path::Path;

use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, InputFile, LinkPreviewOptions, MaybeInaccessibleMessage, ParseMode,
};

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::types::{FeedbackType, InputFlow};
use crate::storage::nodes::{self, Node, NodeFile};
use crate::storage::get_connection;
use crate::telegram::feedback;
use crate::telegram::handlers::HandlerDeps;

pub const BACK_LABEL: &str = "Назад";
pub const TO_START_LABEL: &str = "В начало";
const SENDING_FILES_TEXT: &str = "Отправляем файлы, подождите немного...";

/// Direction of a navigation step, one character on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavDirection {
    Forward,
    Back,
    Root,
}

impl NavDirection {
    fn as_char(self) -> char {
        match self {
            NavDirection::Forward => 'f',
            NavDirection::Back => 'b',
            NavDirection::Root => 'r',
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "f" => Some(NavDirection::Forward),
            "b" => Some(NavDirection::Back),
            "r" => Some(NavDirection::Root),
            _ => None,
        }
    }
}

/// Compact button payload: "go to node X, in direction Y".
///
/// Wire format `nav:<id>|<f|b|r>`. The prefix separates navigation tokens
/// from the other callback payloads sharing the button namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavData {
    pub node_id: i64,
    pub direction: NavDirection,
}

impl NavData {
    pub const PREFIX: &'static str = "nav:";

    pub fn new(node_id: i64, direction: NavDirection) -> Self {
        Self { node_id, direction }
    }

    pub fn serialize(&self) -> String {
        format!("{}{}|{}", Self::PREFIX, self.node_id, self.direction.as_char())
    }

    pub fn deserialize(data: &str) -> AppResult<Self> {
        let content = data
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| AppError::MalformedToken(format!("missing '{}' prefix: {}", Self::PREFIX, data)))?;

        let (id_part, dir_part) = content
            .split_once('|')
            .ok_or_else(|| AppError::MalformedToken(format!("missing separator: {}", data)))?;

        let node_id: i64 = id_part
            .parse()
            .map_err(|_| AppError::MalformedToken(format!("bad node id: {}", data)))?;
        let direction = NavDirection::from_str(dir_part)
            .ok_or_else(|| AppError::MalformedToken(format!("bad direction: {}", data)))?;

        Ok(Self { node_id, direction })
    }

    /// Fast prefix test used by the dispatcher to route callbacks here.
    pub fn check(data: &str) -> bool {
        data.starts_with(Self::PREFIX)
    }
}

fn disabled_link_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

/// Validates every `input_function` stored in the tree against the closed
/// flow registry. Run at startup so a typo in the admin panel fails the
/// deploy, not the first user who taps the button.
pub fn validate_input_functions(conn: &rusqlite::Connection) -> AppResult<()> {
    for name in nodes::input_functions(conn)? {
        InputFlow::resolve(&name)?;
    }
    Ok(())
}

/// /start: enter the tree root.
pub async fn handle_start_command(bot: &Bot, deps: &HandlerDeps, msg: &Message) -> AppResult<()> {
    let username = msg.from.as_ref().and_then(|u| u.username.as_deref()).unwrap_or("-");
    log::info!("User entered \"start\": {}", username);

    let conn = get_connection(&deps.db_pool)?;
    let root = nodes::root(&conn)?.ok_or_else(|| AppError::Misconfigured("node tree has no root".to_string()))?;
    drop(conn);

    send_node(bot, deps, msg.chat.id, root.id, false).await
}

/// Enters a node: resets the chat's session, sends body text and files
/// (unless `only_nav`), then either launches the node's input flow or
/// renders the navigation row.
pub async fn send_node(bot: &Bot, deps: &HandlerDeps, chat_id: ChatId, node_id: i64, only_nav: bool) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    // Always re-read: the admin may have edited the node since the button
    // was rendered.
    let node = nodes::get(&conn, node_id)?.ok_or(AppError::NodeNotFound(node_id))?;
    let files = nodes::files(&conn, node.id)?;
    drop(conn);

    deps.sessions.reset(chat_id);

    if !only_nav {
        if let Some(text) = node.text.as_deref().filter(|t| !t.is_empty()) {
            bot.send_message(chat_id, text)
                .parse_mode(ParseMode::Html)
                .link_preview_options(disabled_link_preview())
                .await?;
        }

        if !files.is_empty() {
            send_files(bot, chat_id, &files).await?;
        }
    }

    if let Some(name) = node.input_function.as_deref() {
        let flow = InputFlow::resolve(name)?;
        deps.sessions.set_return_node(chat_id, node.id);
        match flow {
            InputFlow::Feedback => feedback::start(bot, deps, chat_id, FeedbackType::General).await?,
        }
    } else {
        send_navigation(bot, deps, chat_id, &node).await?;
    }

    Ok(())
}

/// Streams the node's content files as documents behind a placeholder
/// message that is removed afterwards.
async fn send_files(bot: &Bot, chat_id: ChatId, files: &[NodeFile]) -> AppResult<()> {
    let placeholder = bot.send_message(chat_id, SENDING_FILES_TEXT).await?;

    for file in files {
        let path = Path::new(config::FILES_ROOT.as_str()).join(&file.file_path);
        bot.send_document(chat_id, InputFile::file(path)).await?;
    }

    if let Err(e) = bot.delete_message(chat_id, placeholder.id).await {
        log::warn!("Failed to delete file placeholder in chat {}: {}", chat_id, e);
    }
    Ok(())
}

/// Renders the navigation row for a node: one button per child, then
/// "Назад", then "В начало" when the parent is not already the root.
///
/// A childless node is skipped silently back into its parent (nav row
/// only); a childless root is a content misconfiguration worth a log line
/// but nothing more.
pub async fn send_navigation(bot: &Bot, deps: &HandlerDeps, chat_id: ChatId, node: &Node) -> AppResult<()> {
    let conn = get_connection(&deps.db_pool)?;
    let children = nodes::children(&conn, node.id)?;

    if children.is_empty() {
        drop(conn);
        return match node.parent_id {
            None => {
                log::warn!("Node {} has neither a parent nor a child node", node.id);
                Ok(())
            }
            Some(parent_id) => Box::pin(send_node(bot, deps, chat_id, parent_id, true)).await,
        };
    }

    let root_id = nodes::root(&conn)?.map(|n| n.id);
    drop(conn);

    let mut rows: Vec<Vec<InlineKeyboardButton>> = children
        .iter()
        .map(|child| {
            vec![InlineKeyboardButton::callback(
                child.button_text.clone(),
                NavData::new(child.id, NavDirection::Forward).serialize(),
            )]
        })
        .collect();

    if let Some(parent_id) = node.parent_id {
        rows.push(vec![InlineKeyboardButton::callback(
            BACK_LABEL,
            NavData::new(parent_id, NavDirection::Back).serialize(),
        )]);

        if Some(parent_id) != root_id {
            if let Some(root_id) = root_id {
                rows.push(vec![InlineKeyboardButton::callback(
                    TO_START_LABEL,
                    NavData::new(root_id, NavDirection::Root).serialize(),
                )]);
            }
        }
    }

    bot.send_message(chat_id, &node.nav_text)
        .parse_mode(ParseMode::Html)
        .link_preview_options(disabled_link_preview())
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;

    Ok(())
}

/// Handles a navigation button press: appends a breadcrumb to the pressed
/// message and enters the target node. Moving forward re-renders body
/// content; back/root render only the navigation row — the body was
/// already shown on the way down.
pub async fn handle_navigation_callback(bot: &Bot, deps: &HandlerDeps, q: &CallbackQuery) -> AppResult<()> {
    let data = q
        .data
        .as_deref()
        .ok_or_else(|| AppError::MalformedToken("empty callback payload".to_string()))?;
    let nav = NavData::deserialize(data)?;

    let _ = bot.answer_callback_query(q.id.clone()).await;

    let Some(message) = q.message.as_ref() else {
        log::warn!("Navigation callback without an attached message");
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();

    let conn = get_connection(&deps.db_pool)?;
    let node = nodes::get(&conn, nav.node_id)?.ok_or(AppError::NodeNotFound(nav.node_id))?;
    drop(conn);

    let where_to = match nav.direction {
        NavDirection::Forward => node.button_text.as_str(),
        NavDirection::Back => BACK_LABEL,
        NavDirection::Root => TO_START_LABEL,
    };

    if let MaybeInaccessibleMessage::Regular(pressed) = message {
        if let Some(old_text) = pressed.text() {
            let new_text = format!("{}\n\n> {}", old_text, where_to);
            // Cosmetic edit of a possibly stale message, not worth failing
            // the navigation over.
            if let Err(e) = bot.edit_message_text(chat_id, message_id, new_text).await {
                log::warn!("Failed to append breadcrumb in chat {}: {}", chat_id, e);
            }
        }
    }

    send_node(bot, deps, chat_id, node.id, nav.direction != NavDirection::Forward).await
}
