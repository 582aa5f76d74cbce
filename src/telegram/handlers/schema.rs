//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;

use super::types::{HandlerDeps, HandlerError};
use crate::telegram::bot::Command;
use crate::telegram::feedback;
use crate::telegram::navigation::{self, NavData};

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Returns a handler tree usable with teloxide's Dispatcher. The same
/// schema is used in production and in integration tests. Every endpoint
/// logs and swallows its own errors: one bad update must never take down
/// the polling loop.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        // Command handler
        .branch(command_handler(deps_commands))
        // Plain messages while a chat is filling the feedback form
        .branch(feedback_message_handler(deps_messages))
        // Callback query handler (inline keyboard buttons)
        .branch(callback_handler(deps_callback))
}

/// Handler for bot commands (/start)
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                match cmd {
                    Command::Start => {
                        if let Err(e) = navigation::handle_start_command(&bot, &deps, &msg).await {
                            log::error!("/start handler failed for chat {}: {}", msg.chat.id, e);
                        }
                    }
                }
                Ok(())
            }
        },
    ))
}

/// Handler for inbound text/document/photo messages of the feedback flow.
/// Gated by the session's entering_feedback flag; anything else a user
/// types outside the flow is unrelated chatter and falls through.
fn feedback_message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let sessions = deps.sessions.clone();

    Update::filter_message()
        .filter(move |msg: Message| sessions.is_entering_feedback(msg.chat.id))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Err(e) = feedback::handle_feedback_message(&bot, &deps, &msg).await {
                    log::error!("Feedback input handler failed for chat {}: {}", msg.chat.id, e);
                }
                Ok(())
            }
        })
}

/// Handler for callback queries, routed by payload prefix.
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            let result = match q.data.as_deref() {
                Some(data) if NavData::check(data) => navigation::handle_navigation_callback(&bot, &deps, &q).await,
                Some(feedback::CANCEL_CALLBACK) => feedback::handle_cancel_callback(&bot, &deps, &q).await,
                Some(feedback::SUBMIT_CALLBACK) => feedback::handle_submit_callback(&bot, &deps, &q).await,
                _ => {
                    // Unknown payload: acknowledge the tap and move on.
                    let _ = bot.answer_callback_query(q.id.clone()).await;
                    Ok(())
                }
            };

            if let Err(e) = result {
                log::error!("Callback handler failed: {}", e);
            }
            Ok(())
        }
    })
}
