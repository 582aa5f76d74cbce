//! Common test harness: a real teloxide Bot pointed at a wiremock Telegram
//! API, a file-backed throwaway database, and a recording notifier.
//!
//! Shared across all integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use teloxide::prelude::*;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use tendersbot::core::error::AppResult;
use tendersbot::notify::Notifier;
use tendersbot::storage::feedback::{Feedback, UploadedFile};
use tendersbot::storage::nodes::{self, Node, NodeParams};
use tendersbot::storage::{create_pool, DbConnection};
use tendersbot::telegram::{HandlerDeps, SessionStore};

pub const TEST_CHAT_ID: i64 = 123456789;

/// Notifier double that records every delivery instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(i64, usize)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_feedback(&self, feedback: &Feedback, files: &[UploadedFile]) -> AppResult<()> {
        self.sent.lock().unwrap().push((feedback.id, files.len()));
        Ok(())
    }
}

impl RecordingNotifier {
    pub fn deliveries(&self) -> Vec<(i64, usize)> {
        self.sent.lock().unwrap().clone()
    }
}

/// Test harness wiring real handlers to a mock Telegram API.
pub struct TestEnv {
    pub mock_server: MockServer,
    pub bot: Bot,
    pub deps: HandlerDeps,
    pub notifier: Arc<RecordingNotifier>,
    // Holds the database file for the lifetime of the test
    _tempdir: tempfile::TempDir,
}

impl TestEnv {
    pub async fn new() -> Self {
        let mock_server = MockServer::start().await;

        let bot = Bot::new("1234567890:TESTTOKENTESTTOKENTESTTOKEN")
            .set_api_url(mock_server.uri().parse().expect("mock server uri"));

        let tempdir = tempfile::tempdir().expect("create tempdir");
        let db_path = tempdir.path().join("test.sqlite");
        let db_pool = Arc::new(create_pool(db_path.to_str().expect("db path")).expect("create test pool"));

        let notifier = Arc::new(RecordingNotifier::default());
        let deps = HandlerDeps::new(db_pool, Arc::new(SessionStore::new()), notifier.clone());

        Self {
            mock_server,
            bot,
            deps,
            notifier,
            _tempdir: tempdir,
        }
    }

    pub fn conn(&self) -> DbConnection {
        self.deps.db_pool.get().expect("get test connection")
    }

    /// Seeds a root node.
    pub fn create_root(&self, label: &str) -> Node {
        nodes::create(&self.conn(), &NodeParams::new(label)).expect("create root")
    }

    /// Seeds a child node.
    pub fn create_child(&self, parent: i64, label: &str, order: i64) -> Node {
        nodes::create(
            &self.conn(),
            &NodeParams {
                parent_id: Some(parent),
                button_order: order,
                ..NodeParams::new(label)
            },
        )
        .expect("create child")
    }

    /// Seeds a child node that launches the feedback flow.
    pub fn create_feedback_node(&self, parent: i64, label: &str) -> Node {
        nodes::create(
            &self.conn(),
            &NodeParams {
                parent_id: Some(parent),
                input_function: Some("feedback".to_string()),
                ..NodeParams::new(label)
            },
        )
        .expect("create feedback node")
    }

    /// Mounts permissive mocks for every Telegram API method the bot uses.
    pub async fn mock_telegram_api(&self) {
        let sent_message = serde_json::json!({
            "ok": true,
            "result": {
                "message_id": 42,
                "from": { "id": 987654321, "is_bot": true, "first_name": "TestBot" },
                "chat": { "id": TEST_CHAT_ID, "type": "private" },
                "date": 1735992000,
                "text": "response"
            }
        });

        for api_method in ["sendMessage", "editMessageText", "sendDocument"] {
            Mock::given(method("POST"))
                .and(path_regex(format!("/bot[^/]+/{}", api_method)))
                .respond_with(ResponseTemplate::new(200).set_body_json(sent_message.clone()))
                .mount(&self.mock_server)
                .await;
        }

        let ok_true = serde_json::json!({ "ok": true, "result": true });
        for api_method in ["answerCallbackQuery", "deleteMessage", "editMessageReplyMarkup"] {
            Mock::given(method("POST"))
                .and(path_regex(format!("/bot[^/]+/{}", api_method)))
                .respond_with(ResponseTemplate::new(200).set_body_json(ok_true.clone()))
                .mount(&self.mock_server)
                .await;
        }
    }

    /// Mounts a getFile mock reporting the given size and path, plus the
    /// file-download route serving a small payload.
    pub async fn mock_get_file(&self, file_size: u64, file_path: &str) {
        let get_file = serde_json::json!({
            "ok": true,
            "result": {
                "file_id": "file_abc",
                "file_unique_id": "unique_abc",
                "file_size": file_size,
                "file_path": file_path
            }
        });
        Mock::given(method("POST"))
            .and(path_regex("/bot[^/]+/getFile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(get_file))
            .mount(&self.mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path_regex("/file/bot[^/]+/.*"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
            .mount(&self.mock_server)
            .await;
    }

    pub async fn received_requests(&self) -> Vec<Request> {
        self.mock_server.received_requests().await.unwrap_or_default()
    }

    /// Bodies of every request to the given API method, in arrival order.
    pub async fn bodies_of(&self, api_method: &str) -> Vec<serde_json::Value> {
        let needle = api_method.to_lowercase();
        self.received_requests()
            .await
            .iter()
            .filter(|r| r.url.path().to_lowercase().contains(&needle))
            .map(|r| serde_json::from_slice(&r.body).expect("request body should be JSON"))
            .collect()
    }

    /// Texts of every sendMessage request, in arrival order.
    pub async fn sent_texts(&self) -> Vec<String> {
        self.bodies_of("sendMessage")
            .await
            .iter()
            .filter_map(|b| b["text"].as_str().map(str::to_string))
            .collect()
    }
}

/// Flattened [text, callback_data] pairs of an inline keyboard in a
/// request body.
pub fn keyboard_buttons(body: &serde_json::Value) -> Vec<(String, String)> {
    body["reply_markup"]["inline_keyboard"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .flat_map(|row| row.as_array().cloned().unwrap_or_default())
                .map(|button| {
                    (
                        button["text"].as_str().unwrap_or_default().to_string(),
                        button["callback_data"].as_str().unwrap_or_default().to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Builds an inbound text message as Telegram would deliver it.
pub fn text_message(chat_id: i64, text: &str) -> Message {
    let json = serde_json::json!({
        "message_id": 1,
        "date": 1735992000,
        "chat": { "id": chat_id, "type": "private", "first_name": "Тест", "username": "testuser" },
        "from": {
            "id": chat_id,
            "is_bot": false,
            "first_name": "Иван",
            "last_name": "Иванов",
            "username": "ivanov",
            "language_code": "ru"
        },
        "text": text
    });
    serde_json::from_value(json).expect("deserialize text message")
}

/// Builds an inbound document message.
pub fn document_message(chat_id: i64, file_id: &str, file_name: &str, caption: Option<&str>) -> Message {
    let mut json = serde_json::json!({
        "message_id": 2,
        "date": 1735992000,
        "chat": { "id": chat_id, "type": "private", "first_name": "Тест", "username": "testuser" },
        "from": {
            "id": chat_id,
            "is_bot": false,
            "first_name": "Иван",
            "last_name": "Иванов",
            "username": "ivanov",
            "language_code": "ru"
        },
        "document": {
            "file_id": file_id,
            "file_unique_id": "unique_doc",
            "file_name": file_name,
            "file_size": 1000
        }
    });
    if let Some(caption) = caption {
        json["caption"] = serde_json::json!(caption);
    }
    serde_json::from_value(json).expect("deserialize document message")
}

/// Builds an inbound photo message (Telegram sends several sizes; the
/// intake uses the largest, which comes last).
pub fn photo_message(chat_id: i64, file_id: &str) -> Message {
    let json = serde_json::json!({
        "message_id": 3,
        "date": 1735992000,
        "chat": { "id": chat_id, "type": "private", "first_name": "Тест", "username": "testuser" },
        "from": {
            "id": chat_id,
            "is_bot": false,
            "first_name": "Иван",
            "last_name": "Иванов",
            "username": "ivanov",
            "language_code": "ru"
        },
        "photo": [
            { "file_id": "small", "file_unique_id": "u_small", "width": 90, "height": 90, "file_size": 500 },
            { "file_id": file_id, "file_unique_id": "u_big", "width": 800, "height": 800, "file_size": 2000 }
        ]
    });
    serde_json::from_value(json).expect("deserialize photo message")
}

/// Builds a callback query as delivered when a user presses an inline
/// button on `message_text`.
pub fn callback_query(chat_id: i64, data: &str, message_text: &str) -> CallbackQuery {
    let json = serde_json::json!({
        "id": "callback_123",
        "from": {
            "id": chat_id,
            "is_bot": false,
            "first_name": "Иван",
            "username": "ivanov",
            "language_code": "ru"
        },
        "message": {
            "message_id": 42,
            "date": 1735992000,
            "chat": { "id": chat_id, "type": "private", "first_name": "Тест", "username": "testuser" },
            "from": { "id": 987654321, "is_bot": true, "first_name": "TestBot", "username": "test_bot" },
            "text": message_text
        },
        "chat_instance": "chat_instance_123",
        "data": data
    });
    serde_json::from_value(json).expect("deserialize callback query")
}
