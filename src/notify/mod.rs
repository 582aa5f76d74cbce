//! Staff notification sink for submitted feedback.
//!
//! Rendering is a pure function so the template is testable without a
//! mail server; delivery goes through the `Notifier` trait so tests and
//! unconfigured deployments can swap the SMTP transport out. Delivery is
//! never the source of truth — the record is durably stored before any
//! notification attempt.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::feedback::{Feedback, UploadedFile};

/// Outbound notification sink for submitted feedback.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_feedback(&self, feedback: &Feedback, files: &[UploadedFile]) -> AppResult<()>;
}

/// Renders the staff notification: subject with the reference number,
/// body with the localized timestamp and every collected field, plus the
/// attachment list when files are present.
pub fn render_feedback_email(feedback: &Feedback, files: &[UploadedFile]) -> (String, String) {
    let reference = config::format_feedback_id(feedback.id);
    let subject = format!("Запрос из Telegram-бота: {}", reference);

    let mut body = format!(
        "Пришло обращение из телеграм бота департамента тендеров и закупок.\n\
         \n\
         Номер обращения: {}.\n\
         Дата и время обращения: {}\n\
         \n\
         Название компании: {}\n\
         ИНН: {}\n\
         ФИО: {}\n\
         Номер телефона: {}\n\
         Электронная почта: {}\n\
         \n\
         Текст сообщения:\n\
         {}\n",
        reference,
        localize_timestamp(&feedback.created_at),
        field(&feedback.company),
        field(&feedback.inn),
        field(&feedback.name),
        field(&feedback.contact_number),
        field(&feedback.email),
        field(&feedback.text),
    );

    if !files.is_empty() {
        body.push_str("\nВложенные файлы:\n- ");
        let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
        body.push_str(&names.join("\n- "));
    }

    (subject, body)
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

/// Stored timestamps are UTC `%Y-%m-%d %H:%M:%S`; staff read server-local
/// time. An unparseable value is passed through as-is.
fn localize_timestamp(created_at: &str) -> String {
    NaiveDateTime::parse_from_str(created_at, "%Y-%m-%d %H:%M:%S")
        .map(|naive| {
            Utc.from_utc_datetime(&naive)
                .with_timezone(&Local)
                .format("%d.%m.%Y %H:%M")
                .to_string()
        })
        .unwrap_or_else(|_| created_at.to_string())
}

/// SMTP-backed notifier.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpNotifier {
    /// Builds the notifier from the EMAIL_* configuration. `Ok(None)` when
    /// no host is configured (notifications disabled).
    pub fn from_config() -> AppResult<Option<Self>> {
        let Some(host) = config::email::HOST.as_deref() else {
            return Ok(None);
        };

        let mut builder = if *config::email::USE_SSL {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        };
        builder = builder
            .port(*config::email::PORT)
            .timeout(Some(config::email::timeout()));
        if !config::email::HOST_USER.is_empty() {
            builder = builder.credentials(Credentials::new(
                config::email::HOST_USER.clone(),
                config::email::HOST_PASSWORD.clone(),
            ));
        }

        let from: Mailbox = config::email::DEFAULT_FROM.parse()?;
        let mut to = Vec::new();
        for address in config::email::FEEDBACK_TO.iter() {
            to.push(address.parse()?);
        }
        if to.is_empty() {
            return Err(AppError::Validation(
                "MAIL_FEEDBACK_TO is empty while EMAIL_HOST is configured".to_string(),
            ));
        }

        Ok(Some(Self {
            transport: builder.build(),
            from,
            to,
        }))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_feedback(&self, feedback: &Feedback, files: &[UploadedFile]) -> AppResult<()> {
        let (subject, body) = render_feedback_email(feedback, files);

        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }

        let email = if files.is_empty() {
            builder.header(ContentType::TEXT_PLAIN).body(body)?
        } else {
            let text_part = SinglePart::builder().header(ContentType::TEXT_PLAIN).body(body);
            let mut multipart = MultiPart::mixed().singlepart(text_part);
            for file in files {
                // Re-read each stored payload and attach it under its
                // user-facing name.
                let content = fs_err::tokio::read(config::files_path(&file.stored_path)).await?;
                let content_type = ContentType::parse("application/octet-stream")
                    .map_err(|e| AppError::Validation(format!("attachment content type: {}", e)))?;
                multipart = multipart.singlepart(Attachment::new(file.file_name.clone()).body(content, content_type));
            }
            builder.multipart(multipart)?
        };

        log::debug!("Sending feedback notification email");
        self.transport.send(email).await?;
        log::debug!("Sent feedback notification email");
        Ok(())
    }
}

/// Sink used when email is not configured: the record is kept, the
/// notification is dropped with a log line.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send_feedback(&self, feedback: &Feedback, _files: &[UploadedFile]) -> AppResult<()> {
        log::warn!(
            "Email delivery is not configured; feedback {} stored without notification",
            feedback.id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{FeedbackField, FeedbackType};
    use pretty_assertions::assert_eq;

    fn sample_feedback() -> Feedback {
        Feedback {
            id: 17,
            created_at: "2025-03-04 10:30:00".to_string(),
            chat_id: 123456789,
            sent_message_id: None,
            username: Some("ivanov".to_string()),
            first_name: Some("Иван".to_string()),
            last_name: Some("Иванов".to_string()),
            name: Some("Иванов Иван Иванович".to_string()),
            contact_number: Some("+7 900 000-00-00".to_string()),
            email: Some("ivanov@example.com".to_string()),
            company: Some("ООО Ромашка".to_string()),
            inn: Some("7701234567".to_string()),
            text: Some("Вопрос по тендеру №42".to_string()),
            feedback_type: FeedbackType::General,
            processed: false,
            submitted: true,
            comment: None,
            next_field: Some(FeedbackField::Files),
        }
    }

    #[test]
    fn body_carries_the_reference_and_every_field() {
        let (subject, body) = render_feedback_email(&sample_feedback(), &[]);

        assert_eq!(subject, "Запрос из Telegram-бота: GKE-17");
        assert!(body.contains("Номер обращения: GKE-17."));
        assert!(body.contains("Название компании: ООО Ромашка"));
        assert!(body.contains("ИНН: 7701234567"));
        assert!(body.contains("ФИО: Иванов Иван Иванович"));
        assert!(body.contains("Номер телефона: +7 900 000-00-00"));
        assert!(body.contains("Электронная почта: ivanov@example.com"));
        assert!(body.contains("Вопрос по тендеру №42"));
        assert!(!body.contains("Вложенные файлы"));
    }

    #[test]
    fn attachment_names_are_listed() {
        let files = vec![
            UploadedFile {
                id: 1,
                feedback_id: 17,
                file_name: "смета.pdf".to_string(),
                stored_path: "user_uploads/x_смета.pdf".to_string(),
                size_bytes: 1000,
            },
            UploadedFile {
                id: 2,
                feedback_id: 17,
                file_name: "договор.docx".to_string(),
                stored_path: "user_uploads/y_договор.docx".to_string(),
                size_bytes: 2000,
            },
        ];

        let (_, body) = render_feedback_email(&sample_feedback(), &files);
        assert!(body.contains("Вложенные файлы:\n- смета.pdf\n- договор.docx"));
    }

    #[test]
    fn missing_fields_render_as_dashes() {
        let mut feedback = sample_feedback();
        feedback.company = None;
        feedback.text = None;

        let (_, body) = render_feedback_email(&feedback, &[]);
        assert!(body.contains("Название компании: -"));
        assert!(body.contains("Текст сообщения:\n-"));
    }

    #[test]
    fn unparseable_timestamp_is_passed_through() {
        assert_eq!(localize_timestamp("not a date"), "not a date");
    }
}
