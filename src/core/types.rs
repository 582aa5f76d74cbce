//! Closed domain enums for the feedback form and input-flow registry.
//!
//! The original data model routed these through free-form strings; here
//! they are tagged variants so an unknown value is a parse error at the
//! edge instead of a surprise at dispatch time.

use std::str::FromStr;

use strum::{Display, EnumString};

use crate::core::error::{AppError, AppResult};

/// Form variant. Only the general feedback form is active; the contract
/// template variants of the original data model are reserved and absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackType {
    #[default]
    General,
}

/// One field of the feedback form, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum FeedbackField {
    Company,
    Inn,
    Name,
    Email,
    ContactNumber,
    Text,
    Files,
}

impl FeedbackType {
    /// The field sequence of this form variant, in prompt order.
    pub fn sequence(self) -> &'static [FeedbackField] {
        match self {
            FeedbackType::General => &[
                FeedbackField::Company,
                FeedbackField::Inn,
                FeedbackField::Name,
                FeedbackField::Email,
                FeedbackField::ContactNumber,
                FeedbackField::Text,
                FeedbackField::Files,
            ],
        }
    }

    /// The field a fresh form starts with.
    pub fn first_field(self) -> FeedbackField {
        self.sequence()[0]
    }

    /// Pure transition function: the field after `field`, or `None` when
    /// `field` is terminal (or not part of this variant at all).
    pub fn next_field(self, field: FeedbackField) -> Option<FeedbackField> {
        let seq = self.sequence();
        let pos = seq.iter().position(|f| *f == field)?;
        seq.get(pos + 1).copied()
    }

    /// True when `field` is the last field of this variant's sequence.
    pub fn is_last(self, field: FeedbackField) -> bool {
        self.sequence().last() == Some(&field)
    }

    /// True when this variant collects file attachments at some step.
    pub fn has_files_step(self) -> bool {
        self.sequence().contains(&FeedbackField::Files)
    }
}

/// Registry of input flows a menu node may launch instead of showing its
/// children. Closed set: unknown `input_function` values in the content
/// tree are rejected at startup, not at first button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum InputFlow {
    Feedback,
}

impl InputFlow {
    /// Resolves a stored `input_function` value, mapping unknown names to
    /// a configuration error naming the offending value.
    pub fn resolve(name: &str) -> AppResult<Self> {
        InputFlow::from_str(name).map_err(|_| AppError::Misconfigured(format!("unknown input function '{}'", name)))
    }
}

// rusqlite FromSql/ToSql: the enums live in TEXT columns under their strum
// serializations ("GENERAL", "contact_number", ...).

macro_rules! impl_text_sql {
    ($ty:ty) => {
        impl rusqlite::types::FromSql for $ty {
            fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
                let s = value.as_str()?;
                <$ty>::from_str(s)
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(std::io::Error::other(e.to_string()))))
            }
        }

        impl rusqlite::types::ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::Owned(rusqlite::types::Value::Text(
                    self.to_string(),
                )))
            }
        }
    };
}

impl_text_sql!(FeedbackType);
impl_text_sql!(FeedbackField);
