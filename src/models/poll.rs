use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{OptionId, PollId, UserId};

#[derive(Debug, Serialize, Deserialize, Clone, FromRow, PartialEq, Eq)]
pub struct Poll {
    pub id: PollId,
    pub title: String,
    pub description: String,
    /// The creator. Set once at creation and never reassigned.
    pub user_id: UserId,
    #[sqlx(skip)]
    #[serde(default)]
    pub options: Vec<PollOption>,
}

#[derive(Debug, Serialize, Deserialize, Clone, FromRow, PartialEq, Eq)]
pub struct PollOption {
    pub id: OptionId,
    pub poll_id: PollId,
    #[sqlx(rename = "option_text")]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, FromRow, PartialEq, Eq)]
pub struct Vote {
    pub id: i64,
    pub option_id: OptionId,
    pub user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePollRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePollRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionText {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddOptionsRequest {
    #[serde(default)]
    pub options: Vec<OptionText>,
}
