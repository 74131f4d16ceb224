pub mod poll;
pub mod user;

pub type UserId = i64;
pub type PollId = i64;
pub type OptionId = i64;
