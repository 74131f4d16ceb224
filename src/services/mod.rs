pub mod ownership;
pub mod token;
pub mod votes;
