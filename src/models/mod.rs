pub mod moderation;
pub mod token;
