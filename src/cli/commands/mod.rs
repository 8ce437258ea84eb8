pub mod notifications;
pub mod serve;
pub mod token;
