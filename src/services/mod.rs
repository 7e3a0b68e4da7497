pub mod account_service;
pub mod lottery_service;
pub mod otp_service;
pub mod user_service;

pub use account_service::*;
pub use lottery_service::*;
pub use otp_service::*;
pub use user_service::*;
