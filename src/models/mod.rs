pub mod common;
pub mod lottery;
pub mod otp;
pub mod pagination;
pub mod user;

pub use common::*;
pub use lottery::*;
pub use otp::*;
pub use pagination::*;
pub use user::*;
