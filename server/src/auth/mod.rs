pub mod otp;
pub mod password;
pub mod session;

pub use otp::{LogOtpSender, OtpSender};
pub use session::{Session, SessionKeys};
