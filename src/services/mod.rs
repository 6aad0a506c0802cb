pub mod dispatch;
pub mod email;
pub mod init;
pub mod push;
pub mod sms;
