pub mod bulk;
pub mod dispatch;
pub mod priority;
pub mod recipients;
pub mod repository;
pub mod resend;
pub mod template;
