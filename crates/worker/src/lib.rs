pub mod alert;
pub mod cleanup;
pub mod delivery;
pub mod mailer;
