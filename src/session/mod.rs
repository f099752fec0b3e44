pub mod clock;
pub mod export_session;
