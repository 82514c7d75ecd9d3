pub mod error;
pub mod phone;
pub mod time_window;
