//! TCP listener that feeds accepted sockets to [`crate::http::connection`].

pub mod listener;
