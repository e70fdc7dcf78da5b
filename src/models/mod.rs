pub mod booking;
pub mod geo;
pub mod service;
pub mod session;
