pub mod admin;
pub mod handler;
pub mod middleware;
pub mod server;
