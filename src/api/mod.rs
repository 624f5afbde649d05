pub mod handler;
pub mod interaction;
pub mod middleware;
pub mod server;
