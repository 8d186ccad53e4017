pub mod config;
pub mod error;
pub mod executor;
pub mod export;
pub mod inspect;
pub mod scanner;
pub mod server;
pub mod shape;
pub mod validator;
