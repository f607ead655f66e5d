pub mod anchor;
pub mod config;
pub mod crypto;
pub mod error;
pub mod evidence;
pub mod pipeline;
pub mod retry;
pub mod script;
pub mod verify;
