pub mod connect;
pub mod export;
pub mod import;
pub mod login;
pub mod progress;
pub mod tenant;
