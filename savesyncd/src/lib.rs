pub mod category;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod refresh;
pub mod session;
pub mod space;
pub mod state;
pub mod sync;
