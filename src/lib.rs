pub mod api;
pub mod app;
pub mod bootstrap;
pub mod database_sqlx;
pub mod models;
pub mod reconciler;
pub mod router;
pub mod storage;

pub use app::CentiApp;
pub use models::{AuthModal, Config, Screen, SessionState};
