pub mod backend;
pub mod config;
pub mod error;
pub mod notification;
pub mod pages;
pub mod point;
pub mod schema;
pub mod shell;
pub use backend::{ ConsoleBackend, HttpBackend, create_backend, parse_backend_url, BackendConfig };
pub use config::ConsoleConfig;
pub use error::ConsoleError;
pub use notification::{ Notification, NotificationCenter, NotificationKind };
pub use pages::{ CreateVectorPage, EditPointsPage, SaveOutcome };
pub use shell::{ Route, Shell };
