pub mod cookie_manager;
pub mod credentials;
pub mod http_client;
pub mod models;
pub mod portal_auth;
pub mod storage;
pub mod todo_api;

pub use cookie_manager::*;
pub use credentials::*;
pub use http_client::*;
pub use models::*;
pub use portal_auth::*;
pub use storage::*;
pub use todo_api::*;
