pub mod backend;
pub mod error;
pub mod manager;
pub mod state;
pub mod store;
pub mod validate;

pub use error::SessionError;
pub use manager::SessionManager;
pub use state::{AuthState, ProfileUpdate, SocialProvider, UserProfile};
pub use store::{SessionRecord, SessionStore};
