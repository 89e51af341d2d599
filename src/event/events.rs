use crate::session::state::{AuthState, UserProfile};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    AuthStateChanged(AuthState),
    ProfileUpdated(Option<UserProfile>),
    // Failures worth surfacing that did not fail the operation itself
    Error(String),
}
