use serde::{Deserialize, Serialize};

/// Storefront login flow events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuthEvent {
    /// A transfer was refused and the login surface is being opened
    LoginRequired { url: String },

    LoginCompleted { url: String },

    /// The retry after login was refused again
    LoginRejected { url: String },

    SurfaceClosed,
}
