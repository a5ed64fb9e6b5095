//! Logged-in user, focused group and hosting surface

use serde::{Deserialize, Serialize};

/// Profile of the current user as reported by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// `None` when nobody is logged in
    #[serde(default)]
    pub userid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Profile {
    pub fn logged_in(userid: impl Into<String>) -> Self {
        Self {
            userid: Some(userid.into()),
            display_name: None,
        }
    }
}

/// The kind of view hosting the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// Interactive sidebar next to a document
    #[default]
    Sidebar,
    /// Standalone activity stream
    Stream,
    /// A single annotation and its replies
    SingleAnnotation,
}

/// Session state shared by all components
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub profile: Profile,
    pub focused_group: Option<String>,
    pub surface: Surface,
}

impl SessionState {
    pub fn is_logged_in(&self) -> bool {
        self.profile.userid.is_some()
    }

    pub fn userid(&self) -> Option<&str> {
        self.profile.userid.as_deref()
    }

    pub fn is_sidebar(&self) -> bool {
        self.surface == Surface::Sidebar
    }
}
