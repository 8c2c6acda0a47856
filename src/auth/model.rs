use serde::{Deserialize, Serialize};

/// UI theme preference.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Parse a theme name. Returns `None` for anything outside the enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }
}

/// Per-channel notification switches. Both default to on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationPreferences {
    pub email: bool,
    pub sms: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            sms: true,
        }
    }
}

/// A stored user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub profile_picture: Option<String>,
    pub notifications: NotificationPreferences,
    pub theme: Theme,
    /// Bumped by every successful save; used for compare-and-set.
    pub version: i64,
    pub created_at: String,
}

/// Fields supplied at registration. The hash is computed before insertion.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Public projection of a user, safe to return over the wire.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub profile_picture: Option<String>,
    pub notifications: NotificationPreferences,
    pub theme: Theme,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            profile_picture: user.profile_picture.clone(),
            notifications: user.notifications,
            theme: user.theme,
        }
    }
}

/// Profile changes. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub profile_picture: Option<String>,
}

/// Notification changes. `None` leaves the stored switch untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationsPatch {
    pub email: Option<bool>,
    pub sms: Option<bool>,
}

impl User {
    pub fn apply_profile(&mut self, patch: ProfilePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(picture) = patch.profile_picture {
            self.profile_picture = Some(picture);
        }
    }

    pub fn apply_notifications(&mut self, patch: NotificationsPatch) {
        if let Some(email) = patch.email {
            self.notifications.email = email;
        }
        if let Some(sms) = patch.sms {
            self.notifications.sms = sms;
        }
    }
}
