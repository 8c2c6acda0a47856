//! Per-user settings updates.
//!
//! Every update loads the caller's record, overwrites only the fields that
//! were supplied, and saves it back in one compare-and-set write.

use super::error::{AccountError, AccountResult};
use super::service::AccountService;
use crate::auth::{AuthContext, NotificationsPatch, ProfilePatch, Theme, User};

/// Treat blank strings as "not supplied".
fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

impl AccountService {
    async fn load(&self, ctx: &AuthContext) -> AccountResult<User> {
        self.store
            .find_by_id(&ctx.user_id)
            .await?
            .ok_or(AccountError::UserNotFound)
    }

    /// Current record of the authenticated user.
    pub async fn current_user(&self, ctx: &AuthContext) -> AccountResult<User> {
        self.load(ctx).await
    }

    pub async fn update_profile(
        &self,
        ctx: &AuthContext,
        patch: ProfilePatch,
    ) -> AccountResult<User> {
        let patch = ProfilePatch {
            name: non_blank(patch.name),
            email: non_blank(patch.email),
            profile_picture: non_blank(patch.profile_picture),
        };

        let mut user = self.load(ctx).await?;
        user.apply_profile(patch);
        Ok(self.store.save(user).await?)
    }

    pub async fn update_notifications(
        &self,
        ctx: &AuthContext,
        patch: NotificationsPatch,
    ) -> AccountResult<User> {
        let mut user = self.load(ctx).await?;
        user.apply_notifications(patch);
        Ok(self.store.save(user).await?)
    }

    /// `None` or a blank string leaves the theme unchanged.
    pub async fn update_theme(
        &self,
        ctx: &AuthContext,
        theme: Option<String>,
    ) -> AccountResult<User> {
        let theme = match non_blank(theme) {
            Some(name) => Some(Theme::parse(&name).ok_or_else(|| {
                AccountError::Validation(format!(
                    "Unknown theme '{name}'; expected 'light' or 'dark'"
                ))
            })?),
            None => None,
        };

        let mut user = self.load(ctx).await?;
        if let Some(theme) = theme {
            user.theme = theme;
        }
        Ok(self.store.save(user).await?)
    }

    /// Replace the password hash after checking the old password.
    ///
    /// A wrong old password returns before anything is written.
    pub async fn change_password(
        &self,
        ctx: &AuthContext,
        old_password: &str,
        new_password: &str,
    ) -> AccountResult<User> {
        if new_password.is_empty() {
            return Err(AccountError::Validation("New password is required".into()));
        }

        let mut user = self.load(ctx).await?;
        if !self
            .verify_blocking(old_password.to_string(), user.password_hash.clone())
            .await?
        {
            tracing::warn!(user_id = %user.id, "Password change rejected: wrong old password");
            return Err(AccountError::InvalidOldPassword);
        }

        user.password_hash = self.hash_blocking(new_password.to_string()).await?;
        let user = self.store.save(user).await?;
        tracing::info!(user_id = %user.id, "Password changed");
        Ok(user)
    }

    /// Hard-delete the caller's record. Returns the removed record, or
    /// `None` when nothing was stored under the caller's identity.
    pub async fn deactivate(&self, ctx: &AuthContext) -> AccountResult<Option<User>> {
        let existing = self.store.find_by_id(&ctx.user_id).await?;
        if self.store.delete(&ctx.user_id).await? {
            tracing::info!(user_id = %ctx.user_id, "Account deactivated");
            Ok(existing)
        } else {
            tracing::warn!(user_id = %ctx.user_id, "Deactivation found no record");
            Ok(None)
        }
    }
}
