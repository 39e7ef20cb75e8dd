//! Account management for the current user and admins.

use crate::errors::HbError;
use crate::middleware::auth::Principal;
use crate::models::{user_slug, UpdateProfileRequest, User};
use crate::observability::hash_for_correlation;
use crate::repositories::{mapper, Filter, Querier};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

fn not_found(e: HbError) -> HbError {
    match e {
        HbError::NotFound(_) => HbError::NotFound("User not found".to_string()),
        other => other,
    }
}

pub async fn get_user(db: &dyn Querier, user_id: Uuid) -> Result<User, HbError> {
    mapper::get_one::<User>(db, Filter::by_id(user_id))
        .await
        .map_err(not_found)
}

/// Apply a profile update. Renaming also refreshes the slug.
#[instrument(skip_all)]
pub async fn update_profile(
    db: &dyn Querier,
    principal: &Principal,
    req: UpdateProfileRequest,
) -> Result<User, HbError> {
    let mut user = get_user(db, principal.user_id).await?;

    if let Some(name) = req.full_name {
        let name = name.trim();
        if name.is_empty() {
            return Err(HbError::BadRequest("full_name must not be empty".to_string()));
        }
        user.full_name = name.to_string();
        user.slug = user_slug(&user.full_name, user.id);
    }
    if let Some(avatar) = req.avatar_url {
        let avatar = avatar.trim();
        user.avatar_url = (!avatar.is_empty()).then(|| avatar.to_string());
    }
    user.updated_at = Utc::now();

    mapper::update(db, &user, Filter::by_id(user.id))
        .await
        .map_err(not_found)?;
    Ok(user)
}

/// Hard-delete an account.
///
/// Content the user created is removed with it by the schema's cascades.
#[instrument(skip_all)]
pub async fn delete_user(db: &dyn Querier, user_id: Uuid) -> Result<(), HbError> {
    mapper::delete::<User>(db, Filter::by_id(user_id))
        .await
        .map_err(not_found)?;

    tracing::info!(
        target: "hb.users",
        user = %hash_for_correlation(&user_id.to_string()),
        "User deleted"
    );
    Ok(())
}
