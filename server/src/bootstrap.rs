use agency_store::{Filter, SharedStore};

use crate::config::BootstrapAdmin;
use crate::error::ApiResult;
use crate::models::{Record, Role, User};
use crate::repository::Repository;

/// Creates a user through the regular validation path.
pub async fn create_user(
    store: &SharedStore,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> ApiResult<Record<User>> {
    let user = User {
        name: name.to_string(),
        email: email.to_string(),
        role,
        password: Some(password.to_string()),
        ..Default::default()
    };
    Repository::new(store.clone()).create(user).await
}

/// Creates the first administrator when no users exist yet. Returns whether
/// a user was created.
pub async fn ensure_admin(store: &SharedStore, admin: &BootstrapAdmin) -> ApiResult<bool> {
    let users = Repository::<User>::new(store.clone());
    if users.count(&Filter::all()).await? > 0 {
        return Ok(false);
    }

    let created = create_user(store, "Administrator", &admin.email, &admin.password, Role::Admin).await?;
    tracing::info!("✓ Bootstrap admin created: {}", created.body.email);
    Ok(true)
}
