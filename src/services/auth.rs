use crate::error::{AppError, Result};
use crate::models::user::User;
use crate::repositories::user as user_repo;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder,
};
use deadpool_postgres::Pool;
use rand::{rngs::OsRng, RngCore};
use uuid::Uuid;
use zeroize::Zeroize;

/// The memory cost for Argon2 in MB.
const ARGON2_MEMORY_MB: u32 = 19;
/// The number of iterations for Argon2.
const ARGON2_ITERATIONS: u32 = 3;
/// The parallelism factor for Argon2.
const ARGON2_PARALLELISM: u32 = 6;

/// Hashes a password using Argon2id.
///
/// # Arguments
///
/// * `password` - The password to hash.
///
/// # Returns
///
/// A `Result` containing the hashed password.
fn hash_password(password: &str) -> Result<String> {
    let mut password_bytes = password.as_bytes().to_vec();

    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("Salt encoding error: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        ParamsBuilder::new()
            .m_cost(ARGON2_MEMORY_MB * 1024)
            .t_cost(ARGON2_ITERATIONS)
            .p_cost(ARGON2_PARALLELISM)
            .build()
            .map_err(|e| AppError::Internal(format!("Argon2 params: {}", e)))?,
    );

    let password_hash = argon2
        .hash_password(&password_bytes, &salt)
        .map_err(|e| AppError::Internal(format!("Argon2 hash error: {}", e)))?
        .to_string();

    password_bytes.zeroize();
    tracing::debug!("Password hashed successfully with Argon2");
    Ok(password_hash)
}

/// Verifies a password against a hash.
///
/// # Arguments
///
/// * `password` - The password to verify.
/// * `hash` - The hash to verify against.
///
/// # Returns
///
/// A `Result` containing `true` if the password is valid, `false` otherwise.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let mut password_bytes = password.as_bytes().to_vec();
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Hash parse error: {}", e)))?;
    let argon2 = Argon2::default();
    let result = argon2
        .verify_password(&password_bytes, &parsed_hash)
        .is_ok();

    password_bytes.zeroize();
    tracing::debug!("Password verification completed");
    Ok(result)
}

/// Registers a new account.
///
/// # Arguments
///
/// * `db` - The database connection pool.
/// * `id_number` - The human-facing student/instructor number.
/// * `firstname` - The user's first name.
/// * `lastname` - The user's last name.
/// * `email` - The user's email address, if any.
/// * `program` - The review program the user enrolls in.
/// * `password` - The user's password.
///
/// # Returns
///
/// A `Result` containing the created `User`.
pub async fn create_user(
    db: &Pool,
    id_number: String,
    firstname: String,
    lastname: String,
    email: Option<String>,
    program: String,
    password: String,
) -> Result<User> {
    tracing::debug!("🔐 Creating user: {}", id_number);

    if user_repo::find_by_id_number(db, &id_number).await?.is_some() {
        return Err(AppError::Validation(
            "This ID number is already registered".to_string(),
        ));
    }

    let hashed_password = hash_password(&password)?;

    let user = user_repo::create_user(
        db,
        Uuid::new_v4(),
        id_number,
        firstname,
        lastname,
        email,
        program,
        hashed_password,
    )
    .await?;

    tracing::info!("✅ User created with ID: {}", user.id);
    Ok(user)
}

/// Authenticates a user by id_number and password.
///
/// # Arguments
///
/// * `db` - The database connection pool.
/// * `id_number` - The user's id_number.
/// * `password` - The user's password.
///
/// # Returns
///
/// A `Result` containing the authenticated `User`.
pub async fn authenticate_user(db: &Pool, id_number: String, password: String) -> Result<User> {
    tracing::debug!("🔐 Authenticating user: {}", id_number);

    let user = user_repo::find_by_id_number(db, &id_number)
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid ID number or password".to_string()))?;

    if !verify_password(&password, &user.password)? {
        return Err(AppError::Authentication(
            "Invalid ID number or password".to_string(),
        ));
    }

    tracing::info!("✅ User authenticated: {}", user.id);

    Ok(user)
}

/// Changes a user's password.
///
/// # Arguments
///
/// * `db` - The database connection pool.
/// * `user_id` - The ID of the user.
/// * `old_password` - The user's old password.
/// * `new_password` - The user's new password.
///
/// # Returns
///
/// A `Result<()>`.
pub async fn change_password(
    db: &Pool,
    user_id: Uuid,
    old_password: String,
    new_password: String,
) -> Result<()> {
    tracing::info!("🔑 Changing password for user: {}", user_id);

    let user = user_repo::find_by_id(db, &user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    if !verify_password(&old_password, &user.password)? {
        return Err(AppError::Authentication(
            "Invalid current password".to_string(),
        ));
    }

    let new_hashed_password = hash_password(&new_password)?;
    user_repo::update_password(db, &user_id, new_hashed_password).await?;

    tracing::info!("✅ Password changed for user: {}", user_id);

    Ok(())
}
