use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;
use crate::{
    error::{AppError, Result},
    models::user::User,
};

/// A helper function to map a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User> {
    Ok(User {
        id: row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))?,
        id_number: row.try_get("id_number").map_err(|_| AppError::MissingData("id_number".to_string()))?,
        firstname: row.try_get("firstname").map_err(|_| AppError::MissingData("firstname".to_string()))?,
        lastname: row.try_get("lastname").map_err(|_| AppError::MissingData("lastname".to_string()))?,
        email: row.try_get("email").map_err(|_| AppError::MissingData("email".to_string()))?,
        program: row.try_get("program").map_err(|_| AppError::MissingData("program".to_string()))?,
        password: row.try_get("password").map_err(|_| AppError::MissingData("password".to_string()))?,
        role: row.try_get("role").map_err(|_| AppError::MissingData("role".to_string()))?,
        is_active: row.try_get("is_active").map_err(|_| AppError::MissingData("is_active".to_string()))?,
        created_at: row.try_get("created_at").map_err(|_| AppError::MissingData("created_at".to_string()))?,
        updated_at: row.try_get("updated_at").map_err(|_| AppError::MissingData("updated_at".to_string()))?,
    })
}

/// Creates a new user in the database.
pub async fn create_user(
    pool: &Pool,
    id: Uuid,
    id_number: String,
    firstname: String,
    lastname: String,
    email: Option<String>,
    program: String,
    password_hash: String,
) -> Result<User> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            INSERT INTO users (id, id_number, firstname, lastname, email, program, password)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
            &[&id, &id_number, &firstname, &lastname, &email, &program, &password_hash],
        )
        .await?;
    row_to_user(&row)
}

/// Finds an active user by their id_number.
pub async fn find_by_id_number(pool: &Pool, id_number: &str) -> Result<Option<User>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT *
            FROM users
            WHERE id_number = $1 AND is_active = true
            "#,
            &[&id_number],
        )
        .await?;
    row.map(|r| row_to_user(&r)).transpose()
}

/// Finds a user by their ID.
pub async fn find_by_id(pool: &Pool, user_id: &Uuid) -> Result<Option<User>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT *
            FROM users
            WHERE id = $1
            "#,
            &[user_id],
        )
        .await?;
    row.map(|r| row_to_user(&r)).transpose()
}

/// Updates a user's password hash.
pub async fn update_password(pool: &Pool, user_id: &Uuid, new_password: String) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            r#"
            UPDATE users
            SET password = $1, updated_at = NOW()
            WHERE id = $2
            "#,
            &[&new_password, user_id],
        )
        .await?;
    Ok(())
}

/// Display name and program for decorating participant lists.
/// Returns `None` for unknown or deactivated accounts.
pub async fn display_info(pool: &Pool, id_number: &str) -> Result<Option<(String, String)>> {
    let user = find_by_id_number(pool, id_number).await?;
    Ok(user.map(|u| (u.display_name(), u.program)))
}
