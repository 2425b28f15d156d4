use rusqlite::{OptionalExtension, Row};
use sha2::{Digest, Sha256};

use super::database::{now_utc, Database};
use crate::error::AppError;
use crate::models::{Role, User};

/// SHA-256 hex digest. The stored credential is compared digest-to-digest;
/// salting mechanics are outside the contract.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        role: Role::from_db(&row.get::<_, String>(3)?),
        created_at: row.get(4)?,
    })
}

enum RegisterOutcome {
    Created(User),
    DuplicateUsername,
    DuplicateEmail,
}

enum LoginOutcome {
    LoggedIn(User),
    BadCredentials,
}

impl Database {
    pub async fn register_user(
        &self,
        username: String,
        email: Option<String>,
        password: String,
        role: Role,
    ) -> Result<User, AppError> {
        if password.len() < 6 {
            return Err(AppError::Validation(
                "password must be at least 6 characters".to_string(),
            ));
        }

        let password_hash = hash_password(&password);
        let outcome = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let taken: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM users WHERE username = ?",
                        [&username],
                        |row| row.get(0),
                    )
                    .optional()?;
                if taken.is_some() {
                    return Ok(RegisterOutcome::DuplicateUsername);
                }

                if let Some(ref email) = email {
                    let taken: Option<i64> = tx
                        .query_row("SELECT id FROM users WHERE email = ?", [email], |row| {
                            row.get(0)
                        })
                        .optional()?;
                    if taken.is_some() {
                        return Ok(RegisterOutcome::DuplicateEmail);
                    }
                }

                let now = now_utc();
                tx.execute(
                    "INSERT INTO users (username, email, password_hash, role, created_at)
                     VALUES (?, ?, ?, ?, ?)",
                    (&username, &email, &password_hash, role.as_str(), &now),
                )?;
                let user_id = tx.last_insert_rowid();

                let user = tx.query_row(
                    "SELECT id, username, email, role, created_at FROM users WHERE id = ?",
                    [user_id],
                    user_from_row,
                )?;
                tx.commit()?;
                Ok(RegisterOutcome::Created(user))
            })
            .await?;

        match outcome {
            RegisterOutcome::Created(user) => Ok(user),
            RegisterOutcome::DuplicateUsername => {
                Err(AppError::Conflict("username already exists".to_string()))
            }
            RegisterOutcome::DuplicateEmail => {
                Err(AppError::Conflict("email already registered".to_string()))
            }
        }
    }

    /// Verifies the credential and stamps `last_login`. The error message is
    /// identical for an unknown user and a wrong password.
    pub async fn login_user(&self, username: String, password: String) -> Result<User, AppError> {
        let password_hash = hash_password(&password);
        let outcome = self
            .conn
            .call(move |conn| {
                let stored: Option<(User, String)> = conn
                    .query_row(
                        "SELECT id, username, email, role, created_at, password_hash
                         FROM users WHERE username = ?",
                        [&username],
                        |row| Ok((user_from_row(row)?, row.get::<_, String>(5)?)),
                    )
                    .optional()?;

                let (user, stored_hash) = match stored {
                    Some(found) => found,
                    None => return Ok(LoginOutcome::BadCredentials),
                };
                if stored_hash != password_hash {
                    return Ok(LoginOutcome::BadCredentials);
                }

                conn.execute(
                    "UPDATE users SET last_login = ? WHERE id = ?",
                    (now_utc(), user.id),
                )?;
                Ok(LoginOutcome::LoggedIn(user))
            })
            .await?;

        match outcome {
            LoginOutcome::LoggedIn(user) => Ok(user),
            LoginOutcome::BadCredentials => Err(AppError::Unauthorized(
                "invalid username or password".to_string(),
            )),
        }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User, AppError> {
        let user = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT id, username, email, role, created_at FROM users WHERE id = ?",
                        [user_id],
                        user_from_row,
                    )
                    .optional()?)
            })
            .await?;

        user.ok_or_else(|| AppError::NotFound("user not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[tokio::test]
    async fn register_then_login() {
        let db = Database::open_in_memory().await.unwrap();
        let user = db
            .register_user(
                "alice".to_string(),
                Some("alice@example.com".to_string()),
                "secret123".to_string(),
                Role::Student,
            )
            .await
            .unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, Role::Student);

        let logged_in = db
            .login_user("alice".to_string(), "secret123".to_string())
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let db = Database::open_in_memory().await.unwrap();
        db.register_user("bob".to_string(), None, "secret123".to_string(), Role::Student)
            .await
            .unwrap();
        let err = db
            .register_user("bob".to_string(), None, "secret456".to_string(), Role::Student)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let db = Database::open_in_memory().await.unwrap();
        db.register_user(
            "carol".to_string(),
            Some("c@example.com".to_string()),
            "secret123".to_string(),
            Role::Student,
        )
        .await
        .unwrap();
        let err = db
            .register_user(
                "carol2".to_string(),
                Some("c@example.com".to_string()),
                "secret123".to_string(),
                Role::Student,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let err = db
            .register_user("dave".to_string(), None, "short".to_string(), Role::Student)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let db = Database::open_in_memory().await.unwrap();
        db.register_user("erin".to_string(), None, "secret123".to_string(), Role::Student)
            .await
            .unwrap();
        let err = db
            .login_user("erin".to_string(), "wrong-password".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = db
            .login_user("nobody".to_string(), "secret123".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let db = Database::open_in_memory().await.unwrap();
        let err = db.get_user(42).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
