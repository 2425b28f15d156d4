use rusqlite::{OptionalExtension, Row};

use super::database::{now_utc, Database};
use crate::error::AppError;
use crate::models::{Rating, RatingWithUser};

fn rating_from_row(row: &Row<'_>) -> rusqlite::Result<Rating> {
    Ok(Rating {
        id: row.get(0)?,
        user_id: row.get(1)?,
        dish_id: row.get(2)?,
        score: row.get(3)?,
        comment: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn rating_with_user_from_row(row: &Row<'_>) -> rusqlite::Result<RatingWithUser> {
    Ok(RatingWithUser {
        id: row.get(0)?,
        user_id: row.get(1)?,
        dish_id: row.get(2)?,
        score: row.get(3)?,
        comment: row.get(4)?,
        created_at: row.get(5)?,
        username: row.get(6)?,
    })
}

enum UpsertOutcome {
    Done(RatingWithUser),
    NoUser,
    NoDish,
}

impl Database {
    pub async fn list_ratings(&self) -> Result<Vec<Rating>, AppError> {
        let ratings = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, dish_id, score, comment, created_at
                     FROM ratings ORDER BY created_at DESC",
                )?;
                let rows = stmt.query_map([], rating_from_row)?;
                let mut ratings = Vec::new();
                for row in rows {
                    ratings.push(row?);
                }
                Ok(ratings)
            })
            .await?;
        Ok(ratings)
    }

    /// Ratings for one dish without the join, as served under
    /// `/dishes/:id/ratings`.
    pub async fn list_dish_ratings(&self, dish_id: i64) -> Result<Vec<Rating>, AppError> {
        let ratings = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, dish_id, score, comment, created_at
                     FROM ratings WHERE dish_id = ? ORDER BY created_at DESC",
                )?;
                let rows = stmt.query_map([dish_id], rating_from_row)?;
                let mut ratings = Vec::new();
                for row in rows {
                    ratings.push(row?);
                }
                Ok(ratings)
            })
            .await?;
        Ok(ratings)
    }

    pub async fn list_ratings_for_dish(
        &self,
        dish_id: i64,
    ) -> Result<Vec<RatingWithUser>, AppError> {
        let ratings = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT r.id, r.user_id, r.dish_id, r.score, r.comment, r.created_at, u.username
                     FROM ratings r
                     JOIN users u ON r.user_id = u.id
                     WHERE r.dish_id = ?
                     ORDER BY r.created_at DESC",
                )?;
                let rows = stmt.query_map([dish_id], rating_with_user_from_row)?;
                let mut ratings = Vec::new();
                for row in rows {
                    ratings.push(row?);
                }
                Ok(ratings)
            })
            .await?;
        Ok(ratings)
    }

    /// Insert-or-update keyed by (user, dish). A repeat submission overwrites
    /// score, comment and created_at of the existing row, keeping its id.
    /// The whole sequence runs in one transaction.
    pub async fn upsert_rating(
        &self,
        user_id: i64,
        dish_id: i64,
        score: i64,
        comment: Option<String>,
    ) -> Result<RatingWithUser, AppError> {
        if !(1..=5).contains(&score) {
            return Err(AppError::Validation(format!(
                "score must be between 1 and 5, got {score}"
            )));
        }

        let outcome = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let user: Option<i64> = tx
                    .query_row("SELECT id FROM users WHERE id = ?", [user_id], |row| {
                        row.get(0)
                    })
                    .optional()?;
                if user.is_none() {
                    return Ok(UpsertOutcome::NoUser);
                }
                let dish: Option<i64> = tx
                    .query_row("SELECT id FROM dishes WHERE id = ?", [dish_id], |row| {
                        row.get(0)
                    })
                    .optional()?;
                if dish.is_none() {
                    return Ok(UpsertOutcome::NoDish);
                }

                let existing: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM ratings WHERE user_id = ? AND dish_id = ?",
                        [user_id, dish_id],
                        |row| row.get(0),
                    )
                    .optional()?;

                let now = now_utc();
                let rating_id = match existing {
                    Some(id) => {
                        tx.execute(
                            "UPDATE ratings SET score = ?, comment = ?, created_at = ? WHERE id = ?",
                            (score, &comment, &now, id),
                        )?;
                        id
                    }
                    None => {
                        tx.execute(
                            "INSERT INTO ratings (user_id, dish_id, score, comment, created_at)
                             VALUES (?, ?, ?, ?, ?)",
                            (user_id, dish_id, score, &comment, &now),
                        )?;
                        tx.last_insert_rowid()
                    }
                };

                let rating = tx.query_row(
                    "SELECT r.id, r.user_id, r.dish_id, r.score, r.comment, r.created_at, u.username
                     FROM ratings r
                     JOIN users u ON r.user_id = u.id
                     WHERE r.id = ?",
                    [rating_id],
                    rating_with_user_from_row,
                )?;
                tx.commit()?;
                Ok(UpsertOutcome::Done(rating))
            })
            .await?;

        match outcome {
            UpsertOutcome::Done(rating) => Ok(rating),
            UpsertOutcome::NoUser => Err(AppError::NotFound("user not found".to_string())),
            UpsertOutcome::NoDish => Err(AppError::NotFound("dish not found".to_string())),
        }
    }
}
