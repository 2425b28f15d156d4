use rusqlite::{Row, ToSql};
use std::collections::BTreeMap;

use super::database::Database;
use crate::error::AppError;
use crate::models::{DayRecommendations, DishWithStats};

pub const DAY_NAMES_EN: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];
pub const DAY_NAMES_ZH: [&str; 7] = ["周一", "周二", "周三", "周四", "周五", "周六", "周日"];

fn stats_from_row(row: &Row<'_>) -> rusqlite::Result<DishWithStats> {
    Ok(DishWithStats {
        id: row.get(0)?,
        canteen_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        price: row.get(4)?,
        ingredients: row.get(5)?,
        ingredients_zh: row.get(6)?,
        calories: row.get(7)?,
        canteen_name: None,
        avg_score: row.get(8)?,
        rating_count: row.get(9)?,
    })
}

fn stats_with_canteen_from_row(row: &Row<'_>) -> rusqlite::Result<DishWithStats> {
    Ok(DishWithStats {
        id: row.get(0)?,
        canteen_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        price: row.get(4)?,
        ingredients: row.get(5)?,
        ingredients_zh: row.get(6)?,
        calories: row.get(7)?,
        canteen_name: row.get(8)?,
        avg_score: row.get(9)?,
        rating_count: row.get(10)?,
    })
}

/// Deterministic weekday rotation over a ranked pool: start at
/// `(weekday * limit) mod N` and walk circularly, repeating entries when
/// `limit` exceeds the pool size. Not a quality-based selection.
fn rotate_pool(pool: &[DishWithStats], weekday: i64, limit: i64) -> Vec<DishWithStats> {
    let n = pool.len() as i64;
    if n == 0 || limit <= 0 {
        return Vec::new();
    }
    let start = (weekday * limit) % n;
    (0..limit)
        .map(|i| pool[((start + i) % n) as usize].clone())
        .collect()
}

impl Database {
    /// Dishes with at least one rating, ranked by average score then rating
    /// count.
    pub async fn top_dishes(&self, limit: i64) -> Result<Vec<DishWithStats>, AppError> {
        let dishes = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT d.id, d.canteen_id, d.name, d.category, d.price, d.ingredients,
                            d.ingredients_zh, d.calories,
                            AVG(r.score) AS avg_score, COUNT(r.id) AS rating_count
                     FROM dishes d
                     JOIN ratings r ON d.id = r.dish_id
                     GROUP BY d.id
                     HAVING rating_count > 0
                     ORDER BY avg_score DESC, rating_count DESC
                     LIMIT ?",
                )?;
                let rows = stmt.query_map([limit], stats_from_row)?;
                let mut dishes = Vec::new();
                for row in rows {
                    dishes.push(row?);
                }
                Ok(dishes)
            })
            .await?;
        Ok(dishes)
    }

    /// Category-preference recommendation: dishes in categories the user
    /// rated >= 4, excluding anything the user has already rated. Falls back
    /// to the global top list when the user has no high ratings.
    pub async fn recommend_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<DishWithStats>, AppError> {
        let categories: Vec<String> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT d.category
                     FROM ratings r
                     JOIN dishes d ON r.dish_id = d.id
                     WHERE r.user_id = ? AND r.score >= 4 AND d.category IS NOT NULL",
                )?;
                let rows = stmt.query_map([user_id], |row| row.get::<_, String>(0))?;
                let mut categories = Vec::new();
                for row in rows {
                    categories.push(row?);
                }
                Ok(categories)
            })
            .await?;

        if categories.is_empty() {
            return self.top_dishes(limit).await;
        }

        let dishes = self
            .conn
            .call(move |conn| {
                let placeholders = vec!["?"; categories.len()].join(",");
                let sql = format!(
                    "SELECT d.id, d.canteen_id, d.name, d.category, d.price, d.ingredients,
                            d.ingredients_zh, d.calories,
                            AVG(r.score) AS avg_score, COUNT(r.id) AS rating_count
                     FROM dishes d
                     LEFT JOIN ratings r ON d.id = r.dish_id
                     WHERE d.category IN ({placeholders})
                       AND d.id NOT IN (SELECT dish_id FROM ratings WHERE user_id = ?)
                     GROUP BY d.id
                     ORDER BY (avg_score IS NULL), avg_score DESC, rating_count DESC
                     LIMIT ?"
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut params: Vec<&dyn ToSql> =
                    categories.iter().map(|c| c as &dyn ToSql).collect();
                params.push(&user_id);
                params.push(&limit);
                let rows = stmt.query_map(&params[..], stats_from_row)?;
                let mut dishes = Vec::new();
                for row in rows {
                    dishes.push(row?);
                }
                Ok(dishes)
            })
            .await?;
        Ok(dishes)
    }

    /// The globally-ranked pool the weekday rotation draws from: available
    /// dishes with at least one rating, joined with their canteen name.
    async fn ranked_available_pool(&self) -> Result<Vec<DishWithStats>, AppError> {
        let pool = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT d.id, d.canteen_id, d.name, d.category, d.price, d.ingredients,
                            d.ingredients_zh, d.calories, c.name AS canteen_name,
                            AVG(r.score) AS avg_score, COUNT(r.id) AS rating_count
                     FROM dishes d
                     JOIN canteens c ON d.canteen_id = c.id
                     LEFT JOIN ratings r ON d.id = r.dish_id
                     WHERE d.is_available = 1
                     GROUP BY d.id
                     HAVING rating_count > 0
                     ORDER BY avg_score DESC, rating_count DESC",
                )?;
                let rows = stmt.query_map([], stats_with_canteen_from_row)?;
                let mut pool = Vec::new();
                for row in rows {
                    pool.push(row?);
                }
                Ok(pool)
            })
            .await?;
        Ok(pool)
    }

    /// Weekday rotation, Monday = 0. Pure in the weekday: the current-date
    /// default lives at the API boundary.
    pub async fn daily_recommendations(
        &self,
        weekday: u32,
        limit: i64,
    ) -> Result<Vec<DishWithStats>, AppError> {
        if weekday > 6 {
            return Err(AppError::Validation(format!(
                "weekday must be between 0 (Monday) and 6 (Sunday), got {weekday}"
            )));
        }
        let pool = self.ranked_available_pool().await?;
        Ok(rotate_pool(&pool, weekday as i64, limit))
    }

    pub async fn weekly_recommendations(
        &self,
        limit_per_day: i64,
    ) -> Result<BTreeMap<u32, DayRecommendations>, AppError> {
        let pool = self.ranked_available_pool().await?;
        let mut week = BTreeMap::new();
        for day in 0..7u32 {
            week.insert(
                day,
                DayRecommendations {
                    day_name_en: DAY_NAMES_EN[day as usize].to_string(),
                    day_name_zh: DAY_NAMES_ZH[day as usize].to_string(),
                    dishes: rotate_pool(&pool, day as i64, limit_per_day),
                },
            );
        }
        Ok(week)
    }

    /// Dishes this user personally rated, best first. Feeds the chat context.
    pub async fn user_top_dishes(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<DishWithStats>, AppError> {
        let dishes = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT d.id, d.canteen_id, d.name, d.category, d.price, d.ingredients,
                            d.ingredients_zh, d.calories, c.name AS canteen_name,
                            AVG(r.score) AS avg_score, COUNT(r.id) AS rating_count
                     FROM ratings r
                     JOIN dishes d ON r.dish_id = d.id
                     JOIN canteens c ON d.canteen_id = c.id
                     WHERE r.user_id = ?
                     GROUP BY d.id
                     ORDER BY avg_score DESC, rating_count DESC
                     LIMIT ?",
                )?;
                let rows = stmt.query_map([user_id, limit], stats_with_canteen_from_row)?;
                let mut dishes = Vec::new();
                for row in rows {
                    dishes.push(row?);
                }
                Ok(dishes)
            })
            .await?;
        Ok(dishes)
    }

    /// Global top dishes with canteen names, restricted to rated dishes.
    /// Feeds the chat context.
    pub async fn global_top_dishes(&self, limit: i64) -> Result<Vec<DishWithStats>, AppError> {
        let dishes = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT d.id, d.canteen_id, d.name, d.category, d.price, d.ingredients,
                            d.ingredients_zh, d.calories, c.name AS canteen_name,
                            AVG(r.score) AS avg_score, COUNT(r.id) AS rating_count
                     FROM ratings r
                     JOIN dishes d ON r.dish_id = d.id
                     JOIN canteens c ON d.canteen_id = c.id
                     GROUP BY d.id
                     HAVING rating_count > 0
                     ORDER BY avg_score DESC, rating_count DESC
                     LIMIT ?",
                )?;
                let rows = stmt.query_map([limit], stats_with_canteen_from_row)?;
                let mut dishes = Vec::new();
                for row in rows {
                    dishes.push(row?);
                }
                Ok(dishes)
            })
            .await?;
        Ok(dishes)
    }
}
