use rusqlite::{OptionalExtension, Row};

use super::database::Database;
use crate::error::AppError;
use crate::models::{Canteen, Dish, DishOptionConfig, OptionValue};

pub(crate) fn dish_from_row(row: &Row<'_>) -> rusqlite::Result<Dish> {
    Ok(Dish {
        id: row.get(0)?,
        canteen_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        price: row.get(4)?,
        ingredients: row.get(5)?,
        ingredients_zh: row.get(6)?,
        calories: row.get(7)?,
        is_available: row.get(8)?,
        created_at: row.get(9)?,
    })
}

const DISH_COLUMNS: &str =
    "id, canteen_id, name, category, price, ingredients, ingredients_zh, calories, \
     is_available, created_at";

impl Database {
    pub async fn list_canteens(&self) -> Result<Vec<Canteen>, AppError> {
        let canteens = self
            .conn
            .call(|conn| {
                let mut stmt = conn
                    .prepare("SELECT id, name, location, description FROM canteens ORDER BY id")?;
                let rows = stmt.query_map([], |row| {
                    Ok(Canteen {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        location: row.get(2)?,
                        description: row.get(3)?,
                    })
                })?;
                let mut canteens = Vec::new();
                for row in rows {
                    canteens.push(row?);
                }
                Ok(canteens)
            })
            .await?;
        Ok(canteens)
    }

    pub async fn list_dishes_for_canteen(&self, canteen_id: i64) -> Result<Vec<Dish>, AppError> {
        let dishes = self
            .conn
            .call(move |conn| {
                let exists: Option<i64> = conn
                    .query_row("SELECT id FROM canteens WHERE id = ?", [canteen_id], |row| {
                        row.get(0)
                    })
                    .optional()?;
                if exists.is_none() {
                    return Ok(None);
                }

                let mut stmt = conn.prepare(&format!(
                    "SELECT {DISH_COLUMNS} FROM dishes WHERE canteen_id = ? ORDER BY id"
                ))?;
                let rows = stmt.query_map([canteen_id], dish_from_row)?;
                let mut dishes = Vec::new();
                for row in rows {
                    dishes.push(row?);
                }
                Ok(Some(dishes))
            })
            .await?;

        dishes.ok_or_else(|| AppError::NotFound("canteen not found".to_string()))
    }

    pub async fn list_dishes(&self) -> Result<Vec<Dish>, AppError> {
        let dishes = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {DISH_COLUMNS} FROM dishes ORDER BY id"))?;
                let rows = stmt.query_map([], dish_from_row)?;
                let mut dishes = Vec::new();
                for row in rows {
                    dishes.push(row?);
                }
                Ok(dishes)
            })
            .await?;
        Ok(dishes)
    }

    pub async fn get_dish(&self, dish_id: i64) -> Result<Dish, AppError> {
        let dish = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {DISH_COLUMNS} FROM dishes WHERE id = ?"),
                        [dish_id],
                        dish_from_row,
                    )
                    .optional()?)
            })
            .await?;

        dish.ok_or_else(|| AppError::NotFound("dish not found".to_string()))
    }

    /// Option configs for a dish, empty when the dish has none. A blob that
    /// fails to decode degrades to an empty value list rather than an error.
    pub async fn list_dish_options(
        &self,
        dish_id: i64,
    ) -> Result<Vec<DishOptionConfig>, AppError> {
        let configs = self
            .conn
            .call(move |conn| {
                let exists: Option<i64> = conn
                    .query_row("SELECT id FROM dishes WHERE id = ?", [dish_id], |row| {
                        row.get(0)
                    })
                    .optional()?;
                if exists.is_none() {
                    return Ok(None);
                }

                let mut stmt = conn.prepare(
                    "SELECT id, dish_id, option_type, option_name_zh, option_name_en,
                            option_values, is_required
                     FROM dish_option_configs
                     WHERE dish_id = ?
                     ORDER BY id",
                )?;
                let rows = stmt.query_map([dish_id], |row| {
                    let raw: String = row.get(5)?;
                    let option_values: Vec<OptionValue> =
                        serde_json::from_str(&raw).unwrap_or_default();
                    Ok(DishOptionConfig {
                        id: row.get(0)?,
                        dish_id: row.get(1)?,
                        option_type: row.get(2)?,
                        option_name_zh: row.get(3)?,
                        option_name_en: row.get(4)?,
                        option_values,
                        is_required: row.get(6)?,
                    })
                })?;
                let mut configs = Vec::new();
                for row in rows {
                    configs.push(row?);
                }
                Ok(Some(configs))
            })
            .await?;

        configs.ok_or_else(|| AppError::NotFound("dish not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_util;

    #[tokio::test]
    async fn unknown_canteen_is_not_found() {
        let db = Database::open_in_memory().await.unwrap();
        let err = db.list_dishes_for_canteen(99).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn dishes_are_scoped_to_their_canteen() {
        let db = Database::open_in_memory().await.unwrap();
        let c1 = test_util::seed_canteen(&db, "Main Canteen").await;
        let c2 = test_util::seed_canteen(&db, "North Canteen").await;
        test_util::seed_dish(&db, c1, "Fried Noodles", Some("Noodles"), Some(12.0), true).await;
        test_util::seed_dish(&db, c2, "Dumplings", Some("Dumplings"), Some(10.0), true).await;

        let dishes = db.list_dishes_for_canteen(c1).await.unwrap();
        assert_eq!(dishes.len(), 1);
        assert_eq!(dishes[0].name, "Fried Noodles");

        assert_eq!(db.list_dishes().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_dish_is_not_found() {
        let db = Database::open_in_memory().await.unwrap();
        let err = db.get_dish(7).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = db.list_dish_options(7).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn option_values_decode_and_degrade() {
        let db = Database::open_in_memory().await.unwrap();
        let canteen = test_util::seed_canteen(&db, "Main Canteen").await;
        let dish = test_util::seed_dish(&db, canteen, "Fried Noodles", Some("Noodles"), Some(12.0), true).await;

        let good = serde_json::json!([
            {"value": "no", "label_zh": "不加", "label_en": "No"},
            {"value": "yes", "label_zh": "加蛋 (+2元)", "label_en": "Add Egg (+¥2)"}
        ])
        .to_string();
        test_util::seed_option_config(&db, dish, "add_egg", &good).await;
        test_util::seed_option_config(&db, dish, "spicy_level", "not json at all").await;

        let configs = db.list_dish_options(dish).await.unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].option_values.len(), 2);
        assert_eq!(configs[0].option_values[1].value, "yes");
        // Lossy-tolerant read: undecodable blob becomes an empty list.
        assert!(configs[1].option_values.is_empty());
    }

    #[tokio::test]
    async fn dish_with_no_configs_yields_empty_list() {
        let db = Database::open_in_memory().await.unwrap();
        let canteen = test_util::seed_canteen(&db, "Main Canteen").await;
        let dish = test_util::seed_dish(&db, canteen, "Rice", Some("Staple"), Some(2.0), true).await;
        assert!(db.list_dish_options(dish).await.unwrap().is_empty());
    }
}
