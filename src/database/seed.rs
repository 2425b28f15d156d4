use log::info;
use serde_json::json;

use super::database::{now_utc, Database};
use super::users::hash_password;
use crate::error::AppError;

/// Demo dataset: canteens, stalls worth of dishes, a few accounts and
/// ratings, plus option configs for the customizable dishes. Rows carry
/// fixed ids and are inserted with `INSERT OR IGNORE`, so re-seeding is a
/// no-op.
impl Database {
    pub async fn seed_demo_data(&self) -> Result<(), AppError> {
        self.conn
            .call(|conn| {
                let tx = conn.transaction()?;
                let now = now_utc();

                let users: &[(i64, &str, &str, &str)] = &[
                    (1, "student1", "student123", "student"),
                    (2, "student2", "student123", "student"),
                    (3, "student3", "student123", "student"),
                    (4, "admin", "admin123", "admin"),
                ];
                for (id, username, password, role) in users {
                    tx.execute(
                        "INSERT OR IGNORE INTO users (id, username, password_hash, role, created_at)
                         VALUES (?, ?, ?, ?, ?)",
                        (id, username, hash_password(password), role, &now),
                    )?;
                }

                let canteens: &[(i64, &str, &str, &str)] = &[
                    (1, "Main Canteen", "Building A", "Main campus canteen with multiple stalls"),
                    (2, "North Canteen", "North Gate", "Canteen near the north gate"),
                    (3, "South Canteen", "South Dorms", "Canteen near the south dormitory area"),
                ];
                for (id, name, location, description) in canteens {
                    tx.execute(
                        "INSERT OR IGNORE INTO canteens (id, name, location, description)
                         VALUES (?, ?, ?, ?)",
                        (id, name, location, description),
                    )?;
                }

                // (id, canteen, name, category/stall, price, calories)
                let dishes: &[(i64, i64, &str, &str, f64, i64)] = &[
                    (1, 1, "Braised Pork Rice", "Rice", 15.0, 650),
                    (2, 1, "Mapo Tofu Rice", "Rice", 12.0, 520),
                    (3, 1, "Beef Noodles", "Noodles", 16.0, 580),
                    (4, 1, "Fried Noodles", "Noodles", 12.0, 600),
                    (5, 1, "Hot and Sour Soup", "Soup", 6.0, 150),
                    (6, 2, "Lanzhou Ramen", "Noodles", 14.0, 550),
                    (7, 2, "Dumplings (Pork)", "Dumplings", 10.0, 480),
                    (8, 2, "Steamed Buns", "Staple", 4.0, 320),
                    (9, 2, "Milk Tea", "Drinks", 8.0, 280),
                    (10, 3, "Spicy Hot Pot", "Hot Pot", 20.0, 750),
                    (11, 3, "Egg Fried Rice", "Rice", 10.0, 560),
                    (12, 3, "Lemon Tea", "Drinks", 6.0, 120),
                ];
                for (id, canteen_id, name, category, price, calories) in dishes {
                    tx.execute(
                        "INSERT OR IGNORE INTO dishes
                         (id, canteen_id, name, category, price, calories, is_available, created_at)
                         VALUES (?, ?, ?, ?, ?, ?, 1, ?)",
                        (id, canteen_id, name, category, price, calories, &now),
                    )?;
                }

                let yes_no = |label_zh: &str, label_en: &str| {
                    json!([
                        {"value": "no", "label_zh": "不加", "label_en": "No"},
                        {"value": "yes", "label_zh": label_zh, "label_en": label_en}
                    ])
                    .to_string()
                };
                let spicy_levels = json!([
                    {"value": "no", "label_zh": "不辣", "label_en": "No Spicy"},
                    {"value": "mild", "label_zh": "微辣", "label_en": "Mild"},
                    {"value": "medium", "label_zh": "中辣", "label_en": "Medium"},
                    {"value": "hot", "label_zh": "重辣", "label_en": "Hot"}
                ])
                .to_string();
                let sugar_levels = json!([
                    {"value": "full", "label_zh": "全糖", "label_en": "Full Sugar"},
                    {"value": "half", "label_zh": "半糖", "label_en": "Half Sugar"},
                    {"value": "none", "label_zh": "无糖", "label_en": "No Sugar"}
                ])
                .to_string();

                // (dish, option_type, name_zh, name_en, values, required)
                let option_configs: &[(i64, &str, &str, &str, String, i64)] = &[
                    (4, "add_egg", "加蛋", "Add Egg", yes_no("加蛋 (+2元)", "Add Egg (+¥2)"), 0),
                    (4, "spicy_level", "辣度", "Spicy Level", spicy_levels.clone(), 0),
                    (10, "spicy_level", "辣度", "Spicy Level", spicy_levels, 1),
                    (9, "sugar_level", "糖度", "Sugar Level", sugar_levels.clone(), 0),
                    (12, "sugar_level", "糖度", "Sugar Level", sugar_levels, 0),
                ];
                for (dish_id, option_type, name_zh, name_en, values, required) in option_configs {
                    let exists: i64 = tx.query_row(
                        "SELECT COUNT(*) FROM dish_option_configs
                         WHERE dish_id = ? AND option_type = ?",
                        (dish_id, option_type),
                        |row| row.get(0),
                    )?;
                    if exists == 0 {
                        tx.execute(
                            "INSERT INTO dish_option_configs
                             (dish_id, option_type, option_name_zh, option_name_en, option_values, is_required)
                             VALUES (?, ?, ?, ?, ?, ?)",
                            (dish_id, option_type, name_zh, name_en, values, required),
                        )?;
                    }
                }

                let ratings: &[(i64, i64, i64, i64, &str)] = &[
                    (1, 1, 1, 5, "Rich flavor, generous portion"),
                    (2, 2, 1, 4, "Good but a bit fatty"),
                    (3, 1, 3, 5, "Best noodles on campus"),
                    (4, 3, 3, 4, "Solid choice"),
                    (5, 2, 6, 5, "Fresh and springy"),
                    (6, 3, 7, 3, "Average filling"),
                    (7, 1, 9, 4, "Sweet but good"),
                    (8, 2, 10, 5, "Great for dinner with friends"),
                ];
                for (id, user_id, dish_id, score, comment) in ratings {
                    tx.execute(
                        "INSERT OR IGNORE INTO ratings (id, user_id, dish_id, score, comment, created_at)
                         VALUES (?, ?, ?, ?, ?, ?)",
                        (id, user_id, dish_id, score, comment, &now),
                    )?;
                }

                tx.commit()?;
                Ok(())
            })
            .await?;

        info!("demo data seeded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_util;

    #[tokio::test]
    async fn seeding_twice_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        db.seed_demo_data().await.unwrap();
        let dishes = test_util::count_rows(&db, "dishes").await;
        let ratings = test_util::count_rows(&db, "ratings").await;
        let configs = test_util::count_rows(&db, "dish_option_configs").await;
        assert!(dishes > 0 && ratings > 0 && configs > 0);

        db.seed_demo_data().await.unwrap();
        assert_eq!(test_util::count_rows(&db, "dishes").await, dishes);
        assert_eq!(test_util::count_rows(&db, "ratings").await, ratings);
        assert_eq!(test_util::count_rows(&db, "dish_option_configs").await, configs);
    }

    #[tokio::test]
    async fn seeded_accounts_can_log_in() {
        let db = Database::open_in_memory().await.unwrap();
        db.seed_demo_data().await.unwrap();
        let user = db
            .login_user("student1".to_string(), "student123".to_string())
            .await
            .unwrap();
        assert_eq!(user.id, 1);
    }
}
