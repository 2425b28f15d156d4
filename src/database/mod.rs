pub mod catalog;
pub mod database;
pub mod orders;
pub mod ratings;
pub mod recommend;
pub mod seed;
pub mod users;

pub use database::Database;

#[cfg(test)]
pub(crate) mod test_util {
    use super::database::{now_utc, Database};

    pub async fn seed_user(db: &Database, username: &str) -> i64 {
        let username = username.to_string();
        db.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO users (username, password_hash, role, created_at)
                     VALUES (?, 'digest', 'student', ?)",
                    (&username, now_utc()),
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .unwrap()
    }

    pub async fn seed_canteen(db: &Database, name: &str) -> i64 {
        let name = name.to_string();
        db.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO canteens (name, location, description) VALUES (?, 'Building A', NULL)",
                    [&name],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .unwrap()
    }

    pub async fn seed_dish(
        db: &Database,
        canteen_id: i64,
        name: &str,
        category: Option<&str>,
        price: Option<f64>,
        available: bool,
    ) -> i64 {
        let name = name.to_string();
        let category = category.map(str::to_string);
        db.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO dishes (canteen_id, name, category, price, is_available, created_at)
                     VALUES (?, ?, ?, ?, ?, ?)",
                    (canteen_id, &name, &category, price, available, now_utc()),
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .unwrap()
    }

    pub async fn seed_option_config(db: &Database, dish_id: i64, option_type: &str, values: &str) {
        let option_type = option_type.to_string();
        let values = values.to_string();
        db.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO dish_option_configs
                     (dish_id, option_type, option_name_zh, option_name_en, option_values, is_required)
                     VALUES (?, ?, ?, ?, ?, 0)",
                    (dish_id, &option_type, &option_type, &option_type, &values),
                )?;
                Ok(())
            })
            .await
            .unwrap()
    }

    pub async fn seed_rating(db: &Database, user_id: i64, dish_id: i64, score: i64) {
        db.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO ratings (user_id, dish_id, score, created_at) VALUES (?, ?, ?, ?)",
                    (user_id, dish_id, score, now_utc()),
                )?;
                Ok(())
            })
            .await
            .unwrap()
    }

    pub async fn count_rows(db: &Database, table: &str) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        db.conn
            .call(move |conn| Ok(conn.query_row(&sql, [], |row| row.get(0))?))
            .await
            .unwrap()
    }
}
