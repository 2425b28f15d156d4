use std::collections::HashMap;

use rusqlite::{OptionalExtension, Row};
use serde_json::Value;

use super::database::{now_utc, Database};
use crate::error::AppError;
use crate::models::{NewOrderItem, Order, OrderDetail, OrderItem, OrderStatus};

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        user_id: row.get(1)?,
        total_price: row.get(2)?,
        status: OrderStatus::from_db(&row.get::<_, String>(3)?),
        created_at: row.get(4)?,
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<OrderItem> {
    let raw: Option<String> = row.get(5)?;
    let options: HashMap<String, Value> = raw
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();
    Ok(OrderItem {
        id: row.get(0)?,
        dish_id: row.get(1)?,
        dish_name: row.get(2)?,
        quantity: row.get(3)?,
        price: row.get(4)?,
        options,
    })
}

fn items_for_order(conn: &rusqlite::Connection, order_id: i64) -> rusqlite::Result<Vec<OrderItem>> {
    let mut stmt = conn.prepare(
        "SELECT oi.id, oi.dish_id, d.name AS dish_name, oi.quantity, oi.price, oi.options
         FROM order_items oi
         JOIN dishes d ON oi.dish_id = d.id
         WHERE oi.order_id = ?
         ORDER BY oi.id",
    )?;
    let rows = stmt.query_map([order_id], item_from_row)?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

/// Item with its charged unit price and pre-serialized options, resolved
/// before the write phase.
struct PricedItem {
    dish_id: i64,
    quantity: i64,
    price: f64,
    options_json: Option<String>,
}

enum CreateOutcome {
    Created(Order),
    MissingDish(i64),
}

enum PayOutcome {
    Paid,
    Missing,
    NotPending,
}

impl Database {
    /// Creates an order plus its items in one transaction. Unit price is the
    /// client-supplied per-item price when present (option surcharges are the
    /// client's computation), otherwise the catalog price. An explicit total
    /// from the caller overrides the computed sum.
    pub async fn create_order(
        &self,
        user_id: i64,
        items: Vec<NewOrderItem>,
        explicit_total: Option<f64>,
    ) -> Result<Order, AppError> {
        if items.is_empty() {
            return Err(AppError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }
        if let Some(bad) = items.iter().find(|i| i.quantity < 1) {
            return Err(AppError::Validation(format!(
                "quantity must be at least 1 for dish {}",
                bad.dish_id
            )));
        }

        // Serialize option maps up front so the closure only deals with
        // database errors.
        let mut prepared = Vec::with_capacity(items.len());
        for item in items {
            let options_json = match &item.options {
                Some(options) => Some(serde_json::to_string(options).map_err(|e| {
                    AppError::Validation(format!("invalid options for dish {}: {e}", item.dish_id))
                })?),
                None => None,
            };
            prepared.push((item, options_json));
        }

        let outcome = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                let mut total_price = 0.0;
                let mut priced = Vec::with_capacity(prepared.len());
                for (item, options_json) in &prepared {
                    let catalog_price: Option<Option<f64>> = tx
                        .query_row(
                            "SELECT price FROM dishes WHERE id = ? AND is_available = 1",
                            [item.dish_id],
                            |row| row.get(0),
                        )
                        .optional()?;
                    let catalog_price = match catalog_price {
                        Some(price) => price,
                        None => return Ok(CreateOutcome::MissingDish(item.dish_id)),
                    };

                    let price = item.price.unwrap_or_else(|| catalog_price.unwrap_or(0.0));
                    total_price += price * item.quantity as f64;
                    priced.push(PricedItem {
                        dish_id: item.dish_id,
                        quantity: item.quantity,
                        price,
                        options_json: options_json.clone(),
                    });
                }

                if let Some(total) = explicit_total {
                    total_price = total;
                }

                let now = now_utc();
                tx.execute(
                    "INSERT INTO orders (user_id, total_price, status, created_at)
                     VALUES (?, ?, ?, ?)",
                    (user_id, total_price, OrderStatus::Pending.as_str(), &now),
                )?;
                let order_id = tx.last_insert_rowid();

                for item in &priced {
                    tx.execute(
                        "INSERT INTO order_items (order_id, dish_id, quantity, price, options)
                         VALUES (?, ?, ?, ?, ?)",
                        (
                            order_id,
                            item.dish_id,
                            item.quantity,
                            item.price,
                            &item.options_json,
                        ),
                    )?;
                }

                tx.commit()?;
                Ok(CreateOutcome::Created(Order {
                    id: order_id,
                    user_id,
                    total_price,
                    status: OrderStatus::Pending,
                    created_at: now,
                }))
            })
            .await?;

        match outcome {
            CreateOutcome::Created(order) => Ok(order),
            CreateOutcome::MissingDish(dish_id) => Err(AppError::NotFound(format!(
                "dish {dish_id} not found or not available"
            ))),
        }
    }

    pub async fn list_orders_for_user(&self, user_id: i64) -> Result<Vec<OrderDetail>, AppError> {
        let orders = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, total_price, status, created_at
                     FROM orders
                     WHERE user_id = ?
                     ORDER BY created_at DESC",
                )?;
                let rows = stmt.query_map([user_id], order_from_row)?;
                let mut orders = Vec::new();
                for row in rows {
                    orders.push(row?);
                }

                let mut details = Vec::with_capacity(orders.len());
                for order in orders {
                    let items = items_for_order(conn, order.id)?;
                    details.push(OrderDetail {
                        id: order.id,
                        user_id: order.user_id,
                        total_price: order.total_price,
                        status: order.status,
                        created_at: order.created_at,
                        items,
                    });
                }
                Ok(details)
            })
            .await?;
        Ok(orders)
    }

    pub async fn get_order_detail(&self, order_id: i64) -> Result<OrderDetail, AppError> {
        let detail = self
            .conn
            .call(move |conn| {
                let order: Option<Order> = conn
                    .query_row(
                        "SELECT id, user_id, total_price, status, created_at
                         FROM orders WHERE id = ?",
                        [order_id],
                        order_from_row,
                    )
                    .optional()?;
                let order = match order {
                    Some(order) => order,
                    None => return Ok(None),
                };
                let items = items_for_order(conn, order.id)?;
                Ok(Some(OrderDetail {
                    id: order.id,
                    user_id: order.user_id,
                    total_price: order.total_price,
                    status: order.status,
                    created_at: order.created_at,
                    items,
                }))
            })
            .await?;

        detail.ok_or_else(|| AppError::NotFound("order not found".to_string()))
    }

    /// The only modeled transition: pending -> paid. Anything else is
    /// rejected, never silently accepted.
    pub async fn pay_order(&self, order_id: i64) -> Result<OrderStatus, AppError> {
        let outcome = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let status: Option<String> = tx
                    .query_row(
                        "SELECT status FROM orders WHERE id = ?",
                        [order_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let status = match status {
                    Some(status) => status,
                    None => return Ok(PayOutcome::Missing),
                };
                // Compare the raw string: a status outside the modeled set
                // (e.g. a legacy 'completed' row) must not be payable either.
                if status != OrderStatus::Pending.as_str() {
                    return Ok(PayOutcome::NotPending);
                }
                tx.execute(
                    "UPDATE orders SET status = ? WHERE id = ?",
                    (OrderStatus::Paid.as_str(), order_id),
                )?;
                tx.commit()?;
                Ok(PayOutcome::Paid)
            })
            .await?;

        match outcome {
            PayOutcome::Paid => Ok(OrderStatus::Paid),
            PayOutcome::Missing => Err(AppError::NotFound("order not found".to_string())),
            PayOutcome::NotPending => Err(AppError::InvalidState(
                "order already paid or cancelled".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_util;
    use serde_json::json;

    async fn seed_basic(db: &Database) -> (i64, i64) {
        let user = test_util::seed_user(db, "alice").await;
        let canteen = test_util::seed_canteen(db, "Main Canteen").await;
        let dish = test_util::seed_dish(db, canteen, "Fried Rice", Some("Rice"), Some(10.0), true).await;
        (user, dish)
    }

    #[tokio::test]
    async fn computes_total_from_catalog_price() {
        let db = Database::open_in_memory().await.unwrap();
        let (user, dish) = seed_basic(&db).await;

        let order = db
            .create_order(
                user,
                vec![NewOrderItem {
                    dish_id: dish,
                    quantity: 2,
                    price: None,
                    options: None,
                }],
                None,
            )
            .await
            .unwrap();

        assert_eq!(order.total_price, 20.0);
        assert_eq!(order.status, OrderStatus::Pending);

        let detail = db.get_order_detail(order.id).await.unwrap();
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].price, 10.0);
        assert_eq!(detail.items[0].quantity, 2);
        assert!(detail.items[0].options.is_empty());
    }

    #[tokio::test]
    async fn client_supplied_prices_win() {
        let db = Database::open_in_memory().await.unwrap();
        let (user, dish) = seed_basic(&db).await;

        // Per-item price includes an option surcharge computed by the client.
        let order = db
            .create_order(
                user,
                vec![NewOrderItem {
                    dish_id: dish,
                    quantity: 1,
                    price: Some(12.0),
                    options: Some(HashMap::from([(
                        "add_egg".to_string(),
                        json!("yes"),
                    )])),
                }],
                None,
            )
            .await
            .unwrap();
        assert_eq!(order.total_price, 12.0);

        let detail = db.get_order_detail(order.id).await.unwrap();
        assert_eq!(detail.items[0].options.get("add_egg"), Some(&json!("yes")));

        // An explicit total overrides the computed sum entirely.
        let order = db
            .create_order(
                user,
                vec![NewOrderItem {
                    dish_id: dish,
                    quantity: 3,
                    price: None,
                    options: None,
                }],
                Some(25.5),
            )
            .await
            .unwrap();
        assert_eq!(order.total_price, 25.5);
    }

    #[tokio::test]
    async fn empty_order_never_reaches_the_store() {
        let db = Database::open_in_memory().await.unwrap();
        let (user, _) = seed_basic(&db).await;

        let err = db.create_order(user, Vec::new(), None).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(test_util::count_rows(&db, "orders").await, 0);
    }

    #[tokio::test]
    async fn unavailable_dish_fails_and_writes_nothing() {
        let db = Database::open_in_memory().await.unwrap();
        let (user, dish) = seed_basic(&db).await;
        let canteen = test_util::seed_canteen(&db, "North Canteen").await;
        let off_menu =
            test_util::seed_dish(&db, canteen, "Off Menu", Some("Rice"), Some(9.0), false).await;

        let items = vec![
            NewOrderItem {
                dish_id: dish,
                quantity: 1,
                price: None,
                options: None,
            },
            NewOrderItem {
                dish_id: off_menu,
                quantity: 1,
                price: None,
                options: None,
            },
        ];
        let err = db.create_order(user, items, None).await.unwrap_err();
        match err {
            AppError::NotFound(msg) => {
                assert_eq!(msg, format!("dish {off_menu} not found or not available"))
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        // The transaction rolled back: no order, no items.
        assert_eq!(test_util::count_rows(&db, "orders").await, 0);
        assert_eq!(test_util::count_rows(&db, "order_items").await, 0);
    }

    #[tokio::test]
    async fn pay_transitions_once() {
        let db = Database::open_in_memory().await.unwrap();
        let (user, dish) = seed_basic(&db).await;
        let order = db
            .create_order(
                user,
                vec![NewOrderItem {
                    dish_id: dish,
                    quantity: 1,
                    price: None,
                    options: None,
                }],
                None,
            )
            .await
            .unwrap();

        assert_eq!(db.pay_order(order.id).await.unwrap(), OrderStatus::Paid);

        let err = db.pay_order(order.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        let detail = db.get_order_detail(order.id).await.unwrap();
        assert_eq!(detail.status, OrderStatus::Paid);

        let err = db.pay_order(9999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn pay_rejects_statuses_outside_the_model() {
        let db = Database::open_in_memory().await.unwrap();
        let (user, dish) = seed_basic(&db).await;
        let order = db
            .create_order(
                user,
                vec![NewOrderItem {
                    dish_id: dish,
                    quantity: 1,
                    price: None,
                    options: None,
                }],
                None,
            )
            .await
            .unwrap();

        // A row written by an older schema or by hand carries a status the
        // enum does not model. It must not be payable.
        db.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE orders SET status = 'completed' WHERE id = ?",
                    [order.id],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = db.pay_order(order.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let raw: String = db
            .conn
            .call(move |conn| {
                let status =
                    conn.query_row("SELECT status FROM orders WHERE id = ?", [order.id], |row| {
                        row.get(0)
                    })?;
                Ok(status)
            })
            .await
            .unwrap();
        assert_eq!(raw, "completed");
    }

    #[tokio::test]
    async fn listing_preserves_item_order_and_decodes_options() {
        let db = Database::open_in_memory().await.unwrap();
        let (user, dish) = seed_basic(&db).await;
        let canteen = test_util::seed_canteen(&db, "North Canteen").await;
        let second =
            test_util::seed_dish(&db, canteen, "Milk Tea", Some("Drinks"), Some(8.0), true).await;

        db.create_order(
            user,
            vec![
                NewOrderItem {
                    dish_id: dish,
                    quantity: 1,
                    price: None,
                    options: None,
                },
                NewOrderItem {
                    dish_id: second,
                    quantity: 2,
                    price: None,
                    options: Some(HashMap::from([("sugar".to_string(), json!("less"))])),
                },
            ],
            None,
        )
        .await
        .unwrap();

        let orders = db.list_orders_for_user(user).await.unwrap();
        assert_eq!(orders.len(), 1);
        let items = &orders[0].items;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].dish_name, "Fried Rice");
        assert_eq!(items[1].dish_name, "Milk Tea");
        assert_eq!(items[1].options.get("sugar"), Some(&json!("less")));
        assert_eq!(orders[0].total_price, 26.0);
    }

    #[tokio::test]
    async fn corrupt_options_blob_degrades_to_empty_map() {
        let db = Database::open_in_memory().await.unwrap();
        let (user, dish) = seed_basic(&db).await;
        let order = db
            .create_order(
                user,
                vec![NewOrderItem {
                    dish_id: dish,
                    quantity: 1,
                    price: None,
                    options: None,
                }],
                None,
            )
            .await
            .unwrap();

        db.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE order_items SET options = 'not json' WHERE order_id = ?",
                    [order.id],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let detail = db.get_order_detail(order.id).await.unwrap();
        assert!(detail.items[0].options.is_empty());
    }
}
