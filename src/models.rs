use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User role stored as lowercase text in the users table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
        }
    }

    /// Unknown values in the column degrade to `student`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "admin" => Role::Admin,
            _ => Role::Student,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Student
    }
}

/// Order lifecycle: `pending --pay()--> paid`. No other transition exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "paid" => OrderStatus::Paid,
            _ => OrderStatus::Pending,
        }
    }
}

/// Public user view. The password digest never leaves the database layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Canteen {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dish {
    pub id: i64,
    pub canteen_id: i64,
    pub name: String,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub ingredients: Option<String>,
    pub ingredients_zh: Option<String>,
    pub calories: Option<i64>,
    pub is_available: bool,
    pub created_at: String,
}

/// One selectable value of a dish option, with localized labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionValue {
    pub value: String,
    pub label_zh: String,
    pub label_en: String,
}

/// Option group attached to a dish, e.g. `add_egg` or `spicy_level`.
/// `option_values` is stored as a JSON text blob in the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishOptionConfig {
    pub id: i64,
    pub dish_id: i64,
    pub option_type: String,
    pub option_name_zh: String,
    pub option_name_en: String,
    pub option_values: Vec<OptionValue>,
    pub is_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: i64,
    pub user_id: i64,
    pub dish_id: i64,
    pub score: i64,
    pub comment: Option<String>,
    pub created_at: String,
}

/// Rating joined with the rater's display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingWithUser {
    pub id: i64,
    pub user_id: i64,
    pub dish_id: i64,
    pub score: i64,
    pub comment: Option<String>,
    pub created_at: String,
    pub username: String,
}

/// Dish row with rating aggregates, as returned by the recommendation
/// queries. `avg_score` is `None` for dishes that have no ratings (these
/// only appear in the per-user category recommendations).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishWithStats {
    pub id: i64,
    pub canteen_id: i64,
    pub name: String,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub ingredients: Option<String>,
    pub ingredients_zh: Option<String>,
    pub calories: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canteen_name: Option<String>,
    pub avg_score: Option<f64>,
    pub rating_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayRecommendations {
    pub day_name_en: String,
    pub day_name_zh: String,
    pub dishes: Vec<DishWithStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub total_price: f64,
    pub status: OrderStatus,
    pub created_at: String,
}

/// Persisted order line joined with the dish name. `price` is the unit
/// price actually charged; `options` decodes from the stored JSON blob and
/// degrades to an empty map when absent or undecodable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub dish_id: i64,
    pub dish_name: String,
    pub quantity: i64,
    pub price: f64,
    pub options: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub id: i64,
    pub user_id: i64,
    pub total_price: f64,
    pub status: OrderStatus,
    pub created_at: String,
    pub items: Vec<OrderItem>,
}

/// Input line for order creation. `price` present means the client already
/// folded option surcharges into the unit price and it is charged as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderItem {
    pub dish_id: i64,
    pub quantity: i64,
    pub price: Option<f64>,
    pub options: Option<HashMap<String, Value>>,
}
