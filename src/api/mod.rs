use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Datelike, Local};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use validator::Validate;

use crate::chat;
use crate::config::ChatConfig;
use crate::database::Database;
use crate::error::AppError;
use crate::models::{
    Canteen, DayRecommendations, Dish, DishOptionConfig, DishWithStats, NewOrderItem, Order,
    OrderDetail, Rating, RatingWithUser, Role, User,
};
use crate::providers::MoonshotProvider;

#[derive(Clone)]
pub struct AppState {
    db: Database,
    chat_config: Arc<ChatConfig>,
}

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 50))]
    username: String,
    #[validate(email)]
    email: Option<String>,
    #[validate(length(min = 6, max = 128))]
    password: String,
    #[serde(default)]
    role: Role,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    user: User,
    message: String,
}

#[derive(Deserialize, Validate)]
pub struct RatingCreate {
    user_id: i64,
    dish_id: i64,
    #[validate(range(min = 1, max = 5))]
    score: i64,
    comment: Option<String>,
}

#[derive(Deserialize)]
pub struct OrderCreate {
    user_id: i64,
    items: Vec<NewOrderItem>,
    total_price: Option<f64>,
}

#[derive(Serialize)]
pub struct PayResponse {
    message: String,
    order_id: i64,
    status: String,
}

#[derive(Deserialize, Validate)]
pub struct ChatRequest {
    user_id: Option<i64>,
    #[validate(length(min = 1, max = 1000))]
    message: String,
}

#[derive(Serialize)]
pub struct ChatAnswer {
    answer: String,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct DailyQuery {
    weekday: Option<u32>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct WeeklyQuery {
    limit_per_day: Option<i64>,
}

#[derive(Deserialize)]
pub struct OrdersListQuery {
    user_id: i64,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Create and configure the API router
pub fn create_api(db: Database, chat_config: ChatConfig) -> Router {
    let state = AppState {
        db,
        chat_config: Arc::new(chat_config),
    };

    // Fully permissive CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    info!("API router configured with permissive CORS");

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/user/:user_id", get(get_user_handler))
        .route("/canteens", get(list_canteens_handler))
        .route("/canteens/:canteen_id/dishes", get(canteen_dishes_handler))
        .route("/dishes", get(list_dishes_handler))
        .route("/dishes/:dish_id", get(get_dish_handler))
        .route("/dishes/:dish_id/ratings", get(dish_ratings_handler))
        .route("/options/dish/:dish_id", get(dish_options_handler))
        .route("/ratings", get(list_ratings_handler).post(upsert_rating_handler))
        .route("/ratings/dish/:dish_id", get(ratings_for_dish_handler))
        .route("/stats/top-dishes", get(top_dishes_handler))
        .route("/stats/recommendations/:user_id", get(recommendations_handler))
        .route("/stats/daily-recommendations", get(daily_recommendations_handler))
        .route("/stats/weekly-recommendations", get(weekly_recommendations_handler))
        .route("/orders", post(create_order_handler).get(list_orders_handler))
        .route("/orders/:order_id", get(get_order_handler))
        .route("/orders/:order_id/pay", post(pay_order_handler))
        .route("/chat", post(chat_handler))
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let user = state
        .db
        .register_user(request.username, request.email, request.password, request.role)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = state.db.login_user(request.username, request.password).await?;
    Ok(Json(LoginResponse {
        user,
        message: "login successful".to_string(),
    }))
}

async fn get_user_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.db.get_user(user_id).await?))
}

async fn list_canteens_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Canteen>>, AppError> {
    Ok(Json(state.db.list_canteens().await?))
}

async fn canteen_dishes_handler(
    State(state): State<AppState>,
    Path(canteen_id): Path<i64>,
) -> Result<Json<Vec<Dish>>, AppError> {
    Ok(Json(state.db.list_dishes_for_canteen(canteen_id).await?))
}

async fn list_dishes_handler(State(state): State<AppState>) -> Result<Json<Vec<Dish>>, AppError> {
    Ok(Json(state.db.list_dishes().await?))
}

async fn get_dish_handler(
    State(state): State<AppState>,
    Path(dish_id): Path<i64>,
) -> Result<Json<Dish>, AppError> {
    Ok(Json(state.db.get_dish(dish_id).await?))
}

async fn dish_ratings_handler(
    State(state): State<AppState>,
    Path(dish_id): Path<i64>,
) -> Result<Json<Vec<Rating>>, AppError> {
    Ok(Json(state.db.list_dish_ratings(dish_id).await?))
}

async fn dish_options_handler(
    State(state): State<AppState>,
    Path(dish_id): Path<i64>,
) -> Result<Json<Vec<DishOptionConfig>>, AppError> {
    Ok(Json(state.db.list_dish_options(dish_id).await?))
}

async fn list_ratings_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Rating>>, AppError> {
    Ok(Json(state.db.list_ratings().await?))
}

async fn ratings_for_dish_handler(
    State(state): State<AppState>,
    Path(dish_id): Path<i64>,
) -> Result<Json<Vec<RatingWithUser>>, AppError> {
    Ok(Json(state.db.list_ratings_for_dish(dish_id).await?))
}

async fn upsert_rating_handler(
    State(state): State<AppState>,
    Json(request): Json<RatingCreate>,
) -> Result<(StatusCode, Json<RatingWithUser>), AppError> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let rating = state
        .db
        .upsert_rating(request.user_id, request.dish_id, request.score, request.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(rating)))
}

async fn top_dishes_handler(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<DishWithStats>>, AppError> {
    Ok(Json(state.db.top_dishes(query.limit.unwrap_or(5)).await?))
}

async fn recommendations_handler(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<DishWithStats>>, AppError> {
    Ok(Json(
        state
            .db
            .recommend_for_user(user_id, query.limit.unwrap_or(5))
            .await?,
    ))
}

async fn daily_recommendations_handler(
    State(state): State<AppState>,
    Query(query): Query<DailyQuery>,
) -> Result<Json<Vec<DishWithStats>>, AppError> {
    // Deriving the weekday from the clock happens here at the boundary;
    // the engine itself only ever sees an explicit weekday.
    let weekday = query
        .weekday
        .unwrap_or_else(|| Local::now().weekday().num_days_from_monday());
    Ok(Json(
        state
            .db
            .daily_recommendations(weekday, query.limit.unwrap_or(6))
            .await?,
    ))
}

async fn weekly_recommendations_handler(
    State(state): State<AppState>,
    Query(query): Query<WeeklyQuery>,
) -> Result<Json<BTreeMap<u32, DayRecommendations>>, AppError> {
    Ok(Json(
        state
            .db
            .weekly_recommendations(query.limit_per_day.unwrap_or(4))
            .await?,
    ))
}

async fn create_order_handler(
    State(state): State<AppState>,
    Json(request): Json<OrderCreate>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = state
        .db
        .create_order(request.user_id, request.items, request.total_price)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_orders_handler(
    State(state): State<AppState>,
    Query(query): Query<OrdersListQuery>,
) -> Result<Json<Vec<OrderDetail>>, AppError> {
    Ok(Json(state.db.list_orders_for_user(query.user_id).await?))
}

async fn get_order_handler(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderDetail>, AppError> {
    Ok(Json(state.db.get_order_detail(order_id).await?))
}

async fn pay_order_handler(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> Result<Json<PayResponse>, AppError> {
    let status = state.db.pay_order(order_id).await?;
    Ok(Json(PayResponse {
        message: "payment successful".to_string(),
        order_id,
        status: status.as_str().to_string(),
    }))
}

async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatAnswer>, AppError> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let provider = MoonshotProvider::from_config(&state.chat_config)?;
    let user_id = request.user_id.unwrap_or(1);
    let answer = chat::answer(
        &state.db,
        &provider,
        &state.chat_config,
        user_id,
        &request.message,
    )
    .await?;
    Ok(Json(ChatAnswer { answer }))
}
