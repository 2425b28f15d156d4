use crate::config::ChatConfig;
use crate::database::Database;
use crate::error::AppError;
use crate::models::DishWithStats;
use crate::providers::{ChatTurn, CompletionProvider};

const USER_TOP_LIMIT: i64 = 5;
const GLOBAL_TOP_LIMIT: i64 = 10;

fn render_dish_line(dish: &DishWithStats) -> String {
    format!(
        "- {} (canteen={}, stall={}, avg_score={:.1}, ratings={})",
        dish.name,
        dish.canteen_name.as_deref().unwrap_or("-"),
        dish.category.as_deref().unwrap_or("-"),
        dish.avg_score.unwrap_or(0.0),
        dish.rating_count,
    )
}

/// Renders the retrieval context sent alongside the user's question. Both
/// sections are always present; an empty personal history gets an explicit
/// line instead of a missing section.
pub fn build_context_text(user_top: &[DishWithStats], global_top: &[DishWithStats]) -> String {
    let mut lines = vec!["[User Favorite Dishes]".to_string()];
    if user_top.is_empty() {
        lines.push("- This user has no historical high ratings yet.".to_string());
    } else {
        lines.extend(user_top.iter().map(render_dish_line));
    }

    if !global_top.is_empty() {
        lines.push("\n[Global Top Dishes]".to_string());
        lines.extend(global_top.iter().map(render_dish_line));
    }

    lines.join("\n")
}

fn system_instruction(config: &ChatConfig) -> String {
    format!(
        "You are {name}, a campus canteen ordering assistant. Help students put together \
         meal orders using only the dishes, prices and ratings provided to you; never invent \
         canteens or dishes that are not in the supplied data. Take budget, taste preferences \
         (e.g. no spice, less oil) and meal time into account. Answer in {language}, keep a \
         friendly and concise tone, and name concrete dishes, canteens and stalls.",
        name = config.assistant_name,
        language = config.language,
    )
}

pub fn build_messages(config: &ChatConfig, context: &str, user_message: &str) -> Vec<ChatTurn> {
    vec![
        ChatTurn::system(system_instruction(config)),
        ChatTurn::system(format!(
            "Popular dishes and rating data retrieved from the database, usable for \
             recommendations:\n{context}"
        )),
        ChatTurn::user(user_message),
    ]
}

/// Full chat flow: retrieve the user's favorites and the global top list,
/// render them into the context block and delegate to the completion
/// provider. Performs no writes.
pub async fn answer(
    db: &Database,
    provider: &dyn CompletionProvider,
    config: &ChatConfig,
    user_id: i64,
    message: &str,
) -> Result<String, AppError> {
    let user_top = db.user_top_dishes(user_id, USER_TOP_LIMIT).await?;
    let global_top = db.global_top_dishes(GLOBAL_TOP_LIMIT).await?;
    let context = build_context_text(&user_top, &global_top);
    let messages = build_messages(config, &context, message);
    provider.complete(&messages).await
}
