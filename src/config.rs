use std::env;

/// Settings for the external completion service, read from the environment.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub language: String,
    pub assistant_name: String,
}

impl ChatConfig {
    pub fn from_env() -> Self {
        let api_key = env::var("MOONSHOT_API_KEY").ok().filter(|k| !k.is_empty());

        let model = env::var("MOONSHOT_MODEL_NAME")
            .unwrap_or_else(|_| "kimi-k2-0711-preview".to_string());

        let api_base = env::var("MOONSHOT_API_BASE")
            .unwrap_or_else(|_| "https://api.moonshot.cn/v1".to_string());

        let language = env::var("LLM_DEFAULT_LANGUAGE").unwrap_or_else(|_| "zh".to_string());

        let assistant_name = env::var("LLM_ASSISTANT_NAME")
            .unwrap_or_else(|_| "CampusCanteenAssistant".to_string());

        Self {
            api_key,
            model,
            api_base,
            language,
            assistant_name,
        }
    }

    /// Endpoint for chat completions, tolerating a trailing slash on the base.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_url_strips_trailing_slash() {
        let config = ChatConfig {
            api_key: Some("sk-test".to_string()),
            model: "kimi-k2-0711-preview".to_string(),
            api_base: "https://api.moonshot.cn/v1/".to_string(),
            language: "zh".to_string(),
            assistant_name: "CampusCanteenAssistant".to_string(),
        };
        assert_eq!(
            config.completions_url(),
            "https://api.moonshot.cn/v1/chat/completions"
        );
    }
}
