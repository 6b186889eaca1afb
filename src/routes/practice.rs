// 生成类接口。真正的 LLM / 语音服务在外部，这里只校验输入并返回受理结果

use axum::{Json, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, middleware::Identity, utils::success_to_api_response};

const LEVELS: [&str; 6] = ["A1", "A2", "B1", "B2", "C1", "C2"];

#[derive(Debug, Deserialize)]
pub struct GenerateLessonRequest {
    pub topic: String,
    pub level: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateLessonResponse {
    pub user_id: String,
    pub topic: String,
    pub level: String,
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ScorePronunciationRequest {
    pub reference_text: String,
    pub transcript: String,
}

#[derive(Debug, Serialize)]
pub struct ScorePronunciationResponse {
    pub matched_words: usize,
    pub total_words: usize,
    pub accuracy: f64,
}

#[derive(Debug, Deserialize)]
pub struct ConversationReplyRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationReplyResponse {
    pub user_id: String,
    pub received_chars: usize,
    pub status: &'static str,
}

#[axum::debug_handler]
pub async fn generate_lesson(
    identity: Identity,
    Json(req): Json<GenerateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    let topic = req.topic.trim();
    if topic.is_empty() || topic.chars().count() > 100 {
        return Err(AppError::Validation("主题长度必须在1到100个字符之间".into()));
    }

    let level = req.level.trim().to_ascii_uppercase();
    if !LEVELS.contains(&level.as_str()) {
        return Err(AppError::Validation(format!("未知的难度等级 {}", req.level)));
    }

    Ok(success_to_api_response(GenerateLessonResponse {
        user_id: identity.0,
        topic: topic.to_string(),
        level,
        status: "queued",
    }))
}

/// 按位置逐词比较参考文本与识别结果
#[axum::debug_handler]
pub async fn score_pronunciation(
    Json(req): Json<ScorePronunciationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let reference: Vec<String> = normalize_words(&req.reference_text);
    if reference.is_empty() {
        return Err(AppError::Validation("参考文本不能为空".into()));
    }
    let spoken = normalize_words(&req.transcript);

    let matched_words = reference
        .iter()
        .zip(spoken.iter())
        .filter(|(a, b)| a == b)
        .count();
    let total_words = reference.len();

    Ok(success_to_api_response(ScorePronunciationResponse {
        matched_words,
        total_words,
        accuracy: matched_words as f64 / total_words as f64,
    }))
}

#[axum::debug_handler]
pub async fn conversation_reply(
    identity: Identity,
    Json(req): Json<ConversationReplyRequest>,
) -> Result<impl IntoResponse, AppError> {
    let received_chars = req.message.trim().chars().count();
    if received_chars == 0 || received_chars > 2000 {
        return Err(AppError::Validation("消息长度必须在1到2000个字符之间".into()));
    }

    Ok(success_to_api_response(ConversationReplyResponse {
        user_id: identity.0,
        received_chars,
        status: "queued",
    }))
}

fn normalize_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric() || *c == '\'')
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(
            normalize_words("Bonjour, je m'appelle  Marie!"),
            vec!["bonjour", "je", "m'appelle", "marie"]
        );
    }
}
