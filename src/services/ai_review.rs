use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::core::config::Settings;

const REVIEW_SYSTEM_PROMPT: &str = r#"Вы — эксперт по математике и опытный преподаватель, готовящий школьников к ЕГЭ.
Ваша задача — проверить развёрнутое решение ученика и оценить его.

Критерии проверки:
1. Правильность хода решения
2. Корректность вычислений
3. Обоснованность переходов
4. Правильная запись ответа

Классификация ошибки (ровно одно значение поля error_type):
- CALCULATION — арифметическая или вычислительная ошибка
- CONCEPT — непонимание понятия или метода
- LOGIC — ошибка в логике рассуждения
- NOTATION — ошибка записи или оформления
- NONE — ошибок нет

Формат ответа (строгий JSON):
{
  "is_correct": <true|false>,
  "points_earned": <целое число от 0 до max_points>,
  "feedback": "развёрнутый комментарий для ученика",
  "error_type": "CALCULATION|CONCEPT|LOGIC|NOTATION|NONE",
  "recommendations": ["рекомендация 1", "рекомендация 2"],
  "quality_score": <целое число от 1 до 5 — качество оформления решения>
}
"#;

const ERROR_TYPES: [&str; 5] = ["CALCULATION", "CONCEPT", "LOGIC", "NOTATION", "NONE"];

#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub attempt_id: String,
    pub question_content: String,
    pub reference_answer: String,
    pub reference_solution: Option<String>,
    pub student_solution: String,
    pub solution_image_url: Option<String>,
    pub max_points: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewVerdict {
    pub is_correct: bool,
    pub points_earned: i32,
    pub feedback: String,
    pub error_type: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub quality_score: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct AiReviewService {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    max_retries: u32,
}

impl AiReviewService {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.ai().request_timeout);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.ai().api_key.clone(),
            base_url: settings.ai().base_url.trim_end_matches('/').to_string(),
            model: settings.ai().model.clone(),
            max_tokens: settings.ai().max_tokens,
            temperature: settings.ai().temperature,
            max_retries: settings.ai().max_retries,
        })
    }

    pub async fn review_solution(&self, request: ReviewRequest) -> Result<ReviewVerdict> {
        let timer = Instant::now();

        let user_prompt = format!(
            "Задача:\n{}\n\nЭталонный ответ: {}\n\nЭталонное решение:\n{}\n\nМаксимальный балл: {}\n\nРешение ученика:\n{}\n\nПроверьте решение и верните вердикт строго в JSON-формате из системного промпта.",
            request.question_content,
            request.reference_answer,
            request.reference_solution.as_deref().unwrap_or("(не задано)"),
            request.max_points,
            request.student_solution,
        );

        let mut content = vec![json!({"type": "text", "text": user_prompt})];
        if let Some(image_url) = &request.solution_image_url {
            content.push(json!({
                "type": "image_url",
                "image_url": {"url": image_url}
            }));
        }

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": REVIEW_SYSTEM_PROMPT},
                {"role": "user", "content": content}
            ],
            "max_completion_tokens": self.max_tokens,
            "temperature": self.temperature,
            "response_format": {"type": "json_object"}
        });

        tracing::info!(attempt_id = %request.attempt_id, "Sending AI review request");

        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error = None;
        let mut body = Value::Null;

        for attempt in 0..=self.max_retries {
            let response =
                self.client.post(&url).bearer_auth(&self.api_key).json(&payload).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    body = resp.json().await.unwrap_or(Value::Null);
                    if status.is_success() {
                        last_error = None;
                        break;
                    }
                    last_error = Some(anyhow::anyhow!("AI API error: {body}"));
                }
                Err(err) => {
                    last_error = Some(anyhow::anyhow!(err).context("Failed to call AI API"));
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt))).await;
            }
        }

        if let Some(err) = last_error {
            return Err(err);
        }

        let content = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|value| value.as_str())
            .context("Missing AI response content")?;

        let verdict = parse_verdict(content, request.max_points)?;

        tracing::info!(
            attempt_id = %request.attempt_id,
            duration_seconds = timer.elapsed().as_secs_f64(),
            points_earned = verdict.points_earned,
            error_type = %verdict.error_type,
            "AI review completed"
        );

        Ok(verdict)
    }
}

/// Parses and sanitizes the model output: points clamp to the question's
/// range, unknown error types collapse to NONE, quality stays within 1..=5.
fn parse_verdict(content: &str, max_points: i32) -> Result<ReviewVerdict> {
    let mut verdict: ReviewVerdict =
        serde_json::from_str(content).context("Failed to parse AI verdict JSON")?;

    verdict.points_earned = verdict.points_earned.clamp(0, max_points);
    verdict.error_type = verdict.error_type.to_ascii_uppercase();
    if !ERROR_TYPES.contains(&verdict.error_type.as_str()) {
        verdict.error_type = "NONE".to_string();
    }
    verdict.quality_score = verdict.quality_score.map(|score| score.clamp(1, 5));

    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_points_clamp_to_max() {
        let raw = r#"{"is_correct": true, "points_earned": 7, "feedback": "ok",
                      "error_type": "NONE", "recommendations": [], "quality_score": 9}"#;
        let verdict = parse_verdict(raw, 4).unwrap();
        assert_eq!(verdict.points_earned, 4);
        assert_eq!(verdict.quality_score, Some(5));
    }

    #[test]
    fn unknown_error_type_collapses_to_none() {
        let raw = r#"{"is_correct": false, "points_earned": 0, "feedback": "см. решение",
                      "error_type": "misc"}"#;
        let verdict = parse_verdict(raw, 2).unwrap();
        assert_eq!(verdict.error_type, "NONE");
        assert!(verdict.recommendations.is_empty());
    }

    #[test]
    fn malformed_verdict_is_an_error() {
        assert!(parse_verdict("not json", 2).is_err());
    }
}
