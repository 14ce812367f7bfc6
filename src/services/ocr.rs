use anyhow::{Context, Result};
use reqwest::multipart::Form;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::core::config::Settings;

/// Recognized handwriting plus the provider's confidence, when reported.
#[derive(Debug, Clone)]
pub struct OcrResult {
    pub text: String,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct OcrService {
    client: Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

#[derive(Debug, Clone)]
struct OcrJobRef {
    request_id: String,
    request_check_url: String,
}

impl OcrService {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.ocr().timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(timeout)
            .build()
            .context("Failed to build OCR HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.ocr().api_key.clone(),
            base_url: settings.ocr().base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_secs(settings.ocr().poll_interval_seconds),
            max_poll_attempts: settings.ocr().max_poll_attempts,
        })
    }

    /// Recognizes a solution photo: submit, then poll until the job settles.
    pub async fn recognize_image_url(&self, image_url: &str) -> Result<OcrResult> {
        let job_ref = self.submit_job(image_url).await?;
        self.poll_result(&job_ref).await
    }

    async fn submit_job(&self, image_url: &str) -> Result<OcrJobRef> {
        let endpoint = format!("{}/ocr", self.base_url);
        let form = Form::new()
            .text("file_url", image_url.to_string())
            .text("output_format", "text".to_string());

        let response = self
            .client
            .post(&endpoint)
            .header("X-Api-Key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Failed to call OCR submit endpoint")?;

        let status = response.status();
        let raw_body = response.text().await.context("Failed to read OCR submit response")?;
        let parsed = serde_json::from_str::<Value>(&raw_body).map_err(|err| {
            anyhow::anyhow!("OCR submit returned non-JSON body (status {status}): {err}: {raw_body}")
        })?;

        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "OCR submit failed (status {status}): {}",
                extract_error_message(&parsed)
            ));
        }

        extract_job_ref(&self.base_url, &parsed)
            .ok_or_else(|| anyhow::anyhow!("OCR submit response missing request reference"))
    }

    async fn poll_result(&self, job_ref: &OcrJobRef) -> Result<OcrResult> {
        for attempt in 0..self.max_poll_attempts {
            let response = self
                .client
                .get(&job_ref.request_check_url)
                .header("X-Api-Key", &self.api_key)
                .send()
                .await
                .context("Failed to call OCR result endpoint")?;

            let status_code = response.status();
            let raw_body = response.text().await.context("Failed to read OCR poll response")?;
            let parsed: Value = serde_json::from_str(&raw_body).map_err(|err| {
                anyhow::anyhow!(
                    "OCR poll returned non-JSON body (status {status_code}): {err}: {raw_body}"
                )
            })?;

            if !status_code.is_success() {
                return Err(anyhow::anyhow!(
                    "OCR poll failed (status {status_code}): {}",
                    extract_error_message(&parsed)
                ));
            }

            let status = parsed
                .get("status")
                .and_then(Value::as_str)
                .map(|value| value.to_ascii_lowercase())
                .unwrap_or_else(|| "unknown".to_string());

            if status == "complete" || status == "completed" {
                return extract_result(&parsed).ok_or_else(|| {
                    anyhow::anyhow!("OCR job {} finished without text", job_ref.request_id)
                });
            }

            if status == "failed" || status == "error" {
                return Err(anyhow::anyhow!(
                    "OCR job {} failed: {}",
                    job_ref.request_id,
                    extract_error_message(&parsed)
                ));
            }

            if attempt + 1 >= self.max_poll_attempts {
                break;
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        Err(anyhow::anyhow!(
            "OCR polling timed out for request {} after {} attempts",
            job_ref.request_id,
            self.max_poll_attempts
        ))
    }
}

fn extract_job_ref(base_url: &str, payload: &Value) -> Option<OcrJobRef> {
    let request_check_url =
        payload.get("request_check_url").and_then(Value::as_str).map(ToString::to_string);
    let request_id = payload
        .get("request_id")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .or_else(|| {
            request_check_url
                .clone()
                .and_then(|url| url.trim_end_matches('/').rsplit('/').next().map(ToString::to_string))
        })?;

    let request_check_url =
        request_check_url.unwrap_or_else(|| format!("{base_url}/ocr/{request_id}"));

    Some(OcrJobRef { request_id, request_check_url })
}

fn extract_result(payload: &Value) -> Option<OcrResult> {
    let container = payload.get("result").unwrap_or(payload);
    let text = container
        .get("text")
        .and_then(Value::as_str)
        .or_else(|| payload.get("text").and_then(Value::as_str))?
        .to_string();
    let confidence = container
        .get("confidence")
        .and_then(Value::as_f64)
        .or_else(|| payload.get("confidence").and_then(Value::as_f64));
    Some(OcrResult { text, confidence })
}

fn extract_error_message(payload: &Value) -> String {
    payload
        .get("detail")
        .and_then(Value::as_str)
        .or_else(|| payload.get("message").and_then(Value::as_str))
        .or_else(|| payload.get("error").and_then(Value::as_str))
        .unwrap_or("unknown_error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_ref_builds_check_url_from_id() {
        let payload = json!({"request_id": "abc123"});
        let job_ref = extract_job_ref("https://ocr.example", &payload).unwrap();
        assert_eq!(job_ref.request_id, "abc123");
        assert_eq!(job_ref.request_check_url, "https://ocr.example/ocr/abc123");
    }

    #[test]
    fn result_reads_nested_and_flat_payloads() {
        let nested = json!({"status": "complete", "result": {"text": "x=5", "confidence": 0.93}});
        let result = extract_result(&nested).unwrap();
        assert_eq!(result.text, "x=5");
        assert_eq!(result.confidence, Some(0.93));

        let flat = json!({"status": "complete", "text": "y=2"});
        let result = extract_result(&flat).unwrap();
        assert_eq!(result.text, "y=2");
        assert_eq!(result.confidence, None);
    }

    #[test]
    fn missing_text_is_none() {
        assert!(extract_result(&json!({"status": "complete"})).is_none());
    }
}
