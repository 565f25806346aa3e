//! Mock implementations for testing
//!
//! A scripted LLM provider that plays back text answers, tool-call turns and
//! failures in order, and records every request it receives.

use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
    ToolCall,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// One scripted provider turn
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    ToolCalls(Vec<ToolCall>),
    Fail(LlmError),
}

/// Mock LLM provider for testing
///
/// Replies are played back in order and cycle once exhausted.
#[derive(Debug, Clone)]
pub struct MockLlmProvider {
    replies: Vec<MockReply>,
    position: Arc<Mutex<usize>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    delay: Option<Duration>,
    healthy: bool,
}

impl MockLlmProvider {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies,
            position: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
            healthy: true,
        }
    }

    /// Every call and every health check fails
    pub fn with_failure() -> Self {
        Self {
            healthy: false,
            ..Self::new(vec![MockReply::Fail(LlmError::RequestFailed(
                "Mock LLM failure".to_string(),
            ))])
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![MockReply::Text(response.into())])
    }

    /// One tool-call turn followed by the final answer
    pub fn with_tool_calls(calls: Vec<ToolCall>, final_answer: impl Into<String>) -> Self {
        Self::new(vec![
            MockReply::ToolCalls(calls),
            MockReply::Text(final_answer.into()),
        ])
    }

    /// Sleep before every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn available_models(&self) -> Vec<String> {
        vec!["mock-model".to_string()]
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let model = request.model.clone();
        self.requests.lock().await.push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = {
            let mut position = self.position.lock().await;
            let reply = self
                .replies
                .get(*position % self.replies.len().max(1))
                .cloned()
                .unwrap_or_else(|| MockReply::Text("{}".to_string()));
            *position += 1;
            reply
        };

        let (content, tool_calls, finish_reason) = match reply {
            MockReply::Fail(e) => return Err(e),
            MockReply::Text(text) => (Some(text), None, FinishReason::Stop),
            MockReply::ToolCalls(calls) => (None, Some(calls), FinishReason::ToolCalls),
        };

        Ok(CompletionResponse {
            content,
            model,
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason,
            tool_calls,
            metadata: HashMap::new(),
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.healthy {
            Ok(())
        } else {
            Err(LlmError::RequestFailed(
                "Mock health check failure".to_string(),
            ))
        }
    }
}

/// Build a tool call with a fixed id
pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}

/// A well-formed final answer for a customer lead
pub fn sample_model_answer(new_status: &str) -> String {
    json!({
        "parsed_lead": {
            "role": "customer",
            "intent_type": "customer_lead",
            "service_type": "birthday decoration",
            "location": "Gaya",
            "date": "tomorrow",
            "budget": 2000,
            "urgency": "high",
            "notes": null
        },
        "tools_result": {
            "base_price_inr": 2000,
            "priority": "high",
            "provider_summary": "3 matching decorators available in Gaya."
        },
        "reply_message": "Hi! Our packages for birthday decoration start from ₹2000. 3 matching decorators are available in Gaya. Shall I book one for tomorrow?",
        "follow_up_message": null,
        "new_status": new_status,
        "summary": "Birthday decoration in Gaya tomorrow, budget ₹2000, high urgency"
    })
    .to_string()
}

/// A final answer for a follow-up run
pub fn sample_follow_up_answer(message: &str, new_status: &str) -> String {
    json!({
        "parsed_lead": null,
        "tools_result": null,
        "reply_message": "",
        "follow_up_message": message,
        "new_status": new_status,
        "summary": "Sent a gentle follow-up"
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::Message;

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::user("hi")],
            model: "mock-model".to_string(),
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop_sequences: None,
            tools: None,
            response_format: None,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_replies_play_in_order_and_cycle() {
        let provider = MockLlmProvider::with_tool_calls(
            vec![tool_call("c1", "get_base_price", json!({"service_type": "makeup"}))],
            "{}",
        );

        let first = provider.complete(request()).await.unwrap();
        assert_eq!(first.finish_reason, FinishReason::ToolCalls);
        assert_eq!(first.requested_tool_calls().len(), 1);

        let second = provider.complete(request()).await.unwrap();
        assert_eq!(second.content.as_deref(), Some("{}"));

        let third = provider.complete(request()).await.unwrap();
        assert_eq!(third.finish_reason, FinishReason::ToolCalls);
        assert_eq!(provider.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_failure_mode() {
        let provider = MockLlmProvider::with_failure();
        assert!(provider.complete(request()).await.is_err());
        assert!(provider.health_check().await.is_err());
    }

    #[test]
    fn test_sample_answers_are_json() {
        let answer: Value = serde_json::from_str(&sample_model_answer("WAITING_CUSTOMER")).unwrap();
        assert_eq!(answer["new_status"], "WAITING_CUSTOMER");
        let follow_up: Value =
            serde_json::from_str(&sample_follow_up_answer("Hi again!", "FOLLOWED_UP")).unwrap();
        assert_eq!(follow_up["follow_up_message"], "Hi again!");
    }
}
