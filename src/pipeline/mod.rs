//! Lead pipeline: one model conversation per lead
//!
//! The conversation is a fixed shape:
//!
//! 1. system prompt plus the JSON `PipelineInput` as the user turn, with the
//!    tool descriptions attached
//! 2. up to `budget.max_tool_rounds` rounds where the model may call tools,
//!    which run locally and are answered in the history
//! 3. a final call without tools in JSON mode, parsed into a `PipelineResult`
//!
//! Everything the model decides (classification, reply text, status) comes
//! back in that final answer; this module only moves data.

pub mod prompt;

use crate::config::{BudgetConfig, DeskConfig};
use crate::error::{LeadError, LeadResult};
use crate::lead::{parse_model_output, PipelineInput, PipelineResult, ToolInvocation, Urgency};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, LlmProvider, Message, ResponseFormat, TokenUsage,
    ToolCall,
};
use crate::observability::metrics::metrics;
use crate::tools::{ToolDescription, ToolSystem};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

pub use prompt::{build_system_prompt, with_current_date, PromptContext};

/// Everything one pipeline run produced
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub result: PipelineResult,
    pub tool_invocations: Vec<ToolInvocation>,
    pub usage: TokenUsage,
    pub llm_calls: u32,
}

/// Runs the model conversation for a single lead
pub struct LeadPipeline {
    llm_provider: Arc<dyn LlmProvider>,
    tool_system: Arc<ToolSystem>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    budget: BudgetConfig,
    system_prompt: String,
}

impl LeadPipeline {
    pub fn new(
        llm_provider: Arc<dyn LlmProvider>,
        tool_system: Arc<ToolSystem>,
        config: &DeskConfig,
    ) -> Self {
        let system_prompt = config
            .llm
            .system_prompt
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| build_system_prompt(&PromptContext::from_config(config)));

        Self {
            llm_provider,
            tool_system,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            budget: config.budget.clone(),
            system_prompt,
        }
    }

    /// The system prompt without the date suffix
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn provider_name(&self) -> &str {
        self.llm_provider.name()
    }

    /// Run the conversation for one input
    pub async fn run(&self, input: &PipelineInput) -> LeadResult<PipelineOutcome> {
        let available_tools = self.tool_system.describe_all();
        let mut messages = self.build_initial_messages(input)?;
        let mut usage = TokenUsage::default();
        let mut llm_calls = 0u32;
        let mut invocations: Vec<ToolInvocation> = Vec::new();

        for round in 1..=self.budget.max_tool_rounds {
            if available_tools.is_empty() {
                break;
            }

            let request = self.create_completion_request(
                messages.clone(),
                Some(&available_tools),
                ResponseFormat::Text,
            );
            let response = self.execute_llm_request(request, round).await?;
            llm_calls += 1;
            usage.add(&response.usage);

            let tool_calls = response.requested_tool_calls().to_vec();
            if tool_calls.is_empty() {
                debug!(round, "Model answered without calling tools");
                break;
            }

            debug!(round, tool_count = tool_calls.len(), "Processing tool calls");
            let results = self.execute_tool_calls(&tool_calls, &mut invocations).await;

            messages.push(Message::assistant_tool_calls(
                response.content.clone(),
                tool_calls.clone(),
            ));
            for (call, output) in tool_calls.iter().zip(results) {
                messages.push(Message::tool(call, output));
            }
        }

        let final_request = self.create_completion_request(messages, None, ResponseFormat::Json);
        let final_round = llm_calls + 1;
        let response = self.execute_llm_request(final_request, final_round).await?;
        llm_calls += 1;
        usage.add(&response.usage);

        let text = response.content.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(LeadError::invalid_model_output(
                "AI returned invalid JSON structure: empty response",
            ));
        }

        let mut result = parse_model_output(&text, input.lead_status)?;
        backfill_tools_result(&mut result, &invocations);

        info!(
            mode = ?input.mode,
            new_status = %result.new_status,
            llm_calls,
            tool_calls = invocations.len(),
            total_tokens = usage.total_tokens,
            "Pipeline completed"
        );

        Ok(PipelineOutcome {
            result,
            tool_invocations: invocations,
            usage,
            llm_calls,
        })
    }

    fn build_initial_messages(&self, input: &PipelineInput) -> LeadResult<Vec<Message>> {
        let user_turn = serde_json::to_string(input)
            .map_err(|e| LeadError::internal_error(format!("Failed to encode pipeline input: {e}")))?;

        Ok(vec![
            Message::system(with_current_date(&self.system_prompt, chrono::Utc::now())),
            Message::user(user_turn),
        ])
    }

    fn create_completion_request(
        &self,
        messages: Vec<Message>,
        tools: Option<&[ToolDescription]>,
        response_format: ResponseFormat,
    ) -> CompletionRequest {
        CompletionRequest {
            messages,
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: None,
            stop_sequences: None,
            tools: tools.filter(|t| !t.is_empty()).map(|t| t.to_vec()),
            response_format: Some(response_format),
            metadata: HashMap::new(),
        }
    }

    async fn execute_llm_request(
        &self,
        request: CompletionRequest,
        round: u32,
    ) -> LeadResult<CompletionResponse> {
        let span = crate::llm_span!(
            provider = %self.llm_provider.name(),
            model = %request.model,
            round,
            with_tools = request.tools.is_some()
        );

        async {
            let start = Instant::now();
            match self.llm_provider.complete(request).await {
                Ok(response) => {
                    metrics().llm_call_completed(
                        start.elapsed(),
                        response.usage.prompt_tokens,
                        response.usage.completion_tokens,
                    );
                    debug!(
                        finish_reason = ?response.finish_reason,
                        tool_calls = response.requested_tool_calls().len(),
                        total_tokens = response.usage.total_tokens,
                        "LLM call completed"
                    );
                    Ok(response)
                }
                Err(e) => {
                    metrics().llm_call_failed(start.elapsed());
                    warn!(error = %e, "LLM call failed");
                    Err(LeadError::from(e))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Execute calls in order; every call gets exactly one output
    async fn execute_tool_calls(
        &self,
        tool_calls: &[ToolCall],
        invocations: &mut Vec<ToolInvocation>,
    ) -> Vec<Value> {
        let max_calls = self.budget.max_tool_calls as usize;
        let mut outputs = Vec::with_capacity(tool_calls.len());

        for call in tool_calls {
            if invocations.len() >= max_calls {
                warn!(tool = %call.name, max_calls, "Tool call budget exhausted");
                outputs.push(json!({
                    "error": format!("Tool call limit of {max_calls} reached; answer with what you have")
                }));
                continue;
            }

            let invocation = self.execute_single_tool_call(call).await;
            outputs.push(invocation.output.clone());
            invocations.push(invocation);
        }

        outputs
    }

    async fn execute_single_tool_call(&self, call: &ToolCall) -> ToolInvocation {
        let span = crate::tool_span!(tool = %call.name, call_id = %call.id);

        async {
            debug!(arguments = %call.arguments, "Executing tool");
            let start = Instant::now();
            let outcome = self
                .tool_system
                .execute_tool(&call.name, &call.arguments)
                .await;
            metrics().tool_executed(&call.name, start.elapsed(), outcome.is_ok());

            let (output, success) = match outcome {
                Ok(output) => (output, true),
                Err(e) => {
                    warn!(error = %e, "Tool failed; returning the error to the model");
                    (json!({ "error": e.to_string() }), false)
                }
            };

            ToolInvocation {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
                output,
                success,
            }
        }
        .instrument(span)
        .await
    }
}

/// Fill `tools_result` fields the model left empty from local tool output
pub fn backfill_tools_result(result: &mut PipelineResult, invocations: &[ToolInvocation]) {
    for invocation in invocations.iter().filter(|i| i.success) {
        let output = &invocation.output;
        let tools = &mut result.tools_result;

        if tools.base_price_inr.is_none() {
            tools.base_price_inr = output.get("base_price_inr").and_then(Value::as_f64);
        }
        if tools.priority.is_none() {
            tools.priority = output
                .get("priority")
                .and_then(Value::as_str)
                .and_then(Urgency::parse);
        }
        if tools.provider_summary.is_none() {
            tools.provider_summary = output
                .get("provider_summary")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
    }
}
