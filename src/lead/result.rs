//! Parsing of the model's final JSON answer
//!
//! The model is asked for a fixed JSON shape but regularly wraps it in
//! Markdown fences, drops optional keys, or returns `null` for whole
//! sections. Everything here is lenient about shape and strict about JSON.

use super::{IntentType, LeadRole, LeadStatus, ParsedLead, PipelineResult, ToolsResult, Urgency};
use crate::error::{LeadError, LeadResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Remove ```json / ``` fences and surrounding whitespace
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse and normalize the model's final answer
///
/// `fallback_status` is used when the model omits `new_status` or sends a
/// value outside the status set.
pub fn parse_model_output(text: &str, fallback_status: LeadStatus) -> LeadResult<PipelineResult> {
    let cleaned = strip_code_fences(text);
    let value: Value = serde_json::from_str(&cleaned).map_err(|e| {
        LeadError::invalid_model_output(format!("AI returned invalid JSON structure: {e}"))
    })?;

    let root = value.as_object().ok_or_else(|| {
        LeadError::invalid_model_output("AI returned invalid JSON structure: expected an object")
    })?;

    Ok(PipelineResult {
        parsed_lead: parse_lead_section(section(root, "parsed_lead")),
        tools_result: parse_tools_section(section(root, "tools_result")),
        reply_message: string_field(root, "reply_message").unwrap_or_default(),
        follow_up_message: string_field(root, "follow_up_message")
            .filter(|m| !m.trim().is_empty()),
        new_status: string_field(root, "new_status")
            .and_then(|s| LeadStatus::parse(&s))
            .unwrap_or(fallback_status),
        summary: string_field(root, "summary").unwrap_or_default(),
    })
}

/// A nested object; `None` when missing or null
fn section<'a>(root: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    root.get(key).and_then(Value::as_object)
}

fn parse_lead_section(obj: Option<&Map<String, Value>>) -> ParsedLead {
    let Some(obj) = obj else {
        return ParsedLead::default();
    };

    ParsedLead {
        role: string_field(obj, "role")
            .map(|s| LeadRole::parse(&s))
            .unwrap_or_default(),
        intent_type: string_field(obj, "intent_type")
            .map(|s| IntentType::parse(&s))
            .unwrap_or_default(),
        service_type: string_field(obj, "service_type"),
        location: string_field(obj, "location"),
        date: string_field(obj, "date"),
        budget: number_field(obj, "budget"),
        urgency: string_field(obj, "urgency").and_then(|s| Urgency::parse(&s)),
        notes: string_field(obj, "notes"),
    }
}

fn parse_tools_section(obj: Option<&Map<String, Value>>) -> ToolsResult {
    let Some(obj) = obj else {
        return ToolsResult::default();
    };

    ToolsResult {
        base_price_inr: number_field(obj, "base_price_inr"),
        priority: string_field(obj, "priority").and_then(|s| Urgency::parse(&s)),
        provider_summary: string_field(obj, "provider_summary"),
    }
}

/// String value; blank strings and the "null"/"unknown" placeholders count as absent
fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty()
                || trimmed.eq_ignore_ascii_case("null")
                || trimmed.eq_ignore_ascii_case("unknown")
            {
                None
            } else {
                Some(s.clone())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// One amount with optional thousands separators and decimals
static AMOUNT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").ok());

/// Numeric value; numeric strings such as "2000", "Rs. 2000" or "₹2,000" are accepted
fn number_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

/// Single amount in free text; ranges, negatives and suffixed shorthand
/// like "10k" are ambiguous and yield `None`
fn parse_amount(text: &str) -> Option<f64> {
    let pattern = AMOUNT.as_ref()?;
    let mut matches = pattern.find_iter(text);
    let amount = matches.next()?;
    if matches.next().is_some() {
        return None;
    }

    let before = text[..amount.start()].trim_end().chars().next_back();
    let after = text[amount.end()..].chars().next();
    if before == Some('-') || after.is_some_and(|c| c.is_alphabetic()) {
        return None;
    }

    amount.as_str().replace(',', "").parse().ok()
}
