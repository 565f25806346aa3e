//! Plain-text lead cards for the terminal and the `/card` endpoint

use super::{Lead, LeadOutcome, PipelineResult};
use std::fmt;

/// Render a lead the way the dashboard shows it
pub fn render_card(lead: &Lead) -> String {
    LeadCard(lead).to_string()
}

/// Display adapter for a lead card
pub struct LeadCard<'a>(pub &'a Lead);

impl fmt::Display for LeadCard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lead = self.0;
        match &lead.outcome {
            LeadOutcome::Processing => {
                writeln!(f, "[{}] {} - processing...", lead.short_id(), lead.customer_name)
            }
            LeadOutcome::Failed { error } => {
                writeln!(f, "[{}] {} - Error Processing Lead", lead.short_id(), lead.customer_name)?;
                writeln!(f, "  {error}")
            }
            LeadOutcome::Processed { result, .. } => write_processed(f, lead, result),
        }
    }
}

fn write_processed(f: &mut fmt::Formatter<'_>, lead: &Lead, result: &PipelineResult) -> fmt::Result {
    let parsed = &result.parsed_lead;
    let tools = &result.tools_result;

    let mut badges = vec![
        parsed.role.as_str().to_uppercase(),
        parsed.intent_type.label().to_uppercase(),
    ];
    if let Some(priority) = tools.priority {
        badges.push(format!("{} PRIORITY", priority.as_str().to_uppercase()));
    }

    writeln!(f, "{} (ID: {})  [{}]", lead.customer_name, lead.short_id(), badges.join("] ["))?;
    writeln!(f, "Original message: \"{}\"", lead.raw_message)?;
    writeln!(f)?;

    writeln!(f, "Extracted details")?;
    writeln!(f, "  Service:  {}", parsed.service_type.as_deref().unwrap_or("N/A"))?;
    writeln!(f, "  Budget:   {}", format_budget(parsed.budget))?;
    writeln!(f, "  Date:     {}", parsed.date.as_deref().unwrap_or("Not Specified"))?;
    writeln!(f, "  Location: {}", parsed.location.as_deref().unwrap_or("Unknown"))?;
    if let Some(notes) = &parsed.notes {
        writeln!(f, "  Notes:    {notes}")?;
    }
    writeln!(f)?;

    writeln!(f, "Tool insights")?;
    if let Some(price) = tools.base_price_inr.filter(|p| *p > 0.0) {
        writeln!(f, "  Base price:      ₹{} (starting)", format_amount(price))?;
    }
    if let Some(summary) = &tools.provider_summary {
        writeln!(f, "  Provider status: {summary}")?;
    }
    let summary = if result.summary.is_empty() {
        "N/A"
    } else {
        result.summary.as_str()
    };
    writeln!(f, "  Lead summary:    {summary}")?;
    writeln!(f)?;

    writeln!(f, "Draft reply")?;
    write_indented(f, &result.reply_message)?;

    if let Some(follow_up) = &result.follow_up_message {
        writeln!(f)?;
        writeln!(f, "Suggested follow-up")?;
        write_indented(f, follow_up)?;
    }

    writeln!(f)?;
    writeln!(f, "Current status: {}", lead.status)
}

fn write_indented(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    for line in text.lines() {
        writeln!(f, "  {line}")?;
    }
    Ok(())
}

fn format_budget(budget: Option<f64>) -> String {
    match budget {
        Some(b) if b > 0.0 => format!("₹{}", format_amount(b)),
        _ => "Not Specified".to_string(),
    }
}

/// Whole rupee amounts print without a fractional part
fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{amount:.2}")
    }
}
