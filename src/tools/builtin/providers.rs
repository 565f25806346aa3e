//! Provider availability lookup tool

use crate::tools::{Tool, ToolDescription, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};

pub const UNKNOWN_AVAILABILITY: &str = "Could not determine provider availability.";
pub const DEFAULT_AVAILABILITY: &str = "Providers might be available. We'll check for you!";

/// (service keyword, location keyword, summary)
const KNOWN_MATCHES: [(&str, &str, &str); 3] = [
    ("decoration", "gaya", "3 matching decorators available in Gaya."),
    ("tutor", "kankarbagh", "2 experienced tutors found in Kankarbagh."),
    (
        "assignment",
        "online",
        "Multiple assignment writers available for online support.",
    ),
];

#[derive(Default)]
pub struct FindProvidersTool;

impl FindProvidersTool {
    pub fn new() -> Self {
        Self
    }

    /// Availability summary for a service and location (pure function)
    pub fn summarize(service_type: Option<&str>, location: Option<&str>) -> &'static str {
        let (Some(service), Some(location)) = (
            service_type.filter(|s| !s.is_empty()),
            location.filter(|l| !l.is_empty()),
        ) else {
            return UNKNOWN_AVAILABILITY;
        };

        let service = service.to_lowercase();
        let location = location.to_lowercase();

        KNOWN_MATCHES
            .iter()
            .find(|(svc, loc, _)| service.contains(svc) && location.contains(loc))
            .map(|(_, _, summary)| *summary)
            .unwrap_or(DEFAULT_AVAILABILITY)
    }
}

#[async_trait]
impl Tool for FindProvidersTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: super::FIND_PROVIDERS.to_string(),
            description: "Finds a short list/summary of suitable providers for a given service type and location."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "service_type": {
                        "type": "string",
                        "description": "The type of service to find providers for."
                    },
                    "location": {
                        "type": "string",
                        "description": "The location where the service is needed."
                    }
                },
                "required": ["service_type", "location"]
            }),
        }
    }

    async fn initialize(&mut self, _config: Option<&Value>) -> Result<(), ToolError> {
        Ok(())
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let summary = Self::summarize(
            parameters["service_type"].as_str(),
            parameters["location"].as_str(),
        );
        Ok(json!({ "provider_summary": summary }))
    }
}
