//! Demo messages for trying the desk without real traffic

use serde::Serialize;

/// A canned lead for the "load sample" shortcut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleLead {
    pub name: &'static str,
    pub message: &'static str,
    pub kind: &'static str,
}

const SAMPLE_LEADS: [SampleLead; 5] = [
    SampleLead {
        name: "Rahul Kumar",
        message: "Bhai kal birthday decoration chahiye Gaya me, budget 2000 hoga, kar paoge?",
        kind: "customer lead",
    },
    SampleLead {
        name: "Sneha G.",
        message: "I need a home tutor for class 10 math in Kankarbagh area. Urgent requirement.",
        kind: "customer lead",
    },
    SampleLead {
        name: "Amit S.",
        message: "Hello, I am a photographer based in Patna. How can I list my services on LocalBookr?",
        kind: "provider lead",
    },
    SampleLead {
        name: "Priya D.",
        message: "Mujhe apni beti ke liye ek mehendi artist chahiye, shaadi ke liye. Location Delhi, budget 10000. High urgency.",
        kind: "customer lead",
    },
    SampleLead {
        name: "LocalBookr Team",
        message: "What is LocalBookr about?",
        kind: "general question",
    },
];

/// All demo leads, in display order
pub fn sample_leads() -> &'static [SampleLead] {
    &SAMPLE_LEADS
}

/// Demo lead by zero-based index
pub fn sample_lead(index: usize) -> Option<&'static SampleLead> {
    SAMPLE_LEADS.get(index)
}
