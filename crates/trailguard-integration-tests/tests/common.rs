//! Common test utilities for integration tests

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use trailguard_core::{AnalysisRequest, Cell, Column, Table};
use trailguard_egress::{AnalysisBackend, BackendError};

/// Raw identifiers used in the fixtures; none may leave the process
#[allow(dead_code)]
pub const RAW_IDENTIFIERS: &[&str] = &[
    "Alice Smith",
    "Bob Jones",
    "10.0.0.1",
    "10.0.0.2",
    "alice.smith@pharma.example",
];

/// Backend that records every request and answers with a fixed report
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct RecordingBackend {
    requests: Arc<Mutex<Vec<AnalysisRequest>>>,
    response: String,
}

#[allow(dead_code)]
impl RecordingBackend {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            requests: Arc::default(),
            response: response.into(),
        }
    }

    pub fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisBackend for RecordingBackend {
    async fn generate(&self, request: AnalysisRequest) -> Result<String, BackendError> {
        self.requests.lock().unwrap().push(request);
        Ok(self.response.clone())
    }
}

/// Small audit trail with names, IPs and an email in a free-text column
#[allow(dead_code)]
pub fn audit_table() -> Table {
    let text = |values: &[&str]| values.iter().map(|v| Cell::from(*v)).collect::<Vec<_>>();

    Table::new(vec![
        Column::new("User", text(&["Alice Smith", "Bob Jones", "Alice Smith"])),
        Column::new("Action", text(&["Login", "Delete File", "Logout"])),
        Column::new("IP", text(&["10.0.0.1", "10.0.0.2", "10.0.0.1"])),
        Column::new(
            "Detail",
            text(&[
                "Session opened",
                "Raw data removed, notified alice.smith@pharma.example",
                "Session closed",
            ]),
        ),
        Column::new("Batch", vec![Cell::Int(1001), Cell::Int(1001), Cell::Null]),
    ])
    .unwrap()
}

/// Gemini `generateContent` response carrying `text`
#[allow(dead_code)]
pub fn gemini_response(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

#[allow(dead_code)]
pub const SAMPLE_REPORT: &str = "#### 1. Compliance Summary\n\
**Assessment:** [Major Observation]\n\n\
#### 2. Detailed Findings\n\
* **Severity:** Major\n\
* **Observation:** Raw data deleted by <PERSON_2> without a documented reason.\n\
* **Regulatory Reference:** 21 CFR 211.68\n";

#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("debug")
        .try_init();
}
