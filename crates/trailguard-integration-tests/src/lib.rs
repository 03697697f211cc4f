//! End-to-end integration tests for TrailGuard
//!
//! These tests wire together masking, request assembly and the Gemini
//! backend to verify the full outbound flow.

#[cfg(test)]
mod e2e_tests {
    use serde_json::json;
    use trailguard_core::{Cell, Column, Table};
    use trailguard_egress::{GeminiConfig, ResilientAnalysisClient, RetryPolicy};
    use trailguard_pii::MaskingEngine;
    use trailguard_report::{AuditTemplate, ContextLimits, MaskedContent, build_request};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, method, path},
    };

    #[tokio::test]
    async fn test_e2e_request_parts_carry_template_and_masked_table() {
        let mock_server = MockServer::start().await;

        let table = Table::new(vec![Column::new(
            "Operator",
            vec![Cell::from("alice"), Cell::from("bob")],
        )])
        .unwrap();
        let masked = MaskingEngine::default().mask_table_default(&table).unwrap();
        let content = MaskedContent::from_table(&masked, &ContextLimits::default());
        let template = AuditTemplate::current();
        let request = build_request(&content, &template, None);

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-flash-latest:generateContent"))
            .and(body_partial_json(json!({
                "contents": [{
                    "parts": [
                        {"text": template.compose(None)},
                        {"text": "| Operator |\n|---|\n| <PERSON_1> |\n| <PERSON_2> |\n"}
                    ]
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "#### 1. Compliance Summary"}]}
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ResilientAnalysisClient::gemini(
            GeminiConfig::new("test-key").with_base_url(mock_server.uri()),
            RetryPolicy::no_retry(),
        )
        .unwrap();

        let outcome = client.analyze(request).await.unwrap();
        assert_eq!(outcome.text, "#### 1. Compliance Summary");
    }
}
