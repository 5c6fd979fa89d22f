use serde::Deserialize;

use crate::{
    error::PredictionError,
    model::{Assessment, RiskLevel, RiskPrediction},
};

/// Prefix of the legacy `prediction` string when inference fails.
pub const ERROR_PREFIX: &str = "Error getting AI response: ";

#[derive(Debug, Deserialize)]
struct RawPrediction {
    prediction: String,
    #[serde(default)]
    reasoning: String,
}

/// Pull the outermost JSON object out of free-form model text.
///
/// Models frequently wrap the answer in a Markdown fence or add a sentence
/// around it, so everything outside the first `{` and the last `}` is dropped.
fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parse and validate the model's answer.
pub fn parse_prediction(text: &str) -> Result<RiskPrediction, PredictionError> {
    let object = extract_object(text)
        .ok_or_else(|| PredictionError::MalformedOutput("no JSON object found".to_string()))?;

    let raw: RawPrediction = serde_json::from_str(object)
        .map_err(|e| PredictionError::MalformedOutput(e.to_string()))?;

    let prediction = raw.prediction.parse::<RiskLevel>().map_err(PredictionError::MalformedOutput)?;

    Ok(RiskPrediction { prediction, reasoning: raw.reasoning })
}

/// Fold the inference outcome into the two response fields: the legacy string
/// and the typed assessment.
pub fn summarize(outcome: &Result<String, PredictionError>) -> (String, Assessment) {
    match outcome {
        Ok(text) => {
            let assessment = match parse_prediction(text) {
                Ok(p) => Assessment::Ok { prediction: p.prediction, reasoning: p.reasoning },
                Err(e) => Assessment::Error { kind: e.kind().to_string(), message: e.to_string() },
            };
            (text.clone(), assessment)
        }
        Err(e) => (
            format!("{ERROR_PREFIX}{e}"),
            Assessment::Error { kind: e.kind().to_string(), message: e.to_string() },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let p = parse_prediction(r#"{"prediction": "High", "reasoning": "Hot and dry."}"#).unwrap();
        assert_eq!(p.prediction, RiskLevel::High);
        assert_eq!(p.reasoning, "Hot and dry.");
    }

    #[test]
    fn parses_fenced_json_with_chatter() {
        let text = "Here you go:\n```json\n{ \"prediction\": \"extreme\", \"reasoning\": \"x\" }\n```\n";
        let p = parse_prediction(text).unwrap();
        assert_eq!(p.prediction, RiskLevel::Extreme);
    }

    #[test]
    fn rejects_text_without_object() {
        let err = parse_prediction("I cannot answer that.").unwrap_err();
        assert_eq!(err.kind(), "malformed_output");
    }

    #[test]
    fn rejects_unknown_label() {
        let err = parse_prediction(r#"{"prediction": "Catastrophic", "reasoning": ""}"#).unwrap_err();
        assert!(err.to_string().contains("Catastrophic"));
    }

    #[test]
    fn upstream_error_keeps_body_in_legacy_field() {
        let outcome = Err(PredictionError::Status { status: 429, body: "rate limited".into() });
        let (legacy, assessment) = summarize(&outcome);

        assert_eq!(legacy, "Error getting AI response: rate limited");
        assert_eq!(
            assessment,
            Assessment::Error { kind: "upstream_status".into(), message: "rate limited".into() }
        );
    }

    #[test]
    fn malformed_output_is_passed_through_verbatim() {
        let outcome = Ok("not json at all".to_string());
        let (legacy, assessment) = summarize(&outcome);

        assert_eq!(legacy, "not json at all");
        assert!(matches!(assessment, Assessment::Error { ref kind, .. } if kind == "malformed_output"));
    }
}
