use anyhow::{Context, Result};

use crate::model::RiskRecord;

/// Escalation instruction embedded verbatim in every prompt.
pub const ESCALATION_RULE: &str = "Use a conservative approach: if multiple high-risk indicators \
(e.g., temperature > 40°C, humidity < 20%, wind > 20 m/s, zero precipitation, significant fire activity) \
are present, the risk should be marked as High";

const RULES: &str = r#"Rules:
- Always respond with JSON. Format: { "prediction": "Moderate", "reasoning": "..." }
- Never say that you cannot predict due to missing data. Use all available signals.
- Use the latitude and longitude to estimate the types and amount of vegetation present in the region.
- Consider NDVI, burn history, temperature, humidity, precipitation, windspeed, AQI, fire activity, population density, elevation, and more.
- Reason through missing values intelligently based on the other data.
- Do not break character. Only return the JSON."#;

/// Build the instruction sent to the model, embedding `record` as indented JSON.
pub fn build_prompt(record: &RiskRecord) -> Result<String> {
    let data =
        serde_json::to_string_pretty(record).context("Failed to serialize risk record to JSON")?;

    Ok(format!(
        r#"Based on the following environmental and physical data, predict the wildfire risk in the area and return the result as a JSON object with two fields: "prediction" (values: Low, Moderate, High, or Extreme) and "reasoning" (detailed explanation why you made that prediction).

Data:
{data}

Use NDVI & lat long (do not mention lat and long in your answer, only the NDVI) for type and amount of vegetation.
Determine the wildfire risk as Low, Moderate, High, or Extreme. {ESCALATION_RULE}.

{RULES}
"#
    ))
}
