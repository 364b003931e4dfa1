//! Weather Tool
//!
//! Mock current conditions for a handful of cities. An unknown city is an
//! ordinary answer, not a failure.

use async_trait::async_trait;

use swap_agent_core::{
    AgentError, Result as CoreResult, Tool, ToolInput, ToolOutput, ToolSchema, tool::ParameterSchema,
};

use super::legacy_text;

/// (city, temperature, condition, humidity)
const MOCK_WEATHER: [(&str, &str, &str, &str); 5] = [
    ("New York", "22°C", "Partly Cloudy", "65%"),
    ("London", "15°C", "Rainy", "80%"),
    ("Tokyo", "28°C", "Sunny", "55%"),
    ("Sydney", "18°C", "Clear", "70%"),
    ("Paris", "20°C", "Cloudy", "75%"),
];

pub struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "weather".into(),
            description: "Get current weather information for a location (mock data for demo)".into(),
            parameters: vec![ParameterSchema::required("location", "string", "City name")],
            category: Some("utility".into()),
            has_side_effects: false,
            accepts_structured_args: false,
            needs_caller_context: false,
        }
    }

    async fn invoke(&self, input: ToolInput) -> CoreResult<ToolOutput> {
        let location = legacy_text(&input, &["input", "location"]);
        if location.is_empty() {
            return Err(AgentError::ToolValidation("Location is required".into()));
        }

        let found = MOCK_WEATHER
            .iter()
            .find(|(city, ..)| city.eq_ignore_ascii_case(&location));

        let text = match found {
            Some((_, temp, condition, humidity)) => {
                format!("Weather in {location}: {temp}, {condition}, Humidity: {humidity}")
            }
            None => {
                let cities: Vec<&str> = MOCK_WEATHER.iter().map(|(city, ..)| *city).collect();
                format!(
                    "Weather data not available for {location}. Available cities: {}",
                    cities.join(", ")
                )
            }
        };
        Ok(ToolOutput::text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(input: &str) -> String {
        let output = WeatherTool.invoke(ToolInput::Text(input.into())).await.unwrap();
        output.into_value().as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_known_city() {
        assert_eq!(
            run("tokyo").await,
            "Weather in tokyo: 28°C, Sunny, Humidity: 55%"
        );
        assert!(run(r#"{"location": "Paris"}"#).await.starts_with("Weather in Paris"));
    }

    #[tokio::test]
    async fn test_unsupported_city_is_not_an_error() {
        assert_eq!(
            run("Atlantis").await,
            "Weather data not available for Atlantis. Available cities: New York, London, Tokyo, Sydney, Paris"
        );
    }
}
