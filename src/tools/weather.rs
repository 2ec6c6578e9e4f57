use std::convert::Infallible;

use rig::{completion::ToolDefinition, tool::Tool};
use schemars::JsonSchema;
use serde::Deserialize;
use thiserror::Error;

use super::parameters_schema;

pub const MISSING_KEY_MESSAGE: &str =
    "Weather API key not configured. Please set WEATHER_API_KEY environment variable.";

/// How the weather observation is phrased for the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportStyle {
    /// One line in metric units, used by the ReAct agent.
    Brief,
    /// Multi-line report in imperial units, used by the agent executor.
    Detailed,
}

impl ReportStyle {
    fn units(self) -> &'static str {
        match self {
            ReportStyle::Brief => "metric",
            ReportStyle::Detailed => "imperial",
        }
    }

    fn error_prefix(self) -> &'static str {
        match self {
            ReportStyle::Brief => "Error fetching weather: ",
            ReportStyle::Detailed => "Error getting weather: ",
        }
    }

    fn description(self) -> &'static str {
        match self {
            ReportStyle::Brief => "Get current weather information for a city.",
            ReportStyle::Detailed => "Get current weather information for a specific location",
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WeatherArgs {
    /// The city and state/country, e.g. 'New York, NY' or 'London, UK'
    pub location: String,
}

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("{status} {message}")]
    Status { status: u16, message: String },
    #[error("response has no '{0}' entry")]
    MissingField(&'static str),
}

/// Current conditions as returned by the OpenWeatherMap `weather` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Observation {
    pub name: String,
    pub sys: Sys,
    pub main: Main,
    pub weather: Vec<Condition>,
    pub wind: Wind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sys {
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Main {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Condition {
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Wind {
    pub speed: f64,
}

#[derive(Deserialize)]
struct ApiFailure {
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct WeatherTool {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    style: ReportStyle,
}

impl WeatherTool {
    pub fn new(api_key: Option<String>, base_url: impl Into<String>, style: ReportStyle) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            style,
        }
    }

    pub fn style(&self) -> ReportStyle {
        self.style
    }

    /// Fetch the weather for `location` and phrase it. Never fails: problems become the report.
    pub async fn report(&self, location: &str) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            return MISSING_KEY_MESSAGE.to_owned();
        };

        match (self.fetch(location, api_key).await, self.style) {
            (Ok(observation), ReportStyle::Brief) => brief_report(location, &observation),
            (Ok(observation), ReportStyle::Detailed) => match detailed_report(&observation) {
                Ok(report) => report,
                Err(err) => format!("{}{err}", self.style.error_prefix()),
            },
            (Err(err), style) => format!("{}{err}", style.error_prefix()),
        }
    }

    async fn fetch(&self, location: &str, api_key: &str) -> Result<Observation, WeatherError> {
        tracing::debug!(%location, units = self.style.units(), "requesting weather");
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", location),
                ("appid", api_key),
                ("units", self.style.units()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiFailure>()
                .await
                .map(|failure| failure.message)
                .unwrap_or_default();
            return Err(WeatherError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<Observation>().await?)
    }
}

impl Tool for WeatherTool {
    const NAME: &'static str = "get_weather";

    type Error = Infallible;
    type Args = WeatherArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_owned(),
            description: self.style.description().to_owned(),
            parameters: parameters_schema::<WeatherArgs>(),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        // rig wants a `Sync` future; the request future is not, so it runs on its own task.
        let tool = self.clone();
        let report = tokio::spawn(async move { tool.report(&args.location).await }).await;
        Ok(report.unwrap_or_else(|err| format!("{}{err}", self.style.error_prefix())))
    }
}

pub fn brief_report(location: &str, observation: &Observation) -> String {
    let description = observation
        .weather
        .first()
        .map(|condition| condition.description.as_str())
        .unwrap_or("unknown conditions");
    format!(
        "Weather in {location}: {}°C, {description}, humidity: {}%",
        observation.main.temp, observation.main.humidity
    )
}

pub fn detailed_report(observation: &Observation) -> Result<String, WeatherError> {
    let condition = observation
        .weather
        .first()
        .ok_or(WeatherError::MissingField("weather"))?;
    Ok(format!(
        "Weather in {}, {}:\n\
         Temperature: {:.1}°F (feels like {:.1}°F)\n\
         Conditions: {}\n\
         Humidity: {}%\n\
         Wind Speed: {} mph \n",
        observation.name,
        observation.sys.country,
        observation.main.temp,
        observation.main.feels_like,
        title_case(&condition.description),
        observation.main.humidity,
        observation.wind.speed,
    ))
}

/// Upper-case the first letter of every word and lower-case the rest.
pub fn title_case(text: &str) -> String {
    let mut previous_is_letter = false;
    text.chars()
        .map(|c| {
            let mapped = if previous_is_letter {
                c.to_lowercase().collect::<String>()
            } else {
                c.to_uppercase().collect::<String>()
            };
            previous_is_letter = c.is_alphabetic();
            mapped
        })
        .collect()
}
