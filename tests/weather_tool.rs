use rigbook::tools::{ReportStyle, WeatherTool};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn london() -> serde_json::Value {
    json!({
        "name": "London",
        "sys": { "country": "GB" },
        "main": { "temp": 14.2, "feels_like": 13.1, "humidity": 81 },
        "weather": [{ "description": "broken clouds" }],
        "wind": { "speed": 4.6 }
    })
}

async fn server_returning(units: &str, response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("appid", "test-key"))
        .and(query_param("units", units))
        .respond_with(response)
        .expect(1)
        .mount(&server)
        .await;
    server
}

fn tool(server: &MockServer, style: ReportStyle) -> WeatherTool {
    WeatherTool::new(
        Some("test-key".to_owned()),
        format!("{}/weather", server.uri()),
        style,
    )
}

#[tokio::test]
async fn brief_report_in_metric_units() {
    let server =
        server_returning("metric", ResponseTemplate::new(200).set_body_json(london())).await;

    let report = tool(&server, ReportStyle::Brief).report("London").await;

    assert_eq!(report, "Weather in London: 14.2°C, broken clouds, humidity: 81%");
}

#[tokio::test]
async fn detailed_report_in_imperial_units() {
    let server =
        server_returning("imperial", ResponseTemplate::new(200).set_body_json(london())).await;

    let report = tool(&server, ReportStyle::Detailed).report("London, UK").await;

    assert_eq!(
        report,
        "Weather in London, GB:\n\
         Temperature: 14.2°F (feels like 13.1°F)\n\
         Conditions: Broken Clouds\n\
         Humidity: 81%\n\
         Wind Speed: 4.6 mph \n"
    );
}

#[tokio::test]
async fn brief_report_prefixes_http_errors() {
    let server = server_returning(
        "metric",
        ResponseTemplate::new(404)
            .set_body_json(json!({ "cod": "404", "message": "city not found" })),
    )
    .await;

    let report = tool(&server, ReportStyle::Brief).report("Atlantis").await;

    assert_eq!(report, "Error fetching weather: 404 city not found");
}

#[tokio::test]
async fn detailed_report_prefixes_failures() {
    let server = server_returning(
        "imperial",
        ResponseTemplate::new(401)
            .set_body_json(json!({ "cod": 401, "message": "Invalid API key" })),
    )
    .await;

    let report = tool(&server, ReportStyle::Detailed).report("Paris").await;

    assert_eq!(report, "Error getting weather: 401 Invalid API key");
}

#[tokio::test]
async fn location_is_sent_as_the_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("q", "New York, NY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(london()))
        .expect(1)
        .mount(&server)
        .await;

    let tool = WeatherTool::new(Some("test-key".to_owned()), server.uri(), ReportStyle::Brief);
    let report = tool.report("New York, NY").await;

    assert!(report.starts_with("Weather in New York, NY: "));
}

#[tokio::test]
async fn brief_report_prefixes_unreadable_bodies() {
    let server =
        server_returning("metric", ResponseTemplate::new(200).set_body_string("not json")).await;

    let report = tool(&server, ReportStyle::Brief).report("London").await;

    assert!(report.starts_with("Error fetching weather: "), "{report}");
}
