//! Plain-text summaries of tool results for terminal output.

use serde_json::Value;

use crate::models::{ToolInvocation, ToolName};

/// Render a tool invocation as a short multi-line card
pub fn render_card(invocation: &ToolInvocation) -> String {
    let result = &invocation.result;
    if field(result, "status") == "unavailable" {
        return unavailable_card(invocation);
    }

    let mut lines = match invocation.tool_name {
        ToolName::GetWeather => weather_card(result),
        ToolName::GetF1Results => motorsport_card(result),
        ToolName::GetStockPrice => equity_card(result),
    };
    if field(result, "source") == "demo" {
        lines.push("  (sample data)".to_string());
    }
    lines.join("\n")
}

fn unavailable_card(invocation: &ToolInvocation) -> String {
    let subject = match invocation.tool_name {
        ToolName::GetWeather => field(&invocation.result, "city"),
        ToolName::GetF1Results => "Formula 1",
        ToolName::GetStockPrice => field(&invocation.result, "symbol"),
    };
    format!("[{}] {}: unavailable", label(invocation.tool_name), subject)
}

fn weather_card(result: &Value) -> Vec<String> {
    vec![
        format!(
            "[weather] {}, {}",
            field(result, "city"),
            field(result, "country")
        ),
        format!(
            "  {:.1}°C, {}",
            number(result, "temperatureCelsius"),
            field(result, "description")
        ),
        format!(
            "  humidity {:.0}%  wind {:.1} m/s",
            number(result, "humidityPercent"),
            number(result, "windSpeedMetersPerSecond")
        ),
    ]
}

fn motorsport_card(result: &Value) -> Vec<String> {
    match field(result, "type") {
        "latest-race" => {
            let mut lines = vec![format!(
                "[f1] {} ({})",
                field(result, "raceName"),
                field(result, "date")
            )];
            lines.extend(entries(result, "results").map(|entry| {
                format!(
                    "  P{} {} ({}) {}",
                    field(entry, "position"),
                    field(entry, "driver"),
                    field(entry, "constructor"),
                    field(entry, "time")
                )
                .trim_end()
                .to_string()
            }));
            lines
        }
        "standings" => {
            let mut lines = vec![format!(
                "[f1] {} driver standings",
                field(result, "season")
            )];
            lines.extend(entries(result, "standings").map(|entry| {
                format!(
                    "  {}. {} ({}) {} pts",
                    field(entry, "position"),
                    field(entry, "driver"),
                    field(entry, "constructor"),
                    field(entry, "points")
                )
            }));
            lines
        }
        _ => vec![
            format!("[f1] Next: {}", field(result, "raceName")),
            format!(
                "  {}, {}",
                field(result, "circuit"),
                field(result, "location")
            ),
            format!("  {} {}", field(result, "date"), field(result, "time"))
                .trim_end()
                .to_string(),
        ],
    }
}

fn equity_card(result: &Value) -> Vec<String> {
    vec![
        format!(
            "[stock] {} {} ({}, {})",
            field(result, "symbol"),
            field(result, "price"),
            field(result, "change"),
            field(result, "changePercent")
        ),
        format!(
            "  open {}  high {}  low {}  volume {}",
            field(result, "open"),
            field(result, "high"),
            field(result, "low"),
            field(result, "volume")
        ),
    ]
}

fn label(tool: ToolName) -> &'static str {
    match tool {
        ToolName::GetWeather => "weather",
        ToolName::GetF1Results => "f1",
        ToolName::GetStockPrice => "stock",
    }
}

fn field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn number(value: &Value, key: &str) -> f64 {
    value.get(key).and_then(Value::as_f64).unwrap_or_default()
}

fn entries<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}
