//! Formula 1 results, standings and schedule from an Ergast-compatible API.

use chrono::{Datelike, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use strum::{Display, EnumString};

use super::{ProviderError, get_json, record_fallback, with_deadline};
use crate::config::MotorsportProviderConfig;
use crate::models::ToolName;

/// Which slice of the season the user asked about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum RaceView {
    #[strum(to_string = "latest-race", serialize = "last-race")]
    #[serde(rename = "latest-race", alias = "last-race")]
    LatestRace,
    #[strum(serialize = "standings")]
    #[serde(rename = "standings")]
    Standings,
    #[strum(serialize = "next-race")]
    #[serde(rename = "next-race")]
    NextRace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MotorsportQuery {
    pub view: RaceView,
    /// Podium-sized lists instead of the full top ten
    pub compact: bool,
}

impl MotorsportQuery {
    fn limit(&self) -> usize {
        match (self.view, self.compact) {
            (RaceView::LatestRace, true) => 3,
            (RaceView::Standings, true) => 5,
            _ => 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Demo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MotorsportReport {
    LatestRace(RaceResults),
    Standings(DriverStandings),
    NextRace(UpcomingRace),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceResults {
    pub source: DataSource,
    pub season: String,
    pub round: String,
    pub race_name: String,
    pub circuit: String,
    pub date: String,
    pub results: Vec<ResultEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultEntry {
    pub position: String,
    pub driver: String,
    pub constructor: String,
    pub time: String,
    pub points: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverStandings {
    pub source: DataSource,
    pub season: String,
    pub standings: Vec<StandingEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StandingEntry {
    pub position: String,
    pub driver: String,
    pub constructor: String,
    pub points: String,
    pub wins: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingRace {
    pub source: DataSource,
    pub season: String,
    pub round: String,
    pub race_name: String,
    pub circuit: String,
    pub location: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

// Ergast wire format

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErgastResponse {
    #[serde(rename = "MRData")]
    mr_data: MrData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MrData {
    #[serde(default)]
    race_table: Option<RaceTable>,
    #[serde(default)]
    standings_table: Option<StandingsTable>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RaceTable {
    #[serde(default)]
    races: Vec<ErgastRace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErgastRace {
    season: String,
    round: String,
    race_name: String,
    date: String,
    #[serde(default)]
    time: Option<String>,
    #[serde(rename = "Circuit")]
    circuit: ErgastCircuit,
    #[serde(rename = "Results", default)]
    results: Vec<ErgastResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErgastCircuit {
    circuit_name: String,
    #[serde(rename = "Location")]
    location: ErgastLocation,
}

#[derive(Debug, Deserialize)]
struct ErgastLocation {
    locality: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct ErgastResult {
    position: String,
    points: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(rename = "Driver")]
    driver: ErgastDriver,
    #[serde(rename = "Constructor")]
    constructor: ErgastConstructor,
    #[serde(rename = "Time", default)]
    time: Option<ErgastTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErgastDriver {
    given_name: String,
    family_name: String,
}

impl ErgastDriver {
    fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
    }
}

#[derive(Debug, Deserialize)]
struct ErgastConstructor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErgastTime {
    time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StandingsTable {
    #[serde(default)]
    standings_lists: Vec<StandingsList>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StandingsList {
    #[serde(rename = "season")]
    season: String,
    #[serde(default)]
    driver_standings: Vec<ErgastStanding>,
}

#[derive(Debug, Deserialize)]
struct ErgastStanding {
    position: String,
    points: String,
    wins: String,
    #[serde(rename = "Driver")]
    driver: ErgastDriver,
    #[serde(rename = "Constructors", default)]
    constructors: Vec<ErgastConstructor>,
}

#[derive(Clone)]
pub struct MotorsportExecutor {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl MotorsportExecutor {
    pub fn new(config: &MotorsportProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: super::http_client(timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Live data for the query, or the demo dataset for its view
    pub async fn execute(&self, query: MotorsportQuery) -> Value {
        let report = match with_deadline(self.timeout, self.fetch(query)).await {
            Ok(report) => report,
            Err(e) => {
                record_fallback(ToolName::GetF1Results, &query.view.to_string(), &e);
                demo_report(query)
            }
        };
        serde_json::to_value(report).unwrap_or(Value::Null)
    }

    pub async fn fetch(&self, query: MotorsportQuery) -> Result<MotorsportReport, ProviderError> {
        let limit = query.limit();
        match query.view {
            RaceView::LatestRace => {
                let race = self.first_race("current/last/results.json").await?;
                Ok(MotorsportReport::LatestRace(RaceResults {
                    source: DataSource::Live,
                    season: race.season,
                    round: race.round,
                    race_name: race.race_name,
                    circuit: race.circuit.circuit_name,
                    date: race.date,
                    results: race
                        .results
                        .into_iter()
                        .take(limit)
                        .map(|r| ResultEntry {
                            position: r.position,
                            driver: r.driver.full_name(),
                            constructor: r.constructor.name,
                            time: r
                                .time
                                .map(|t| t.time)
                                .or(r.status)
                                .unwrap_or_else(|| "N/A".to_string()),
                            points: r.points,
                        })
                        .collect(),
                }))
            }
            RaceView::Standings => {
                let url = format!("{}/current/driverStandings.json", self.base_url);
                let response: ErgastResponse = get_json(&self.client, &url).await?;
                let list = response
                    .mr_data
                    .standings_table
                    .and_then(|t| t.standings_lists.into_iter().next())
                    .ok_or_else(|| ProviderError::malformed("no standings list"))?;
                Ok(MotorsportReport::Standings(DriverStandings {
                    source: DataSource::Live,
                    season: list.season,
                    standings: list
                        .driver_standings
                        .into_iter()
                        .take(limit)
                        .map(|s| StandingEntry {
                            position: s.position,
                            driver: s.driver.full_name(),
                            constructor: s
                                .constructors
                                .into_iter()
                                .next()
                                .map(|c| c.name)
                                .unwrap_or_default(),
                            points: s.points,
                            wins: s.wins,
                        })
                        .collect(),
                }))
            }
            RaceView::NextRace => {
                let race = self.first_race("current/next.json").await?;
                Ok(MotorsportReport::NextRace(UpcomingRace {
                    source: DataSource::Live,
                    season: race.season,
                    round: race.round,
                    race_name: race.race_name,
                    location: format!(
                        "{}, {}",
                        race.circuit.location.locality, race.circuit.location.country
                    ),
                    circuit: race.circuit.circuit_name,
                    date: race.date,
                    time: race.time,
                }))
            }
        }
    }

    async fn first_race(&self, path: &str) -> Result<ErgastRace, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);
        let response: ErgastResponse = get_json(&self.client, &url).await?;
        response
            .mr_data
            .race_table
            .and_then(|t| t.races.into_iter().next())
            .ok_or_else(|| ProviderError::NotFound {
                message: format!("no race in {}", path),
            })
    }
}

/// Fixed dataset served when the provider is unreachable
pub fn demo_report(query: MotorsportQuery) -> MotorsportReport {
    let season = Utc::now().year().to_string();
    let limit = query.limit();
    let entry = |position: &str, driver: &str, constructor: &str| {
        (position.to_string(), driver.to_string(), constructor.to_string())
    };

    match query.view {
        RaceView::LatestRace => MotorsportReport::LatestRace(RaceResults {
            source: DataSource::Demo,
            season,
            round: "20".to_string(),
            race_name: "Demo Grand Prix".to_string(),
            circuit: "Demo Circuit".to_string(),
            date: "2024-11-24".to_string(),
            results: [
                (entry("1", "Max Verstappen", "Red Bull Racing"), "1:32:07.986", "25"),
                (entry("2", "Lewis Hamilton", "Mercedes"), "+5.432", "18"),
                (entry("3", "Charles Leclerc", "Ferrari"), "+12.891", "15"),
                (entry("4", "Lando Norris", "McLaren"), "+15.204", "12"),
            ]
            .into_iter()
            .take(limit)
            .map(|((position, driver, constructor), time, points)| ResultEntry {
                position,
                driver,
                constructor,
                time: time.to_string(),
                points: points.to_string(),
            })
            .collect(),
        }),
        RaceView::Standings => MotorsportReport::Standings(DriverStandings {
            source: DataSource::Demo,
            season,
            standings: [
                (entry("1", "Max Verstappen", "Red Bull Racing"), "575", "19"),
                (entry("2", "Lando Norris", "McLaren"), "356", "3"),
                (entry("3", "Charles Leclerc", "Ferrari"), "345", "2"),
                (entry("4", "Lewis Hamilton", "Mercedes"), "234", "1"),
            ]
            .into_iter()
            .take(limit)
            .map(|((position, driver, constructor), points, wins)| StandingEntry {
                position,
                driver,
                constructor,
                points: points.to_string(),
                wins: wins.to_string(),
            })
            .collect(),
        }),
        RaceView::NextRace => MotorsportReport::NextRace(UpcomingRace {
            source: DataSource::Demo,
            season,
            round: "21".to_string(),
            race_name: "Las Vegas Grand Prix".to_string(),
            circuit: "Las Vegas Street Circuit".to_string(),
            location: "Las Vegas, USA".to_string(),
            date: "2024-11-23".to_string(),
            time: None,
        }),
    }
}
