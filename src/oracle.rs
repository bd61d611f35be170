//! Journey Oracle (C2): given (origin, destination, mode), returns a travel
//! time by delegating to the rate gate, or by a local walking-graph
//! shortest-path for degenerate/walking cases.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    gate::{CancellationToken, Error as GateError, JourneyPlanner, RateGate},
    mode::TransportMode,
    shared::{Coordinate, Duration},
    spatial::graph::WalkGraph,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("no trip found")]
    NoTrip,
    #[error("remote reported a data error")]
    DataError,
}

impl From<GateError> for Error {
    fn from(value: GateError) -> Self {
        match value {
            GateError::RateLimited => Error::RateLimited,
            GateError::Transport(_) => Error::DataError,
        }
    }
}

/// Enumerated status strings the remote planner can report, decoupled from
/// whatever wire format actually carries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerStatus {
    Ok,
    NoTripFound,
    SameStation,
    DataError,
}

/// A fully-resolved trip, including the "performance" extras (used modes,
/// boarded station names) extracted when the caller asked for them.
#[derive(Debug, Clone, Default)]
pub struct TripDetails {
    pub duration: Duration,
    pub used_modes: Vec<String>,
    pub station_names: Vec<String>,
}

const MIN_MEANINGFUL_WALK_METERS: f32 = 30.0;

pub struct JourneyOracle<P> {
    gate: Arc<RateGate<P>>,
    walk_graph: Arc<WalkGraph>,
    walking_speed_mps: f64,
}

impl<P: JourneyPlanner> JourneyOracle<P> {
    pub fn new(gate: Arc<RateGate<P>>, walk_graph: Arc<WalkGraph>, walking_speed_mps: f64) -> Self {
        Self {
            gate,
            walk_graph,
            walking_speed_mps,
        }
    }

    /// Returns `Ok(None)` for a recoverable per-point failure (no trip, data
    /// error); `Err` only for a fatal rate-limit signal.
    pub async fn travel_time(
        &self,
        from: Coordinate,
        to: Coordinate,
        mode: TransportMode,
        token: &CancellationToken,
    ) -> Result<Option<Duration>, Error> {
        if token.is_cancelled() {
            return Ok(None);
        }

        if from == to {
            return Ok(Some(Duration::from_seconds(0)));
        }

        let distance = from.network_distance(&to);
        if distance.as_meters() < MIN_MEANINGFUL_WALK_METERS {
            return Ok(Some(Duration::from_seconds(60)));
        }

        if mode == TransportMode::Walk {
            if let Some(length_m) = self.walk_graph.shortest_path_length(from, to) {
                let secs = (length_m / self.walking_speed_mps).ceil().max(0.0) as u32;
                return Ok(Some(Duration::from_seconds(secs)));
            }
            return Ok(None);
        }

        let request = encode_request(from, to, mode);
        let (body, status) = self.gate.send(&request).await?;
        if status == 429 {
            return Err(Error::RateLimited);
        }

        match parse_response(&body) {
            PlannerStatus::Ok => Ok(extract_duration(&body)),
            PlannerStatus::SameStation => Ok(Some(Duration::from_seconds(0))),
            PlannerStatus::NoTripFound | PlannerStatus::DataError => Ok(None),
        }
    }

    /// Like [`travel_time`](Self::travel_time) but also extracts used-mode
    /// and boarded-station labels, for the performance point-mode path.
    pub async fn travel_details(
        &self,
        from: Coordinate,
        to: Coordinate,
        mode: TransportMode,
        token: &CancellationToken,
    ) -> Result<Option<TripDetails>, Error> {
        if token.is_cancelled() {
            return Ok(None);
        }
        let request = encode_request(from, to, mode);
        let (body, status) = self.gate.send(&request).await?;
        if status == 429 {
            return Err(Error::RateLimited);
        }
        match parse_response(&body) {
            PlannerStatus::Ok => Ok(extract_duration(&body).map(|duration| TripDetails {
                duration,
                used_modes: extract_field_list(&body, "usedModes"),
                station_names: extract_field_list(&body, "stationNames"),
            })),
            PlannerStatus::SameStation => Ok(Some(TripDetails {
                duration: Duration::from_seconds(0),
                ..Default::default()
            })),
            PlannerStatus::NoTripFound | PlannerStatus::DataError => Ok(None),
        }
    }
}

fn encode_request(from: Coordinate, to: Coordinate, mode: TransportMode) -> String {
    format!(
        "from={from};to={to};mode={mode:?}",
        from = from,
        to = to,
        mode = mode
    )
}

fn parse_response(body: &str) -> PlannerStatus {
    if body.contains("no valid response") || body.contains("no trip found") {
        PlannerStatus::NoTripFound
    } else if body.contains("same station") {
        PlannerStatus::SameStation
    } else if body.contains("data error") {
        PlannerStatus::DataError
    } else {
        PlannerStatus::Ok
    }
}

fn extract_duration(body: &str) -> Option<Duration> {
    let start = body.find("PT")?;
    let tail = &body[start..];
    let end = tail
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, 'P' | 'T' | 'H' | 'M' | 'S')))
        .unwrap_or(tail.len());
    Duration::from_iso8601(&tail[..end])
}

/// Extracts the text content of every element named `tag` (ignoring its
/// namespace prefix), e.g. `<ojp:IndividualMode>walk</ojp:IndividualMode>`.
fn extract_tag_text(body: &str, tag: &str) -> Vec<String> {
    let open_needle = format!(":{tag}>");
    let mut out = Vec::new();
    let mut cursor = 0usize;
    while let Some(rel) = body[cursor..].find(open_needle.as_str()) {
        let open_end = cursor + rel + open_needle.len();
        let Some(close_rel) = body[open_end..].find('<') else {
            break;
        };
        let text = body[open_end..open_end + close_rel].trim();
        if !text.is_empty() {
            out.push(text.to_string());
        }
        cursor = open_end + close_rel;
    }
    out
}

/// Extracts `usedModes` (`IndividualMode`/`PtMode` leg tags) or
/// `stationNames` (`StopPointName` leg tags) from a trip response body,
/// deduplicating in first-seen order.
fn extract_field_list(body: &str, field: &str) -> Vec<String> {
    let tags: &[&str] = match field {
        "usedModes" => &["IndividualMode", "PtMode"],
        "stationNames" => &["StopPointName"],
        _ => &[],
    };
    let mut values = Vec::new();
    for tag in tags {
        for value in extract_tag_text(body, tag) {
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }
    values
}

#[cfg(feature = "remote-oracle")]
pub mod remote {
    use super::*;
    use crate::gate::Error as GateError;

    /// `reqwest`-backed [`JourneyPlanner`], the default transport used by
    /// `RateGate` when the `remote-oracle` feature is enabled.
    pub struct ReqwestPlanner {
        client: reqwest::Client,
        base_url: String,
    }

    impl ReqwestPlanner {
        pub fn new(base_url: impl Into<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                base_url: base_url.into(),
            }
        }
    }

    #[async_trait::async_trait]
    impl JourneyPlanner for ReqwestPlanner {
        async fn send(&self, request: &str) -> Result<(String, u16), GateError> {
            let resp = self
                .client
                .get(format!("{}?{}", self.base_url, request))
                .send()
                .await
                .map_err(|e| GateError::Transport(e.to_string()))?;
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .map_err(|e| GateError::Transport(e.to_string()))?;
            Ok((body, status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_statuses() {
        assert_eq!(parse_response("fine / ok"), PlannerStatus::Ok);
        assert_eq!(
            parse_response("trip / no valid response!"),
            PlannerStatus::NoTripFound
        );
        assert_eq!(
            parse_response("trip / same station!"),
            PlannerStatus::SameStation
        );
        assert_eq!(parse_response("trip / data error!"), PlannerStatus::DataError);
    }

    #[test]
    fn extracts_duration_from_body() {
        let body = "{\"duration\":\"PT15M30S\"}";
        let d = extract_duration(body).unwrap();
        assert_eq!(d.as_seconds(), 930);
    }

    #[test]
    fn extracts_used_modes_and_station_names() {
        let body = "<ojp:TripLeg><ojp:IndividualMode>walk</ojp:IndividualMode>\
                     <ojp:LegBoard><ojp:StopPointName>Main Station</ojp:StopPointName></ojp:LegBoard>\
                     <ojp:LegAlight><ojp:StopPointName>City Hall</ojp:StopPointName></ojp:LegAlight>\
                     </ojp:TripLeg><ojp:TripLeg><ojp:PtMode>rail</ojp:PtMode></ojp:TripLeg>";
        assert_eq!(
            extract_field_list(body, "usedModes"),
            vec!["walk".to_string(), "rail".to_string()]
        );
        assert_eq!(
            extract_field_list(body, "stationNames"),
            vec!["Main Station".to_string(), "City Hall".to_string()]
        );
    }
}
