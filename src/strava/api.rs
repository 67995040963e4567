use curl::easy::{Easy, List};
use serde_json::Value;

use crate::{
    data_types::{
        activity::ActivityRecord,
        athlete::AthleteId,
        common::ActivityId,
        stream::{StreamChannel, TrackStream},
    },
    error::{Error, Result},
    logvbln,
};

use super::ActivitySource;

pub const STRAVA_BASE_URL: &str = "https://www.strava.com/api/v3/";

pub struct StravaApi {
    access_token: String,
    base_url: String,
}

impl StravaApi {
    const CC: &'static str = "StravaApi";

    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, STRAVA_BASE_URL)
    }

    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            base_url: base_url.into(),
        }
    }

    fn get_request(bearer: &str, url: &str) -> Result<Value> {
        let mut handle = Easy::new();
        let mut list = List::new();

        list.append(&format!("Authorization: Bearer {}", bearer))?;
        handle.http_headers(list)?;
        handle.get(true)?;
        handle.url(url)?;

        perform(&mut handle, url)
    }

    /// Runs the blocking libcurl transfer off the async executor.
    async fn get(&self, url: String) -> Result<Value> {
        logvbln!("GET {}", url);

        let bearer = self.access_token.clone();
        tokio::task::spawn_blocking(move || StravaApi::get_request(&bearer, &url)).await?
    }
}

/// Performs the transfer prepared on `handle` and maps the response:
/// 404 becomes `Error::NotFound`, other non-2xx statuses and bodies that
/// carry an `errors` member become `Error::Remote`.
pub(crate) fn perform(handle: &mut Easy, url: &str) -> Result<Value> {
    let mut buffer_response = Vec::new();
    {
        let mut transfer = handle.transfer();
        transfer.write_function(|data| {
            buffer_response.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let status = handle.response_code()?;
    let body = String::from_utf8_lossy(&buffer_response);
    let json: Option<Value> = serde_json::from_str(&body).ok();

    let message = json
        .as_ref()
        .and_then(|j| j.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());

    if status == 404 {
        return Err(Error::NotFound(url.to_string()));
    }

    if !(200..300).contains(&status) {
        return Err(Error::Remote {
            status,
            message,
        });
    }

    match json {
        Some(json) if json.get("errors").is_some() => Err(Error::Remote {
            status,
            message,
        }),
        Some(json) => Ok(json),
        None => Ok(serde_json::from_str(&body)?),
    }
}

/// Streams come back either as a list of channels or, when keyed by type,
/// as an object of channels.
pub(crate) fn stream_from_value(value: Value) -> Result<TrackStream> {
    match value {
        Value::Object(by_type) => {
            let mut channels = Vec::with_capacity(by_type.len());
            for (kind, channel) in by_type {
                let mut channel: StreamChannel = match channel {
                    Value::Object(mut fields) => {
                        fields
                            .entry("type")
                            .or_insert_with(|| Value::String(kind.clone()));
                        serde_json::from_value(Value::Object(fields))?
                    }
                    other => serde_json::from_value(other)?,
                };
                channel.r#type = kind;
                channels.push(channel);
            }
            Ok(TrackStream::new(channels))
        }
        other => Ok(serde_json::from_value(other)?),
    }
}

impl ActivitySource for StravaApi {
    async fn list_activities(
        &self,
        athlete_id: AthleteId,
        after: i64,
        before: i64,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<ActivityRecord>> {
        logvbln!("listing activities of athlete {} (page {})", athlete_id, page);

        let result = self
            .get(format!(
                "{}athlete/activities?after={}&before={}&per_page={}&page={}",
                self.base_url, after, before, per_page, page
            ))
            .await?;

        Ok(serde_json::from_value(result)?)
    }

    async fn fetch_stream(
        &self,
        activity_id: ActivityId,
        channels: &[&str],
        resolution: &str,
    ) -> Result<TrackStream> {
        let result = self
            .get(format!(
                "{}activities/{}/streams/{}?resolution={}",
                self.base_url,
                activity_id,
                channels.join(","),
                resolution
            ))
            .await?;

        stream_from_value(result)
    }
}
