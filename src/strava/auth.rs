use curl::easy::Easy;
use serde_json::Value;

use crate::{
    config::Config,
    data_types::athlete::AthleteTokens,
    error::{Error, Result},
    logln,
};

use super::api::perform;

const STRAVA_AUTHORIZE_URL: &str = "https://www.strava.com/oauth/authorize";
const STRAVA_TOKEN_URL: &str = "https://www.strava.com/oauth/token";

pub const DEFAULT_SCOPES: &str = "read,activity:read_all";

/// OAuth collaborator: builds the consent URL and trades the returned code
/// for an access token.
pub struct Auth {
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
}

impl Auth {
    const CC: &'static str = "Auth";

    pub fn from_config(config: &Config) -> Result<Self> {
        let client_id = config
            .client_id
            .clone()
            .ok_or(Error::MissingDependency("client_id"))?;

        Ok(Self {
            client_id,
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    /// The user is sent back to `<redirect_uri>/code` with `?code=...`.
    pub fn authorization_url(&self, scopes: &str) -> String {
        let mut encoder = Easy::new();
        let redirect = encoder.url_encode(format!("{}/code", self.redirect_uri).as_bytes());
        let scopes = encoder.url_encode(scopes.as_bytes());

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&approval_prompt=auto&scope={}",
            STRAVA_AUTHORIZE_URL, self.client_id, redirect, scopes
        )
    }

    pub async fn exchange_code_for_token(&self, code: &str) -> Result<AthleteTokens> {
        let client_secret = self
            .client_secret
            .clone()
            .ok_or(Error::MissingDependency("client_secret"))?;
        let client_id = self.client_id.clone();
        let code = code.to_string();

        logln!("exchanging authorization code for a token");

        let response = tokio::task::spawn_blocking(move || -> Result<Value> {
            let mut handle = Easy::new();
            let client_id = handle.url_encode(client_id.as_bytes());
            let client_secret = handle.url_encode(client_secret.as_bytes());
            let code = handle.url_encode(code.as_bytes());
            let body = format!(
                "client_id={}&client_secret={}&code={}&grant_type=authorization_code",
                client_id, client_secret, code
            );

            handle.url(STRAVA_TOKEN_URL)?;
            handle.post(true)?;
            handle.post_fields_copy(body.as_bytes())?;

            perform(&mut handle, STRAVA_TOKEN_URL)
        })
        .await??;

        Ok(serde_json::from_value(response)?)
    }
}
