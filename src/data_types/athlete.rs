use serde_derive::{Deserialize, Serialize};

pub type AthleteId = i64;

#[derive(Deserialize, Debug, Serialize, Clone, Default, PartialEq)]
pub struct AthleteTokens {
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: String,

    #[serde(default)]
    pub expires_at: i64,
}

impl AthleteTokens {
    pub fn is_expired(&self, now_ts: i64) -> bool {
        self.expires_at != 0 && now_ts > self.expires_at
    }
}
