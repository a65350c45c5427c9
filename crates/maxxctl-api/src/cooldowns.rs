// Cooldown endpoints

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::client::AdminClient;
use crate::error::Error;
use crate::models::Cooldown;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SetCooldownBody<'a> {
    until: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_type: Option<&'a str>,
}

impl AdminClient {
    /// All cooldowns the server currently knows about.
    ///
    /// `GET /api/admin/cooldowns`
    pub async fn get_cooldowns(&self) -> Result<Vec<Cooldown>, Error> {
        let url = self.admin_url("cooldowns")?;
        let list: Option<Vec<Cooldown>> = self.get(url).await?;
        Ok(list.unwrap_or_default())
    }

    /// Remove every cooldown for `provider_id`.
    ///
    /// `DELETE /api/admin/cooldowns/{provider_id}`
    pub async fn clear_cooldown(&self, provider_id: u64) -> Result<(), Error> {
        let url = self.admin_url(&format!("cooldowns/{provider_id}"))?;
        self.delete(url).await
    }

    /// Put `provider_id` into cooldown until `until`, optionally for one
    /// client type only.
    ///
    /// `PUT /api/admin/cooldowns/{provider_id}` with `{until, clientType}`
    pub async fn set_cooldown(
        &self,
        provider_id: u64,
        until: DateTime<Utc>,
        client_type: Option<&str>,
    ) -> Result<(), Error> {
        let url = self.admin_url(&format!("cooldowns/{provider_id}"))?;
        let body = SetCooldownBody {
            until: until.to_rfc3339_opts(SecondsFormat::Millis, true),
            client_type,
        };
        self.put_unit(url, &body).await
    }
}
