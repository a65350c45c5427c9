// Settings and aggregate endpoints
//
// Settings are a flat string-to-string map. Dashboard and provider stats
// are server-side aggregates this client treats as opaque JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::client::AdminClient;
use crate::error::Error;

#[derive(Deserialize)]
struct SettingBody {
    #[serde(default)]
    value: String,
}

#[derive(Serialize)]
struct UpdateSettingBody<'a> {
    value: &'a str,
}

impl AdminClient {
    /// `GET /api/admin/settings`
    pub async fn get_settings(&self) -> Result<BTreeMap<String, String>, Error> {
        let url = self.admin_url("settings")?;
        let settings: Option<BTreeMap<String, String>> = self.get(url).await?;
        Ok(settings.unwrap_or_default())
    }

    /// `GET /api/admin/settings/{key}`
    pub async fn get_setting(&self, key: &str) -> Result<String, Error> {
        let url = self.admin_url(&format!("settings/{key}"))?;
        let body: SettingBody = self.get(url).await?;
        Ok(body.value)
    }

    /// `PUT /api/admin/settings/{key}` with `{value}`
    pub async fn update_setting(&self, key: &str, value: &str) -> Result<(), Error> {
        let url = self.admin_url(&format!("settings/{key}"))?;
        self.put_unit(url, &UpdateSettingBody { value }).await
    }

    /// `DELETE /api/admin/settings/{key}`
    pub async fn delete_setting(&self, key: &str) -> Result<(), Error> {
        let url = self.admin_url(&format!("settings/{key}"))?;
        self.delete(url).await
    }

    /// `GET /api/admin/dashboard`
    pub async fn get_dashboard(&self) -> Result<serde_json::Value, Error> {
        let url = self.admin_url("dashboard")?;
        self.get(url).await
    }

    /// `GET /api/admin/provider-stats`
    pub async fn get_provider_stats(&self) -> Result<serde_json::Value, Error> {
        let url = self.admin_url("provider-stats")?;
        self.get(url).await
    }
}
