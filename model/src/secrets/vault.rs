use log::{debug, warn};
use serde_json::{json, Value};
use snafu::{ResultExt, Snafu};
use std::collections::BTreeMap;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Unable to build the Vault HTTP client: {}", source))]
    ClientBuild { source: reqwest::Error },

    #[snafu(display("Unable to reach Vault at '{}': {}", addr, source))]
    Unreachable { addr: String, source: reqwest::Error },

    #[snafu(display("Vault is not healthy at '{}'. Enable it with VAULT_ENABLED=true and restart", addr))]
    Unhealthy { addr: String },

    #[snafu(display("Vault request to '{}' failed with status {}", path, status))]
    RequestFailed { path: String, status: u16 },

    #[snafu(display("Unable to parse the Vault response from '{}': {}", path, source))]
    ResponseParse { path: String, source: reqwest::Error },
}

/// A thin client for Vault's KV v2 engine, authenticated with the dev root token.
pub struct VaultClient {
    http: reqwest::Client,
    addr: String,
    token: String,
}

impl VaultClient {
    pub fn new(addr: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context(ClientBuildSnafu)?;
        Ok(Self {
            http,
            addr: addr.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.addr, path)
    }

    /// Check the server health endpoint. A dev-mode Vault answers 200; a standby answers 429,
    /// which is also healthy.
    pub async fn check_health(&self) -> Result<()> {
        let response = self
            .http
            .get(self.url("sys/health"))
            .send()
            .await
            .context(UnreachableSnafu { addr: &self.addr })?;
        let status = response.status().as_u16();
        if status == 200 || status == 429 {
            return Ok(());
        }
        UnhealthySnafu { addr: &self.addr }.fail()
    }

    /// True when a secret exists at `secret/data/<path>`.
    pub async fn secret_exists(&self, path: &str) -> bool {
        let url = self.url(&format!("secret/data/{}", path));
        match self
            .http
            .get(url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("vault existence check for '{}' failed: {}", path, e);
                false
            }
        }
    }

    /// Write a secret's key/value data to `secret/data/<path>`.
    pub async fn write_secret(&self, path: &str, data: &BTreeMap<String, String>) -> Result<()> {
        let api_path = format!("secret/data/{}", path);
        let response = self
            .http
            .post(self.url(&api_path))
            .header("X-Vault-Token", &self.token)
            .json(&json!({ "data": data }))
            .send()
            .await
            .context(UnreachableSnafu { addr: &self.addr })?;
        if !response.status().is_success() {
            return RequestFailedSnafu {
                path: api_path,
                status: response.status().as_u16(),
            }
            .fail();
        }
        Ok(())
    }

    /// Delete a secret's data and metadata. Both calls are best-effort since removal of an
    /// already-gone secret should not fail the overall cleanup.
    pub async fn delete_secret(&self, path: &str) {
        for api_path in [
            format!("secret/data/{}", path),
            format!("secret/metadata/{}", path),
        ] {
            let result = self
                .http
                .delete(self.url(&api_path))
                .header("X-Vault-Token", &self.token)
                .send()
                .await;
            if let Err(e) = result {
                warn!("vault delete of '{}' failed: {}", api_path, e);
            }
        }
    }

    /// List the keys under `secret/metadata/<base>`. Directory entries keep their trailing `/`.
    pub async fn list_secrets(&self, base: &str) -> Result<Vec<String>> {
        let api_path = if base.is_empty() {
            "secret/metadata?list=true".to_string()
        } else {
            format!("secret/metadata/{}?list=true", base)
        };
        let response = self
            .http
            .get(self.url(&api_path))
            .header("X-Vault-Token", &self.token)
            .send()
            .await
            .context(UnreachableSnafu { addr: &self.addr })?;
        if response.status().as_u16() == 404 {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return RequestFailedSnafu {
                path: api_path,
                status: response.status().as_u16(),
            }
            .fail();
        }
        let body: Value = response
            .json()
            .await
            .context(ResponseParseSnafu { path: api_path })?;
        Ok(body
            .pointer("/data/keys")
            .and_then(Value::as_array)
            .map(|keys| {
                keys.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}
