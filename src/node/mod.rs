//! Typed client for the worker's local control API.
//!
//! The worker process exposes a plain HTTP interface on localhost for
//! wallet, mining and staking operations. Calls here are simple
//! request/response with no retry or backoff; callers observe completion
//! and errors through the returned futures instead of a console side
//! channel. Input validation happens before any request is issued.

use std::path::{Path, PathBuf};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeClientError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("node returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("unexpected response body: {0}")]
    BadResponse(String),

    #[error("backup failed: {0}")]
    Backup(#[from] std::io::Error),
}

/// Freshly generated wallet keypair.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyPair {
    #[serde(rename = "pubKey")]
    pub pub_key: String,
    #[serde(rename = "privKey")]
    pub priv_key: String,
}

/// Account balances as reported by `/account`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountBalances {
    #[serde(rename = "digitalDollarBalance")]
    pub dollar: Value,
    #[serde(rename = "digitalStockBalance")]
    pub stock: Value,
    #[serde(rename = "digitalStakingBalance")]
    pub staking: Value,
}

/// A coin transfer request. `dollar` must be positive; `stock` and
/// `reward` non-negative.
#[derive(Debug, Clone)]
pub struct SendCoinRequest {
    pub sender: String,
    pub recipient: String,
    pub dollar: f64,
    pub stock: f64,
    pub reward: f64,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct NodeClient {
    base_url: String,
    http: reqwest::Client,
}

impl NodeClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn get_json(&self, endpoint: &str) -> Result<Value, NodeClientError> {
        let response = self.http.get(self.url(endpoint)).send().await?;
        if !response.status().is_success() {
            return Err(NodeClientError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    async fn post_form(
        &self,
        endpoint: &str,
        form: &[(&str, String)],
    ) -> Result<Value, NodeClientError> {
        let response = self.http.post(self.url(endpoint)).form(form).send().await?;
        if !response.status().is_success() {
            return Err(NodeClientError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Set or change the miner's wallet address.
    pub async fn set_miner_address(&self, address: &str) -> Result<Value, NodeClientError> {
        if address.trim().is_empty() {
            return Err(NodeClientError::InvalidInput(
                "wallet address must not be empty".into(),
            ));
        }
        self.post_form("/setMinner", &[("setMinner", address.to_string())])
            .await
    }

    /// Point the worker at a different peer server.
    pub async fn change_server(&self, host: &str) -> Result<Value, NodeClientError> {
        if host.trim().is_empty() {
            return Err(NodeClientError::InvalidInput("server host must not be empty".into()));
        }
        self.post_form("/server", &[("host", host.to_string())]).await
    }

    /// Set the custom mining difficulty. Valid range is 17..=99.
    pub async fn set_difficulty(&self, difficulty: u32) -> Result<Value, NodeClientError> {
        if !(17..=99).contains(&difficulty) {
            return Err(NodeClientError::InvalidInput(format!(
                "difficulty must be between 17 and 99, got {}",
                difficulty
            )));
        }
        self.post_form("/customDiff", &[("customDiff", difficulty.to_string())])
            .await
    }

    pub async fn start_mining(&self) -> Result<Value, NodeClientError> {
        self.get_json("/constantMining").await
    }

    pub async fn stop_mining(&self) -> Result<Value, NodeClientError> {
        self.get_json("/stopMining").await
    }

    pub async fn stake(
        &self,
        miner: &str,
        dollar: f64,
        password: &str,
    ) -> Result<Value, NodeClientError> {
        validate_staking(miner, dollar, password)?;
        self.post_form(
            "/staking",
            &[
                ("miner", miner.to_string()),
                ("dollar", dollar.to_string()),
                ("password", password.to_string()),
            ],
        )
        .await
    }

    pub async fn unstake(
        &self,
        miner: &str,
        dollar: f64,
        password: &str,
    ) -> Result<Value, NodeClientError> {
        validate_staking(miner, dollar, password)?;
        self.post_form(
            "/unstaking",
            &[
                ("miner", miner.to_string()),
                ("dollar", dollar.to_string()),
                ("password", password.to_string()),
            ],
        )
        .await
    }

    /// Transfer coins. The worker expects all parameters in the query
    /// string of a GET request.
    pub async fn send_coin(&self, req: &SendCoinRequest) -> Result<Value, NodeClientError> {
        if req.sender.is_empty()
            || req.recipient.is_empty()
            || req.password.is_empty()
        {
            return Err(NodeClientError::InvalidInput(
                "sender, recipient and password must all be provided".into(),
            ));
        }
        if req.dollar <= 0.0 {
            return Err(NodeClientError::InvalidInput(
                "dollar must be greater than 0".into(),
            ));
        }
        if req.stock < 0.0 || req.reward < 0.0 {
            return Err(NodeClientError::InvalidInput(
                "stock and reward must be non-negative".into(),
            ));
        }

        let response = self
            .http
            .get(self.url("/sendCoin"))
            .query(&[
                ("sender", req.sender.as_str()),
                ("recipient", req.recipient.as_str()),
                ("dollar", &req.dollar.to_string()),
                ("stock", &req.stock.to_string()),
                ("reward", &req.reward.to_string()),
                ("password", req.password.as_str()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NodeClientError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Generate a fresh wallet keypair.
    pub async fn generate_keys(&self) -> Result<KeyPair, NodeClientError> {
        let value = self.get_json("/keys").await?;
        serde_json::from_value(value.clone())
            .map_err(|_| NodeClientError::BadResponse(value.to_string()))
    }

    /// Balances for an address, queried against a specific peer server.
    pub async fn account(
        &self,
        server: &str,
        address: &str,
    ) -> Result<AccountBalances, NodeClientError> {
        if address.trim().is_empty() {
            return Err(NodeClientError::InvalidInput("address must not be empty".into()));
        }
        let url = format!("{}/account", server.trim_end_matches('/'));
        let response = self
            .http
            .get(url)
            .query(&[("address", address)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(NodeClientError::Status(response.status()));
        }
        let value: Value = response.json().await?;
        serde_json::from_value(value.clone())
            .map_err(|_| NodeClientError::BadResponse(value.to_string()))
    }

    /// Local node's blockchain size.
    pub async fn local_chain_size(&self) -> Result<Value, NodeClientError> {
        self.get_json("/size").await
    }

    /// Blockchain size as reported by a specific peer server.
    pub async fn global_chain_size(&self, server: &str) -> Result<Value, NodeClientError> {
        if server.trim().is_empty() {
            return Err(NodeClientError::InvalidInput("server host must not be empty".into()));
        }
        let url = format!("{}/size", server.trim_end_matches('/'));
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(NodeClientError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Ask the worker to reconcile its chain against the network.
    pub async fn resolve_chain(&self) -> Result<Value, NodeClientError> {
        self.get_json("/resolving").await
    }

    /// Known peer servers from a remote discovery endpoint.
    pub async fn fetch_nodes(&self, discovery_url: &str) -> Result<Vec<String>, NodeClientError> {
        let response = self.http.get(discovery_url).send().await?;
        if !response.status().is_success() {
            return Err(NodeClientError::Status(response.status()));
        }
        let value: Value = response.json().await?;
        serde_json::from_value(value.clone())
            .map_err(|_| NodeClientError::BadResponse(value.to_string()))
    }
}

fn validate_staking(miner: &str, dollar: f64, password: &str) -> Result<(), NodeClientError> {
    if miner.is_empty() || password.is_empty() {
        return Err(NodeClientError::InvalidInput(
            "miner address and password must be provided".into(),
        ));
    }
    if dollar <= 0.0 {
        return Err(NodeClientError::InvalidInput(
            "amount must be greater than 0".into(),
        ));
    }
    Ok(())
}

/// Write a plaintext backup file for a generated keypair, named after the
/// public key. Returns the created path.
pub fn backup_keys(dir: &Path, keys: &KeyPair) -> Result<PathBuf, NodeClientError> {
    if keys.pub_key.is_empty() || keys.priv_key.is_empty() {
        return Err(NodeClientError::InvalidInput(
            "both keys must be present to create a backup".into(),
        ));
    }
    let path = dir.join(format!("{}.txt", keys.pub_key));
    let body = format!(
        "Backup for wallet: {}\nPublic Key: {}\nPrivate Key: {}\n",
        keys.pub_key, keys.pub_key, keys.priv_key
    );
    std::fs::write(&path, body)?;
    Ok(path)
}
