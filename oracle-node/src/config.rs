//! Environment-sourced configuration (§6 "Environment/configuration"): a
//! single struct loaded once at boot.

use alloy::signers::local::PrivateKeySigner;
use eyre::{Result, WrapErr};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub log_level: String,
    pub ethereum_url: String,
    pub private_key: String,
    pub oracle_contract_address: String,
    pub stake_guard_address: String,
    pub db_path: String,
    pub telemetry_mode: bool,
}

impl Config {
    /// Loads from the process environment (via an optional `.env`). Missing
    /// optional keys fall back to documented defaults; a missing or
    /// all-zero private key gets an ephemeral one generated in its place,
    /// with a warning logged (§6).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let port = dotenvy::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .wrap_err("PORT must be a valid u16")?;

        let log_level = dotenvy::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let ethereum_url = dotenvy::var("ETHEREUM_URL")
            .unwrap_or_else(|_| "ws://127.0.0.1:8545".to_string());

        let private_key = match dotenvy::var("PRIVATE_KEY") {
            Ok(key) if !key.is_empty() && key != "0x0000000000000000000000000000000000000000000000000000000000000000" => key,
            _ => {
                warn!("PRIVATE_KEY unset or all-zero; generating an ephemeral signing key");
                let signer = PrivateKeySigner::random();
                hex::encode(signer.to_bytes())
            }
        };

        let oracle_contract_address = dotenvy::var("ORACLE_CONTRACT_ADDRESS")
            .unwrap_or_else(|_| "0x0000000000000000000000000000000000000000".to_string());
        let stake_guard_address = dotenvy::var("STAKE_GUARD_ADDRESS")
            .unwrap_or_else(|_| "0x0000000000000000000000000000000000000000".to_string());
        let db_path = dotenvy::var("DB_PATH").unwrap_or_else(|_| "./oracle-node-db".to_string());
        let telemetry_mode = dotenvy::var("TELEMETRY_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);

        Ok(Self {
            port,
            log_level,
            ethereum_url,
            private_key,
            oracle_contract_address,
            stake_guard_address,
            db_path,
            telemetry_mode,
        })
    }
}
