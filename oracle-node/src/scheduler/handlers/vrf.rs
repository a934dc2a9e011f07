//! VRF handler (§4.8): run the VRF Manager on the seed, pack and submit.

use crate::scheduler::JobHandler;
use crate::transaction_manager::TxSubmitter;
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use eyre::{eyre, Result};
use oracle_core::VrfManager;
use oracle_types::Job;
use serde_json::json;
use std::sync::Arc;

pub struct VrfHandler {
    vrf: Arc<VrfManager>,
    tx: Arc<dyn TxSubmitter>,
    oracle_contract: Address,
}

impl VrfHandler {
    pub fn new(vrf: Arc<VrfManager>, tx: Arc<dyn TxSubmitter>, oracle_contract: Address) -> Self {
        Self { vrf, tx, oracle_contract }
    }
}

#[async_trait]
impl JobHandler for VrfHandler {
    async fn handle(&self, job: &Job) -> Result<()> {
        let seed = job
            .param("seed")
            .ok_or_else(|| eyre!("VRF job {} is missing a seed parameter", job.id))?;

        let (randomness, proof_hex) = self.vrf.generate(seed);
        let payload = json!({
            "request_id": job.id,
            "randomness": randomness,
            "proof": proof_hex,
        });
        let calldata = Bytes::from(serde_json::to_vec(&payload).unwrap_or_default());

        self.tx.send(self.oracle_contract, calldata, U256::ZERO, &job.id).await?;
        Ok(())
    }
}
