//! Compute handler (§4.8): sandboxed WASM execution, proved against a
//! declared threshold via the confidential-computation circuit.

use crate::scheduler::JobHandler;
use crate::transaction_manager::TxSubmitter;
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use eyre::{eyre, Result};
use oracle_core::zk::circuits::Witness;
use oracle_core::ZkProver;
use oracle_types::{CircuitKind, Job};
use serde_json::json;
use std::sync::Arc;
use wasmer::{imports, Instance, Module, Store, TypedFunction};

pub struct ComputeHandler {
    tx: Arc<dyn TxSubmitter>,
    oracle_contract: Address,
}

impl ComputeHandler {
    pub fn new(tx: Arc<dyn TxSubmitter>, oracle_contract: Address) -> Self {
        Self { tx, oracle_contract }
    }
}

#[async_trait]
impl JobHandler for ComputeHandler {
    async fn handle(&self, job: &Job) -> Result<()> {
        let wasm_hex = job
            .param("wasm_hex")
            .ok_or_else(|| eyre!("Compute job {} is missing a wasm_hex parameter", job.id))?
            .to_string();
        let function = job
            .param("function")
            .ok_or_else(|| eyre!("Compute job {} is missing a function parameter", job.id))?
            .to_string();
        let threshold: i128 = job
            .param("threshold")
            .ok_or_else(|| eyre!("Compute job {} is missing a threshold parameter", job.id))?
            .parse()
            .map_err(|_| eyre!("Compute job {} has a non-numeric threshold", job.id))?;

        let result = tokio::task::spawn_blocking(move || execute_wasm(&wasm_hex, &function))
            .await
            .map_err(|e| eyre!("wasm execution task panicked: {e}"))??;

        let witness = Witness::ConfidentialCompute {
            secret_result: result as i128,
            public_threshold: threshold,
        };
        let proof = ZkProver::prove_composite(CircuitKind::ConfidentialCompute, &witness)
            .map_err(|e| eyre!("confidential-compute proof generation failed for job {}: {e}", job.id))?;

        let payload = json!({
            "request_id": job.id,
            "threshold": threshold.to_string(),
            "proof": proof,
        });
        let calldata = Bytes::from(serde_json::to_vec(&payload).unwrap_or_default());

        self.tx.send(self.oracle_contract, calldata, U256::ZERO, &job.id).await?;
        Ok(())
    }
}

/// Executes `function` in a sandboxed WASM module with no host imports, so
/// the computation is deterministic and cannot reach outside the sandbox.
/// The function signature is `() -> i64`.
fn execute_wasm(wasm_hex: &str, function: &str) -> Result<i64> {
    let bytes = hex::decode(wasm_hex).map_err(|e| eyre!("invalid wasm_hex: {e}"))?;
    let mut store = Store::default();
    let module = Module::new(&store, &bytes).map_err(|e| eyre!("failed to compile wasm module: {e}"))?;
    let import_object = imports! {};
    let instance =
        Instance::new(&mut store, &module, &import_object).map_err(|e| eyre!("failed to instantiate wasm module: {e}"))?;
    let entry: TypedFunction<(), i64> = instance
        .exports
        .get_typed_function(&store, function)
        .map_err(|e| eyre!("function '{function}' not found or has the wrong signature: {e}"))?;
    entry.call(&mut store).map_err(|e| eyre!("wasm execution trapped: {e}"))
}
