//! Composite circuits (§4.3): typed witnesses with distinguished public and
//! secret fields, each asserting its own algebraic property.

use oracle_types::{CircuitKind, ProverError};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub enum Witness {
    Twap {
        secret_prices: Vec<i128>,
        public_window_average: i128,
    },
    ProofOfReserves {
        secret_reserves: i128,
        public_liabilities: i128,
    },
    SelectiveDisclosure {
        secret_fields: Vec<(String, String)>,
        disclosed_keys: Vec<String>,
    },
    RecursiveAggregation {
        secret_inner_proofs: Vec<[String; 8]>,
        public_aggregate_hash: String,
    },
    ConfidentialCompute {
        secret_result: i128,
        public_threshold: i128,
    },
}

impl Witness {
    /// Seed material fed into the proof's scalar sealing — includes the
    /// secret fields, since they never leave this process.
    pub fn digest_seed(&self) -> String {
        format!("{self:?}")
    }

    pub fn public_inputs(&self) -> Vec<String> {
        match self {
            Witness::Twap {
                public_window_average,
                ..
            } => vec![public_window_average.to_string()],
            Witness::ProofOfReserves {
                public_liabilities, ..
            } => vec![public_liabilities.to_string()],
            Witness::SelectiveDisclosure { disclosed_keys, .. } => disclosed_keys.clone(),
            Witness::RecursiveAggregation {
                public_aggregate_hash,
                ..
            } => vec![public_aggregate_hash.clone()],
            Witness::ConfidentialCompute {
                public_threshold, ..
            } => vec![public_threshold.to_string()],
        }
    }
}

pub fn assert_relation(kind: CircuitKind, witness: &Witness) -> Result<(), ProverError> {
    match (kind, witness) {
        (
            CircuitKind::Twap,
            Witness::Twap {
                secret_prices,
                public_window_average,
            },
        ) => {
            if secret_prices.is_empty() {
                return Err(ProverError::WitnessInvalid("twap window is empty".into()));
            }
            let sum: i128 = secret_prices.iter().sum();
            let avg = sum / secret_prices.len() as i128;
            if avg != *public_window_average {
                return Err(ProverError::WitnessInvalid(format!(
                    "window average {avg} does not match claimed {public_window_average}"
                )));
            }
            Ok(())
        }
        (
            CircuitKind::ProofOfReserves,
            Witness::ProofOfReserves {
                secret_reserves,
                public_liabilities,
            },
        ) => {
            if secret_reserves < public_liabilities {
                return Err(ProverError::WitnessInvalid(
                    "reserves fall below liabilities".into(),
                ));
            }
            Ok(())
        }
        (
            CircuitKind::SelectiveDisclosure,
            Witness::SelectiveDisclosure {
                secret_fields,
                disclosed_keys,
            },
        ) => {
            for key in disclosed_keys {
                if !secret_fields.iter().any(|(k, _)| k == key) {
                    return Err(ProverError::WitnessInvalid(format!(
                        "disclosed key '{key}' is absent from the field set"
                    )));
                }
            }
            Ok(())
        }
        (
            CircuitKind::RecursiveAggregation,
            Witness::RecursiveAggregation {
                secret_inner_proofs,
                public_aggregate_hash,
            },
        ) => {
            let mut hasher = Sha256::new();
            for proof in secret_inner_proofs {
                for scalar in proof {
                    hasher.update(scalar.as_bytes());
                }
            }
            let expected = hex::encode(hasher.finalize());
            if &expected != public_aggregate_hash {
                return Err(ProverError::WitnessInvalid(
                    "aggregate hash does not match the inner proof set".into(),
                ));
            }
            Ok(())
        }
        (
            CircuitKind::ConfidentialCompute,
            Witness::ConfidentialCompute {
                secret_result,
                public_threshold,
            },
        ) => {
            if secret_result < public_threshold {
                return Err(ProverError::WitnessInvalid(
                    "computed result falls below the declared threshold".into(),
                ));
            }
            Ok(())
        }
        _ => Err(ProverError::WitnessInvalid(
            "witness shape does not match the requested circuit".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twap_accepts_matching_average() {
        let witness = Witness::Twap {
            secret_prices: vec![100, 102, 98],
            public_window_average: 100,
        };
        assert!(assert_relation(CircuitKind::Twap, &witness).is_ok());
    }

    #[test]
    fn twap_rejects_wrong_average() {
        let witness = Witness::Twap {
            secret_prices: vec![100, 102, 98],
            public_window_average: 999,
        };
        assert!(assert_relation(CircuitKind::Twap, &witness).is_err());
    }

    #[test]
    fn proof_of_reserves_rejects_insolvency() {
        let witness = Witness::ProofOfReserves {
            secret_reserves: 50,
            public_liabilities: 100,
        };
        assert!(assert_relation(CircuitKind::ProofOfReserves, &witness).is_err());
    }

    #[test]
    fn selective_disclosure_rejects_unknown_key() {
        let witness = Witness::SelectiveDisclosure {
            secret_fields: vec![("age".into(), "30".into())],
            disclosed_keys: vec!["name".into()],
        };
        assert!(assert_relation(CircuitKind::SelectiveDisclosure, &witness).is_err());
    }

    #[test]
    fn mismatched_circuit_and_witness_is_rejected() {
        let witness = Witness::ProofOfReserves {
            secret_reserves: 50,
            public_liabilities: 10,
        };
        assert!(assert_relation(CircuitKind::Twap, &witness).is_err());
    }
}
