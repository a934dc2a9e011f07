use serde::{Deserialize, Serialize};

/// Fixed-length on-chain witness encoding (§3): every proving operation
/// serializes to exactly 8 scalars regardless of circuit.
pub const PROOF_SCALAR_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitKind {
    Range,
    Vrf,
    Bridge,
    Twap,
    ProofOfReserves,
    SelectiveDisclosure,
    RecursiveAggregation,
    ConfidentialCompute,
}

/// An opaque proving-system artifact plus the fixed on-chain witness. Public
/// inputs are circuit-specific and bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    pub circuit: CircuitKind,
    pub scalars: [String; PROOF_SCALAR_COUNT],
    pub public_inputs: Vec<String>,
}

impl Proof {
    pub fn scalars_hex(&self) -> Vec<String> {
        self.scalars.to_vec()
    }
}
