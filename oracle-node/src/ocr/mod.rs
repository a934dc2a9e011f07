//! OCR Coordinator (§4.10): one round ticker per feed, leader election,
//! bounded observation intake, median sealing with signature verification.

use chrono::{DateTime, Utc};
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use oracle_core::aggregation::{median, zscore_filter};
use oracle_core::constants::ZSCORE_THRESHOLD_SECURITY;
use oracle_types::{Observation, Report, ReportSignature};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub threshold: usize,
    pub round_duration: Duration,
    pub stage_duration: Duration,
    pub max_round_age: Duration,
    pub leader_rotation: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            round_duration: Duration::from_secs(30),
            stage_duration: Duration::from_secs(2),
            max_round_age: Duration::from_secs(600),
            leader_rotation: true,
        }
    }
}

struct RoundState {
    started_at: DateTime<Utc>,
    leader: String,
    observations: HashMap<String, Observation>,
    /// Report-phase attestations, keyed by node ID so a resubmission
    /// overwrites rather than double-counts. Each one is a signature over
    /// this round's `report_digest`, not the observation digest.
    signatures: HashMap<String, ReportSignature>,
    sealed: bool,
}

struct CoordinatorState {
    current_round: u64,
    rounds: HashMap<u64, RoundState>,
    active_nodes: Vec<String>,
}

pub struct OcrCoordinator {
    pub feed_id: String,
    config: OcrConfig,
    local_node_id: String,
    signing_key: SigningKey,
    state: RwLock<CoordinatorState>,
    obs_tx: mpsc::Sender<Observation>,
    report_tx: mpsc::Sender<Report>,
}

impl OcrCoordinator {
    pub fn new(
        feed_id: impl Into<String>,
        config: OcrConfig,
        local_node_id: impl Into<String>,
        signing_key: SigningKey,
    ) -> (std::sync::Arc<Self>, mpsc::Receiver<Observation>, mpsc::Receiver<Report>) {
        let (obs_tx, obs_rx) = mpsc::channel(1000);
        let (report_tx, report_rx) = mpsc::channel(16);
        let coordinator = std::sync::Arc::new(Self {
            feed_id: feed_id.into(),
            config,
            local_node_id: local_node_id.into(),
            signing_key,
            state: RwLock::new(CoordinatorState {
                current_round: 0,
                rounds: HashMap::new(),
                active_nodes: Vec::new(),
            }),
            obs_tx,
            report_tx,
        });
        (coordinator, obs_rx, report_rx)
    }

    pub fn set_active_nodes(&self, nodes: Vec<String>) {
        self.state.write().expect("ocr state lock poisoned").active_nodes = nodes;
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_encoded_point(true).as_bytes())
    }

    /// Monotonic round ticker (§4.10 step 1).
    pub async fn run_ticker(self: std::sync::Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.round_duration);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.start_new_round(),
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    fn start_new_round(&self) {
        let mut guard = self.state.write().expect("ocr state lock poisoned");
        guard.current_round += 1;
        let round_id = guard.current_round;
        let leader = self.elect_leader(&guard.active_nodes, round_id);
        guard.rounds.insert(
            round_id,
            RoundState {
                started_at: Utc::now(),
                leader: leader.clone(),
                observations: HashMap::new(),
                signatures: HashMap::new(),
                sealed: false,
            },
        );
        debug!(feed_id = %self.feed_id, round_id, leader, "started new OCR round");
    }

    fn elect_leader(&self, active_nodes: &[String], round_id: u64) -> String {
        if !self.config.leader_rotation || active_nodes.is_empty() {
            return self.local_node_id.clone();
        }
        let mut sorted = active_nodes.to_vec();
        sorted.sort();
        let idx = (round_id as usize) % sorted.len();
        sorted[idx].clone()
    }

    pub fn current_round(&self) -> u64 {
        self.state.read().expect("ocr state lock poisoned").current_round
    }

    /// Signs and enqueues an observation for the current round (§4.10 step
    /// 3). Non-blocking: the channel is bounded at 1000, and a full channel
    /// just drops the submission.
    pub fn submit(&self, value: i128) {
        let round_id = self.current_round();
        let timestamp = Utc::now();
        let message = observation_digest(&self.feed_id, round_id, value, timestamp);
        let signature: Signature = self
            .signing_key
            .sign_prehash(&message)
            .expect("prehash signing over a fixed-size digest cannot fail");

        let observation = Observation {
            feed_id: self.feed_id.clone(),
            round_id,
            value,
            timestamp,
            signature: hex::encode(signature.to_bytes()),
            pubkey: self.public_key_hex(),
            node_id: self.local_node_id.clone(),
        };

        if self.obs_tx.try_send(observation).is_err() {
            warn!(feed_id = %self.feed_id, "observation channel full or closed, dropping submission");
        }
    }

    /// Observation handler (§4.10 step 4): verify structural validity and
    /// the declared key, insert into the round map, attempt to seal.
    pub fn handle_observation(&self, observation: Observation) {
        if !verify_observation(&observation) {
            warn!(node_id = %observation.node_id, "observation failed signature verification, discarding");
            return;
        }

        let should_seal = {
            let mut guard = self.state.write().expect("ocr state lock poisoned");
            let Some(round) = guard.rounds.get_mut(&observation.round_id) else {
                return;
            };
            if round.sealed {
                return;
            }
            round.observations.insert(observation.node_id.clone(), observation.clone());
            round.observations.len() >= self.config.threshold
        };

        if should_seal {
            self.try_attest(observation.round_id);
        }
    }

    /// Report-phase attestation intake (§4.10 step 5): a node — this one or
    /// a peer — that has independently derived the same deterministic
    /// report digest for `round_id` contributes its signature over it.
    /// Rejected if it doesn't verify against the digest this coordinator
    /// itself computes for the round, so a peer can never contribute a
    /// signature for a report it didn't actually observe.
    pub fn submit_report_signature(&self, round_id: u64, sig: ReportSignature) {
        let accepted = {
            let mut guard = self.state.write().expect("ocr state lock poisoned");
            let Some(round) = guard.rounds.get_mut(&round_id) else {
                return;
            };
            if round.sealed {
                return;
            }
            let Some((_, _, _, hash)) = Self::round_draft(round, round_id, &self.config) else {
                return;
            };
            if !verify_against_digest(&sig.pubkey, &hash, &sig.signature) {
                warn!(node_id = %sig.node_id, round_id, "report attestation failed verification, discarding");
                return;
            }
            round.signatures.insert(sig.node_id.clone(), sig);
            true
        };
        if accepted {
            self.try_seal(round_id);
        }
    }

    /// The deterministic draft a round would seal to if it sealed right
    /// now: `(aggregated_value, timestamp, observation_count, report_digest)`.
    /// Exposed so a node can learn what hash to sign without duplicating
    /// this logic; `None` until the round has threshold-many verified,
    /// surviving observations.
    pub fn round_draft_hash(&self, round_id: u64) -> Option<[u8; 32]> {
        let guard = self.state.read().expect("ocr state lock poisoned");
        let round = guard.rounds.get(&round_id)?;
        Self::round_draft(round, round_id, &self.config).map(|(.., hash)| hash)
    }

    fn round_draft(
        round: &RoundState,
        round_id: u64,
        config: &OcrConfig,
    ) -> Option<(i128, DateTime<Utc>, u32, [u8; 32])> {
        let verified: Vec<&Observation> = round.observations.values().filter(|o| verify_observation(o)).collect();
        if verified.len() < config.threshold {
            return None;
        }

        let values: Vec<i128> = verified.iter().map(|o| o.value).collect();
        let survivors = zscore_filter(&values, ZSCORE_THRESHOLD_SECURITY);
        let effective = if survivors.is_empty() { values.clone() } else { survivors };
        if effective.len() < config.threshold {
            return None;
        }

        // `median` re-derives the same filtered set internally (it's a pure
        // function of `values`/threshold), so this stays consistent with
        // `effective` above without double-filtering.
        let aggregated_value = median(&values, ZSCORE_THRESHOLD_SECURITY);
        // Every independent signer must land on the same digest, so the
        // timestamp is the round's start (agreed at round-open) rather than
        // whatever instant each signer happens to attest at.
        let timestamp = round.started_at;
        let count = effective.len() as u32;
        let hash = report_digest(round_id, aggregated_value, timestamp, count);
        Some((aggregated_value, timestamp, count, hash))
    }

    /// Local attestation (§4.10 step 5, first half): once the round map
    /// reaches `threshold`, sign this node's own copy of the deterministic
    /// draft and contribute it like any other attestation. Does not seal by
    /// itself — sealing waits for `threshold`-many attestations total.
    fn try_attest(&self, round_id: u64) {
        let already_sealing = {
            let mut guard = self.state.write().expect("ocr state lock poisoned");
            let Some(round) = guard.rounds.get_mut(&round_id) else {
                return;
            };
            if round.sealed || round.signatures.contains_key(&self.local_node_id) {
                true
            } else {
                let Some((_, _, _, hash)) = Self::round_draft(round, round_id, &self.config) else {
                    return;
                };
                let local_sig: Signature = self
                    .signing_key
                    .sign_prehash(&hash)
                    .expect("prehash signing over a fixed-size digest cannot fail");
                round.signatures.insert(
                    self.local_node_id.clone(),
                    ReportSignature {
                        node_id: self.local_node_id.clone(),
                        pubkey: self.public_key_hex(),
                        signature: hex::encode(local_sig.to_bytes()),
                    },
                );
                false
            }
        };
        if !already_sealing {
            self.try_seal(round_id);
        }
    }

    /// Sealing (§4.10 step 5, second half): once `threshold`-many verified
    /// attestations have accumulated for a round, build and publish the
    /// final `Report` non-blocking.
    fn try_seal(&self, round_id: u64) {
        let sealed_report = {
            let mut guard = self.state.write().expect("ocr state lock poisoned");
            let Some(round) = guard.rounds.get_mut(&round_id) else {
                return;
            };
            if round.sealed || round.signatures.len() < self.config.threshold {
                return;
            }
            if Utc::now().signed_duration_since(round.started_at).to_std().unwrap_or_default()
                > self.config.max_round_age
            {
                warn!(round_id, "round exceeded max age, will never seal");
                return;
            }
            let Some((aggregated_value, timestamp, count, hash)) = Self::round_draft(round, round_id, &self.config)
            else {
                return;
            };

            round.sealed = true;

            Report {
                round_id,
                feed_id: self.feed_id.clone(),
                aggregated_value,
                timestamp,
                leader: round.leader.clone(),
                epoch: round_id,
                observation_count: count,
                signatures: round.signatures.values().cloned().collect(),
                hash: hex::encode(hash),
            }
        };

        info!(feed_id = %self.feed_id, round_id, value = sealed_report.aggregated_value, "OCR round sealed");
        if self.report_tx.try_send(sealed_report).is_err() {
            debug!(round_id, "report consumer absent, dropping published report");
        }
    }

    /// `verify(report)` (§4.10 step 6).
    pub fn verify_report(&self, report: &Report) -> bool {
        if report.signatures.len() < self.config.threshold {
            return false;
        }
        let hash = hex::decode(&report.hash).unwrap_or_default();
        let matches = report
            .signatures
            .iter()
            .filter(|sig| verify_against_digest(&sig.pubkey, &hash, &sig.signature))
            .count();
        matches >= self.config.threshold
    }
}

fn observation_digest(feed_id: &str, round_id: u64, value: i128, timestamp: DateTime<Utc>) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(feed_id.as_bytes());
    hasher.update(round_id.to_be_bytes());
    hasher.update(value.to_be_bytes());
    hasher.update(timestamp.timestamp().to_be_bytes());
    hasher.finalize().into()
}

fn report_digest(round_id: u64, median: i128, timestamp: DateTime<Utc>, count: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(round_id.to_be_bytes());
    hasher.update(median.to_be_bytes());
    hasher.update(timestamp.timestamp().to_be_bytes());
    hasher.update(count.to_be_bytes());
    hasher.finalize().into()
}

fn verify_observation(observation: &Observation) -> bool {
    let digest = observation_digest(&observation.feed_id, observation.round_id, observation.value, observation.timestamp);
    verify_against_digest(&observation.pubkey, &digest, &observation.signature)
}

fn verify_against_digest(pubkey_hex: &str, digest: &[u8], signature_hex: &str) -> bool {
    let Ok(pubkey_bytes) = hex::decode(pubkey_hex) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(&pubkey_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return false;
    };
    verifying_key.verify_prehash(digest, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_observation(key: &SigningKey, node_id: &str, feed_id: &str, round_id: u64, value: i128) -> Observation {
        let timestamp = Utc::now();
        let digest = observation_digest(feed_id, round_id, value, timestamp);
        let signature: Signature = key.sign_prehash(&digest).unwrap();
        Observation {
            feed_id: feed_id.to_string(),
            round_id,
            value,
            timestamp,
            signature: hex::encode(signature.to_bytes()),
            pubkey: hex::encode(key.verifying_key().to_encoded_point(true).as_bytes()),
            node_id: node_id.to_string(),
        }
    }

    #[test]
    fn round_seals_once_threshold_observations_verify() {
        let mut config = OcrConfig::default();
        config.threshold = 3;
        let local_key = SigningKey::random(&mut rand::thread_rng());
        let (coordinator, _obs_rx, mut report_rx) = OcrCoordinator::new("eth-usd", config, "node-local", local_key);
        coordinator.start_new_round();
        let round_id = coordinator.current_round();

        let mut peer_keys = Vec::new();
        for i in 0..3 {
            let key = SigningKey::random(&mut rand::thread_rng());
            let obs = signed_observation(&key, &format!("node-{i}"), "eth-usd", round_id, 2500 + i as i128);
            coordinator.handle_observation(obs);
            peer_keys.push((format!("node-{i}"), key));
        }

        let hash = coordinator.round_draft_hash(round_id).expect("threshold reached, draft should be available");
        for (node_id, key) in &peer_keys {
            let signature: Signature = key.sign_prehash(&hash).unwrap();
            coordinator.submit_report_signature(
                round_id,
                ReportSignature {
                    node_id: node_id.clone(),
                    pubkey: hex::encode(key.verifying_key().to_encoded_point(true).as_bytes()),
                    signature: hex::encode(signature.to_bytes()),
                },
            );
        }

        let report = report_rx.try_recv().expect("round should have sealed");
        assert!(coordinator.verify_report(&report));
        assert_eq!(report.observation_count, 3);
    }

    #[test]
    fn tampered_observation_is_rejected_before_insertion() {
        let local_key = SigningKey::random(&mut rand::thread_rng());
        let config = OcrConfig::default();
        let (coordinator, _obs_rx, mut report_rx) = OcrCoordinator::new("eth-usd", config, "node-local", local_key);
        coordinator.start_new_round();
        let round_id = coordinator.current_round();

        let key = SigningKey::random(&mut rand::thread_rng());
        let mut obs = signed_observation(&key, "node-0", "eth-usd", round_id, 2500);
        obs.value = 999_999; // tamper after signing
        coordinator.handle_observation(obs);

        assert!(report_rx.try_recv().is_err());
    }
}
