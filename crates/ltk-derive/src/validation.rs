//! Fingerprint / validation engine.
//!
//! A node is proven correct to the operator by a short Z85 string: derive
//! the node's validation child, Argon2id-hash the Z85 form of its
//! symmetric key with a salt cut from its derivation key, and Z85-encode
//! the result. The operator compares the string against the one recorded
//! when the account or tape was first keyed; a matching fingerprint means
//! the whole derivation chain above it is intact.
//!
//! Argon2id is deliberately expensive, so computation is offloaded to a
//! blocking task ([`spawn_fingerprint`]) rather than run on the caller's
//! thread.

use argon2::{Algorithm, Argon2, Params, Version};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use zeroize::Zeroizing;

use ltk_core::config::FingerprintConfig;

use crate::codec::z85_encode;
use crate::error::DeriveError;
use crate::slip21::Slip21Node;

/// Salt length convention: the first 16 bytes of the validation child's
/// derivation key.
pub const SALT_LEN: usize = 16;

/// Output length for displayed account/global fingerprints (40 Z85 chars).
pub const DISPLAY_HASH_LEN: usize = 32;

/// Output length for tape fingerprints embedded in the KAD (30 Z85 chars).
pub const KAD_HASH_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintParams {
    pub mem_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
    pub out_len: usize,
}

impl FingerprintParams {
    /// Parameters for a displayed fingerprint.
    pub fn display(cfg: &FingerprintConfig) -> Self {
        Self::with_len(cfg, DISPLAY_HASH_LEN)
    }

    /// Parameters for the shorter tape fingerprint carried in the KAD.
    pub fn tape_kad(cfg: &FingerprintConfig) -> Self {
        Self::with_len(cfg, KAD_HASH_LEN)
    }

    fn with_len(cfg: &FingerprintConfig, out_len: usize) -> Self {
        Self {
            mem_cost_kib: cfg.mem_cost_kib,
            time_cost: cfg.time_cost,
            parallelism: cfg.parallelism,
            out_len,
        }
    }
}

/// Derive the validation child `N/"<label>"/"<rollover>"`.
pub fn validation_node(node: &Slip21Node, validation_label: &str, rollover: u64) -> Slip21Node {
    let mut level = node.child(validation_label);
    let v = level.child(&rollover.to_string());
    level.wipe();
    v
}

/// Argon2id hash of (message, salt) under the given parameters.
pub fn key_validation_hash(
    message: &[u8],
    salt: &[u8],
    params: &FingerprintParams,
) -> Result<Zeroizing<Vec<u8>>, DeriveError> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(params.out_len),
    )
    .map_err(|e| DeriveError::Argon2(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);
    let mut out = Zeroizing::new(vec![0u8; params.out_len]);
    argon2
        .hash_password_into(message, salt, &mut out)
        .map_err(|e| DeriveError::Argon2(e.to_string()))?;
    Ok(out)
}

/// Synchronous fingerprint of a node's validation child.
pub fn node_fingerprint(
    node: &Slip21Node,
    validation_label: &str,
    rollover: u64,
    params: &FingerprintParams,
) -> Result<String, DeriveError> {
    let mut v = validation_node(node, validation_label, rollover);
    let message = Zeroizing::new(z85_encode(v.symmetric_key())?);
    let salt: Zeroizing<[u8; SALT_LEN]> = Zeroizing::new(
        v.derivation_key()[..SALT_LEN]
            .try_into()
            .expect("salt is 16 bytes"),
    );
    v.wipe();
    let hash = key_validation_hash(message.as_bytes(), &salt[..], params)?;
    z85_encode(&hash)
}

/// Observable states of a background fingerprint computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintPhase {
    Pending,
    Started,
    Finished(Result<String, DeriveError>),
}

/// Handle to a background fingerprint computation.
///
/// The finished value is latched in the channel: `wait` after completion
/// re-delivers it without recomputing, and only one hash ever runs per
/// task.
#[derive(Debug)]
pub struct FingerprintTask {
    rx: watch::Receiver<FingerprintPhase>,
    join: JoinHandle<()>,
}

impl FingerprintTask {
    /// Current phase without blocking.
    pub fn phase(&self) -> FingerprintPhase {
        self.rx.borrow().clone()
    }

    /// Wait for completion; repeated calls return the latched result.
    pub async fn wait(&mut self) -> Result<String, DeriveError> {
        let finished = self
            .rx
            .wait_for(|p| matches!(p, FingerprintPhase::Finished(_)))
            .await;
        match finished {
            Ok(guard) => match &*guard {
                FingerprintPhase::Finished(result) => result.clone(),
                _ => unreachable!("wait_for only yields the finished phase"),
            },
            Err(_) => Err(DeriveError::Argon2(
                "fingerprint task ended without a result".to_string(),
            )),
        }
    }

    /// Abort the task. Takes effect before the hash starts; a hash already
    /// running completes and its result is discarded with the handle.
    pub fn cancel(&self) {
        self.join.abort();
    }
}

/// Offload a fingerprint computation.
///
/// The validation child is derived synchronously (cheap); only the
/// Argon2id hash runs on the blocking pool. Must be called from within a
/// tokio runtime.
pub fn spawn_fingerprint(
    node: &Slip21Node,
    validation_label: &str,
    rollover: u64,
    params: FingerprintParams,
) -> Result<FingerprintTask, DeriveError> {
    let mut v = validation_node(node, validation_label, rollover);
    let message = Zeroizing::new(z85_encode(v.symmetric_key())?);
    let salt: Zeroizing<[u8; SALT_LEN]> = Zeroizing::new(
        v.derivation_key()[..SALT_LEN]
            .try_into()
            .expect("salt is 16 bytes"),
    );
    let path = v.path().to_string();
    v.wipe();

    let (tx, rx) = watch::channel(FingerprintPhase::Pending);
    let join = tokio::spawn(async move {
        debug!(path = %path, "fingerprint computation started");
        let _ = tx.send(FingerprintPhase::Started);
        let result = tokio::task::spawn_blocking(move || {
            let hash = key_validation_hash(message.as_bytes(), &salt[..], &params)?;
            z85_encode(&hash)
        })
        .await
        .unwrap_or_else(|e| {
            Err(DeriveError::Argon2(format!("blocking task failed: {e}")))
        });
        debug!(path = %path, ok = result.is_ok(), "fingerprint computation finished");
        let _ = tx.send(FingerprintPhase::Finished(result));
    });
    Ok(FingerprintTask { rx, join })
}
