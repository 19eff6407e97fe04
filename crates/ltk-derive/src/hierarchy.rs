//! The tape-encryption key hierarchy on top of SLIP-0021.
//!
//! Level layout (labels are SLIP-0021 children, rollovers rendered as
//! decimal strings):
//!
//! ```text
//! m / "<tree label>" / "<global rollover>"            → global node
//!   / "<account id>" / "<account rollover>"           → account node
//!   / "<barcode>"    / "<tape rollover>"              → tape node
//! ```
//!
//! Rolling any counter forward retires every key below that level without
//! touching the recovery phrase.

use ltk_core::types::{Barcode, RolloverCounters};
use tracing::debug;

use crate::material::Secret64;
use crate::slip21::Slip21Node;

/// Global node for a schema label and global rollover count.
pub fn global_node(seed: &Secret64, tree_label: &str, global_rollover: u64) -> Slip21Node {
    let mut master = Slip21Node::master(seed);
    let mut schema = master.child(tree_label);
    master.wipe();
    let node = schema.child(&global_rollover.to_string());
    schema.wipe();
    debug!(path = node.path(), "derived global node");
    node
}

/// Account node below a global node.
pub fn account_node(global: &Slip21Node, account_id: &str, account_rollover: u64) -> Slip21Node {
    let mut level = global.child(account_id);
    let node = level.child(&account_rollover.to_string());
    level.wipe();
    debug!(path = node.path(), "derived account node");
    node
}

/// Tape node below an account node.
pub fn tape_node(account: &Slip21Node, barcode: &Barcode, tape_rollover: u64) -> Slip21Node {
    let mut level = account.child(barcode.as_str());
    let node = level.child(&tape_rollover.to_string());
    level.wipe();
    debug!(path = node.path(), "derived tape node");
    node
}

/// Full chain seed → tape node, wiping every intermediate level.
pub fn derive_tape_node(
    seed: &Secret64,
    tree_label: &str,
    account_id: &str,
    barcode: &Barcode,
    rollovers: RolloverCounters,
) -> Slip21Node {
    let mut global = global_node(seed, tree_label, rollovers.global);
    let mut account = account_node(&global, account_id, rollovers.account);
    global.wipe();
    let tape = tape_node(&account, barcode, rollovers.tape);
    account.wipe();
    tape
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> Secret64 {
        Secret64::from_bytes([0x5Au8; 64])
    }

    #[test]
    fn tape_node_path_shape() {
        let tape = derive_tape_node(
            &seed(),
            "LTO tape encryption",
            "backups",
            &Barcode("LTO123L6".to_string()),
            RolloverCounters {
                global: 0,
                account: 2,
                tape: 1,
            },
        );
        assert_eq!(
            tape.path(),
            "m/\"LTO tape encryption\"/\"0\"/\"backups\"/\"2\"/\"LTO123L6\"/\"1\""
        );
    }

    #[test]
    fn rollover_changes_every_key_below() {
        let a = derive_tape_node(
            &seed(),
            "LTO tape encryption",
            "backups",
            &Barcode("LTO123L6".to_string()),
            RolloverCounters::default(),
        );
        let b = derive_tape_node(
            &seed(),
            "LTO tape encryption",
            "backups",
            &Barcode("LTO123L6".to_string()),
            RolloverCounters {
                global: 1,
                ..Default::default()
            },
        );
        assert_ne!(a.symmetric_key(), b.symmetric_key());
    }

    #[test]
    fn stepwise_equals_full_chain() {
        let barcode = Barcode("TAPE01L8".to_string());
        let rollovers = RolloverCounters::default();
        let global = global_node(&seed(), "LTO tape encryption", rollovers.global);
        let account = account_node(&global, "0", rollovers.account);
        let tape = tape_node(&account, &barcode, rollovers.tape);
        let full = derive_tape_node(&seed(), "LTO tape encryption", "0", &barcode, rollovers);
        assert_eq!(tape.symmetric_key(), full.symmetric_key());
    }
}
