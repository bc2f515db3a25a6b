//! Simulated Transaction Hashes
//!
//! Attack legs are never broadcast, but outcomes still carry transaction
//! hashes so exported runs look like receipts. Hashes are SHA256 over the
//! leg's identifying fields, so a seeded run reproduces them exactly.

use sha2::{Digest, Sha256};

/// Which leg of a sandwich a hash belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxLeg {
    Frontrun,
    Backrun,
}

impl TxLeg {
    fn tag(&self) -> &'static [u8] {
        match self {
            TxLeg::Frontrun => b"frontrun",
            TxLeg::Backrun => b"backrun",
        }
    }
}

/// Hash the fields identifying one attack leg
/// Layout: agent id + 0x00 + opportunity id + 0x00 + leg tag + round (u64 LE)
pub fn hash_attack_leg(agent_id: &str, opportunity_id: &str, leg: TxLeg, round: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(agent_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(opportunity_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(leg.tag());
    hasher.update(round.to_le_bytes());
    let result = hasher.finalize();

    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Convert hash to 0x-prefixed hex string for display
pub fn hash_to_hex(hash: &[u8; 32]) -> String {
    let hex: String = hash.iter().map(|b| format!("{:02x}", b)).collect();
    format!("0x{}", hex)
}

/// Convenience: hex hash of one attack leg
pub fn attack_tx_hash(agent_id: &str, opportunity_id: &str, leg: TxLeg, round: u64) -> String {
    hash_to_hex(&hash_attack_leg(agent_id, opportunity_id, leg, round))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_determinism() {
        let a = attack_tx_hash("aggressive_bot", "opp-1", TxLeg::Frontrun, 7);
        let b = attack_tx_hash("aggressive_bot", "opp-1", TxLeg::Frontrun, 7);

        assert_eq!(a, b);
        assert_eq!(a.len(), 66);
        assert!(a.starts_with("0x"));
    }

    #[test]
    fn test_legs_hash_differently() {
        let front = hash_attack_leg("bot", "opp-1", TxLeg::Frontrun, 1);
        let back = hash_attack_leg("bot", "opp-1", TxLeg::Backrun, 1);
        assert_ne!(front, back);
    }

    #[test]
    fn test_field_boundaries_are_separated() {
        // "ab" + "c" must not collide with "a" + "bc"
        let h1 = hash_attack_leg("ab", "c", TxLeg::Frontrun, 1);
        let h2 = hash_attack_leg("a", "bc", TxLeg::Frontrun, 1);
        assert_ne!(h1, h2);
    }
}
