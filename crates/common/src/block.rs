//! The universal state block.
//!
//! Every operation on an account chain (open, send, receive, representative
//! change) is expressed as one block shape carrying the full resulting
//! account state. Direction is not stored explicitly: a block is a send or
//! a receive depending on how `balance` compares to its predecessor's, which
//! only the ledger can decide.

use crate::types::{Account, Amount, BlockHash, HashOrAccount, Signature, WorkNonce};
use crate::utils::keccak;
use sha3::{Digest, Keccak256};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Block {
    pub account: Account,
    pub previous: BlockHash,
    pub representative: Account,
    pub balance: Amount,
    /// Destination account for sends, source block hash for receives and
    /// opens, zero for representative changes.
    pub link: HashOrAccount,
    pub signature: Signature,
    pub work: WorkNonce,
}

impl Block {
    /// Block hash over the state fields. Signature and work are detached
    /// and do not contribute.
    pub fn hash(&self) -> BlockHash {
        let mut hasher = Keccak256::new();
        hasher.update(self.account.as_bytes());
        hasher.update(self.previous.as_bytes());
        hasher.update(self.representative.as_bytes());
        hasher.update(self.balance.to_be_bytes());
        hasher.update(self.link.0);
        BlockHash(hasher.finalize().into())
    }

    /// An open block starts its account chain.
    pub fn is_open(&self) -> bool {
        self.previous.is_zero()
    }

    pub fn link_as_source(&self) -> BlockHash {
        self.link.as_block_hash()
    }

    pub fn link_as_destination(&self) -> Account {
        self.link.as_account()
    }

    /// Deterministic filler signature for fixtures and unsigned local
    /// blocks. Real signing lives outside this crate.
    pub fn fill_signature(&mut self) {
        let digest = keccak(self.hash().as_bytes());
        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(&digest);
        signature[32..].copy_from_slice(&digest);
        self.signature = Signature(signature);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block {
            account: Account::from_low_u64_be(1),
            previous: BlockHash::from_low_u64_be(2),
            representative: Account::from_low_u64_be(3),
            balance: Amount::raw(1000),
            link: HashOrAccount::from_low_u64_be(4),
            signature: Signature::default(),
            work: 0,
        }
    }

    #[test]
    fn hash_ignores_signature_and_work() {
        let block = sample_block();
        let mut signed = block.clone();
        signed.fill_signature();
        signed.work = 42;
        assert_eq!(block.hash(), signed.hash());
    }

    #[test]
    fn hash_depends_on_every_state_field() {
        let base = sample_block().hash();
        let mut changed = sample_block();
        changed.balance = Amount::raw(999);
        assert_ne!(base, changed.hash());
        let mut changed = sample_block();
        changed.link = HashOrAccount::from_low_u64_be(5);
        assert_ne!(base, changed.hash());
    }

    #[test]
    fn open_block_detection() {
        let mut block = sample_block();
        assert!(!block.is_open());
        block.previous = BlockHash::ZERO;
        assert!(block.is_open());
    }
}
