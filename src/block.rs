use crate::{MerkleHash, MerkleTree, Sha256, Transaction};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A block hash that identifies the block uniquely and unambiguously, and implicitly all of its
/// ancestors.
#[derive(Hash, Ord, PartialOrd, Eq, PartialEq, Debug, Copy, Clone, Serialize, Deserialize)]
pub struct BlockHash(Sha256);

impl BlockHash {
    pub fn new(hash: Sha256) -> Self {
        Self(hash)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0.as_slice()
    }
}

impl Display for BlockHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

/// Block header represents the metadata of the block associated with it.
/// There is no difficulty target or nonce: proof of work is outside the scope of the
/// consensus core, so a block is identified by its content alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    // A reference to the hash of the previous (parent) block in the chain.
    previous_block_hash: BlockHash,
    // A hash of the root of the Merkle tree of this block's transactions.
    merkle_root: MerkleHash,
    // The approximate creation time of this block (seconds from Unix Epoch).
    timestamp: u32,
}

impl BlockHeader {
    pub fn new(previous_block_hash: BlockHash, merkle_root: MerkleHash, timestamp: u32) -> Self {
        Self {
            previous_block_hash,
            merkle_root,
            timestamp,
        }
    }

    pub fn hash(&self) -> BlockHash {
        let data = bincode::serialize(self).expect("serializing a block header never fails");
        BlockHash::new(Sha256::double_digest(&data))
    }

    pub fn previous_block_hash(&self) -> BlockHash {
        self.previous_block_hash
    }

    pub fn merkle_root(&self) -> MerkleHash {
        self.merkle_root
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    // Block hash that is equivalent to `header.hash()`.
    // It's convenient to store it here, rather than having to get it via block header each time.
    id: BlockHash,
    header: BlockHeader,
    // The coinbase transaction that credits this block's reward. It has no inputs and
    // is never run through transaction validation.
    coinbase: Transaction,
    // A list of transactions included in this block, excluding the coinbase.
    transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(
        previous_block_hash: BlockHash,
        timestamp: u32,
        coinbase: Transaction,
        transactions: Vec<Transaction>,
    ) -> Self {
        // The coinbase is the first leaf of the Merkle tree.
        let mut leaves = vec![coinbase.clone()];
        leaves.extend(transactions.iter().cloned());
        let merkle_root = MerkleTree::merkle_root_from_transactions(&leaves);
        let header = BlockHeader::new(previous_block_hash, merkle_root, timestamp);
        Self {
            id: header.hash(),
            header,
            coinbase,
            transactions,
        }
    }

    pub fn id(&self) -> &BlockHash {
        &self.id
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn coinbase(&self) -> &Transaction {
        &self.coinbase
    }

    pub fn transactions(&self) -> &Vec<Transaction> {
        &self.transactions
    }
}
