use crate::{Sha256, Transaction};
use std::fmt::{Display, Formatter};

/// Represents a SHA-256 hash of a Merkle tree node.
#[derive(Debug, Copy, Clone, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MerkleHash(Sha256);

impl MerkleHash {
    pub fn new(hash: Sha256) -> MerkleHash {
        Self(hash)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0.as_slice()
    }
}

impl Display for MerkleHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Contains a logic to construct a Merkle tree.
pub struct MerkleTree;

impl MerkleTree {
    pub fn merkle_root_from_transactions(transactions: &[Transaction]) -> MerkleHash {
        let leaves = transactions
            .iter()
            .map(|tx| tx.id().as_slice())
            .collect::<Vec<&[u8]>>();
        Self::merkle_root(&leaves)
    }

    /// Computes the Merkle root over the given leaves.
    ///
    /// Preconditions:
    ///   - `leaves` is non-empty. An empty tree has no root; a block always has at
    ///     least its coinbase as a leaf, so an empty call is a defect in the caller.
    pub fn merkle_root(leaves: &[&[u8]]) -> MerkleHash {
        assert!(!leaves.is_empty());
        let mut current_level_hashes = leaves
            .iter()
            .map(|leaf| Sha256::digest(*leaf))
            .collect::<Vec<Sha256>>();

        while current_level_hashes.len() != 1 {
            if current_level_hashes.len() % 2 == 1 {
                // If a level has an odd number of nodes, duplicate the last node.
                let last = *current_level_hashes.last().unwrap();
                current_level_hashes.push(last);
            }

            let mut next_level_hashes = vec![];
            for pair in current_level_hashes.chunks(2) {
                let mut data = vec![];
                data.extend_from_slice(pair[0].as_slice());
                data.extend_from_slice(pair[1].as_slice());
                next_level_hashes.push(Sha256::digest(&data));
            }
            current_level_hashes = next_level_hashes;
        }

        MerkleHash::new(current_level_hashes[0])
    }
}
