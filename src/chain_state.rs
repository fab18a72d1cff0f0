use crate::{
    Block, BlockHash, OutputIndex, SignatureOracle, Transaction, TransactionPool,
    TransactionValidator, UtxoId, UtxoPool,
};
use std::collections::{BTreeMap, HashMap, HashSet};

/// How far below the tallest tip a branch may fall before it is forgotten.
pub const CUT_OFF_AGE: u32 = 10;

/// The last block of one candidate chain fork, paired with the ledger snapshot that
/// results from applying every block on that fork.
/// Each tip exclusively owns its snapshot; accepting a block on one branch never
/// touches another branch's state.
pub struct BranchTip {
    block: Block,
    utxo_pool: UtxoPool,
    height: u32,
    // Monotonically increasing acceptance number, used to prefer the most recently
    // accepted tip among tips of equal height.
    sequence: u64,
}

impl BranchTip {
    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn utxo_pool(&self) -> &UtxoPool {
        &self.utxo_pool
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Keeps a bounded, fork-aware view of chain state.
///
/// There is no single canonical "current" block: every branch whose height is within
/// the retention window of the tallest tip stays active, each with its own snapshot.
/// New blocks attach to whichever tip their parent reference names; blocks whose
/// parent is unknown (or already pruned) are rejected outright.
///
/// The pending transaction pool is shared across branches. It is read by whoever
/// mines on the current tip and is never bound to one fork.
pub struct ChainState {
    // Tip data, owned here and looked up by block hash.
    tips: HashMap<BlockHash, BranchTip>,
    // An ordered index over the same tips, keyed by (height, sequence). The last
    // entry is the current tip; the first entries are the pruning candidates.
    tip_order: BTreeMap<(u32, u64), BlockHash>,
    pending: TransactionPool,
    oracle: Box<dyn SignatureOracle>,
    next_sequence: u64,
    cutoff: u32,
}

impl ChainState {
    /// Creates a chain state holding just the genesis block, which is trusted and not
    /// validated.
    pub fn new(genesis_block: Block, oracle: Box<dyn SignatureOracle>) -> Self {
        Self::with_cutoff(genesis_block, oracle, CUT_OFF_AGE)
    }

    pub fn with_cutoff(genesis_block: Block, oracle: Box<dyn SignatureOracle>, cutoff: u32) -> Self {
        let mut genesis_pool = UtxoPool::new();
        for transaction in genesis_block.transactions() {
            Self::credit_outputs(&mut genesis_pool, transaction);
        }
        Self::credit_outputs(&mut genesis_pool, genesis_block.coinbase());

        let genesis_hash = *genesis_block.id();
        let genesis_tip = BranchTip {
            block: genesis_block,
            utxo_pool: genesis_pool,
            height: 0,
            sequence: 0,
        };
        let mut tips = HashMap::new();
        tips.insert(genesis_hash, genesis_tip);
        let mut tip_order = BTreeMap::new();
        tip_order.insert((0, 0), genesis_hash);

        Self {
            tips,
            tip_order,
            pending: TransactionPool::new(),
            oracle,
            next_sequence: 1,
            cutoff,
        }
    }

    /// Validates the block against its parent's snapshot and, on success, registers a
    /// new branch tip for it.
    ///
    /// A block is valid when every one of its transactions eventually commits: the
    /// transaction list is scanned repeatedly, committing whatever currently
    /// validates, until a full scan commits nothing new. Transactions may therefore
    /// appear in any order within the block, including consumers ahead of their
    /// producers. If any transaction never commits, the whole block is rejected and
    /// no state changes.
    pub fn add_block(&mut self, block: Block) -> bool {
        if self.tips.contains_key(block.id()) {
            // Already accepted.
            return false;
        }
        let parent_hash = block.header().previous_block_hash();
        let (mut working, height) = match self.tips.get(&parent_hash) {
            Some(parent) => (parent.utxo_pool.clone(), parent.height + 1),
            None => return false, // Orphan: the parent is unknown or already pruned.
        };

        // Transaction ids are content-derived, so a block listing the same transaction
        // twice, re-listing its own coinbase, or replaying a transaction (or an
        // identical coinbase) already confirmed on this branch would re-create output
        // identities that exist in the snapshot. All of these reject the block before
        // any state changes.
        let mut ids = HashSet::new();
        ids.insert(*block.coinbase().id());
        for transaction in block.transactions() {
            if !ids.insert(*transaction.id()) {
                return false;
            }
        }
        let body_and_coinbase = block
            .transactions()
            .iter()
            .chain(std::iter::once(block.coinbase()));
        for transaction in body_and_coinbase {
            for index in 0..transaction.outputs().len() {
                let utxo_id = UtxoId::new(*transaction.id(), OutputIndex::new(index as u32));
                if working.contains(&utxo_id) {
                    return false;
                }
            }
        }

        let mut remaining: Vec<&Transaction> = block.transactions().iter().collect();
        loop {
            let mut deferred = Vec::new();
            let mut committed_any = false;
            for transaction in remaining {
                let valid = TransactionValidator::new(&working, None, &*self.oracle)
                    .is_valid(transaction);
                if valid {
                    working.apply(transaction);
                    committed_any = true;
                } else {
                    deferred.push(transaction);
                }
            }
            remaining = deferred;
            if remaining.is_empty() || !committed_any {
                break;
            }
        }
        if !remaining.is_empty() {
            return false;
        }

        // The coinbase introduces new value; it is credited unconditionally.
        Self::credit_outputs(&mut working, block.coinbase());

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let block_hash = *block.id();
        self.pending.remove_confirmed(&block);
        self.tip_order.insert((height, sequence), block_hash);
        self.tips.insert(
            block_hash,
            BranchTip {
                block,
                utxo_pool: working,
                height,
                sequence,
            },
        );
        self.prune();
        true
    }

    /// Adds the transaction to the shared pending pool. No validation happens here;
    /// validity is decided at selection or commit time against whichever tip's
    /// snapshot is then in use.
    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.pending.insert(transaction);
    }

    /// The current tip: the maximum-height branch, ties broken by the most recently
    /// accepted block.
    pub fn tip(&self) -> &BranchTip {
        let (_, block_hash) = self
            .tip_order
            .iter()
            .next_back()
            .expect("chain state always holds at least one tip");
        self.tips
            .get(block_hash)
            .expect("tip order and tip map are in sync")
    }

    pub fn tip_count(&self) -> usize {
        self.tips.len()
    }

    pub fn contains_block(&self, block_hash: &BlockHash) -> bool {
        self.tips.contains_key(block_hash)
    }

    pub fn pending_pool(&self) -> &TransactionPool {
        &self.pending
    }

    /// Drops every tip whose height has fallen more than the retention window below
    /// the tallest tip, releasing its block and snapshot.
    fn prune(&mut self) {
        let max_height = {
            let (&(height, _), _) = self
                .tip_order
                .iter()
                .next_back()
                .expect("chain state always holds at least one tip");
            height
        };
        loop {
            let (&(height, sequence), &block_hash) = self
                .tip_order
                .iter()
                .next()
                .expect("chain state always holds at least one tip");
            if height + self.cutoff >= max_height {
                break;
            }
            self.tip_order.remove(&(height, sequence));
            self.tips.remove(&block_hash);
        }
    }

    /// Makes every output of the transaction spendable without consuming anything.
    /// Used for coinbase and trusted genesis transactions only.
    fn credit_outputs(pool: &mut UtxoPool, transaction: &Transaction) {
        for (index, output) in transaction.outputs().iter().enumerate() {
            let utxo_id = UtxoId::new(*transaction.id(), OutputIndex::new(index as u32));
            pool.add(utxo_id, output.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Address, DigestSignatureScheme, Sha256, Signature, Tinycoin, TransactionId,
        TransactionInput, TransactionOutput, TransactionSelector,
    };

    #[test]
    fn starts_at_the_genesis_tip() {
        let genesis = genesis_block();
        let genesis_coinbase = genesis.coinbase().clone();
        let state = chain_state(genesis);

        assert_eq!(state.tip().height(), 0);
        assert_eq!(state.tip_count(), 1);
        assert!(state
            .tip()
            .utxo_pool()
            .contains(&utxo(&genesis_coinbase, 0)));
    }

    #[test]
    fn block_with_unknown_parent_is_rejected() {
        let mut state = chain_state(genesis_block());
        let orphan = Block::new(
            BlockHash::new(Sha256::from_raw([9; 32])),
            100,
            coinbase("miner-1"),
            vec![],
        );

        assert!(!state.add_block(orphan));
        assert_eq!(state.tip_count(), 1);
        assert_eq!(state.tip().height(), 0);
    }

    #[test]
    fn valid_block_becomes_the_new_tip() {
        let genesis = genesis_block();
        let genesis_coinbase = genesis.coinbase().clone();
        let mut state = chain_state(genesis);

        let spend = signed_spend(
            vec![(utxo(&genesis_coinbase, 0), address("genesis-miner"))],
            vec![TransactionOutput::new(address("alice"), Tinycoin::new(40))],
        );
        let block = Block::new(
            *state.tip().block().id(),
            100,
            coinbase("miner-1"),
            vec![spend.clone()],
        );
        let block_hash = *block.id();

        assert!(state.add_block(block));
        assert_eq!(state.tip().height(), 1);
        assert_eq!(state.tip().block().id(), &block_hash);
        assert!(state.tip().utxo_pool().contains(&utxo(&spend, 0)));
        assert!(!state
            .tip()
            .utxo_pool()
            .contains(&utxo(&genesis_coinbase, 0)));
    }

    #[test]
    fn transactions_commit_regardless_of_their_order_in_the_block() {
        let genesis = genesis_block();
        let genesis_coinbase = genesis.coinbase().clone();
        let mut state = chain_state(genesis);

        let first = signed_spend(
            vec![(utxo(&genesis_coinbase, 0), address("genesis-miner"))],
            vec![TransactionOutput::new(address("alice"), Tinycoin::new(40))],
        );
        let second = signed_spend(
            vec![(utxo(&first, 0), address("alice"))],
            vec![TransactionOutput::new(address("bob"), Tinycoin::new(30))],
        );

        // The consumer is listed ahead of its producer; the fixed-point revalidation
        // loop must still commit both.
        let block = Block::new(
            *state.tip().block().id(),
            100,
            coinbase("miner-1"),
            vec![second.clone(), first],
        );
        assert!(state.add_block(block));
        assert!(state.tip().utxo_pool().contains(&utxo(&second, 0)));
    }

    #[test]
    fn block_with_an_uncommittable_transaction_is_rejected_whole() {
        let genesis = genesis_block();
        let genesis_coinbase = genesis.coinbase().clone();
        let mut state = chain_state(genesis);

        let pending_tx = signed_spend(
            vec![(utxo(&genesis_coinbase, 0), address("genesis-miner"))],
            vec![TransactionOutput::new(address("alice"), Tinycoin::new(40))],
        );
        state.add_transaction(pending_tx.clone());

        let never_valid = signed_spend(
            vec![(
                UtxoId::new(
                    TransactionId::new(Sha256::from_raw([8; 32])),
                    OutputIndex::new(0),
                ),
                address("nobody"),
            )],
            vec![TransactionOutput::new(address("bob"), Tinycoin::new(1))],
        );
        let block = Block::new(
            *state.tip().block().id(),
            100,
            coinbase("miner-1"),
            vec![pending_tx.clone(), never_valid],
        );

        assert!(!state.add_block(block));
        // No partial effect: tip, snapshot and pending pool are untouched.
        assert_eq!(state.tip().height(), 0);
        assert_eq!(state.tip_count(), 1);
        assert!(state
            .tip()
            .utxo_pool()
            .contains(&utxo(&genesis_coinbase, 0)));
        assert!(state.pending_pool().contains(pending_tx.id()));
    }

    #[test]
    fn block_listing_a_transaction_twice_is_rejected() {
        let genesis = genesis_block();
        let genesis_coinbase = genesis.coinbase().clone();
        let mut state = chain_state(genesis);

        let spend = signed_spend(
            vec![(utxo(&genesis_coinbase, 0), address("genesis-miner"))],
            vec![TransactionOutput::new(address("alice"), Tinycoin::new(40))],
        );
        let block = Block::new(
            *state.tip().block().id(),
            100,
            coinbase("miner-1"),
            vec![spend.clone(), spend],
        );

        assert!(!state.add_block(block));
        assert_eq!(state.tip().height(), 0);
    }

    #[test]
    fn block_replaying_a_confirmed_transaction_is_rejected() {
        let mut state = chain_state(genesis_block());

        // An inputless transaction with a zero-value output validates against any
        // snapshot, so only the replay guard stands between it and a second commit.
        let replayable = Transaction::new(
            vec![],
            vec![TransactionOutput::new(address("alice"), Tinycoin::new(0))],
        );
        let first = Block::new(
            *state.tip().block().id(),
            100,
            coinbase("miner-1"),
            vec![replayable.clone()],
        );
        assert!(state.add_block(first));

        let replay = Block::new(
            *state.tip().block().id(),
            101,
            coinbase("miner-2"),
            vec![replayable],
        );
        assert!(!state.add_block(replay));
        assert_eq!(state.tip().height(), 1);
    }

    #[test]
    fn block_repeating_an_earlier_coinbase_is_rejected() {
        let mut state = chain_state(genesis_block());

        // Coinbase ids are content-derived, so the same recipient and reward twice on
        // one branch would re-create the first block's coinbase output.
        let first = Block::new(*state.tip().block().id(), 100, coinbase("miner-1"), vec![]);
        assert!(state.add_block(first));

        let repeat = Block::new(*state.tip().block().id(), 101, coinbase("miner-1"), vec![]);
        assert!(!state.add_block(repeat));
        assert_eq!(state.tip().height(), 1);

        // A coinbase with fresh content extends the branch as usual.
        let fresh = Block::new(*state.tip().block().id(), 101, coinbase("miner-2"), vec![]);
        assert!(state.add_block(fresh));
        assert_eq!(state.tip().height(), 2);
    }

    #[test]
    fn block_listing_its_own_coinbase_in_the_body_is_rejected() {
        let mut state = chain_state(genesis_block());

        let reward = coinbase("miner-1");
        let block = Block::new(
            *state.tip().block().id(),
            100,
            reward.clone(),
            vec![reward],
        );
        assert!(!state.add_block(block));
        assert_eq!(state.tip().height(), 0);
    }

    #[test]
    fn accepted_block_clears_its_transactions_from_the_pending_pool() {
        let genesis = genesis_block();
        let genesis_coinbase = genesis.coinbase().clone();
        let mut state = chain_state(genesis);

        let spend = signed_spend(
            vec![(utxo(&genesis_coinbase, 0), address("genesis-miner"))],
            vec![TransactionOutput::new(address("alice"), Tinycoin::new(40))],
        );
        let unrelated = Transaction::new_coinbase(address("unrelated"), Tinycoin::new(0));
        state.add_transaction(spend.clone());
        state.add_transaction(unrelated.clone());

        let block = Block::new(
            *state.tip().block().id(),
            100,
            coinbase("miner-1"),
            vec![spend.clone()],
        );
        assert!(state.add_block(block));

        assert!(!state.pending_pool().contains(spend.id()));
        assert!(state.pending_pool().contains(unrelated.id()));
    }

    #[test]
    fn equal_height_forks_prefer_the_most_recently_accepted_tip() {
        let mut state = chain_state(genesis_block());
        let genesis_hash = *state.tip().block().id();

        let fork_a = Block::new(genesis_hash, 100, coinbase("miner-a"), vec![]);
        let fork_b = Block::new(genesis_hash, 101, coinbase("miner-b"), vec![]);
        let fork_b_hash = *fork_b.id();

        assert!(state.add_block(fork_a));
        assert!(state.add_block(fork_b));

        assert_eq!(state.tip_count(), 3);
        assert_eq!(state.tip().height(), 1);
        assert_eq!(state.tip().block().id(), &fork_b_hash);
    }

    #[test]
    fn branches_own_independent_snapshots() {
        let genesis = genesis_block();
        let genesis_coinbase = genesis.coinbase().clone();
        let mut state = chain_state(genesis);
        let genesis_hash = *state.tip().block().id();

        // Fork A spends the genesis output; fork B leaves it alone.
        let spend = signed_spend(
            vec![(utxo(&genesis_coinbase, 0), address("genesis-miner"))],
            vec![TransactionOutput::new(address("alice"), Tinycoin::new(40))],
        );
        let fork_a = Block::new(genesis_hash, 100, coinbase("miner-a"), vec![spend]);
        let fork_b = Block::new(genesis_hash, 101, coinbase("miner-b"), vec![]);
        let fork_b_hash = *fork_b.id();

        assert!(state.add_block(fork_a));
        assert!(state.add_block(fork_b));

        // The current tip is fork B, whose snapshot still holds the genesis output.
        assert_eq!(state.tip().block().id(), &fork_b_hash);
        assert!(state
            .tip()
            .utxo_pool()
            .contains(&utxo(&genesis_coinbase, 0)));
    }

    #[test]
    fn tips_below_the_retention_window_are_pruned() {
        let mut state = ChainState::with_cutoff(
            genesis_block(),
            Box::new(DigestSignatureScheme::new()),
            1,
        );
        let genesis_hash = *state.tip().block().id();

        let mut parent_hash = genesis_hash;
        for height in 1..=4 {
            let block = Block::new(
                parent_hash,
                100 + height,
                coinbase(&format!("miner-{}", height)),
                vec![],
            );
            parent_hash = *block.id();
            assert!(state.add_block(block));
        }

        // Max height is 4 and the window is 1, so only heights 3 and 4 survive.
        assert_eq!(state.tip().height(), 4);
        assert_eq!(state.tip_count(), 2);
        assert!(!state.contains_block(&genesis_hash));

        // Building on a pruned tip is rejected like any other orphan.
        let stale = Block::new(genesis_hash, 200, coinbase("miner-stale"), vec![]);
        assert!(!state.add_block(stale));
    }

    // The full mining flow: relayed transactions accumulate in the pending pool, the
    // selector picks the fee-maximal subset against the current tip's snapshot, and
    // the resulting block extends the chain.
    #[test]
    fn pending_transactions_flow_into_a_mined_block() {
        let genesis = genesis_block();
        let genesis_coinbase = genesis.coinbase().clone();
        let mut state = chain_state(genesis);

        let spend = signed_spend(
            vec![(utxo(&genesis_coinbase, 0), address("genesis-miner"))],
            vec![TransactionOutput::new(address("alice"), Tinycoin::new(40))],
        );
        let respend = signed_spend(
            vec![(utxo(&spend, 0), address("alice"))],
            vec![TransactionOutput::new(address("bob"), Tinycoin::new(35))],
        );
        state.add_transaction(spend.clone());
        state.add_transaction(respend.clone());

        let mut selector = TransactionSelector::new(
            state.tip().utxo_pool().clone(),
            Box::new(DigestSignatureScheme::new()),
        );
        let accepted = selector.select(&state.pending_pool().all());
        assert_eq!(accepted.len(), 2);

        let block = Block::new(
            *state.tip().block().id(),
            100,
            coinbase("miner-1"),
            accepted,
        );
        assert!(state.add_block(block));
        assert_eq!(state.tip().height(), 1);
        assert!(state.pending_pool().is_empty());
        assert!(state.tip().utxo_pool().contains(&utxo(&respend, 0)));
    }

    fn chain_state(genesis: Block) -> ChainState {
        ChainState::new(genesis, Box::new(DigestSignatureScheme::new()))
    }

    fn genesis_block() -> Block {
        Block::new(
            BlockHash::new(Sha256::from_raw([0; 32])),
            0,
            coinbase("genesis-miner"),
            vec![],
        )
    }

    fn coinbase(miner: &str) -> Transaction {
        Transaction::new_coinbase(address(miner), Tinycoin::new(50))
    }

    fn address(name: &str) -> Address {
        Address::new(name.to_string())
    }

    fn utxo(producer: &Transaction, index: u32) -> UtxoId {
        UtxoId::new(*producer.id(), OutputIndex::new(index))
    }

    fn signed_spend(
        sources: Vec<(UtxoId, Address)>,
        outputs: Vec<TransactionOutput>,
    ) -> Transaction {
        let scheme = DigestSignatureScheme::new();
        let placeholder = Signature::new(vec![]);
        let unsigned_inputs = sources
            .iter()
            .map(|(utxo_id, _)| TransactionInput::new(*utxo_id, placeholder.clone()))
            .collect();
        let unsigned = Transaction::new(unsigned_inputs, outputs.clone());

        let inputs = sources
            .iter()
            .enumerate()
            .map(|(index, (utxo_id, owner))| {
                let signature = scheme.sign(owner, &unsigned.signing_payload(index));
                TransactionInput::new(*utxo_id, signature)
            })
            .collect();
        Transaction::new(inputs, outputs)
    }
}
