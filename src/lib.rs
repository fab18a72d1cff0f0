pub mod amount;
pub mod block;
pub mod chain_state;
pub mod crypto;
pub mod forest;
pub mod hash;
pub mod merkle_tree;
pub mod selection;
pub mod transaction;
pub mod transaction_pool;
pub mod utxo_pool;
pub mod validation;

pub use self::{
    amount::*, block::*, chain_state::*, crypto::*, forest::*, hash::*, merkle_tree::*,
    selection::*, transaction::*, transaction_pool::*, utxo_pool::*, validation::*,
};
