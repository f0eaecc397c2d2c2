pub mod account;
pub mod block;
pub mod chain;
pub mod crypto;
pub mod execution;
pub mod explorer;
pub mod selection;
pub mod transaction;
pub mod validation;

pub use account::Account;
pub use block::Block;
pub use chain::{Blockchain, ConsensusError, MineError, NodeSnapshot, ReceiveBlockError};
pub use transaction::Transaction;
