// In-process model of the contracts deployed on each chain

pub mod chain_simulator;
pub mod interface;
pub mod token_ledger;

pub use chain_simulator::{contract_address, Block, Chain, ChainHandle, Env, TxContext};
pub use interface::{CallEnv, ChainInterface, ContractCode};
pub use token_ledger::TokenLedger;
