pub mod anvil;
pub mod blockexplorer_controller;
pub mod contract_controller;
pub mod contractversion_controller;
pub mod deploy_job;
pub mod network_controller;
pub mod rpcprovider_controller;
pub mod state;
pub mod wallet_controller;

pub use state::{Context, Diagnostics, State};
