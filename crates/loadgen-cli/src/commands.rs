pub mod balance;
pub mod create_client;
pub mod distribute;
pub mod generate_wallet;
pub mod load_script;
pub mod relay;
pub mod trace;
pub mod transfer;
