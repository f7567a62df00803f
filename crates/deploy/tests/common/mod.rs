//! In-memory chain used by the integration tests.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    future::Future,
    path::{Path, PathBuf},
    sync::Mutex,
};

use alloy_core::primitives::{Address, B256, Bytes, U256};
use greendish_deploy::{
    ChainClient, ChainError, DeployConfig, PendingTx, TxReceipt, Value,
};

pub const CHAIN_ID: u64 = 31337;

/// Template mirroring the shipped browser config module.
pub const CONFIG_MODULE_TEMPLATE: &str = r#"// Contract configuration for the GreenDish front end
const GreenDishConfig = {
    // Contract addresses will be updated by deployment script
    addresses: {
        GreenCoin: "0x5FbDB2315678afecb367f032d93F642f64180aa3", // Hardhat deployed address
        GreenDish: "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"  // Hardhat deployed address
    },

    greenDishABI: [
        { "name": "dishCount", "type": "function", "stateMutability": "view", "inputs": [] }
    ],

    loadDeploymentAddresses: async function () {
        const response = await fetch('/deployments.json');
        const deploymentData = await response.json();
        if (deploymentData.greenCoinAddress) {
            this.addresses.GreenCoin = deploymentData.greenCoinAddress;
        }
    }
};
"#;

/// Initialize tracing for tests (idempotent).
pub fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Config whose artifacts all live under `dir`, with the config module template in place.
pub fn config_in(dir: &Path) -> DeployConfig {
    let mut config = DeployConfig::default();
    config.publish.manifests = vec![
        dir.join("public/deployments.json"),
        dir.join("deployment-info.json"),
    ];
    config.publish.config_module = Some(dir.join("public/js/contract-config.js"));
    config.publish.summary = Some(dir.join("deployment-summary.txt"));

    std::fs::create_dir_all(dir.join("public/js")).unwrap();
    std::fs::write(dir.join("public/js/contract-config.js"), CONFIG_MODULE_TEMPLATE).unwrap();
    config
}

pub fn config_module_path(dir: &Path) -> PathBuf {
    dir.join("public/js/contract-config.js")
}

#[derive(Debug, Clone)]
enum Contract {
    Token {
        total_supply: U256,
        balances: HashMap<Address, U256>,
    },
    Marketplace {
        token: Address,
        token_initialized: bool,
        dishes: u64,
    },
}

#[derive(Debug, Default)]
struct State {
    contracts: HashMap<Address, Contract>,
    receipts: HashMap<B256, TxReceipt>,
    nonce: u64,
    block: u64,
    /// Every submitted transaction, as `deploy:<Name>` or `call:<method>`.
    submitted: Vec<String>,
    deployed: Vec<Address>,
    revert_method: Option<String>,
    failing_read: Option<String>,
    hang_confirmations: bool,
    uninitialized_marketplace: bool,
}

/// Stateful in-memory token and marketplace.
#[derive(Debug)]
pub struct MockChain {
    chain_id: u64,
    deployer: Address,
    total_supply: U256,
    ecosystem_percentage: u64,
    state: Mutex<State>,
}

fn method_name(signature: &str) -> &str {
    signature.split('(').next().unwrap_or(signature).trim()
}

fn uint_arg(args: &[Value], index: usize) -> Result<U256, ChainError> {
    args.get(index)
        .and_then(Value::as_uint)
        .ok_or_else(|| ChainError::Transport(format!("argument {index} is not a uint")))
}

fn address_arg(args: &[Value], index: usize) -> Result<Address, ChainError> {
    args.get(index)
        .and_then(Value::as_address)
        .ok_or_else(|| ChainError::Transport(format!("argument {index} is not an address")))
}

fn revert(reason: &str) -> ChainError {
    ChainError::Revert {
        reason: Some(reason.to_string()),
    }
}

impl MockChain {
    pub fn new(total_supply: U256) -> Self {
        Self {
            chain_id: CHAIN_ID,
            deployer: Address::repeat_byte(0xde),
            total_supply,
            ecosystem_percentage: 30,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Submitting `method` fails with a revert.
    pub fn revert_on(&self, method: Option<&str>) {
        self.state.lock().unwrap().revert_method = method.map(str::to_string);
    }

    /// Reading `method` fails with a transport error.
    pub fn fail_read_on(&self, method: Option<&str>) {
        self.state.lock().unwrap().failing_read = method.map(str::to_string);
    }

    /// Transactions are accepted but never mined.
    pub fn hang_confirmations(&self, hang: bool) {
        self.state.lock().unwrap().hang_confirmations = hang;
    }

    /// Marketplaces deployed from now on report `tokenInitialized() == false`.
    pub fn uninitialized_marketplace(&self) {
        self.state.lock().unwrap().uninitialized_marketplace = true;
    }

    pub fn submitted(&self) -> Vec<String> {
        self.state.lock().unwrap().submitted.clone()
    }

    /// Contract addresses in deployment order.
    pub fn deployed(&self) -> Vec<Address> {
        self.state.lock().unwrap().deployed.clone()
    }

    pub fn balance_of(&self, token: Address, owner: Address) -> U256 {
        match self.state.lock().unwrap().contracts.get(&token) {
            Some(Contract::Token { balances, .. }) => {
                balances.get(&owner).copied().unwrap_or_default()
            }
            _ => U256::ZERO,
        }
    }

    fn next_tx(state: &mut State, contract_address: Option<Address>) -> PendingTx {
        state.nonce += 1;
        state.block += 1;
        let tx_hash = B256::left_padding_from(&state.nonce.to_be_bytes());
        state.receipts.insert(
            tx_hash,
            TxReceipt {
                tx_hash,
                success: true,
                block_number: Some(state.block),
                contract_address,
            },
        );
        PendingTx { tx_hash }
    }

    fn deploy_sync(&self, contract: &str, args: &[Value]) -> Result<PendingTx, ChainError> {
        let mut state = self.state.lock().unwrap();
        if state.revert_method.as_deref() == Some(contract) {
            return Err(revert("constructor reverted"));
        }

        let address = Address::left_padding_from(&[0x10, state.deployed.len() as u8 + 1]);
        let deployed = match contract {
            "GreenCoin" => Contract::Token {
                total_supply: self.total_supply,
                balances: HashMap::from([(self.deployer, self.total_supply)]),
            },
            "GreenDish" => {
                let token = address_arg(args, 0)?;
                let token_initialized = !state.uninitialized_marketplace
                    && matches!(state.contracts.get(&token), Some(Contract::Token { .. }));
                Contract::Marketplace {
                    token,
                    token_initialized,
                    dishes: 0,
                }
            }
            other => {
                return Err(ChainError::Transport(format!("no artifact for {other}")));
            }
        };

        state.contracts.insert(address, deployed);
        state.deployed.push(address);
        state.submitted.push(format!("deploy:{contract}"));
        Ok(Self::next_tx(&mut state, Some(address)))
    }

    fn transfer(state: &mut State, token: Address, from: Address, to: Address, amount: U256) -> Result<(), ChainError> {
        let Some(Contract::Token { balances, .. }) = state.contracts.get_mut(&token) else {
            return Err(revert("not a token"));
        };
        let from_balance = balances.get(&from).copied().unwrap_or_default();
        if from_balance < amount {
            return Err(revert("ERC20: transfer amount exceeds balance"));
        }
        balances.insert(from, from_balance - amount);
        *balances.entry(to).or_default() += amount;
        Ok(())
    }

    fn call_sync(&self, address: Address, method: &str, args: &[Value]) -> Result<PendingTx, ChainError> {
        let name = method_name(method);
        let mut state = self.state.lock().unwrap();
        if state.revert_method.as_deref() == Some(name) {
            return Err(revert(&format!("{name} disabled")));
        }

        match name {
            "transfer" => {
                let to = address_arg(args, 0)?;
                let amount = uint_arg(args, 1)?;
                Self::transfer(&mut state, address, self.deployer, to, amount)?;
            }
            "allocateToRewardPool" => {
                let to = address_arg(args, 0)?;
                let amount = self.total_supply * U256::from(self.ecosystem_percentage) / U256::from(100u64);
                Self::transfer(&mut state, address, self.deployer, to, amount)?;
            }
            "createDish" => match state.contracts.get_mut(&address) {
                Some(Contract::Marketplace { dishes, .. }) => *dishes += 1,
                _ => return Err(revert("not a marketplace")),
            },
            other => return Err(ChainError::Transport(format!("unknown method {other}"))),
        }

        state.submitted.push(format!("call:{name}"));
        Ok(Self::next_tx(&mut state, None))
    }

    fn read_sync(&self, address: Address, method: &str, args: &[Value]) -> Result<Value, ChainError> {
        let state = self.state.lock().unwrap();
        if state.failing_read.as_deref() == Some(method_name(method)) {
            return Err(ChainError::Transport("connection reset".to_string()));
        }
        let contract = state
            .contracts
            .get(&address)
            .ok_or_else(|| ChainError::Transport(format!("no contract at {address}")))?;

        match (method_name(method), contract) {
            ("totalSupply", Contract::Token { total_supply, .. }) => Ok(Value::Uint(*total_supply)),
            ("balanceOf", Contract::Token { balances, .. }) => {
                let owner = address_arg(args, 0)?;
                Ok(Value::Uint(balances.get(&owner).copied().unwrap_or_default()))
            }
            ("tokenContract", Contract::Marketplace { token, .. }) => Ok(Value::Address(*token)),
            ("tokenInitialized", Contract::Marketplace { token_initialized, .. }) => {
                Ok(Value::Bool(*token_initialized))
            }
            ("dishCount", Contract::Marketplace { dishes, .. }) => Ok(Value::from(*dishes)),
            (other, _) => Err(revert(&format!("{other} not supported at {address}"))),
        }
    }
}

impl ChainClient for MockChain {
    fn chain_id(&self) -> impl Future<Output = Result<u64, ChainError>> + Send {
        let chain_id = self.chain_id;
        async move { Ok(chain_id) }
    }

    fn code_at(&self, address: Address) -> impl Future<Output = Result<Bytes, ChainError>> + Send {
        let code = if self.state.lock().unwrap().contracts.contains_key(&address) {
            Bytes::from_static(&[0x60, 0x80])
        } else {
            Bytes::new()
        };
        async move { Ok(code) }
    }

    fn deploy_contract(
        &self,
        contract: &str,
        constructor_args: &[Value],
    ) -> impl Future<Output = Result<PendingTx, ChainError>> + Send {
        let result = self.deploy_sync(contract, constructor_args);
        async move { result }
    }

    fn call(
        &self,
        address: Address,
        method: &str,
        args: &[Value],
        _value: Option<U256>,
    ) -> impl Future<Output = Result<PendingTx, ChainError>> + Send {
        let result = self.call_sync(address, method, args);
        async move { result }
    }

    fn read(
        &self,
        address: Address,
        method: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<Value, ChainError>> + Send {
        let result = self.read_sync(address, method, args);
        async move { result }
    }

    fn wait_confirmed(
        &self,
        tx: &PendingTx,
    ) -> impl Future<Output = Result<TxReceipt, ChainError>> + Send {
        let state = self.state.lock().unwrap();
        let hang = state.hang_confirmations;
        let receipt = state
            .receipts
            .get(&tx.tx_hash)
            .cloned()
            .ok_or_else(|| ChainError::Transport(format!("unknown transaction {}", tx.tx_hash)));
        drop(state);

        async move {
            if hang {
                std::future::pending::<()>().await;
            }
            receipt
        }
    }
}
