//! Declarative scenarios.
//!
//! A scenario describes a deployment (protocol parameters, funded accounts and
//! gauges) plus a list of steps to replay against it. Accounts and tokens are
//! named by label; labels resolve to the same derived addresses the test
//! fixtures use, so a scenario can be reproduced in code and vice versa.

use std::{collections::BTreeMap, path::Path, str::FromStr};

use serde::Deserialize;
use tracing::{debug, info};
use veboost_core::{config::ProtocolConfig, MemoryTokens, TokenStore, VotingEscrow};
use veboost_escrow::{formulas::format_ratio, Protocol};

use crate::prelude::*;
use crate::report::{AccountRow, GaugeRow, LockRow, PositionRow, Report};

/// Resolves an account label, or passes a hex address through
pub fn account_address(label: &str) -> Result<Address, veboost_core::Error> {
    if label.starts_with("0x") {
        return Address::from_str(label);
    }

    Ok(Address::derive(label))
}

/// Resolves a token symbol, or passes a hex address through
pub fn token_address(symbol: &str) -> Result<Address, veboost_core::Error> {
    if symbol.starts_with("0x") {
        return Address::from_str(symbol);
    }

    Ok(Address::derive(&format!("token/{symbol}")))
}

#[derive(Deserialize, Debug, Clone)]
pub struct AccountSpec {
    pub name: String,

    /// Initial balances by token symbol
    #[serde(default)]
    pub balances: BTreeMap<String, Units>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GaugeSpec {
    pub pool: String,

    #[serde(default = "default_gauge_weight")]
    pub weight: u64,

    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_gauge_weight() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_operator() -> String {
    "operator".into()
}

fn default_escrow_token() -> String {
    "fxs".into()
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    CreateLock {
        account: String,
        amount: Units,
        duration: u64,
        #[serde(default)]
        to: Option<String>,
    },
    DepositFor {
        account: String,
        lock: LockId,
        amount: Units,
    },
    IncreaseUnlockTime {
        account: String,
        lock: LockId,
        duration: u64,
    },
    WithdrawLock {
        account: String,
        lock: LockId,
    },
    Approve {
        account: String,
        lock: LockId,
        spender: String,
    },
    Transfer {
        account: String,
        lock: LockId,
        to: String,
    },
    Deposit {
        account: String,
        pool: String,
        amount: Units,
    },
    Withdraw {
        account: String,
        pool: String,
        amount: Units,
    },
    GetReward {
        account: String,
        pool: String,
    },
    /// Without explicit weights the lock's whole current weight is split
    /// evenly across the pools.
    Vote {
        account: String,
        lock: LockId,
        pools: Vec<String>,
        #[serde(default)]
        weights: Option<Vec<Units>>,
    },
    Poke {
        account: String,
        lock: LockId,
    },
    Abstain {
        account: String,
        lock: LockId,
    },
    SetGauge {
        pool: String,
        weight: u64,
        active: bool,
    },
    Advance {
        seconds: u64,
    },
    Mine {
        blocks: u64,
    },
    MassUpdate,
    Report {
        #[serde(default)]
        label: Option<String>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateLock { .. } => "create_lock",
            Action::DepositFor { .. } => "deposit_for",
            Action::IncreaseUnlockTime { .. } => "increase_unlock_time",
            Action::WithdrawLock { .. } => "withdraw_lock",
            Action::Approve { .. } => "approve",
            Action::Transfer { .. } => "transfer",
            Action::Deposit { .. } => "deposit",
            Action::Withdraw { .. } => "withdraw",
            Action::GetReward { .. } => "get_reward",
            Action::Vote { .. } => "vote",
            Action::Poke { .. } => "poke",
            Action::Abstain { .. } => "abstain",
            Action::SetGauge { .. } => "set_gauge",
            Action::Advance { .. } => "advance",
            Action::Mine { .. } => "mine",
            Action::MassUpdate => "mass_update",
            Action::Report { .. } => "report",
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,

    /// Reason string the step is expected to revert with
    #[serde(default)]
    pub expect_error: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,

    /// Overrides the protocol parameters of the loaded config
    #[serde(default)]
    pub protocol: Option<ProtocolConfig>,

    #[serde(default = "default_operator")]
    pub operator: String,

    #[serde(default = "default_escrow_token")]
    pub escrow_token: String,

    /// Defaults to the escrowed token
    #[serde(default)]
    pub reward_token: Option<String>,

    #[serde(default)]
    pub accounts: Vec<AccountSpec>,

    #[serde(default)]
    pub gauges: Vec<GaugeSpec>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_toml(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub action: String,
    pub reverted: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Outcome {
    pub name: Option<String>,
    pub steps: Vec<StepOutcome>,
    pub reports: Vec<Report>,
}

/// A deployed scenario, ready to replay steps
pub struct Simulation {
    protocol: Protocol<MemoryTokens>,
    labels: Vec<(String, Address)>,
    pools: Vec<(String, Address)>,
    reports: Vec<Report>,
}

impl Simulation {
    pub fn deploy(scenario: &Scenario, fallback: &ProtocolConfig) -> Result<Self, Error> {
        let config = scenario.protocol.as_ref().unwrap_or(fallback);

        let operator = account_address(&scenario.operator)?;
        let escrow_token = token_address(&scenario.escrow_token)?;
        let reward_token = match &scenario.reward_token {
            Some(x) => token_address(x)?,
            None => escrow_token,
        };

        let mut protocol = Protocol::deploy(
            config,
            MemoryTokens::new(),
            operator,
            escrow_token,
            reward_token,
        )?;

        let mut pools = vec![];

        for gauge in scenario.gauges.iter() {
            let pool = token_address(&gauge.pool)?;
            protocol.create_gauge(pool, gauge.weight as Amount, gauge.active)?;
            pools.push((gauge.pool.clone(), pool));
        }

        let mut labels = vec![(scenario.operator.clone(), operator)];

        for account in scenario.accounts.iter() {
            let who = account_address(&account.name)?;

            for (symbol, amount) in account.balances.iter() {
                let token = token_address(symbol)?;
                protocol.tokens_mut().mint(&token, &who, amount.raw())?;
            }

            protocol.locker_client(who).approve_token(Amount::MAX);

            for (_, pool) in pools.iter() {
                protocol
                    .gauge_client(*pool, who)
                    .approve_token(Amount::MAX)?;
            }

            if !labels.iter().any(|(_, x)| *x == who) {
                labels.push((account.name.clone(), who));
            }
        }

        info!(
            accounts = labels.len(),
            gauges = pools.len(),
            "scenario deployed"
        );

        Ok(Self {
            protocol,
            labels,
            pools,
            reports: vec![],
        })
    }

    pub fn protocol(&self) -> &Protocol<MemoryTokens> {
        &self.protocol
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    fn label_of(&self, address: &Address) -> String {
        self.labels
            .iter()
            .chain(self.pools.iter())
            .find(|(_, x)| x == address)
            .map(|(label, _)| label.clone())
            .unwrap_or_else(|| address.to_string())
    }

    pub fn apply(&mut self, action: &Action) -> Result<(), veboost_core::Error> {
        let protocol = &mut self.protocol;

        match action {
            Action::CreateLock {
                account,
                amount,
                duration,
                to,
            } => {
                let mut client = protocol.locker_client(account_address(account)?);

                let lock_id = match to {
                    Some(to) => {
                        client.create_lock_for(amount.raw(), *duration, account_address(to)?)?
                    }
                    None => client.create_lock(amount.raw(), *duration)?,
                };

                debug!(lock_id, "scenario lock created");
            }
            Action::DepositFor {
                account,
                lock,
                amount,
            } => {
                protocol
                    .locker_client(account_address(account)?)
                    .deposit_for(*lock, amount.raw())?;
            }
            Action::IncreaseUnlockTime {
                account,
                lock,
                duration,
            } => {
                protocol
                    .locker_client(account_address(account)?)
                    .increase_unlock_time(*lock, *duration)?;
            }
            Action::WithdrawLock { account, lock } => {
                protocol
                    .locker_client(account_address(account)?)
                    .withdraw(*lock)?;
            }
            Action::Approve {
                account,
                lock,
                spender,
            } => {
                protocol
                    .locker_client(account_address(account)?)
                    .approve(account_address(spender)?, *lock)?;
            }
            Action::Transfer { account, lock, to } => {
                protocol
                    .locker_client(account_address(account)?)
                    .transfer(account_address(to)?, *lock)?;
            }
            Action::Deposit {
                account,
                pool,
                amount,
            } => {
                protocol
                    .gauge_client(token_address(pool)?, account_address(account)?)
                    .deposit(amount.raw())?;
            }
            Action::Withdraw {
                account,
                pool,
                amount,
            } => {
                protocol
                    .gauge_client(token_address(pool)?, account_address(account)?)
                    .withdraw(amount.raw())?;
            }
            Action::GetReward { account, pool } => {
                protocol
                    .gauge_client(token_address(pool)?, account_address(account)?)
                    .get_reward()?;
            }
            Action::Vote {
                account,
                lock,
                pools,
                weights,
            } => {
                let pools = pools
                    .iter()
                    .map(|x| token_address(x))
                    .collect::<Result<Vec<_>, _>>()?;

                let weights = match weights {
                    Some(x) => x.iter().map(Units::raw).collect(),
                    None if pools.is_empty() => vec![],
                    None => {
                        let each = protocol.balance_of_nft(*lock) / pools.len() as Amount;
                        vec![each; pools.len()]
                    }
                };

                protocol
                    .boost_client(account_address(account)?)
                    .vote(*lock, &pools, &weights)?;
            }
            Action::Poke { account, lock } => {
                protocol
                    .boost_client(account_address(account)?)
                    .poke(*lock)?;
            }
            Action::Abstain { account, lock } => {
                protocol
                    .boost_client(account_address(account)?)
                    .abstain(*lock)?;
            }
            Action::SetGauge {
                pool,
                weight,
                active,
            } => {
                protocol.set_gauge(&token_address(pool)?, *weight as Amount, *active)?;
            }
            Action::Advance { seconds } => protocol.advance(*seconds),
            Action::Mine { blocks } => protocol.mine(*blocks),
            Action::MassUpdate => protocol.mass_update_pools()?,
            Action::Report { label } => {
                let report = self.snapshot(label.clone())?;
                self.reports.push(report);
            }
        }

        Ok(())
    }

    /// Captures accounts, locks, gauges and staking positions as of now
    pub fn snapshot(&self, label: Option<String>) -> Result<Report, veboost_core::Error> {
        let protocol = &self.protocol;
        let locker = &protocol.locker;
        let boost = &protocol.boost;
        let clock = protocol.clock();

        let accounts = self
            .labels
            .iter()
            .map(|(name, address)| AccountRow {
                name: name.clone(),
                address: *address,
                escrow_balance: Units(protocol.tokens().balance_of(&locker.token(), address)),
                reward_balance: Units(
                    protocol
                        .tokens()
                        .balance_of(&boost.reward_token(), address),
                ),
                locks: locker.balance_of(address),
            })
            .collect();

        let locks = (1..=locker.token_id())
            .filter_map(|id| {
                let locked = locker.locked(id)?;
                let owner = locker.owner_of(id)?;

                Some(LockRow {
                    id,
                    owner: self.label_of(&owner),
                    amount: Units(locked.amount),
                    end: locked.end,
                    weight: Units(locker.balance_of_nft(id, clock)),
                    voted: locker.voted(id),
                })
            })
            .collect();

        let mut gauges = vec![];
        let mut positions = vec![];

        for pool in boost.pools() {
            let Some(gauge) = boost.gauge_of(pool) else {
                continue;
            };

            gauges.push(GaugeRow {
                pool: self.label_of(pool),
                gauge: gauge.address(),
                active: gauge.is_active(),
                base_weight: gauge.base_weight(),
                votes: Units(boost.pool_votes(pool)),
                reward_rate: Units(boost.reward_rate(pool, clock)?),
                deposited: Units(gauge.total_supply()),
                distributed: Units(gauge.distributed()),
                forfeited: Units(gauge.forfeited()),
            });

            for (user, info) in gauge.depositors() {
                positions.push(PositionRow {
                    account: self.label_of(user),
                    pool: self.label_of(pool),
                    deposited: Units(info.amount),
                    claimed: Units(info.claimed),
                    pending: Units(protocol.pending(pool, user)?),
                    pending_max: Units(protocol.pending_max(pool, user)?),
                    multiplier: format_ratio(&protocol.boost_multiplier(pool, user), 4),
                });
            }
        }

        Ok(Report {
            label,
            timestamp: clock.now(),
            block: clock.block(),
            locked_supply: Units(locker.supply()),
            voting_supply: Units(locker.total_supply(clock)),
            total_votes: Units(boost.total_votes()),
            accounts,
            locks,
            gauges,
            positions,
        })
    }
}

/// Deploys the scenario and replays every step.
///
/// A step that reverts aborts the run unless it declares the expected reason.
/// When no step asks for a report, a final one is taken at the end.
pub fn run(scenario: &Scenario, fallback: &ProtocolConfig) -> Result<Outcome, Error> {
    let mut sim = Simulation::deploy(scenario, fallback)?;
    let mut steps = vec![];

    for (index, step) in scenario.steps.iter().enumerate() {
        let action = step.action.name().to_string();
        let result = sim.apply(&step.action);

        let reverted = match (result, &step.expect_error) {
            (Ok(()), None) => None,
            (Ok(()), Some(expected)) => {
                return Err(Error::UnexpectedOutcome {
                    index,
                    action,
                    expected: expected.clone(),
                    actual: "but it succeeded".into(),
                });
            }
            (Err(source), None) => {
                return Err(Error::StepReverted {
                    index,
                    action,
                    source,
                });
            }
            (Err(err), Some(expected)) if err.reason() == expected => {
                debug!(index, %action, reason = err.reason(), "step reverted as expected");
                Some(err.reason().to_string())
            }
            (Err(err), Some(expected)) => {
                return Err(Error::UnexpectedOutcome {
                    index,
                    action,
                    expected: expected.clone(),
                    actual: format!("got `{}`", err.reason()),
                });
            }
        };

        steps.push(StepOutcome {
            index,
            action,
            reverted,
        });
    }

    if sim.reports.is_empty() {
        let last = sim.snapshot(Some("final".into()))?;
        sim.reports.push(last);
    }

    info!(steps = steps.len(), reports = sim.reports.len(), "scenario finished");

    Ok(Outcome {
        name: scenario.name.clone(),
        steps,
        reports: sim.reports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
        name = "small"
        operator = "alice"

        [protocol.clock]
        genesis_timestamp = 1609977600

        [protocol.locker]
        lock_unit = 86400

        [[accounts]]
        name = "alice"
        balances = { fxs = "10", usdc = "5" }

        [[accounts]]
        name = "bob"
        balances = { fxs = "10", usdc = "5" }

        [[gauges]]
        pool = "usdc"

        [[steps]]
        action = "create_lock"
        account = "alice"
        amount = "1"
        duration = 31536000

        [[steps]]
        action = "deposit"
        account = "alice"
        pool = "usdc"
        amount = "1"

        [[steps]]
        action = "vote"
        account = "alice"
        lock = 1
        pools = ["usdc"]

        [[steps]]
        action = "withdraw"
        account = "bob"
        pool = "usdc"
        amount = "1"
        expect_error = "withdrawSwap: not good"

        [[steps]]
        action = "advance"
        seconds = 100

        [[steps]]
        action = "report"
        label = "after 100s"
    "#;

    #[test]
    fn labels_resolve_like_fixtures() {
        assert_eq!(account_address("alice").unwrap(), Address::derive("alice"));
        assert_eq!(
            token_address("usdc").unwrap(),
            Address::derive("token/usdc")
        );

        let raw = Address::derive("raw").to_string();
        assert_eq!(account_address(&raw).unwrap(), Address::derive("raw"));
    }

    #[test]
    fn small_scenario_replays() {
        let scenario = Scenario::from_toml(SMALL).unwrap();
        let outcome = run(&scenario, &ProtocolConfig::default()).unwrap();

        assert_eq!(outcome.steps.len(), 6);
        assert_eq!(
            outcome.steps[3].reverted.as_deref(),
            Some("withdrawSwap: not good")
        );
        assert_eq!(outcome.reports.len(), 1);

        let report = &outcome.reports[0];
        assert_eq!(report.label.as_deref(), Some("after 100s"));
        assert_eq!(report.locks.len(), 1);
        assert!(report.locks[0].voted);
        assert_eq!(report.positions.len(), 1);
        assert_eq!(report.positions[0].account, "alice");
        assert_eq!(report.positions[0].pool, "usdc");
        assert_eq!(report.positions[0].pending_max, Units::tokens(100));
    }

    #[test]
    fn unexpected_revert_aborts() {
        let text = r#"
            [[accounts]]
            name = "alice"

            [[steps]]
            action = "create_lock"
            account = "alice"
            amount = "1"
            duration = 604800
        "#;

        let scenario = Scenario::from_toml(text).unwrap();
        let err = run(&scenario, &ProtocolConfig::default()).unwrap_err();

        match err {
            Error::StepReverted { index, source, .. } => {
                assert_eq!(index, 0);
                assert_eq!(source.reason(), "insufficient balance");
            }
            x => panic!("unexpected error {x}"),
        }
    }

    #[test]
    fn missing_revert_is_reported() {
        let text = r#"
            [[steps]]
            action = "advance"
            seconds = 10
            expect_error = "lock expired"
        "#;

        let scenario = Scenario::from_toml(text).unwrap();
        let err = run(&scenario, &ProtocolConfig::default()).unwrap_err();

        assert!(matches!(err, Error::UnexpectedOutcome { index: 0, .. }));
    }

    #[test]
    fn final_report_is_taken_when_none_requested() {
        let scenario = Scenario::from_toml("").unwrap();
        let outcome = run(&scenario, &ProtocolConfig::default()).unwrap();

        assert_eq!(outcome.reports.len(), 1);
        assert_eq!(outcome.reports[0].label.as_deref(), Some("final"));
        assert_eq!(outcome.reports[0].accounts.len(), 1);
    }
}
