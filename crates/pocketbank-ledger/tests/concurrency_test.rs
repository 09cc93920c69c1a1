//! Concurrent access through a shared engine
//!
//! Operations on the same account must serialise, opposing transfers must
//! not deadlock, and a held lock must surface as `Busy` instead of blocking.

use pocketbank_ledger::{AccountStore, LedgerConfig, LedgerEngine, MemoryStore, SledStore};
use pocketbank_types::{Amount, LedgerError, Username};
use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("pocketbank_ledger=debug")
        .with_test_writer()
        .try_init();
}

fn user(name: &str) -> Username {
    Username::new(name).unwrap()
}

fn funded(names: &[&str], units: i64) -> Arc<LedgerEngine<MemoryStore>> {
    let seed: BTreeMap<Username, Amount> = names
        .iter()
        .map(|name| (user(name), Amount::from_units(units)))
        .collect();
    Arc::new(LedgerEngine::new(MemoryStore::with_accounts(seed)))
}

#[test]
fn test_concurrent_deposits_are_not_lost() {
    init_tracing();
    let engine = funded(&["alice"], 0);
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..100 {
                    engine.deposit("alice", "1.25").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.balance("alice").unwrap(), Amount::from_units(1000));
}

#[test]
fn test_deposit_racing_withdraw_never_overdraws() {
    init_tracing();
    let engine = funded(&["alice"], 100);

    let withdrawer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            let mut applied = 0u32;
            for _ in 0..500 {
                match engine.withdraw("alice", "1") {
                    Ok(balance) => {
                        assert!(!balance.is_negative());
                        applied += 1;
                    }
                    Err(LedgerError::InsufficientFunds { .. }) => {}
                    Err(other) => panic!("unexpected error: {}", other),
                }
            }
            applied
        })
    };
    let depositor = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for _ in 0..200 {
                engine.deposit("alice", "1").unwrap();
            }
        })
    };

    let withdrawn = withdrawer.join().unwrap();
    depositor.join().unwrap();

    let expected = 100 + 200 - i64::from(withdrawn);
    assert_eq!(engine.balance("alice").unwrap(), Amount::from_units(expected));
}

#[test]
fn test_opposing_transfers_do_not_deadlock() {
    init_tracing();
    let names = ["amy", "ben", "cat", "dan"];
    let engine = funded(&names, 1000);
    let barrier = Arc::new(Barrier::new(names.len() * 2));

    let mut handles = Vec::new();
    for (i, from) in names.iter().enumerate() {
        for to in [names[(i + 1) % names.len()], names[(i + names.len() - 1) % names.len()]] {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            let from = from.to_string();
            handles.push(thread::spawn(move || {
                barrier.wait();
                for _ in 0..200 {
                    engine.transfer(&from, "1", to).unwrap();
                }
            }));
        }
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let total = engine
        .store()
        .accounts()
        .unwrap()
        .into_iter()
        .try_fold(Amount::ZERO, |acc, (_, balance)| acc.checked_add(balance))
        .unwrap();
    assert_eq!(total, Amount::from_units(4000));
    // Each account sent 400 and received 400.
    for name in names {
        assert_eq!(engine.balance(name).unwrap(), Amount::from_units(1000));
    }
}

#[test]
fn test_held_lock_surfaces_as_busy() {
    init_tracing();
    let config = LedgerConfig {
        lock_timeout_ms: 30,
        ..LedgerConfig::default()
    };
    let seed = BTreeMap::from([(user("alice"), Amount::from_units(10))]);
    let engine = Arc::new(LedgerEngine::with_config(
        MemoryStore::with_accounts(seed),
        &config,
    ));

    let locked = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let holder = {
        let engine = Arc::clone(&engine);
        let locked = Arc::clone(&locked);
        let release = Arc::clone(&release);
        thread::spawn(move || {
            let alice = user("alice");
            let set = engine.locks().lock_set(&[&alice]);
            let _guards = set.acquire(Duration::from_secs(1)).unwrap();
            locked.wait();
            release.wait();
        })
    };

    locked.wait();
    let err = engine.withdraw("alice", "5").unwrap_err();
    assert!(matches!(err, LedgerError::Busy { .. }));
    assert!(err.is_retryable());
    release.wait();
    holder.join().unwrap();

    assert_eq!(engine.withdraw("alice", "5").unwrap(), Amount::from_units(5));
}

#[test]
fn test_concurrent_transfers_on_sled_store() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(LedgerEngine::new(SledStore::open(dir.path()).unwrap()));
    for name in ["alice", "bob"] {
        engine.open_account(name).unwrap();
        engine.deposit(name, "500").unwrap();
    }

    let handles: Vec<_> = [("alice", "bob"), ("bob", "alice")]
        .into_iter()
        .map(|(from, to)| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..50 {
                    engine.transfer(from, "2.50", to).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(engine.balance("alice").unwrap(), Amount::from_units(500));
    assert_eq!(engine.balance("bob").unwrap(), Amount::from_units(500));
}
