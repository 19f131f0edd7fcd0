// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Concurrency tests using parking_lot's built-in deadlock detector.
//!
//! These tests hammer one shared ledger from many threads and verify that
//! the store lock neither deadlocks nor loses updates.

use moneyjar_rs::{
    Config, Currency, FixedRates, Ledger, LedgerError, MemoryStore, Money, Store, TargetSelector, UserId,
};
use parking_lot::deadlock;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const NUM_USERS: i64 = 8;

fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
}

fn shared_ledger() -> Arc<Ledger<MemoryStore, FixedRates>> {
    let store = MemoryStore::with_lock_timeout(Duration::from_secs(10));
    let ledger = Ledger::new(store, FixedRates::new(Currency::Usd), &Config::default());
    for id in 1..=NUM_USERS {
        ledger.register(UserId(id), &format!("user{id}")).unwrap();
    }
    Arc::new(ledger)
}

fn next_user(id: i64) -> i64 {
    id % NUM_USERS + 1
}

#[test]
fn no_deadlock_concurrent_postings_and_reads() {
    let detector = start_deadlock_detector();
    let ledger = shared_ledger();

    const OPS_PER_THREAD: usize = 200;

    let handles: Vec<_> = (1..=NUM_USERS)
        .map(|id| {
            let ledger = ledger.clone();
            thread::spawn(move || {
                let me = UserId(id);
                let next = format!("user{}", next_user(id));
                for i in 0..OPS_PER_THREAD {
                    match i % 4 {
                        0 => {
                            ledger
                                .post_debt(me, &TargetSelector::parse(&next), dec!(1), Currency::Usd, "")
                                .unwrap();
                        }
                        1 => {
                            ledger
                                .post_debt(me, &TargetSelector::All, dec!(8), Currency::Usd, "")
                                .unwrap();
                        }
                        2 => {
                            let _ = ledger.balances(me).unwrap();
                        }
                        _ => {
                            let _ = ledger.history(me, 1).unwrap();
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    // Splits cancel out pairwise; only the ring of single postings remains.
    for id in 1..=NUM_USERS {
        for balance in ledger.balances(UserId(id)).unwrap() {
            let other = if balance.from_user == UserId(id) { balance.to_user.0 } else { balance.from_user.0 };
            let expected = if other == next_user(id) {
                5_000
            } else if next_user(other) == id {
                -5_000
            } else {
                0
            };
            assert_eq!(balance.position_of(UserId(id)), Money::from_minor(expected));
        }
    }
    // every posting of 1.00 to the next user plus 7 legs for each split
    let postings_per_thread = OPS_PER_THREAD / 4;
    let expected_log = NUM_USERS as usize * postings_per_thread * (1 + (NUM_USERS as usize - 1));
    assert_eq!(ledger.store().log_len().unwrap(), expected_log);
}

#[test]
fn symmetric_postings_cancel_out() {
    let detector = start_deadlock_detector();
    let ledger = shared_ledger();

    const ROUNDS: usize = 500;

    let forward = {
        let ledger = ledger.clone();
        thread::spawn(move || {
            for _ in 0..ROUNDS {
                ledger
                    .post_debt(UserId(1), &TargetSelector::parse("user2"), dec!(3.33), Currency::Usd, "")
                    .unwrap();
            }
        })
    };
    let backward = {
        let ledger = ledger.clone();
        thread::spawn(move || {
            for _ in 0..ROUNDS {
                ledger
                    .post_debt(UserId(2), &TargetSelector::parse("user1"), dec!(3.33), Currency::Usd, "")
                    .unwrap();
            }
        })
    };

    forward.join().expect("Thread panicked");
    backward.join().expect("Thread panicked");
    stop_deadlock_detector(detector);

    let balances = ledger.balances(UserId(1)).unwrap();
    let pair = balances.iter().find(|b| b.to_user == UserId(2)).unwrap();
    assert_eq!(pair.balance, Money::ZERO);
}

#[test]
fn concurrent_registrations_create_every_pair() {
    let detector = start_deadlock_detector();
    let store = Arc::new(MemoryStore::with_lock_timeout(Duration::from_secs(10)));

    const USERS: i64 = 40;

    let handles: Vec<_> = (1..=USERS)
        .map(|id| {
            let store = store.clone();
            thread::spawn(move || store.create_user_and_pairs(UserId(id), &format!("user{id}")))
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked").unwrap();
    }
    stop_deadlock_detector(detector);

    let expected = (USERS * (USERS - 1) / 2) as usize;
    assert_eq!(store.pair_count().unwrap(), expected);
    for id in 1..=USERS {
        assert_eq!(store.list_pairs_for_user(UserId(id)).unwrap().len(), (USERS - 1) as usize);
    }
}

#[test]
fn racing_duplicate_registration_has_one_winner() {
    let store = Arc::new(MemoryStore::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || store.create_user_and_pairs(UserId(7), "lucky"))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == LedgerError::DuplicateUser(UserId(7)))
    );
}
