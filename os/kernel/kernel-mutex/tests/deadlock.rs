mod common;

use common::{create, is_suspended, kernel, kernel_with, last_wake, run, spawn};
use kernel_mutex::{Acquire, MutexConfig, MutexError, Protocol, Timeout};

#[test]
fn two_task_cycle_is_refused_and_reported() {
    let mut k = kernel();
    let a = spawn(&mut k, 10);
    let b = spawn(&mut k, 10);
    let m1 = create(&mut k, Protocol::Inheritance);
    let m2 = create(&mut k, Protocol::Inheritance);

    run(&mut k, a);
    k.lock(m1, Timeout::Infinite).unwrap();
    run(&mut k, b);
    k.lock(m2, Timeout::Infinite).unwrap();
    run(&mut k, a);
    assert_eq!(k.lock(m2, Timeout::Infinite), Ok(Acquire::Suspended));

    run(&mut k, b);
    assert_eq!(k.lock(m1, Timeout::Infinite), Err(MutexError::Deadlock));
    assert!(!is_suspended(&k, b));
    assert_eq!(k.waiting_on(b), None);
    assert!(k.waiters(m1).unwrap().is_empty());

    // The earlier waiter is left exactly where it was.
    assert_eq!(k.waiting_on(a), Some(m2));
    assert!(is_suspended(&k, a));
    assert_eq!(k.waiters(m2), Ok(vec![a]));
    assert_eq!(k.holder(m2), Ok(Some(b)));

    assert_eq!(k.scheduler().deadlocks, vec![(a, m1), (b, m2)]);
    assert_eq!(k.deadlock_peers(m1), Ok(&[m2][..]));
    assert_eq!(k.deadlock_peers(m2), Ok(&[m1][..]));
    k.check_invariants();

    assert_eq!(k.take_deadlock_peers(m1), Ok(vec![m2]));
    assert_eq!(k.deadlock_peers(m1), Ok(&[][..]));
}

#[test]
fn three_task_cycle_implicates_every_mutex() {
    let mut k = kernel();
    let tasks = [spawn(&mut k, 10), spawn(&mut k, 11), spawn(&mut k, 12)];
    let m = [
        create(&mut k, Protocol::Inheritance),
        create(&mut k, Protocol::Inheritance),
        create(&mut k, Protocol::Inheritance),
    ];

    for (t, id) in tasks.iter().zip(m) {
        run(&mut k, *t);
        k.lock(id, Timeout::Infinite).unwrap();
    }
    run(&mut k, tasks[0]);
    assert_eq!(k.lock(m[1], Timeout::Infinite), Ok(Acquire::Suspended));
    run(&mut k, tasks[1]);
    assert_eq!(k.lock(m[2], Timeout::Infinite), Ok(Acquire::Suspended));

    run(&mut k, tasks[2]);
    assert_eq!(k.lock(m[0], Timeout::Infinite), Err(MutexError::Deadlock));
    assert_eq!(k.deadlock_peers(m[0]), Ok(&[m[1], m[2]][..]));
    assert_eq!(k.deadlock_peers(m[1]), Ok(&[m[0], m[2]][..]));
    assert_eq!(k.deadlock_peers(m[2]), Ok(&[m[0], m[1]][..]));
    assert_eq!(
        k.scheduler().deadlocks,
        vec![(tasks[0], m[0]), (tasks[1], m[1]), (tasks[2], m[2])]
    );
    k.check_invariants();
}

#[test]
fn waiting_on_an_unrelated_chain_is_not_a_deadlock() {
    let mut k = kernel();
    let a = spawn(&mut k, 10);
    let b = spawn(&mut k, 10);
    let c = spawn(&mut k, 10);
    let m1 = create(&mut k, Protocol::Inheritance);
    let m2 = create(&mut k, Protocol::Inheritance);

    run(&mut k, a);
    k.lock(m1, Timeout::Infinite).unwrap();
    run(&mut k, b);
    k.lock(m2, Timeout::Infinite).unwrap();
    assert_eq!(k.lock(m1, Timeout::Infinite), Ok(Acquire::Suspended));

    run(&mut k, c);
    assert_eq!(k.lock(m2, Timeout::Infinite), Ok(Acquire::Suspended));
    assert!(k.deadlock_peers(m1).unwrap().is_empty());
    assert!(k.deadlock_peers(m2).unwrap().is_empty());
    assert!(k.scheduler().deadlocks.is_empty());
    k.check_invariants();
}

#[test]
fn report_is_cleared_on_unlock_and_delete() {
    let mut k = kernel();
    let a = spawn(&mut k, 10);
    let b = spawn(&mut k, 10);
    let m1 = create(&mut k, Protocol::Inheritance);
    let m2 = create(&mut k, Protocol::Inheritance);

    run(&mut k, a);
    k.lock(m1, Timeout::Infinite).unwrap();
    run(&mut k, b);
    k.lock(m2, Timeout::Infinite).unwrap();
    run(&mut k, a);
    assert_eq!(k.lock(m2, Timeout::Infinite), Ok(Acquire::Suspended));
    run(&mut k, b);
    assert_eq!(k.lock(m1, Timeout::Infinite), Err(MutexError::Deadlock));

    // B backs off; A is handed m2.
    k.unlock(m2).unwrap();
    assert_eq!(k.holder(m2), Ok(Some(a)));
    assert!(k.deadlock_peers(m2).unwrap().is_empty());
    assert_eq!(k.deadlock_peers(m1), Ok(&[m2][..]));

    k.delete(m2).unwrap();
    assert!(k.deadlock_peers(m1).unwrap().is_empty());
    k.check_invariants();
}

#[test]
fn without_detection_the_cycle_blocks() {
    let mut k = kernel_with(MutexConfig::DEFAULT.with_deadlock_detection(false));
    let a = spawn(&mut k, 10);
    let b = spawn(&mut k, 10);
    let m1 = create(&mut k, Protocol::Inheritance);
    let m2 = create(&mut k, Protocol::Inheritance);

    run(&mut k, a);
    k.lock(m1, Timeout::Infinite).unwrap();
    run(&mut k, b);
    k.lock(m2, Timeout::Infinite).unwrap();
    run(&mut k, a);
    assert_eq!(k.lock(m2, Timeout::Infinite), Ok(Acquire::Suspended));
    run(&mut k, b);
    assert_eq!(k.lock(m1, Timeout::Infinite), Ok(Acquire::Suspended));
    assert!(k.deadlock_peers(m1).unwrap().is_empty());
    assert!(k.scheduler().deadlocks.is_empty());

    // Breaking the cycle from outside.
    assert!(k.release_wait(b));
    assert_eq!(last_wake(&k, b), Some(Err(MutexError::Forced)));
    assert!(!k.release_wait(b));
    k.check_invariants();
}
