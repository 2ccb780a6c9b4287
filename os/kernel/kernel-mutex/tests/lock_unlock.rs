mod common;

use common::{create, is_suspended, kernel, kernel_with, last_wake, prio, run, spawn};
use kernel_mutex::{Acquire, MutexConfig, MutexError, Protocol, Timeout};

#[test]
fn lock_free_mutex_and_unlock() {
    let mut k = kernel();
    let t = spawn(&mut k, 10);
    let m = create(&mut k, Protocol::Inheritance);

    run(&mut k, t);
    assert_eq!(k.lock(m, Timeout::Infinite), Ok(Acquire::Locked));
    assert_eq!(k.holder(m), Ok(Some(t)));
    assert_eq!(k.lock_count(m), Ok(1));
    assert_eq!(k.held_by(t), &[m]);
    k.check_invariants();

    assert_eq!(k.unlock(m), Ok(()));
    assert_eq!(k.holder(m), Ok(None));
    assert_eq!(k.lock_count(m), Ok(0));
    assert!(k.held_by(t).is_empty());
    assert_eq!(prio(&k, t), 10);
    k.check_invariants();
}

#[test]
fn recursive_lock_counts_up_and_down() {
    let mut k = kernel();
    let t = spawn(&mut k, 10);
    let m = create(&mut k, Protocol::Inheritance);
    run(&mut k, t);

    for _ in 0..3 {
        assert_eq!(k.lock(m, Timeout::Zero), Ok(Acquire::Locked));
    }
    assert_eq!(k.lock_count(m), Ok(3));

    k.unlock(m).unwrap();
    k.unlock(m).unwrap();
    assert_eq!(k.holder(m), Ok(Some(t)));
    assert_eq!(k.lock_count(m), Ok(1));

    k.unlock(m).unwrap();
    assert_eq!(k.holder(m), Ok(None));
    assert_eq!(k.unlock(m), Err(MutexError::IllegalUse));
    k.check_invariants();
}

#[test]
fn nested_locks_keep_others_out_until_the_last_unlock() {
    let mut k = kernel();
    let owner = spawn(&mut k, 10);
    let other = spawn(&mut k, 5);
    let m = create(&mut k, Protocol::Inheritance);

    run(&mut k, owner);
    for _ in 0..3 {
        k.lock(m, Timeout::Infinite).unwrap();
    }

    for remaining in [2, 1] {
        run(&mut k, owner);
        k.unlock(m).unwrap();
        assert_eq!(k.lock_count(m), Ok(remaining));

        run(&mut k, other);
        assert_eq!(k.lock_polling(m), Err(MutexError::Timeout));
        assert_eq!(k.holder(m), Ok(Some(owner)));
    }

    run(&mut k, owner);
    k.unlock(m).unwrap();
    run(&mut k, other);
    assert_eq!(k.lock_polling(m), Ok(()));
    assert_eq!(k.holder(m), Ok(Some(other)));
    assert_eq!(k.lock_count(m), Ok(1));
    k.check_invariants();
}

#[test]
fn relock_without_recursion_is_illegal() {
    let mut k = kernel_with(MutexConfig::new());
    let t = spawn(&mut k, 10);
    let m = create(&mut k, Protocol::Inheritance);
    run(&mut k, t);

    k.lock(m, Timeout::Infinite).unwrap();
    assert_eq!(k.lock(m, Timeout::Infinite), Err(MutexError::IllegalUse));
    assert_eq!(k.lock_count(m), Ok(1));
    assert!(!is_suspended(&k, t));
    k.check_invariants();
}

#[test]
fn only_the_holder_may_unlock() {
    let mut k = kernel();
    let a = spawn(&mut k, 10);
    let b = spawn(&mut k, 10);
    let m = create(&mut k, Protocol::Inheritance);

    run(&mut k, b);
    assert_eq!(k.unlock(m), Err(MutexError::IllegalUse));

    run(&mut k, a);
    k.lock(m, Timeout::Infinite).unwrap();

    run(&mut k, b);
    assert_eq!(k.unlock(m), Err(MutexError::IllegalUse));
    assert_eq!(k.holder(m), Ok(Some(a)));
    assert_eq!(k.lock_count(m), Ok(1));
}

#[test]
fn busy_mutex_with_zero_timeout_fails_without_blocking() {
    let mut k = kernel();
    let a = spawn(&mut k, 10);
    let b = spawn(&mut k, 5);
    let m = create(&mut k, Protocol::Inheritance);

    run(&mut k, a);
    k.lock_polling(m).unwrap();

    run(&mut k, b);
    assert_eq!(k.lock_polling(m), Err(MutexError::Timeout));
    assert_eq!(k.lock(m, Timeout::Ticks(0)), Err(MutexError::Timeout));
    assert!(!is_suspended(&k, b));
    assert!(k.waiters(m).unwrap().is_empty());
    // A refused request lends no priority.
    assert_eq!(prio(&k, a), 10);
    k.check_invariants();
}

#[test]
fn contended_lock_suspends_the_caller() {
    let mut k = kernel();
    let a = spawn(&mut k, 10);
    let b = spawn(&mut k, 10);
    let m = create(&mut k, Protocol::Inheritance);

    run(&mut k, a);
    k.lock(m, Timeout::Infinite).unwrap();
    run(&mut k, b);
    assert_eq!(k.lock(m, Timeout::Ticks(25)), Ok(Acquire::Suspended));

    assert_eq!(k.scheduler().task(b).suspended, Some(Timeout::Ticks(25)));
    assert_eq!(k.waiting_on(b), Some(m));
    assert_eq!(k.waiters(m), Ok(vec![b]));
    k.check_invariants();

    run(&mut k, a);
    k.unlock(m).unwrap();
    assert_eq!(last_wake(&k, b), Some(Ok(())));
    assert_eq!(k.holder(m), Ok(Some(b)));
    assert_eq!(k.lock_count(m), Ok(1));
    assert_eq!(k.waiting_on(b), None);
    k.check_invariants();
}

#[test]
fn handover_goes_to_most_urgent_waiter_then_fifo() {
    let mut k = kernel();
    let owner = spawn(&mut k, 10);
    let b = spawn(&mut k, 5);
    let c = spawn(&mut k, 3);
    let d = spawn(&mut k, 5);
    let m = create(&mut k, Protocol::Inheritance);

    run(&mut k, owner);
    k.lock(m, Timeout::Infinite).unwrap();
    for t in [b, c, d] {
        run(&mut k, t);
        assert_eq!(k.lock(m, Timeout::Infinite), Ok(Acquire::Suspended));
    }
    assert_eq!(k.waiters(m), Ok(vec![c, b, d]));
    k.check_invariants();

    run(&mut k, owner);
    k.unlock(m).unwrap();
    assert_eq!(k.holder(m), Ok(Some(c)));
    assert_eq!(prio(&k, owner), 10);

    run(&mut k, c);
    k.unlock(m).unwrap();
    assert_eq!(k.holder(m), Ok(Some(b)));

    run(&mut k, b);
    k.unlock(m).unwrap();
    assert_eq!(k.holder(m), Ok(Some(d)));

    run(&mut k, d);
    k.unlock(m).unwrap();
    assert_eq!(k.holder(m), Ok(None));
    for t in [b, c, d] {
        assert_eq!(k.scheduler().task(t).wakes, vec![Ok(())]);
    }
    k.check_invariants();
}
