//! Mock scheduler shared by the integration tests.
#![allow(dead_code)]

use kernel_mutex::{
    MutexConfig, MutexId, MutexKernel, MutexSlot, Priority, Protocol, Scheduler, TaskId, Timeout,
    WaitResult,
};

#[derive(Debug)]
pub struct MockTask {
    pub base: Priority,
    pub effective: Priority,
    /// `Some` while the task sits in `suspend`, with the timeout it was given.
    pub suspended: Option<Timeout>,
    /// Every result the task was woken with, oldest first.
    pub wakes: Vec<WaitResult>,
}

#[derive(Debug, Default)]
pub struct MockScheduler {
    pub tasks: Vec<MockTask>,
    pub current: Option<TaskId>,
    /// `(holder, mutex)` pairs announced for refused cycles, oldest first.
    pub deadlocks: Vec<(TaskId, MutexId)>,
}

impl MockScheduler {
    pub fn spawn(&mut self, base: u8) -> TaskId {
        let id = TaskId(u32::try_from(self.tasks.len()).unwrap());
        self.tasks.push(MockTask {
            base: Priority(base),
            effective: Priority(base),
            suspended: None,
            wakes: Vec::new(),
        });
        id
    }

    pub fn task(&self, task: TaskId) -> &MockTask {
        &self.tasks[task.index()]
    }

    pub fn run(&mut self, task: TaskId) {
        assert!(
            self.task(task).suspended.is_none(),
            "{task} is suspended and cannot run"
        );
        self.current = Some(task);
    }
}

impl Scheduler for MockScheduler {
    fn current_task(&self) -> TaskId {
        self.current.expect("no task is running")
    }

    fn base_priority(&self, task: TaskId) -> Priority {
        self.task(task).base
    }

    fn effective_priority(&self, task: TaskId) -> Priority {
        self.task(task).effective
    }

    fn set_effective_priority(&mut self, task: TaskId, priority: Priority) {
        self.tasks[task.index()].effective = priority;
    }

    fn suspend(&mut self, task: TaskId, timeout: Timeout) {
        let t = &mut self.tasks[task.index()];
        assert!(t.suspended.is_none(), "{task} suspended twice");
        t.suspended = Some(timeout);
    }

    fn wake(&mut self, task: TaskId, result: WaitResult) {
        let t = &mut self.tasks[task.index()];
        assert!(t.suspended.is_some(), "{task} woken without being suspended");
        t.suspended = None;
        t.wakes.push(result);
    }

    fn deadlock(&mut self, task: TaskId, mutex: MutexId) {
        self.deadlocks.push((task, mutex));
    }
}

pub fn kernel() -> MutexKernel<MockScheduler> {
    kernel_with(MutexConfig::DEFAULT)
}

pub fn kernel_with(config: MutexConfig) -> MutexKernel<MockScheduler> {
    MutexKernel::start(config, MockScheduler::default())
}

pub fn spawn(k: &mut MutexKernel<MockScheduler>, base: u8) -> TaskId {
    k.scheduler_mut().spawn(base)
}

pub fn run(k: &mut MutexKernel<MockScheduler>, task: TaskId) {
    k.scheduler_mut().run(task);
}

pub fn create(k: &mut MutexKernel<MockScheduler>, protocol: Protocol) -> MutexId {
    k.create(&mut MutexSlot::new(), protocol).unwrap()
}

/// Effective priority value of `task`.
pub fn prio(k: &MutexKernel<MockScheduler>, task: TaskId) -> u8 {
    k.scheduler().task(task).effective.value()
}

pub fn is_suspended(k: &MutexKernel<MockScheduler>, task: TaskId) -> bool {
    k.scheduler().task(task).suspended.is_some()
}

pub fn last_wake(k: &MutexKernel<MockScheduler>, task: TaskId) -> Option<WaitResult> {
    k.scheduler().task(task).wakes.last().copied()
}
