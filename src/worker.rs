use crate::command::Command;
use crate::error_handling::print_error_chain;
use crate::executor::Executor;
use crate::user::UserId;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::info;

/// One unit of work for the pool: a user, what they asked for, and the
/// already-validated arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub user_id: UserId,
    pub command: Command,
    pub args: Vec<String>,
}

pub type TaskSender = crossbeam_channel::Sender<Task>;
pub type TaskReceiver = crossbeam_channel::Receiver<Task>;

/// How many tasks may sit in the queue before producers stall.
/// Backpressure is the point: when workers fall behind, the message loop
/// and the scheduler block on `send` instead of dropping tasks.
pub const QUEUE_CAPACITY: usize = 20;

/// Creates the shared bounded task queue
pub fn task_queue() -> (TaskSender, TaskReceiver) {
    crossbeam_channel::bounded(QUEUE_CAPACITY)
}

/// Starts `count` worker threads draining `queue` into `executor`.
///
/// Each worker runs until the queue's senders are gone. A failing task is
/// reported to the fault sink and the worker moves on; one bad task never
/// takes a worker down with it.
pub fn spawn(count: usize, queue: TaskReceiver, executor: Arc<Executor>) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|n| {
            let queue = queue.clone();
            let executor = executor.clone();

            thread::Builder::new()
                .name(format!("worker-{}", n))
                .spawn(move || {
                    for task in queue.iter() {
                        if let Err(e) = executor.execute(&task) {
                            print_error_chain(&e);
                        }
                    }
                    info!("task queue closed, worker exiting");
                })
                .expect("could not spawn worker thread")
        })
        .collect()
}
