use crate::clock::{self, DAY_MINUTES};
use crate::command::Command;
use crate::error_handling::print_error_chain;
use crate::registry::ReminderRegistry;
use crate::worker::{Task, TaskSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

/// Background loop that walks the day's 5-minute grid and enqueues a
/// reminder task for every user subscribed at each mark.
///
/// It feeds the same bounded queue as inbound messages, so a slow pool
/// stalls the scheduler instead of losing reminders.
pub struct Reminder {
    registry: Arc<ReminderRegistry>,
    queue: TaskSender,
    poll: Duration,
    checkpoints: Vec<i32>,
}

/// Builds the remaining checkpoints for the current server day: every
/// multiple of 5 strictly after `now_minutes`, through 23:55. Rounding up
/// from the last grid mark of the day wraps to midnight and yields the
/// whole next day.
fn regenerate(now_minutes: i32) -> Vec<i32> {
    let mut first = now_minutes / 5 * 5 + 5;
    if first == DAY_MINUTES {
        first = 0;
    }

    (first..DAY_MINUTES).step_by(5).collect()
}

/// Whether the server clock has reached a checkpoint. A checkpoint more
/// than 5 minutes behind the clock is taken to mean tomorrow, which is
/// how the midnight wraparound works: 23:57 has not reached checkpoint 0
/// until the clock itself wraps.
fn due(now_minutes: i32, checkpoint: i32) -> bool {
    let target = if checkpoint < now_minutes - 5 {
        checkpoint + DAY_MINUTES
    } else {
        checkpoint
    };

    now_minutes >= target
}

impl Reminder {
    pub fn new(registry: Arc<ReminderRegistry>, queue: TaskSender) -> Self {
        Self {
            registry,
            queue,
            poll: Duration::from_secs(5),
            checkpoints: Vec::new(),
        }
    }

    /// Runs the loop forever on a named thread
    pub fn spawn(self) -> JoinHandle<()> {
        thread::Builder::new()
            .name(String::from("reminder"))
            .spawn(move || self.run())
            .expect("could not spawn reminder thread")
    }

    pub fn run(mut self) {
        info!("reminder scheduler running");
        loop {
            let checkpoint = self.next_checkpoint();
            self.wait_for(checkpoint);
            self.fire(checkpoint);
        }
    }

    fn next_checkpoint(&mut self) -> i32 {
        if self.checkpoints.is_empty() {
            self.checkpoints = regenerate(clock::minutes_now());
            debug!(
                pending = self.checkpoints.len(),
                "regenerated checkpoint list"
            );
        }
        // regenerate never returns an empty list
        self.checkpoints.remove(0)
    }

    // Blocks the scheduler, and only the scheduler, until the checkpoint
    // comes around.
    fn wait_for(&self, checkpoint: i32) {
        while !due(clock::minutes_now(), checkpoint) {
            thread::sleep(self.poll);
        }
    }

    /// Enqueues one reminder per user subscribed at this checkpoint.
    /// Failures are reported and the sweep moves on; a bad bucket never
    /// stops the loop.
    fn fire(&self, checkpoint: i32) {
        let bucket = clock::to_hhmm(checkpoint);

        for user_id in self.registry.subscribers(&bucket) {
            let task = Task {
                user_id,
                command: Command::Reminder,
                args: Vec::new(),
            };
            if let Err(e) = self.queue.send(task) {
                print_error_chain(&e);
            }
        }
    }
}
