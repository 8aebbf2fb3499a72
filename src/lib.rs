pub mod clock;
pub mod command;
pub mod comms;
pub mod error_handling;
pub mod executor;
pub mod outbox;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod timezone;
pub mod user;
pub mod worker;

use thiserror::Error;
use user::UserId;
use worker::{Task, TaskSender};

#[derive(Debug, Error)]
#[error("could not enqueue task for user {0}, the queue is closed")]
pub struct RouteMessageError(UserId);

/// Turns an inbound chat message into a task on the shared queue.
///
/// Parsing never fails: invalid text becomes an `error` task whose reply
/// explains the problem. The send blocks while the queue is full; that
/// backpressure is what keeps a slow worker pool from dropping messages.
pub fn route_message(
    user_id: UserId,
    text: &str,
    queue: &TaskSender,
) -> Result<(), RouteMessageError> {
    let (command, args) = command::parse(text);

    queue
        .send(Task {
            user_id,
            command,
            args,
        })
        .map_err(|_| RouteMessageError(user_id))
}

#[cfg(test)]
mod test {
    use super::route_message;
    use crate::command::Command;

    #[test]
    fn test_route_message_parses_and_enqueues() {
        let (tx, rx) = crate::worker::task_queue();

        route_message(7, "add 100 200", &tx).unwrap();
        route_message(7, "nonsense", &tx).unwrap();

        let first = rx.recv().unwrap();
        assert_eq!(first.user_id, 7);
        assert_eq!(first.command, Command::Add);
        assert_eq!(first.args, ["100", "200"]);

        let second = rx.recv().unwrap();
        assert_eq!(second.command, Command::Error);
    }

    #[test]
    fn test_route_message_reports_a_closed_queue() {
        let (tx, rx) = crate::worker::task_queue();
        drop(rx);

        assert!(route_message(7, "help", &tx).is_err());
    }
}
