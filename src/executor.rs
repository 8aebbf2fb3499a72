use crate::clock;
use crate::command::Command;
use crate::comms;
use crate::outbox::{Outbox, SendError};
use crate::registry::ReminderRegistry;
use crate::store::{Store, StoreError};
use crate::timezone;
use crate::user::{DayEntry, UserId};
use crate::worker::Task;
use std::sync::Arc;
use thiserror::Error;

/// A command the grammar let through but the ledger refuses.
///
/// Rejections are not faults: the user gets the text back as a formatted
/// error reply and the task itself counts as handled.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("your timezone is not set, send: set time HH:MM")]
    TimezoneUnset,
    #[error("subtracting that much would make today's total negative")]
    WouldGoNegative,
    #[error("no calories recorded for the requested date")]
    NothingRecorded,
    #[error("reminder times must fall on 5 minute marks")]
    UnalignedTime,
    #[error("malformed value: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
enum ExecError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Faults that escape a task and reach the worker's fault sink
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task aborted on a storage fault")]
    Store(#[from] StoreError),
    #[error("task reply was not delivered")]
    Send(#[from] SendError),
}

/// Maps each task onto exactly one ledger or resolver operation plus the
/// replies it owes the user.
pub struct Executor {
    store: Store,
    registry: Arc<ReminderRegistry>,
    outbox: Arc<dyn Outbox>,
}

impl Executor {
    pub fn new(store: Store, registry: Arc<ReminderRegistry>, outbox: Arc<dyn Outbox>) -> Self {
        Self {
            store,
            registry,
            outbox,
        }
    }

    /// Returns the underlying store. Useful for testing
    pub fn get_store(&self) -> &Store {
        &self.store
    }

    /// Runs one task to completion.
    ///
    /// A rejected command turns into an error reply and an `Ok` result;
    /// only storage and delivery faults surface to the worker.
    pub fn execute(&self, task: &Task) -> Result<(), TaskError> {
        // First contact creates the record
        self.store.ensure(task.user_id)?;

        match self.run(task) {
            Ok(reply) => {
                if let Some(text) = reply {
                    self.outbox.send(task.user_id, &text)?;
                }
                if task.command.wants_ack() {
                    self.outbox.send(task.user_id, &comms::ack_text())?;
                }
                Ok(())
            }
            Err(ExecError::Rejected(rejection)) => {
                self.outbox
                    .send(task.user_id, &comms::error_reply(&rejection.to_string()))?;
                Ok(())
            }
            Err(ExecError::Store(e)) => {
                // The user hears something even when their task dies on
                // our side; the details go to the fault sink, not to them.
                self.outbox
                    .send(task.user_id, &comms::failure_text())
                    .ok();
                Err(TaskError::Store(e))
            }
        }
    }

    fn run(&self, task: &Task) -> Result<Option<String>, ExecError> {
        match task.command {
            Command::Add => self.add(task.user_id, &task.args),
            Command::Sub => self.sub(task.user_id, &task.args),
            Command::Give => self.give(task.user_id, &task.args),
            Command::SetTime => self.set_time(task.user_id, &task.args),
            Command::SetEating => self.set_eating(task.user_id, &task.args),
            Command::Stop => self.stop(task.user_id),
            Command::Reminder => self.reminder(task.user_id),
            Command::Start => Ok(Some(comms::start_text())),
            Command::Help => Ok(Some(comms::help_text())),
            Command::Error => {
                let detail = task.args.first().map(String::as_str).unwrap_or("unknown");
                Ok(Some(comms::error_reply(detail)))
            }
        }
    }

    fn add(&self, user_id: UserId, args: &[String]) -> Result<Option<String>, ExecError> {
        let values = parse_values(args)?;

        self.store.with_user(user_id, |record| {
            let zone = record.get_zone().ok_or(Rejection::TimezoneUnset)?;
            record.append_calories(&timezone::local_date(zone), &values);
            Ok::<(), Rejection>(())
        })??;

        Ok(None)
    }

    fn sub(&self, user_id: UserId, args: &[String]) -> Result<Option<String>, ExecError> {
        // The grammar negated these already
        let values = parse_values(args)?;
        let delta: i64 = values.iter().sum();

        self.store.with_user(user_id, |record| {
            let zone = record.get_zone().ok_or(Rejection::TimezoneUnset)?;
            let date = timezone::local_date(zone);

            let eaten = record.day(&date).map(|d| d.total()).unwrap_or(0);
            if eaten + delta < 0 {
                return Err(Rejection::WouldGoNegative);
            }

            record.append_calories(&date, &values);
            Ok(())
        })??;

        Ok(None)
    }

    fn give(&self, user_id: UserId, args: &[String]) -> Result<Option<String>, ExecError> {
        let selector = args
            .first()
            .ok_or_else(|| Rejection::Malformed(String::from("missing date")))?;
        let record = self.store.read(user_id)?;

        let wanted = match selector.as_str() {
            "all" => None,
            "today" => {
                let zone = record.get_zone().ok_or(Rejection::TimezoneUnset)?;
                Some(timezone::local_date(zone))
            }
            explicit => {
                // The ledger stores no year; match on day and month only
                let day_month: Vec<&str> = explicit.split('.').take(2).collect();
                Some(day_month.join("."))
            }
        };

        let days: Vec<&DayEntry> = record
            .get_days()
            .iter()
            .filter(|day| match &wanted {
                Some(date) => day.get_date() == date,
                None => true,
            })
            .collect();

        if days.is_empty() {
            return Err(Rejection::NothingRecorded.into());
        }

        Ok(Some(comms::daily_totals(&days)))
    }

    fn set_time(&self, user_id: UserId, args: &[String]) -> Result<Option<String>, ExecError> {
        let stated = args
            .first()
            .and_then(|t| clock::from_hhmm(t))
            .ok_or_else(|| Rejection::Malformed(String::from("missing time")))?;

        let offset = timezone::resolve_offset(clock::minutes_now(), stated);
        self.store
            .with_user(user_id, |record| record.set_zone(offset))?;

        Ok(None)
    }

    fn set_eating(&self, user_id: UserId, args: &[String]) -> Result<Option<String>, ExecError> {
        let buckets = self.store.with_user(user_id, |record| {
            let zone = record.get_zone().ok_or(Rejection::TimezoneUnset)?;

            let mut buckets = Vec::with_capacity(args.len());
            for arg in args {
                let minutes =
                    clock::from_hhmm(arg).ok_or_else(|| Rejection::Malformed(arg.clone()))?;
                if minutes % 5 != 0 {
                    return Err(Rejection::UnalignedTime);
                }
                buckets.push(timezone::server_bucket(minutes, zone));
            }

            record.extend_reminder_times(&buckets);
            Ok(buckets)
        })??;

        // Registered only after the times are safely on disk, so the
        // registry never holds a bucket the store does not know about.
        self.registry.register(user_id, &buckets);

        Ok(None)
    }

    fn stop(&self, user_id: UserId) -> Result<Option<String>, ExecError> {
        let record = self.store.erase(user_id)?;
        self.registry
            .unregister(user_id, record.get_reminder_times());

        Ok(Some(comms::goodbye_text()))
    }

    fn reminder(&self, user_id: UserId) -> Result<Option<String>, ExecError> {
        let record = self.store.read(user_id)?;
        if record.get_zone().is_none() {
            return Err(Rejection::TimezoneUnset.into());
        }

        Ok(Some(comms::reminder_text()))
    }
}

fn parse_values(args: &[String]) -> Result<Vec<i64>, Rejection> {
    args.iter()
        .map(|v| {
            v.parse::<i64>()
                .map_err(|_| Rejection::Malformed(v.clone()))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::Executor;
    use crate::command::Command;
    use crate::outbox::MemoryOutbox;
    use crate::registry::ReminderRegistry;
    use crate::store::{Store, StoreError};
    use crate::timezone;
    use crate::worker::Task;
    use std::sync::Arc;

    struct Harness {
        _dir: tempfile::TempDir,
        executor: Executor,
        outbox: Arc<MemoryOutbox>,
        registry: Arc<ReminderRegistry>,
    }

    fn setup() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let registry = Arc::new(ReminderRegistry::new());
        let outbox = Arc::new(MemoryOutbox::new());

        let executor = Executor::new(store, registry.clone(), outbox.clone());

        Harness {
            _dir: dir,
            executor,
            outbox,
            registry,
        }
    }

    fn run(harness: &Harness, user_id: i64, command: Command, args: &[&str]) {
        let task = Task {
            user_id,
            command,
            args: args.iter().map(|a| a.to_string()).collect(),
        };
        harness.executor.execute(&task).unwrap();
    }

    fn set_zone(harness: &Harness, user_id: i64, offset: i32) {
        harness.executor.get_store().ensure(user_id).unwrap();
        harness
            .executor
            .get_store()
            .with_user(user_id, |record| record.set_zone(offset))
            .unwrap();
    }

    fn replies(harness: &Harness) -> Vec<String> {
        harness
            .outbox
            .take()
            .into_iter()
            .map(|(_, text)| text)
            .collect()
    }

    #[test]
    fn test_add_then_give_today() {
        let harness = setup();
        set_zone(&harness, 1, 0);

        run(&harness, 1, Command::Add, &["100", "200"]);
        assert_eq!(replies(&harness), ["Got it."]);

        run(&harness, 1, Command::Give, &["today"]);
        let today = timezone::local_date(0);
        assert_eq!(
            replies(&harness),
            [format!("Date: {}. Calories total: 300.\n", today)]
        );
    }

    #[test]
    fn test_add_without_timezone_is_rejected() {
        let harness = setup();

        run(&harness, 1, Command::Add, &["100"]);

        let sent = replies(&harness);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("Error: your timezone is not set"));
        // Nothing was written to the day ledger
        let record = harness.executor.get_store().read(1).unwrap();
        assert!(record.get_days().is_empty());
    }

    #[test]
    fn test_sub_respects_the_floor() {
        let harness = setup();
        set_zone(&harness, 1, 0);
        run(&harness, 1, Command::Add, &["300"]);
        harness.outbox.take();

        run(&harness, 1, Command::Sub, &["-400"]);
        let sent = replies(&harness);
        assert!(sent[0].starts_with("Error: subtracting that much"));

        run(&harness, 1, Command::Sub, &["-250"]);
        assert_eq!(replies(&harness), ["Got it."]);

        run(&harness, 1, Command::Give, &["today"]);
        let today = timezone::local_date(0);
        assert_eq!(
            replies(&harness),
            [format!("Date: {}. Calories total: 50.\n", today)]
        );
    }

    #[test]
    fn test_sub_on_empty_day_is_rejected() {
        let harness = setup();
        set_zone(&harness, 1, 0);

        run(&harness, 1, Command::Sub, &["-100"]);

        assert!(replies(&harness)[0].starts_with("Error: subtracting that much"));
    }

    #[test]
    fn test_give_explicit_date_ignores_year() {
        let harness = setup();
        set_zone(&harness, 1, 0);
        harness
            .executor
            .get_store()
            .with_user(1, |record| record.append_calories("05.06", &[500]))
            .unwrap();

        run(&harness, 1, Command::Give, &["05.06.2022"]);

        assert_eq!(replies(&harness), ["Date: 05.06. Calories total: 500.\n"]);
    }

    #[test]
    fn test_give_all_lists_every_date() {
        let harness = setup();
        harness.executor.get_store().ensure(1).unwrap();
        harness
            .executor
            .get_store()
            .with_user(1, |record| {
                record.append_calories("01.06", &[100]);
                record.append_calories("02.06", &[200]);
            })
            .unwrap();

        // give all needs no timezone
        run(&harness, 1, Command::Give, &["all"]);

        assert_eq!(
            replies(&harness),
            ["Date: 01.06. Calories total: 100.\nDate: 02.06. Calories total: 200.\n"]
        );
    }

    #[test]
    fn test_give_nothing_recorded() {
        let harness = setup();
        set_zone(&harness, 1, 0);

        run(&harness, 1, Command::Give, &["all"]);

        assert!(replies(&harness)[0].starts_with("Error: no calories recorded"));
    }

    #[test]
    fn test_set_time_persists_a_grid_aligned_offset() {
        let harness = setup();
        let stated = "10:00";

        run(&harness, 1, Command::SetTime, &[stated]);
        assert_eq!(replies(&harness), ["Got it."]);

        let zone = harness
            .executor
            .get_store()
            .read(1)
            .unwrap()
            .get_zone()
            .expect("zone should be set");
        assert_eq!(zone.rem_euclid(5), 0);
        assert!(zone.abs() <= 720);
    }

    #[test]
    fn test_set_eating_registers_server_bucket() {
        let harness = setup();
        set_zone(&harness, 1, 30);

        run(&harness, 1, Command::SetEating, &["10:00"]);
        assert_eq!(replies(&harness), ["Got it."]);

        assert_eq!(harness.registry.subscribers("10:30"), [1]);
        let record = harness.executor.get_store().read(1).unwrap();
        assert_eq!(record.get_reminder_times(), ["10:30"]);
    }

    #[test]
    fn test_set_eating_rejects_unaligned_time() {
        let harness = setup();
        set_zone(&harness, 1, 0);

        run(&harness, 1, Command::SetEating, &["10:02"]);

        assert!(replies(&harness)[0].starts_with("Error: reminder times"));
        assert!(harness.registry.subscribers("10:02").is_empty());
        let record = harness.executor.get_store().read(1).unwrap();
        assert!(record.get_reminder_times().is_empty());
    }

    #[test]
    fn test_stop_erases_user_and_registry() {
        let harness = setup();
        set_zone(&harness, 1, 30);
        run(&harness, 1, Command::SetEating, &["10:00"]);
        harness.outbox.take();

        run(&harness, 1, Command::Stop, &[]);

        let sent = replies(&harness);
        assert!(sent[0].contains("erased"));
        assert!(harness.registry.subscribers("10:30").is_empty());
        assert!(matches!(
            harness.executor.get_store().read(1),
            Err(StoreError::MissingRecord(1))
        ));
    }

    #[test]
    fn test_reminder_needs_timezone() {
        let harness = setup();

        run(&harness, 1, Command::Reminder, &[]);
        assert!(replies(&harness)[0].starts_with("Error: your timezone is not set"));

        set_zone(&harness, 1, 0);
        run(&harness, 1, Command::Reminder, &[]);
        assert!(replies(&harness)[0].contains("Time to log"));
    }

    #[test]
    fn test_start_help_and_error_always_reply() {
        let harness = setup();

        run(&harness, 1, Command::Start, &[]);
        run(&harness, 1, Command::Help, &[]);
        run(&harness, 1, Command::Error, &["unknown command"]);

        let sent = replies(&harness);
        assert_eq!(sent.len(), 3);
        assert!(sent[2].starts_with("Error: unknown command."));
    }
}
