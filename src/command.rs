use crate::clock;

/// Everything a task can ask the bot to do.
///
/// `Error` is produced here when a message fails validation; `Reminder`
/// is never parsed from text, only enqueued by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Add,
    Sub,
    Give,
    SetTime,
    SetEating,
    Stop,
    Start,
    Help,
    Error,
    Reminder,
}

impl Command {
    /// Commands that change state get an explicit "got it" on success
    pub fn wants_ack(self) -> bool {
        matches!(
            self,
            Command::Add | Command::Sub | Command::SetTime | Command::SetEating
        )
    }
}

/// Turns a raw message into a validated `(Command, arguments)` pair.
///
/// Anything that fails validation comes back as `Command::Error` with the
/// diagnostic as its single argument, so the executor can reply with it.
pub fn parse(message: &str) -> (Command, Vec<String>) {
    let words = tokenize(message);
    match validate(&words) {
        Ok(task) => task,
        Err(text) => (Command::Error, vec![text]),
    }
}

// Commas count as separators: "add 100, 200" is two values.
fn tokenize(message: &str) -> Vec<String> {
    message
        .replace(',', " ")
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect()
}

fn validate(words: &[String]) -> Result<(Command, Vec<String>), String> {
    let first = words.first().ok_or_else(|| String::from("empty message"))?;

    match first.as_str() {
        "add" => Ok((Command::Add, calorie_values(&words[1..], false)?)),
        "sub" => Ok((Command::Sub, calorie_values(&words[1..], true)?)),
        "give" => Ok((Command::Give, date_selector(&words[1..])?)),
        "set" => set_command(&words[1..]),
        "stop" => Ok((Command::Stop, Vec::new())),
        "start" | "/start" => Ok((Command::Start, Vec::new())),
        "help" => Ok((Command::Help, Vec::new())),
        _ => Err(String::from("unknown command")),
    }
}

/// Calorie values are positive whole numbers between 50 and 9999;
/// `sub` values are negated here so the executor only ever appends.
fn calorie_values(words: &[String], negate: bool) -> Result<Vec<String>, String> {
    if words.is_empty() {
        return Err(String::from("no values given"));
    }

    let mut values = Vec::with_capacity(words.len());
    for word in words {
        let value: i64 = word
            .parse()
            .map_err(|_| String::from("values must be whole numbers"))?;
        if value <= 0 {
            return Err(String::from("values must be positive"));
        }
        if value > 9999 {
            return Err(String::from("values above 9999 are not accepted"));
        }
        if value < 50 {
            return Err(String::from("values below 50 are not accepted"));
        }
        let value = if negate { -value } else { value };
        values.push(value.to_string());
    }

    Ok(values)
}

fn date_selector(words: &[String]) -> Result<Vec<String>, String> {
    match words {
        [] => Err(String::from("no date given")),
        [word] if word == "all" || word == "today" => Ok(vec![word.clone()]),
        [word] => Ok(vec![normalize_date(word)?]),
        _ => Err(String::from("give takes a single date")),
    }
}

/// Validates "DD.MM" or "DD.MM.YY[YY]" and re-renders it zero-padded,
/// expanding two-digit years to 20YY. The stored ledger keys are always
/// padded, so an unpadded "5.6" has to become "05.06" to ever match.
fn normalize_date(word: &str) -> Result<String, String> {
    let parts: Vec<&str> = word.split('.').collect();
    if !(parts.len() == 2 || parts.len() == 3) {
        return Err(String::from("malformed date"));
    }

    let day: u32 = parts[0]
        .parse()
        .map_err(|_| String::from("malformed date"))?;
    let month: u32 = parts[1]
        .parse()
        .map_err(|_| String::from("malformed date"))?;

    // Day 29 in February is let through; the ledger stores no year, so
    // leapness cannot be checked.
    let month_days = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if day == 0 || !(1..=12).contains(&month) || day > month_days[month as usize - 1] {
        return Err(String::from("invalid date"));
    }

    let mut date = format!("{:02}.{:02}", day, month);
    if let Some(year) = parts.get(2) {
        let _: u32 = year.parse().map_err(|_| String::from("malformed date"))?;
        if year.len() <= 2 {
            date.push_str(&format!(".20{:0>2}", year));
        } else {
            date.push_str(&format!(".{}", year));
        }
    }

    Ok(date)
}

fn set_command(words: &[String]) -> Result<(Command, Vec<String>), String> {
    let kind = words
        .first()
        .ok_or_else(|| String::from("set needs a kind: time or eating"))?;
    let command = match kind.as_str() {
        "time" => Command::SetTime,
        "eating" => Command::SetEating,
        _ => return Err(String::from("set needs a kind: time or eating")),
    };

    let times = &words[1..];
    if times.is_empty() {
        return Err(String::from("no time given"));
    }
    for time in times {
        if clock::from_hhmm(time).is_none() {
            return Err(String::from("malformed time"));
        }
    }

    Ok((command, times.to_vec()))
}
