use thiserror::Error;

/// Stable identifier the chat platform assigns to a user.
pub type UserId = i64;

/// An error returned from parsing a record file as `UserRecord`
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record is empty")]
    Empty,
    #[error("malformed record line: {0}")]
    MalformedLine(String),
    #[error("malformed field value: {0}")]
    MalformedValue(String),
}

/// Calories recorded on one calendar date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayEntry {
    date: String,
    calories: Vec<i64>,
}

impl DayEntry {
    /// The entry's date in "DD.MM" form
    pub fn get_date(&self) -> &str {
        self.date.as_str()
    }

    /// Every calorie value recorded on this date, in arrival order
    pub fn get_calories(&self) -> &[i64] {
        self.calories.as_slice()
    }

    /// The running total for this date
    pub fn total(&self) -> i64 {
        self.calories.iter().sum()
    }
}

/// The durable state kept for one user: clock offset, reminder times and
/// the date-bucketed calorie ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    zone: Option<i32>,
    reminder_times: Vec<String>,
    days: Vec<DayEntry>,
}

impl UserRecord {
    /// Creates the record a user has right after first contact: no zone,
    /// no reminder times, nothing eaten
    pub fn new() -> Self {
        Self {
            zone: None,
            reminder_times: Vec::new(),
            days: Vec::new(),
        }
    }

    /// Returns the user's clock offset in minutes, if they have set one
    pub fn get_zone(&self) -> Option<i32> {
        self.zone
    }

    pub fn set_zone(&mut self, offset_minutes: i32) {
        self.zone = Some(offset_minutes);
    }

    /// Returns the server-local "HH:MM" times this user is reminded at
    pub fn get_reminder_times(&self) -> &[String] {
        self.reminder_times.as_slice()
    }

    /// Adds more reminder times. Existing times are kept and duplicates
    /// are skipped; the list only ever grows until the user stops the bot.
    pub fn extend_reminder_times(&mut self, times: &[String]) {
        for time in times {
            if !self.reminder_times.contains(time) {
                self.reminder_times.push(time.clone());
            }
        }
    }

    /// Every recorded day, in first-seen order
    pub fn get_days(&self) -> &[DayEntry] {
        self.days.as_slice()
    }

    /// Returns the entry for the given "DD.MM" date, if any
    pub fn day(&self, date: &str) -> Option<&DayEntry> {
        self.days.iter().find(|d| d.date == date)
    }

    /// Appends calorie values under the given date.
    ///
    /// The last entry is the open date: values land there when the date
    /// matches, otherwise a new entry is started. Earlier dates are never
    /// rewritten.
    pub fn append_calories(&mut self, date: &str, values: &[i64]) {
        match self.days.last_mut() {
            Some(last) if last.date == date => last.calories.extend_from_slice(values),
            _ => self.days.push(DayEntry {
                date: date.to_string(),
                calories: values.to_vec(),
            }),
        }
    }

    /// Renders the record into its file form.
    ///
    /// The first line always holds the zone and reminder times; every
    /// recorded date follows on its own line:
    ///
    /// ```text
    /// zone=180 times_to_eat=10:30,19:00
    /// date=05.06 calories=150,-50,300
    /// ```
    pub fn render(&self) -> String {
        let zone = match self.zone {
            Some(offset) => offset.to_string(),
            None => String::from("None"),
        };
        let times = if self.reminder_times.is_empty() {
            String::from("None")
        } else {
            self.reminder_times.join(",")
        };

        let mut text = format!("zone={} times_to_eat={}", zone, times);

        for day in &self.days {
            let calories = day
                .calories
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<String>>()
                .join(",");
            text.push_str(&format!("\ndate={} calories={}", day.date, calories));
        }

        text
    }
}

impl Default for UserRecord {
    fn default() -> Self {
        Self::new()
    }
}

// "key=value" with the key checked, so a shuffled record does not parse
fn field<'a>(token: &'a str, key: &str) -> Result<&'a str, RecordError> {
    let (name, value) = token
        .split_once('=')
        .ok_or_else(|| RecordError::MalformedLine(token.to_string()))?;
    if name != key {
        return Err(RecordError::MalformedLine(token.to_string()));
    }
    Ok(value)
}

impl TryFrom<&str> for UserRecord {
    type Error = RecordError;

    /// Parses a record file back into a `UserRecord`.
    ///
    /// # Fails
    ///
    /// Fails when the first line is missing either field, or when any
    /// following line is not a well-formed date/calories pair.
    fn try_from(text: &str) -> Result<Self, Self::Error> {
        let mut lines = text.lines();
        let first = lines.next().ok_or(RecordError::Empty)?;

        let mut tokens = first.split_whitespace();
        let zone_token = tokens.next().ok_or(RecordError::Empty)?;
        let times_token = tokens
            .next()
            .ok_or_else(|| RecordError::MalformedLine(first.to_string()))?;

        let zone = match field(zone_token, "zone")? {
            "None" => None,
            value => Some(
                value
                    .parse::<i32>()
                    .map_err(|_| RecordError::MalformedValue(value.to_string()))?,
            ),
        };

        let reminder_times = match field(times_token, "times_to_eat")? {
            "None" => Vec::new(),
            value => value.split(',').map(|t| t.to_string()).collect(),
        };

        let mut days = Vec::new();
        for line in lines {
            let mut tokens = line.split_whitespace();
            let date_token = tokens
                .next()
                .ok_or_else(|| RecordError::MalformedLine(line.to_string()))?;
            let calories_token = tokens
                .next()
                .ok_or_else(|| RecordError::MalformedLine(line.to_string()))?;

            let date = field(date_token, "date")?.to_string();
            let calories = field(calories_token, "calories")?
                .split(',')
                .map(|v| {
                    v.parse::<i64>()
                        .map_err(|_| RecordError::MalformedValue(v.to_string()))
                })
                .collect::<Result<Vec<i64>, RecordError>>()?;

            days.push(DayEntry { date, calories });
        }

        Ok(Self {
            zone,
            reminder_times,
            days,
        })
    }
}
