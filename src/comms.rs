use crate::user::DayEntry;

pub fn start_text() -> String {
    String::from(concat!(
        "Hi! I keep your personal calorie diary.\n",
        "Before anything else, tell me your local time with: set time HH:MM\n",
        "After that you can record food with <add>, fix mistakes with <sub>,\n",
        "ask for totals with <give>, and have me nag you with <set eating>.\n",
        "Send <help> for the full list of commands.\n"
    ))
}

pub fn help_text() -> String {
    String::from(concat!(
        "Commands I understand:\n",
        "add V [V ...] - record eaten calories for today\n",
        "sub V [V ...] - take calories back off today's total\n",
        "give all | today | DD.MM[.YYYY] - show recorded totals\n",
        "set time HH:MM - tell me what time it is for you right now\n",
        "set eating HH:MM [HH:MM ...] - when to remind you to log food\n",
        "stop - erase everything I know about you\n",
        "Values are whole calories between 50 and 9999; reminder times\n",
        "must fall on 5 minute marks.\n"
    ))
}

pub fn reminder_text() -> String {
    String::from("Time to log what you've eaten! Send: add <calories>")
}

pub fn goodbye_text() -> String {
    String::from("Your diary is erased. Send <start> if you ever want to begin again.")
}

pub fn ack_text() -> String {
    String::from("Got it.")
}

/// What a user sees when their task died on an internal fault
pub fn failure_text() -> String {
    String::from("Something went wrong on my side, sorry. Please try that again.")
}

/// The reply sent whenever a command is rejected, whatever the reason
pub fn error_reply(detail: &str) -> String {
    format!(
        "Error: {}.\nSend <help> to see how the commands are used.",
        detail
    )
}

/// One line per recorded date, oldest first, with the day's total
pub fn daily_totals(days: &[&DayEntry]) -> String {
    let mut text = String::new();
    for day in days {
        text.push_str(&format!(
            "Date: {}. Calories total: {}.\n",
            day.get_date(),
            day.total()
        ));
    }
    text
}
