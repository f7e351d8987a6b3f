use chrono::{Local, Timelike};

/// Salutation for an hour of the local day (0..=23).
pub fn salutation_for_hour(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good morning",
        12..=16 => "Good afternoon",
        17..=21 => "Good evening",
        _ => "Good night",
    }
}

pub fn greeting_for_hour(hour: u32, user_name: Option<&str>) -> String {
    let salutation = salutation_for_hour(hour);
    match user_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => format!("{salutation}, {name}! How may I assist you today?"),
        None => format!("{salutation}! How may I assist you today?"),
    }
}

/// Greeting for the current local time.
pub fn time_of_day_greeting(user_name: Option<&str>) -> String {
    greeting_for_hour(Local::now().hour(), user_name)
}
