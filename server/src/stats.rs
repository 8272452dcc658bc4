//! Derived figures shown on the dashboard and accounting pages.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

/// Relative change from `previous` to `current` as a signed whole percentage.
pub fn percentage_change(current: f64, previous: f64) -> String {
    if previous == 0.0 {
        return if current > 0.0 { "+100%".to_string() } else { "0%".to_string() };
    }
    let change = ((current - previous) / previous * 100.0).round() as i64;
    match change {
        0 => "0%".to_string(),
        n if n > 0 => format!("+{n}%"),
        n => format!("{n}%"),
    }
}

/// Elapsed time in its single largest unit, e.g. `"3 day(s) ago"`.
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let (count, unit) = if elapsed.num_days() >= 1 {
        (elapsed.num_days(), "day")
    } else if elapsed.num_hours() >= 1 {
        (elapsed.num_hours(), "hour")
    } else if elapsed.num_minutes() >= 1 {
        (elapsed.num_minutes(), "minute")
    } else {
        return "Just now".to_string();
    };
    format!("{count} {unit}(s) ago")
}

/// `None` when the sum leaves the `Decimal` range.
pub fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values.into_iter().try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

/// Net profit as a percentage of income, rounded to two places.
pub fn profit_margin(income: Decimal, expenses: Decimal) -> Option<Decimal> {
    if income.is_zero() {
        return Some(Decimal::ZERO);
    }
    let margin = income
        .checked_sub(expenses)?
        .checked_div(income)?
        .checked_mul(Decimal::ONE_HUNDRED)?;
    Some(margin.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}
