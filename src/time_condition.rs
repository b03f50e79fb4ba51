use chrono::{Datelike, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};

/// One value or a set of values; matching is membership in either case.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T: PartialEq> OneOrMany<T> {
    fn contains(&self, value: &T) -> bool {
        match self {
            OneOrMany::One(v) => v == value,
            OneOrMany::Many(vs) => vs.contains(value),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MinuteParity {
    Even,
    Odd,
}

/// All fields optional; present fields are ANDed together. An evaluation
/// error in any field makes the whole predicate false rather than panicking.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<OneOrMany<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour_range: Option<(u32, u32)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour: Option<OneOrMany<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minute: Option<OneOrMany<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minute_parity: Option<MinuteParity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<OneOrMany<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<OneOrMany<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<OneOrMany<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl TimeConditions {
    pub fn is_empty(&self) -> bool {
        self == &TimeConditions::default()
    }

    /// Evaluates every present predicate against `now`, ANDing the results.
    pub fn evaluate(&self, now: chrono::DateTime<chrono::Local>) -> bool {
        let weekday_sun0 = now.weekday().num_days_from_sunday();
        let hour = now.hour();
        let minute = now.minute();
        let date = now.date_naive();

        if let Some(dow) = &self.day_of_week {
            if !dow.contains(&weekday_sun0) {
                return false;
            }
        }
        if let Some((a, b)) = self.hour_range {
            let matches = if a <= b {
                hour >= a && hour < b
            } else {
                // Overnight wraparound: [22, 6] matches 23:00 and 05:00, not 12:00.
                hour >= a || hour < b
            };
            if !matches {
                return false;
            }
        }
        if let Some(h) = &self.hour {
            if !h.contains(&hour) {
                return false;
            }
        }
        if let Some(m) = &self.minute {
            if !m.contains(&minute) {
                return false;
            }
        }
        if let Some(parity) = self.minute_parity {
            let is_even = minute % 2 == 0;
            let ok = match parity {
                MinuteParity::Even => is_even,
                MinuteParity::Odd => !is_even,
            };
            if !ok {
                return false;
            }
        }
        if let Some(dom) = &self.day_of_month {
            if !dom.contains(&date.day()) {
                return false;
            }
        }
        if let Some(month) = &self.month {
            if !month.contains(&date.month()) {
                return false;
            }
        }
        if let Some(year) = &self.year {
            if !year.contains(&date.year()) {
                return false;
            }
        }
        if let Some((start, end)) = self.date_range {
            if date < start || date > end {
                return false;
            }
        }

        true
    }
}
