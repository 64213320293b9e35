// sms_relay/src/sms/payload.rs
// Bulk SMS request body and attendance message composition.

use chrono::{NaiveDate, NaiveDateTime};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::warn;

use super::msisdn;

/// The gateway rejects template variables longer than this.
pub const VAR_FIELD_LIMIT: usize = 32;
pub const VAR_COUNT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize,)]
pub struct BulkSmsRequest {
    #[serde(rename = "RequestID")]
    pub request_id:         String,
    #[serde(rename = "MasterCampaignID")]
    pub master_campaign_id: String,
    #[serde(rename = "BulkData")]
    pub bulk_data:          Vec<BulkSmsEntry,>,
}

/// One recipient with its `VAR1`..`VAR10` template values.
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct BulkSmsEntry {
    pub msisdn: String,
    pub vars:   [String; VAR_COUNT],
}

impl BulkSmsEntry {
    /// Builds a sanitised entry: the number is normalised (empty when
    /// invalid) and every variable is trimmed and capped at 32 characters.
    pub fn new(msisdn: &str, vars: [&str; VAR_COUNT],) -> Self {
        let mut index = 0;
        let vars = vars.map(|value| {
            index += 1;
            sanitize_var(value, &format!("VAR{}", index),)
        },);
        Self {
            msisdn: msisdn::normalize(msisdn,).unwrap_or_default(),
            vars,
        }
    }
}

impl Serialize for BulkSmsEntry {
    fn serialize<S: Serializer,>(&self, serializer: S,) -> Result<S::Ok, S::Error,> {
        let mut map = serializer.serialize_map(Some(VAR_COUNT + 1,),)?;
        map.serialize_entry("Msisdn", &self.msisdn,)?;
        for (i, value,) in self.vars.iter().enumerate() {
            map.serialize_entry(&format!("VAR{}", i + 1), value,)?;
        }
        map.end()
    }
}

pub fn sanitize_var(value: &str, field: &str,) -> String {
    let trimmed = value.trim();
    let length = trimmed.chars().count();
    if length <= VAR_FIELD_LIMIT {
        return trimmed.to_string();
    }

    warn!(
        "Truncating {} to {} characters. Original length: {}",
        field, VAR_FIELD_LIMIT, length
    );
    let truncated: String = trimmed.chars().take(VAR_FIELD_LIMIT,).collect();
    truncated.trim_end().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Arrival,
    Departure,
    Attendance,
}

impl MessageType {
    pub fn as_str(self,) -> &'static str {
        match self {
            MessageType::Arrival => "ARRIVAL",
            MessageType::Departure => "DEPARTURE",
            MessageType::Attendance => "ATTENDANCE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize,)]
pub struct StudentContact {
    pub name:  String,
    pub phone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize,)]
pub struct AttendanceEvent {
    pub in_time:    Option<NaiveDateTime,>,
    pub out_time:   Option<NaiveDateTime,>,
    pub date:       Option<NaiveDate,>,
    pub class_name: Option<String,>,
    pub status:     Option<String,>,
}

impl AttendanceEvent {
    /// Arrival wins over departure; with neither the message is a plain
    /// attendance note stamped at `now`.
    pub fn message_type(&self, now: NaiveDateTime,) -> (MessageType, NaiveDateTime,) {
        match (self.in_time, self.out_time,) {
            (Some(t,), _,) => (MessageType::Arrival, t,),
            (None, Some(t,),) => (MessageType::Departure, t,),
            (None, None,) => (MessageType::Attendance, now,),
        }
    }
}

/// `09:05 AM` style, as shown to parents.
pub fn format_time(time: NaiveDateTime,) -> String {
    time.format("%I:%M %p",).to_string()
}

/// `Fri Oct 16 2026` style.
pub fn format_date(date: NaiveDate,) -> String {
    date.format("%a %b %d %Y",).to_string()
}

pub fn attendance_request(
    request_id: String,
    campaign_id: &str,
    student: &StudentContact,
    attendance: &AttendanceEvent,
    now: NaiveDateTime,
) -> BulkSmsRequest {
    let (message_type, at,) = attendance.message_type(now,);
    let time = format_time(at,);

    let name = student.name.trim();
    let name = if name.is_empty() { "Student" } else { name };
    let time_and_name = format!("{} {}", time, name);
    let time_info = match message_type {
        MessageType::Arrival => format!("Marked in at {}", time),
        MessageType::Departure => format!("Marked out at {}", time),
        MessageType::Attendance => format!("Attendance recorded at {}", time),
    };
    let date = format_date(attendance.date.unwrap_or_else(|| now.date(),),);

    let entry = BulkSmsEntry::new(
        &student.phone,
        [
            time_and_name.as_str(),
            time_info.as_str(),
            date.as_str(),
            attendance.class_name.as_deref().unwrap_or("Class",),
            attendance.status.as_deref().unwrap_or("PRESENT",),
            "Attendance System",
            message_type.as_str(),
            "",
            "",
            "",
        ],
    );

    BulkSmsRequest {
        request_id,
        master_campaign_id: campaign_id.to_string(),
        bulk_data: vec![entry],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32,) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16,).unwrap().and_hms_opt(h, m, 0,).unwrap()
    }

    #[test]
    fn long_values_are_truncated_and_trimmed() {
        let long = format!("{}   tail", "a".repeat(30));
        let out = sanitize_var(&long, "VAR4",);
        assert_eq!(out, "a".repeat(30));
        assert_eq!(sanitize_var("  short  ", "VAR1"), "short");
    }

    #[test]
    fn arrival_message_fills_every_variable() {
        let student = StudentContact {
            name:  "Ahmad".to_string(),
            phone: "0730774777".to_string(),
        };
        let attendance = AttendanceEvent {
            in_time: Some(at(7, 45,),),
            class_name: Some("Grade 5-A".to_string(),),
            ..Default::default()
        };

        let request = attendance_request("1700000000000".to_string(), "403", &student, &attendance, at(12, 0,),);
        let json = serde_json::to_value(&request,).unwrap();

        assert_eq!(json["RequestID"], "1700000000000");
        assert_eq!(json["MasterCampaignID"], "403");
        let entry = &json["BulkData"][0];
        assert_eq!(entry["Msisdn"], "93730774777");
        assert_eq!(entry["VAR1"], "07:45 AM Ahmad");
        assert_eq!(entry["VAR2"], "Marked in at 07:45 AM");
        assert_eq!(entry["VAR3"], "Fri Oct 16 2026");
        assert_eq!(entry["VAR4"], "Grade 5-A");
        assert_eq!(entry["VAR5"], "PRESENT");
        assert_eq!(entry["VAR6"], "Attendance System");
        assert_eq!(entry["VAR7"], "ARRIVAL");
        assert_eq!(entry["VAR10"], "");
    }

    #[test]
    fn departure_and_plain_attendance() {
        let departure = AttendanceEvent {
            out_time: Some(at(14, 5,),),
            ..Default::default()
        };
        assert_eq!(departure.message_type(at(15, 0,)), (MessageType::Departure, at(14, 5)));

        let none = AttendanceEvent::default();
        let student = StudentContact {
            name:  "  ".to_string(),
            phone: "93730774777".to_string(),
        };
        let request = attendance_request("1".to_string(), "404", &student, &none, at(15, 30,),);
        let entry = &request.bulk_data[0];
        assert_eq!(entry.vars[0], "03:30 PM Student");
        assert_eq!(entry.vars[1], "Attendance recorded at 03:30 PM");
        assert_eq!(entry.vars[6], "ATTENDANCE");
    }
}
