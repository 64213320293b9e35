// sms_relay/src/sms/msisdn.rs
// Recipient number normalisation for the Afghan gateway.

pub const COUNTRY_CODE: &str = "93";
const MIN_DIGITS: usize = 10;
const MAX_DIGITS: usize = 14;

/// Normalises a phone number to international form without `+`.
///
/// Non-digits are dropped, a `00` international prefix and one trunk `0` are
/// stripped, and the country code is prepended when missing. Returns `None`
/// unless the result has 10 to 14 digits.
pub fn normalize(phone: &str,) -> Option<String,> {
    let mut digits: String = phone.chars().filter(char::is_ascii_digit,).collect();
    if digits.is_empty() {
        return None;
    }

    if let Some(rest,) = digits.strip_prefix("00",) {
        digits = rest.to_string();
    }
    if let Some(rest,) = digits.strip_prefix('0',) {
        digits = rest.to_string();
    }
    if !digits.starts_with(COUNTRY_CODE,) {
        digits = format!("{}{}", COUNTRY_CODE, digits);
    }

    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits.len(),) {
        return None;
    }
    Some(digits,)
}
