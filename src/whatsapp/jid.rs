//! Phone number → WhatsApp JID.

use super::GatewayError;

pub const COUNTRY_CODE: &str = "55";
pub const MIN_PHONE_DIGITS: usize = 10;
const JID_SUFFIX: &str = "@s.whatsapp.net";

/// Digits of `raw` as the gateway expects them.
///
/// Fewer than ten digits cannot be a reachable number. Ten or eleven digits
/// (area code + local number) get the country code prepended; longer inputs
/// are taken to already carry one.
pub fn normalize_phone(raw: &str) -> Result<String, GatewayError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        n if n < MIN_PHONE_DIGITS => Err(GatewayError::InvalidPhone(raw.to_string())),
        10 | 11 => Ok(format!("{COUNTRY_CODE}{digits}")),
        _ => Ok(digits),
    }
}

pub fn to_jid(raw: &str) -> Result<String, GatewayError> {
    Ok(jid_for_number(&normalize_phone(raw)?))
}

/// JID of an already normalized number.
pub fn jid_for_number(number: &str) -> String {
    format!("{number}{JID_SUFFIX}")
}

/// Whether send and record controls should be enabled for this phone.
pub fn is_sendable(phone: Option<&str>) -> bool {
    phone.is_some_and(|p| normalize_phone(p).is_ok())
}
