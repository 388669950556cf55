//! Paginated-scan cursor codec: base64 of the decimal ASCII of a
//! millisecond Unix timestamp. Opaque to callers, but the encoding itself
//! is stable and documented for tooling (see SPEC_FULL.md §6).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};

use crate::sql::error::TranslatorError;

pub fn encode(ts: DateTime<Utc>) -> String {
    let ms = ts.timestamp_millis();
    STANDARD.encode(ms.to_string().into_bytes())
}

pub fn decode(cursor: &str) -> Result<DateTime<Utc>, TranslatorError> {
    let bytes = STANDARD.decode(cursor).map_err(|_| TranslatorError::InvalidCursor)?;
    let ascii = String::from_utf8(bytes).map_err(|_| TranslatorError::InvalidCursor)?;
    let ms: i64 = ascii.parse().map_err(|_| TranslatorError::InvalidCursor)?;
    Utc.timestamp_millis_opt(ms).single().ok_or(TranslatorError::InvalidCursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 0).unwrap();
        let cursor = encode(ts);
        let decoded = decode(&cursor).unwrap();
        assert_eq!(decoded.timestamp_millis(), ts.timestamp_millis());
    }

    #[test]
    fn encoding_is_pure_ascii() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 15, 12, 30, 0).unwrap();
        assert!(encode(ts).is_ascii());
    }

    #[test]
    fn garbage_cursor_is_invalid() {
        assert!(matches!(decode("not-base64-!!"), Err(TranslatorError::InvalidCursor)));
    }
}
