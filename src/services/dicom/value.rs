use super::ParseError;
use super::fields::{FieldKind, FieldSpec};
use chrono::{NaiveDate, NaiveTime};
use dicom_core::VR;
use dicom_core::value::{ConvertValueError, PrimitiveValue};
use serde_json::Value;

/// Converts a decoded element value of `field` into its JSON form. Text has
/// already been decoded with the data set's Specific Character Set.
pub fn convert(field: &FieldSpec, vr: VR, value: &PrimitiveValue) -> Result<Value, ParseError> {
    match value {
        PrimitiveValue::Empty => Ok(Value::Null),
        PrimitiveValue::Str(_)
        | PrimitiveValue::Strs(_)
        | PrimitiveValue::Date(_)
        | PrimitiveValue::Time(_)
        | PrimitiveValue::DateTime(_) => {
            let text = value.to_str();
            let text = text.trim_end_matches(['\0', ' ']);
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            convert_text(field, vr, text)
        }
        _ => convert_binary(field, vr, value),
    }
}

fn convert_text(field: &FieldSpec, vr: VR, text: &str) -> Result<Value, ParseError> {
    match field.kind {
        FieldKind::Text => Ok(Value::String(text.to_string())),
        FieldKind::TextList if is_single_valued_text(vr) => {
            Ok(Value::Array(vec![Value::String(text.to_string())]))
        }
        FieldKind::TextList => Ok(Value::Array(
            split_values(text)
                .map(|v| Value::String(v.to_string()))
                .collect(),
        )),
        FieldKind::Integer => match vr {
            VR::IS => first_value(text)
                .map(|v| parse_integer(field, v))
                .unwrap_or(Ok(Value::Null)),
            _ => Err(incompatible(field, vr)),
        },
        FieldKind::Decimal => match vr {
            VR::DS | VR::IS => first_value(text)
                .map(|v| parse_decimal(field, v))
                .unwrap_or(Ok(Value::Null)),
            _ => Err(incompatible(field, vr)),
        },
        FieldKind::DecimalList => match vr {
            VR::DS | VR::IS => split_values(text)
                .map(|v| parse_decimal(field, v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            _ => Err(incompatible(field, vr)),
        },
        FieldKind::Date => match vr {
            VR::DA => Ok(Value::String(format_date(text.trim()))),
            _ => Err(incompatible(field, vr)),
        },
        FieldKind::Time => match vr {
            VR::TM => Ok(Value::String(format_time(text.trim()))),
            _ => Err(incompatible(field, vr)),
        },
    }
}

fn convert_binary(field: &FieldSpec, vr: VR, value: &PrimitiveValue) -> Result<Value, ParseError> {
    match (field.kind, vr) {
        (FieldKind::Integer, VR::US | VR::SS | VR::UL | VR::SL | VR::UV | VR::SV) => value
            .to_int::<i64>()
            .map(Value::from)
            .map_err(|e| out_of_range(field, e)),
        (FieldKind::Decimal, VR::FL | VR::FD) => value
            .to_float64()
            .map(Value::from)
            .map_err(|e| out_of_range(field, e)),
        (FieldKind::DecimalList, VR::FL | VR::FD) => value
            .to_multi_float64()
            .map(|values| Value::Array(values.into_iter().map(Value::from).collect()))
            .map_err(|e| out_of_range(field, e)),
        _ => Err(incompatible(field, vr)),
    }
}

/// Text VRs whose value may legitimately contain a backslash.
fn is_single_valued_text(vr: VR) -> bool {
    matches!(vr, VR::LT | VR::ST | VR::UT | VR::UR)
}

fn split_values(text: &str) -> impl Iterator<Item = &str> {
    text.split('\\').map(str::trim).filter(|v| !v.is_empty())
}

fn first_value(text: &str) -> Option<&str> {
    split_values(text).next()
}

fn parse_integer(field: &FieldSpec, raw: &str) -> Result<Value, ParseError> {
    // Some writers emit IS values with a redundant "+" or a ".0" tail.
    let cleaned = raw.strip_prefix('+').unwrap_or(raw);
    if let Ok(value) = cleaned.parse::<i64>() {
        return Ok(Value::from(value));
    }
    match cleaned.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && value.is_finite() => Ok(Value::from(value as i64)),
        _ => Err(ParseError::MalformedFile(format!(
            "{} has invalid integer string {raw:?}",
            field.name
        ))),
    }
}

fn parse_decimal(field: &FieldSpec, raw: &str) -> Result<Value, ParseError> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(Value::from)
        .ok_or_else(|| {
            ParseError::MalformedFile(format!(
                "{} has invalid decimal string {raw:?}",
                field.name
            ))
        })
}

/// `YYYYMMDD` (or the pre-1993 `YYYY.MM.DD`) as ISO 8601; anything else is
/// returned unchanged.
fn format_date(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| *c != '.').collect();
    let bytes = raw.as_bytes();
    let dotted_ok =
        !raw.contains('.') || (bytes.len() == 10 && bytes[4] == b'.' && bytes[7] == b'.');
    if !dotted_ok || digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return raw.to_string();
    }

    let year = digits[0..4].parse().ok();
    let month = digits[4..6].parse().ok();
    let day = digits[6..8].parse().ok();
    match (year, month, day) {
        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d)
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| raw.to_string()),
        _ => raw.to_string(),
    }
}

/// `HHMMSS.FFFFFF` and its truncated forms as `HH:MM:SS.FFFFFF`; anything
/// else is returned unchanged.
fn format_time(raw: &str) -> String {
    let (clock, fraction) = match raw.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (raw, None),
    };

    if !matches!(clock.len(), 2 | 4 | 6) || !clock.bytes().all(|b| b.is_ascii_digit()) {
        return raw.to_string();
    }
    let part = |i: usize| clock.get(i..i + 2).and_then(|p| p.parse::<u32>().ok()).unwrap_or(0);

    let Some(time) = NaiveTime::from_hms_opt(part(0), part(2), part(4)) else {
        return raw.to_string();
    };

    let mut formatted = time.format("%H:%M:%S").to_string();
    if let Some(fraction) = fraction {
        if fraction.is_empty()
            || fraction.len() > 6
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return raw.to_string();
        }
        formatted.push('.');
        formatted.push_str(fraction);
    }
    formatted
}

fn incompatible(field: &FieldSpec, vr: VR) -> ParseError {
    ParseError::UnsupportedEncoding(format!(
        "{} encoded as {vr:?} cannot be decoded",
        field.name
    ))
}

fn out_of_range(field: &FieldSpec, err: ConvertValueError) -> ParseError {
    ParseError::MalformedFile(format!("{} could not be converted: {err}", field.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom_core::Tag;
    use dicom_core::dicom_value;
    use serde_json::json;

    fn spec(kind: FieldKind) -> FieldSpec {
        FieldSpec {
            name: "test_field",
            tag: Tag(0x0011, 0x0011),
            kind,
        }
    }

    fn text(raw: &str) -> PrimitiveValue {
        PrimitiveValue::from(raw)
    }

    #[test]
    fn test_text_trims_padding() {
        let value = convert(&spec(FieldKind::Text), VR::UI, &text("1.2.840\0")).unwrap();
        assert_eq!(value, json!("1.2.840"));

        let value = convert(&spec(FieldKind::Text), VR::PN, &text("Doe^John ")).unwrap();
        assert_eq!(value, json!("Doe^John"));
    }

    #[test]
    fn test_blank_values_are_null() {
        let value = convert(&spec(FieldKind::Text), VR::LO, &text("    ")).unwrap();
        assert_eq!(value, Value::Null);
        let value = convert(&spec(FieldKind::Integer), VR::US, &PrimitiveValue::Empty).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn test_text_list_splits_on_backslash() {
        let value = convert(
            &spec(FieldKind::TextList),
            VR::CS,
            &text("ORIGINAL\\PRIMARY\\AXIAL "),
        )
        .unwrap();
        assert_eq!(value, json!(["ORIGINAL", "PRIMARY", "AXIAL"]));

        let value = convert(&spec(FieldKind::TextList), VR::LT, &text("a\\b")).unwrap();
        assert_eq!(value, json!(["a\\b"]));
    }

    #[test]
    fn test_multi_valued_strings() {
        let value =
            PrimitiveValue::Strs(vec!["ORIGINAL".to_string(), "PRIMARY".to_string()].into());
        let converted = convert(&spec(FieldKind::TextList), VR::CS, &value).unwrap();
        assert_eq!(converted, json!(["ORIGINAL", "PRIMARY"]));

        let value = PrimitiveValue::Strs(vec!["0.5".to_string(), "0.625".to_string()].into());
        let converted = convert(&spec(FieldKind::DecimalList), VR::DS, &value).unwrap();
        assert_eq!(converted, json!([0.5, 0.625]));
    }

    #[test]
    fn test_decimal_strings() {
        let value = convert(&spec(FieldKind::Decimal), VR::DS, &text(" -1024")).unwrap();
        assert_eq!(value, json!(-1024.0));
    }

    #[test]
    fn test_integer_string_and_binary() {
        let value = convert(&spec(FieldKind::Integer), VR::IS, &text("+12 ")).unwrap();
        assert_eq!(value, json!(12));

        let value = convert(&spec(FieldKind::Integer), VR::US, &dicom_value!(U16, [512])).unwrap();
        assert_eq!(value, json!(512));

        let value =
            convert(&spec(FieldKind::Integer), VR::SL, &dicom_value!(I32, [-7, 3])).unwrap();
        assert_eq!(value, json!(-7));
    }

    #[test]
    fn test_binary_floats() {
        let value = convert(&spec(FieldKind::Decimal), VR::FD, &dicom_value!(F64, [2.5])).unwrap();
        assert_eq!(value, json!(2.5));

        let value =
            convert(&spec(FieldKind::DecimalList), VR::FL, &dicom_value!(F32, [0.5, 1.5])).unwrap();
        assert_eq!(value, json!([0.5, 1.5]));
    }

    #[test]
    fn test_invalid_numbers_are_malformed() {
        let err = convert(&spec(FieldKind::Integer), VR::IS, &text("twelve")).unwrap_err();
        assert!(matches!(err, ParseError::MalformedFile(_)));

        let err = convert(&spec(FieldKind::Decimal), VR::DS, &text("1e999")).unwrap_err();
        assert!(matches!(err, ParseError::MalformedFile(_)));
    }

    #[test]
    fn test_incompatible_vr_is_unsupported() {
        let bytes = dicom_value!(U8, [0, 2]);
        let err = convert(&spec(FieldKind::Integer), VR::OB, &bytes).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedEncoding(_)));

        let err = convert(&spec(FieldKind::Date), VR::LO, &text("yesterday")).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedEncoding(_)));
    }

    #[test]
    fn test_dates_and_times() {
        assert_eq!(format_date("20240131"), "2024-01-31");
        assert_eq!(format_date("2024.01.31"), "2024-01-31");
        assert_eq!(format_date("2024"), "2024");
        assert_eq!(format_time("142530.123"), "14:25:30.123");
        assert_eq!(format_time("1425"), "14:25:00");
        assert_eq!(format_time("14"), "14:00:00");
        assert_eq!(format_time("99"), "99");
    }
}
