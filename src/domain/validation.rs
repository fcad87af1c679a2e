//! Input validation performed before any store access.
//!
//! Both validators are pure. They report only the first violation found.

use serde_json::Value;

use crate::domain::user::Address;

/// Default page when `page` is absent or not numeric.
pub const DEFAULT_PAGE: i64 = 1;
/// Default page size when `limit` is absent or not numeric.
pub const DEFAULT_LIMIT: i64 = 10;

const ADDRESS_FIELDS: [&str; 4] = ["street", "city", "country", "postal_code"];

/// A rejected request input. The message is sent to the client as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("The 'addresses' field must be an array.")]
    AddressesNotArray,

    #[error("Each address must be an object with valid fields (street, city, country, postal_code).")]
    InvalidAddress,

    #[error("Page and limit must be positive integers")]
    InvalidPagination,

    #[error("Name and email are required.")]
    MissingNameOrEmail,

    #[error("You must provide a city as a query parameter")]
    MissingCity,

    #[error("The '{0}' field must not be empty.")]
    EmptyField(&'static str),
}

/// Check that `addresses` is an array of complete address objects.
pub fn validate_addresses(addresses: &Value) -> Result<(), ValidationError> {
    let items = addresses.as_array().ok_or(ValidationError::AddressesNotArray)?;

    for item in items {
        let complete = item.as_object().is_some_and(|fields| {
            ADDRESS_FIELDS.iter().all(|key| {
                fields
                    .get(*key)
                    .and_then(Value::as_str)
                    .is_some_and(|s| !s.is_empty())
            })
        });
        if !complete {
            return Err(ValidationError::InvalidAddress);
        }
    }

    Ok(())
}

/// Validate and convert an `addresses` value into typed addresses.
pub fn parse_addresses(addresses: &Value) -> Result<Vec<Address>, ValidationError> {
    validate_addresses(addresses)?;
    // Every element is an object with the four string fields at this point.
    serde_json::from_value(addresses.clone()).map_err(|_| ValidationError::InvalidAddress)
}

/// Normalized page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Pagination {
    /// Number of records to skip before the requested page.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// `ceil(total / limit)`.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

/// Interpret raw `page` / `limit` query values.
///
/// Absent or non-numeric values fall back to the defaults. Only an explicit
/// zero or negative number is rejected.
pub fn validate_pagination_params(
    page: Option<&str>,
    limit: Option<&str>,
) -> Result<Pagination, ValidationError> {
    let page = page.and_then(parse_int_prefix).unwrap_or(DEFAULT_PAGE);
    let limit = limit.and_then(parse_int_prefix).unwrap_or(DEFAULT_LIMIT);

    if page <= 0 || limit <= 0 {
        return Err(ValidationError::InvalidPagination);
    }

    Ok(Pagination {
        page: page.unsigned_abs(),
        limit: limit.unsigned_abs(),
    })
}

/// Parse the leading integer of `raw`: optional whitespace, optional sign,
/// an optional `0x` prefix selecting hex, then digits. Trailing characters
/// are ignored (`"2.5"` is 2) and out-of-range values saturate.
fn parse_int_prefix(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, rest) = match rest.get(..2) {
        Some("0x" | "0X") => (16, &rest[2..]),
        _ => (10, rest),
    };

    let digits_len = rest
        .bytes()
        .take_while(|b| char::from(*b).is_digit(radix))
        .count();
    if digits_len == 0 {
        return None;
    }

    // Only overflow can fail here; the digits are already checked.
    let magnitude = u64::from_str_radix(&rest[..digits_len], radix).unwrap_or(u64::MAX);
    Some(if negative {
        0i64.checked_sub_unsigned(magnitude).unwrap_or(i64::MIN)
    } else {
        i64::try_from(magnitude).unwrap_or(i64::MAX)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn address() -> Value {
        json!({
            "street": "Jr. de la Unión 500",
            "city": "Lima",
            "country": "PE",
            "postal_code": "15001"
        })
    }

    #[test]
    fn test_complete_addresses_pass() {
        assert_eq!(validate_addresses(&json!([])), Ok(()));
        assert_eq!(validate_addresses(&json!([address(), address()])), Ok(()));
    }

    #[rstest]
    #[case(json!(null))]
    #[case(json!("Lima"))]
    #[case(json!(42))]
    #[case(address())]
    fn test_non_array_is_rejected(#[case] input: Value) {
        let err = validate_addresses(&input).unwrap_err();
        assert_eq!(err, ValidationError::AddressesNotArray);
        assert!(err.to_string().contains("array"));
    }

    #[rstest]
    #[case("street")]
    #[case("city")]
    #[case("country")]
    #[case("postal_code")]
    fn test_missing_or_empty_field_is_rejected(#[case] field: &str) {
        let mut missing = address();
        missing.as_object_mut().unwrap().remove(field);
        assert_eq!(
            validate_addresses(&json!([address(), missing])),
            Err(ValidationError::InvalidAddress)
        );

        let mut empty = address();
        empty[field] = json!("");
        assert_eq!(validate_addresses(&json!([empty])), Err(ValidationError::InvalidAddress));

        let mut wrong_type = address();
        wrong_type[field] = json!(15001);
        assert_eq!(
            validate_addresses(&json!([wrong_type])),
            Err(ValidationError::InvalidAddress)
        );
    }

    #[test]
    fn test_non_object_element_is_rejected() {
        assert_eq!(
            validate_addresses(&json!([address(), "Lima"])),
            Err(ValidationError::InvalidAddress)
        );
    }

    #[test]
    fn test_parse_addresses_drops_unknown_fields() {
        let mut extra = address();
        extra["floor"] = json!(3);
        let parsed = parse_addresses(&json!([extra])).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].city, "Lima");
    }

    #[rstest]
    #[case(Some("1"), Some("10"), 1, 10)]
    #[case(Some("2"), Some("5"), 2, 5)]
    #[case(Some("37"), Some("100"), 37, 100)]
    #[case(None, None, 1, 10)]
    #[case(Some("abc"), Some("abc"), 1, 10)]
    #[case(Some(""), Some("x5"), 1, 10)]
    #[case(Some("3abc"), Some(" 7"), 3, 7)]
    #[case(Some("2.9"), Some("+4"), 2, 4)]
    #[case(Some("0x2"), Some("0XA"), 2, 10)]
    #[case(Some("0x"), Some("0xg"), 1, 10)]
    #[case(Some("99999999999999999999"), None, i64::MAX as u64, 10)]
    fn test_pagination_accepts(
        #[case] page: Option<&str>,
        #[case] limit: Option<&str>,
        #[case] expected_page: u64,
        #[case] expected_limit: u64,
    ) {
        let p = validate_pagination_params(page, limit).unwrap();
        assert_eq!(p, Pagination { page: expected_page, limit: expected_limit });
    }

    #[rstest]
    #[case(Some("0"), None)]
    #[case(None, Some("0"))]
    #[case(None, Some("-5"))]
    #[case(Some("-1"), Some("10"))]
    #[case(Some("-0"), None)]
    #[case(Some("-99999999999999999999"), None)]
    #[case(None, Some("-0x5"))]
    fn test_pagination_rejects_non_positive(#[case] page: Option<&str>, #[case] limit: Option<&str>) {
        assert_eq!(
            validate_pagination_params(page, limit),
            Err(ValidationError::InvalidPagination)
        );
    }

    #[test]
    fn test_skip_and_total_pages() {
        let p = Pagination { page: 2, limit: 5 };
        assert_eq!(p.skip(), 5);
        assert_eq!(p.total_pages(12), 3);
        assert_eq!(p.total_pages(10), 2);
        assert_eq!(p.total_pages(0), 0);
    }
}
