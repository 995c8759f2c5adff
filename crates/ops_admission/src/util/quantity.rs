use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::util::errors::StdError;

const BINARY_SUFFIXES: [(&str, u32); 6] = [("Ki", 1), ("Mi", 2), ("Gi", 3), ("Ti", 4), ("Pi", 5), ("Ei", 6)];
const DECIMAL_SUFFIXES: [(&str, i32); 9] = [
    ("n", -9),
    ("u", -6),
    ("m", -3),
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

/// Converts a resource quantity (`10Gi`, `500M`, `1.5e9`, `250m`) to an exact
/// count of milli-units. Values finer than a milli-unit round up.
pub fn to_milli(quantity: &Quantity) -> Result<i128, StdError> {
    let raw = quantity.0.trim();
    let invalid = || StdError::InvalidArgument(format!("invalid quantity {raw:?}"));

    let (number, decimal_exp, binary_exp) = split_suffix(raw).ok_or_else(invalid)?;
    let (negative, digits) = match number.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, number.strip_prefix('+').unwrap_or(number)),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if (whole.is_empty() && fraction.is_empty()) || !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let mantissa: i128 = format!("{whole}{fraction}").parse().map_err(|_| invalid())?;
    let scaled = mantissa
        .checked_mul(1024i128.checked_pow(binary_exp).ok_or_else(invalid)?)
        .ok_or_else(invalid)?;

    let exponent = decimal_exp + 3 - i32::try_from(fraction.len()).map_err(|_| invalid())?;
    let magnitude = if exponent >= 0 {
        scaled
            .checked_mul(10i128.checked_pow(exponent.unsigned_abs()).ok_or_else(invalid)?)
            .ok_or_else(invalid)?
    } else {
        let divisor = 10i128.checked_pow(exponent.unsigned_abs()).ok_or_else(invalid)?;
        // round away from zero for positives, toward zero for negatives: both are a ceiling
        if negative {
            scaled / divisor
        } else {
            (scaled + divisor - 1) / divisor
        }
    };
    Ok(if negative { -magnitude } else { magnitude })
}

// Splits `raw` into its number, power-of-ten exponent and power-of-1024 exponent.
fn split_suffix(raw: &str) -> Option<(&str, i32, u32)> {
    for (suffix, power) in BINARY_SUFFIXES {
        if let Some(number) = raw.strip_suffix(suffix) {
            return Some((number, 0, power));
        }
    }
    for (suffix, exponent) in DECIMAL_SUFFIXES {
        if let Some(number) = raw.strip_suffix(suffix) {
            return Some((number, exponent, 0));
        }
    }
    if let Some((number, exponent)) = raw.split_once(|c: char| c == 'e' || c == 'E') {
        return Some((number, exponent.parse().ok()?, 0));
    }
    Some((raw, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(s: &str) -> Quantity {
        Quantity(s.to_string())
    }

    #[test]
    fn parses_binary_and_decimal_suffixes() {
        assert_eq!(to_milli(&q("1Ki")).unwrap(), 1_024_000);
        assert_eq!(to_milli(&q("10Gi")).unwrap(), 10 * 1024 * 1024 * 1024 * 1000);
        assert_eq!(to_milli(&q("2G")).unwrap(), 2_000_000_000_000);
        assert_eq!(to_milli(&q("1E")).unwrap(), 10i128.pow(21));
        assert_eq!(to_milli(&q("250m")).unwrap(), 250);
        assert_eq!(to_milli(&q("1.5e3")).unwrap(), 1_500_000);
        assert_eq!(to_milli(&q("1.5Gi")).unwrap(), 1536 * 1024 * 1024 * 1000);
        assert_eq!(to_milli(&q("1073741824")).unwrap(), to_milli(&q("1Gi")).unwrap());
    }

    #[test]
    fn sub_milli_values_round_up() {
        assert_eq!(to_milli(&q("1n")).unwrap(), 1);
        assert_eq!(to_milli(&q("1500u")).unwrap(), 2);
        assert_eq!(to_milli(&q("-1500u")).unwrap(), -1);
    }

    #[test]
    fn large_values_stay_exact() {
        let exa = to_milli(&q("1Ei")).unwrap();
        assert_eq!(to_milli(&q("1152921504606846976")).unwrap(), exa);
        assert_eq!(to_milli(&q("1152921504606846977")).unwrap(), exa + 1000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(to_milli(&q("")).is_err());
        assert!(to_milli(&q("ten gigs")).is_err());
        assert!(to_milli(&q("10Xi")).is_err());
        assert!(to_milli(&q("Gi")).is_err());
        assert!(to_milli(&q("1e")).is_err());
        assert!(to_milli(&q("1.2.3")).is_err());
    }
}
