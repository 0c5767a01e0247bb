use validator::ValidationError;

/// Reduce a phone number to its canonical wire form: digits only, no
/// leading zeros, country code included. The provider addresses contacts
/// this way in both directions.
pub fn canonicalize(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.trim_start_matches('0').to_string()
}

pub fn is_valid(raw: &str) -> bool {
    let canonical = canonicalize(raw);
    (10..=15).contains(&canonical.len())
}

pub fn validate_number(raw: &str) -> Result<(), ValidationError> {
    if is_valid(raw) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_phone_number"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_formatting_and_leading_zeros() {
        assert_eq!(canonicalize("+62 811-1122-2333"), "628111222333");
        assert_eq!(canonicalize("0062811222333"), "62811222333");
    }

    #[test]
    fn length_bounds() {
        assert!(is_valid("+6281111222333"));
        assert!(!is_valid("12345"));
        assert!(!is_valid("1234567890123456"));
    }
}
