use thiserror::Error;

/// Number of hex digits in a 48-bit MAC address
const MAC_HEX_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacError {
    #[error("Invalid MAC Address format. Expected 12 hex characters.")]
    InvalidFormat,
}

/// Drop every non-hex character and uppercase the rest.
///
/// No length check: accounting records can carry truncated or odd station ids
/// and the caller decides what to do with them.
pub fn strip_to_hex(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Canonicalize any MAC spelling (`aa:bb:..`, `aabb.ccdd.eeff`, `AABBCCDDEEFF`)
/// into `AA-BB-CC-DD-EE-FF`.
pub fn normalize(input: &str) -> Result<String, MacError> {
    let hex = strip_to_hex(input);
    if hex.len() != MAC_HEX_LEN {
        return Err(MacError::InvalidFormat);
    }
    Ok(hyphenate(&hex))
}

/// Same as [`normalize`] but for an already stripped digit string.
pub fn from_hex(hex: &str) -> Option<String> {
    if hex.len() == MAC_HEX_LEN && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hyphenate(&hex.to_ascii_uppercase()))
    } else {
        None
    }
}

fn hyphenate(hex: &str) -> String {
    let mut out = String::with_capacity(17);
    for (i, c) in hex.chars().enumerate() {
        if i > 0 && i % 2 == 0 {
            out.push('-');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_styles_converge() {
        for input in [
            "aabbcc:dd:ee:ff",
            "AA-BB-CC-DD-EE-FF",
            "aabbccddeeff",
            "aa:bb:cc:dd:ee:ff",
            "aabb.ccdd.eeff",
            " Aa-bB cc_DD:ee.FF ",
        ] {
            assert_eq!(normalize(input).unwrap(), "AA-BB-CC-DD-EE-FF", "input {input:?}");
        }
    }

    #[test]
    fn wrong_digit_count_is_rejected() {
        assert_eq!(normalize(""), Err(MacError::InvalidFormat));
        assert_eq!(normalize("AA-BB-CC-DD-EE"), Err(MacError::InvalidFormat));
        assert_eq!(normalize("AA-BB-CC-DD-EE-FF-00"), Err(MacError::InvalidFormat));
        // 'G' is not hex, so only 11 digits survive
        assert_eq!(normalize("GA-BB-CC-DD-EE-FF"), Err(MacError::InvalidFormat));
    }

    #[test]
    fn strip_keeps_short_prefixes() {
        assert_eq!(strip_to_hex("ab-cd"), "ABCD");
        assert_eq!(strip_to_hex("zz"), "");
    }

    #[test]
    fn from_hex_requires_full_length() {
        assert_eq!(from_hex("001122AABBCC").as_deref(), Some("00-11-22-AA-BB-CC"));
        assert_eq!(from_hex("001122"), None);
    }
}
