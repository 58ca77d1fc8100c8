use rust_decimal::Decimal;

/// Parse a free-text BGL amount such as `10bgl`, `10,5 BGL` or `3.25`.
///
/// Whitespace is stripped and matching is case-insensitive. The unit suffix
/// (`bg` or `bgl`) is optional. Negative amounts and anything else that is not
/// a plain decimal number are rejected with `None` - malformed input is an
/// expected case, reported back to the caller as a validation error.
pub fn parse_amount(input: &str) -> Option<Decimal> {
    let text: String = input.to_lowercase().split_whitespace().collect();
    let body = text
        .strip_suffix("bgl")
        .or_else(|| text.strip_suffix("bg"))
        .unwrap_or(&text);
    parse_decimal(body)
}

/// Parse a free-text euro price such as `25€`, `-25€` or `25,50`.
///
/// An optional leading `+`/`-` is honored and the `€` suffix is optional; any
/// other trailing marker rejects the input. The returned sign is informational
/// only: callers re-normalize it from the transaction direction, so a typo'd
/// sign can never flip a bought entry into a sold one.
pub fn parse_price(input: &str) -> Option<Decimal> {
    let text: String = input.split_whitespace().collect();
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(&text)),
    };
    let body = unsigned.strip_suffix('€').unwrap_or(unsigned);
    parse_decimal(body).map(|value| if negative { -value } else { value })
}

/// Unsigned decimal with a comma or dot fractional separator.
fn parse_decimal(text: &str) -> Option<Decimal> {
    let normalized = text.replace(',', ".");
    let bytes = normalized.as_bytes();
    let mut seen_separator = false;
    for (i, byte) in bytes.iter().enumerate() {
        match byte {
            b'0'..=b'9' => {}
            // Separator needs digits on both sides, and only one is allowed
            b'.' if !seen_separator && i > 0 && i + 1 < bytes.len() => seen_separator = true,
            _ => return None,
        }
    }
    if bytes.is_empty() {
        return None;
    }
    normalized.parse().ok()
}
