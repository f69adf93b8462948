//! Number formatting shared by the text report and the table output.

/// Format `value` with thousands separators and exactly `decimals` decimal
/// places.
///
/// # Examples
///
/// ```
/// use billsort_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Nudge by a few ULPs so exact binary midpoints like 1.005 round up.
    let factor = 10_f64.powi(decimals as i32);
    let nudge = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + nudge).round() / factor;

    let fixed = format!("{:.prec$}", rounded, prec = decimals as usize);
    let (int_digits, frac_digits) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::with_capacity(fixed.len() + fixed.len() / 3 + 1);
    // "-0.00" reads oddly, so the sign only survives non-zero output.
    if negative && rounded != 0.0 {
        out.push('-');
    }
    out.push_str(&group_thousands(int_digits));
    if let Some(frac) = frac_digits {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Format a monetary amount as `$` plus two decimals with separators.
///
/// ```
/// use billsort_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.56), "$1,234.56");
/// assert_eq!(format_currency(0.0), "$0.00");
/// assert_eq!(format_currency(-9.99), "$-9.99");
/// ```
pub fn format_currency(amount: f64) -> String {
    format!("${}", format_number(amount, 2))
}

/// `(part / whole) * 100`, rounded to `decimal_places`.
///
/// A zero `whole` yields `0.0`.
///
/// ```
/// use billsort_core::formatting::percentage;
///
/// assert!((percentage(50.0, 200.0, 1) - 25.0).abs() < 1e-9);
/// assert_eq!(percentage(0.0, 0.0, 2), 0.0);
/// ```
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let factor = 10_f64.powi(decimal_places as i32);
    round_half_even((part / whole) * 100.0 * factor) / factor
}

/// Round a cost to whole cents, ties to even.
///
/// ```
/// use billsort_core::formatting::round_cents;
///
/// assert_eq!(round_cents(15.004), 15.0);
/// assert_eq!(round_cents(2.675_1), 2.68);
/// assert_eq!(round_cents(0.125), 0.12);
/// ```
pub fn round_cents(value: f64) -> f64 {
    round_half_even(value * 100.0) / 100.0
}

/// Round to the nearest integer, sending exact halves to the even neighbour.
fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 {
        rounded - rounded % 2.0
    } else {
        rounded
    }
}

/// Insert a comma every three digits, counting from the right.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
