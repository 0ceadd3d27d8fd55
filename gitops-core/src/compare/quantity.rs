use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

const NANO_EXPONENT: i32 = 9;

// Normalizes a Kubernetes quantity string ("500m", "0.5", "1Gi", "1024Mi", "1e3") to an integer
// count of nano-units, so that equivalent spellings compare equal.  Returns None for anything
// unparseable or out of range; callers fall back to string comparison in that case.
pub fn parse_quantity(s: &str) -> Option<i128> {
    let s = s.trim();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let num_end = s.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(s.len());
    let (number, suffix) = s.split_at(num_end);
    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let digits = format!("{int_part}{frac_part}");
    let mut mantissa: i128 = if digits.is_empty() { 0 } else { digits.parse().ok()? };
    let frac_digits = frac_part.len() as i32;

    let (binary_pow, decimal_exp) = match suffix {
        "" => (0, 0),
        "n" => (0, -9),
        "u" => (0, -6),
        "m" => (0, -3),
        "k" => (0, 3),
        "M" => (0, 6),
        "G" => (0, 9),
        "T" => (0, 12),
        "P" => (0, 15),
        "E" => (0, 18),
        "Ki" => (10, 0),
        "Mi" => (20, 0),
        "Gi" => (30, 0),
        "Ti" => (40, 0),
        "Pi" => (50, 0),
        "Ei" => (60, 0),
        exp if exp.starts_with(['e', 'E']) => (0, exp[1..].parse::<i32>().ok()?),
        _ => return None,
    };

    mantissa = mantissa.checked_mul(1i128.checked_shl(binary_pow)?)?;
    let exponent = decimal_exp + NANO_EXPONENT - frac_digits;
    let value = if exponent >= 0 {
        mantissa.checked_mul(10i128.checked_pow(exponent as u32)?)?
    } else {
        mantissa / 10i128.checked_pow((-exponent) as u32)?
    };

    Some(if negative { -value } else { value })
}

pub fn quantity_eq(a: &Quantity, b: &Quantity) -> bool {
    match (parse_quantity(&a.0), parse_quantity(&b.0)) {
        (Some(x), Some(y)) => x == y,
        _ => a.0 == b.0,
    }
}
