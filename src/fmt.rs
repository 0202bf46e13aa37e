use colored::Colorize;

/// $1,234.56 with a leading minus for negatives.
pub fn money(val: f64) -> String {
    let cents = format!("{:.2}", val.abs());
    let (whole, frac) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if val < 0.0 && cents != "0.00" { "-" } else { "" };
    format!("{sign}${grouped}.{frac}")
}

/// Amount as it reads on a statement: money out in the default color,
/// money in (refunds, deposits) in green.
pub fn statement_amount(val: f64) -> String {
    if val < 0.0 {
        money(val).green().to_string()
    } else {
        money(val)
    }
}

pub fn check(flag: bool) -> &'static str {
    if flag {
        "\u{2713}"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(1234.56), "$1,234.56");
        assert_eq!(money(-500.00), "-$500.00");
        assert_eq!(money(0.0), "$0.00");
        assert_eq!(money(1000000.99), "$1,000,000.99");
        assert_eq!(money(999.999), "$1,000.00");
        assert_eq!(money(-0.001), "$0.00");
    }

    #[test]
    fn test_check() {
        assert_eq!(check(true), "\u{2713}");
        assert_eq!(check(false), "");
    }
}
