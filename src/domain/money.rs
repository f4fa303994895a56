use {
    super::error::PipelineError,
    rust_decimal::{Decimal, prelude::ToPrimitive},
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Smallest order total the card processor will accept, in VND.
/// Stripe's floor is ~0.50 USD; 15,000 VND keeps a margin over exchange drift.
pub const MINIMUM_CHARGE_VND: i64 = 15_000;

/// Amount in the currency's minor unit. For zero-decimal currencies this is
/// the whole-unit value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinorUnits(i64);

impl MinorUnits {
    pub const ZERO: MinorUnits = MinorUnits(0);

    pub fn new(units: i64) -> Result<Self, PipelineError> {
        if units < 0 {
            return Err(PipelineError::Validation(format!(
                "amount cannot be negative, got: {units}"
            )));
        }
        Ok(Self(units))
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Whole-unit value. Exact because only zero-decimal currencies are supported.
    pub fn to_major(&self) -> Decimal {
        Decimal::from(self.0)
    }
}

impl fmt::Display for MinorUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        f.write_str(&grouped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Vnd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vnd => "vnd",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Vnd => "VND",
        }
    }

    pub fn minimum_charge(&self) -> MinorUnits {
        match self {
            Self::Vnd => MinorUnits(MINIMUM_CHARGE_VND),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Currency {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_lowercase().as_str() {
            "vnd" => Ok(Self::Vnd),
            other => Err(PipelineError::Validation(format!(
                "unknown currency: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: MinorUnits,
    currency: Currency,
}

impl Money {
    pub fn new(amount: MinorUnits, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn amount(&self) -> MinorUnits {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency.code())
    }
}

/// Convert an order total into the processor's minor-unit amount.
///
/// The fractional part is truncated, never rounded. Totals below the
/// currency's minimum charge are rejected before any provider is contacted.
pub fn normalize_total(total: Decimal, currency: Currency) -> Result<Money, PipelineError> {
    let whole = total.trunc();
    if whole.is_sign_negative() && !whole.is_zero() {
        return Err(PipelineError::Validation(format!(
            "order total cannot be negative, got: {total}"
        )));
    }

    let units = whole
        .to_i64()
        .ok_or_else(|| PipelineError::Validation("amount exceeds storage capacity".into()))?;
    let amount = MinorUnits::new(units)?;

    let minimum = currency.minimum_charge();
    if amount < minimum {
        return Err(PipelineError::AmountTooLow {
            amount: amount.value(),
            minimum: minimum.value(),
        });
    }

    Ok(Money::new(amount, currency))
}

#[cfg(test)]
mod tests {
    use {super::*, rust_decimal_macros::dec};

    #[test]
    fn truncates_instead_of_rounding() {
        let money = normalize_total(dec!(15000.99), Currency::Vnd).unwrap();
        assert_eq!(money.amount().value(), 15_000);
    }

    #[test]
    fn rejects_below_minimum() {
        let err = normalize_total(dec!(10000), Currency::Vnd).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::AmountTooLow {
                amount: 10_000,
                minimum: 15_000
            }
        ));
    }

    #[test]
    fn minimum_is_inclusive() {
        assert!(normalize_total(dec!(15000), Currency::Vnd).is_ok());
        assert!(matches!(
            normalize_total(dec!(14999.99), Currency::Vnd),
            Err(PipelineError::AmountTooLow { .. })
        ));
    }

    #[test]
    fn rejects_negative_total() {
        assert!(matches!(
            normalize_total(dec!(-20000), Currency::Vnd),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn display_groups_thousands() {
        let money = Money::new(MinorUnits::new(500_000).unwrap(), Currency::Vnd);
        assert_eq!(money.to_string(), "500,000 VND");
        assert_eq!(MinorUnits::new(999).unwrap().to_string(), "999");
        assert_eq!(MinorUnits::new(1_000).unwrap().to_string(), "1,000");
        assert_eq!(MinorUnits::ZERO.to_string(), "0");
    }

    #[test]
    fn currency_parse_is_case_insensitive() {
        assert_eq!(Currency::try_from("VND").unwrap(), Currency::Vnd);
        assert_eq!(Currency::try_from("vnd").unwrap(), Currency::Vnd);
        assert!(Currency::try_from("usd").is_err());
    }
}
