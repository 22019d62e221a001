//! Value Objects for the storefront

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Largest amount a `NUMERIC(12, 2)` column holds, 9 999 999 999,99.
pub const MAX_MONEY: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Largest quantity accepted on a single order or cart line.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

static PACK_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:[.,]\d+)?\s*(?:KG|G|ML|L)\b").expect("valid size pattern"));

static FLAVOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:DOCE\s+DE\s+LEITE|CHOCOLATE\s+BRANCO|CHOCOLATE|CAPPUCCINO|BUTTER\s+COOKIES|COOKIES|BANOFFEE|BAUNILHA|MORANGO|COCO|BANANA|NEUTRO|SEM\s+SABOR|SABOR|MILKSHAKE)\b",
    )
    .expect("valid flavor pattern")
});

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Z0-9]+").expect("valid separator pattern"));

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        other => other,
    }
}

fn join_words(text: &str) -> String {
    NON_ALNUM.replace_all(text, " ").split_whitespace().collect::<Vec<_>>().join("_")
}

/// Groups flavor and size variants of one product under a shared code:
/// "Whey Protein 900g Chocolate" becomes `WHEY_PROTEIN`.
///
/// When stripping flavors leaves fewer than four characters the flavor
/// words are kept, so "Coco 500ml" groups as `COCO`.
pub fn group_code(name: &str) -> Option<String> {
    let folded = name
        .chars()
        .filter(|c| !('\u{0300}'..='\u{036f}').contains(c))
        .map(fold_accent)
        .collect::<String>()
        .to_uppercase();
    let sized = PACK_SIZE.replace_all(&folded, " ");
    let mut code = join_words(&FLAVOR.replace_all(&sized, " "));
    if code.len() < 4 {
        code = join_words(&sized);
    }
    (!code.is_empty()).then_some(code)
}

/// Coupon code value object. Codes are stored and compared uppercased.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CouponCode(String);

impl CouponCode {
    pub fn new(value: impl Into<String>) -> Result<Self, CouponCodeError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(CouponCodeError::Empty); }
        if value.len() > 50 { return Err(CouponCodeError::TooLong); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, Error)]
pub enum CouponCodeError {
    #[error("Código do cupom é obrigatório")]
    Empty,
    #[error("Código do cupom muito longo")]
    TooLong,
}

/// Brazilian tax ID (CPF), digits only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cpf(String);

impl Cpf {
    /// Strips every non-digit; `None` when nothing is left.
    pub fn normalize(raw: &str) -> Option<Self> {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() { None } else { Some(Self(digits)) }
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Cpf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Externally visible order reference, `TIT-<unix millis>-<3 digit suffix>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const PREFIX: &'static str = "TIT";

    pub fn generate() -> Self {
        Self::from_parts(Utc::now(), rand::random::<u16>() % 1000)
    }

    pub fn from_parts(at: DateTime<Utc>, suffix: u16) -> Self {
        Self(format!("{}-{}-{:03}", Self::PREFIX, at.timestamp_millis(), suffix % 1000))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Rounds a monetary amount to cents.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Formats an amount as Brazilian reais, e.g. `R$ 150,00`.
pub fn format_brl(amount: Decimal) -> String {
    let mut rounded = round_money(amount);
    rounded.rescale(2);
    format!("R$ {}", rounded.to_string().replace('.', ","))
}
