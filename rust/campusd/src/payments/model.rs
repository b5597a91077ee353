use serde::{Deserialize, Serialize};

/// Exact decimal amount held in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    pub const MIN: Amount = Amount(1);
    pub const MAX: Amount = Amount(99_999_999);

    #[cfg(test)]
    pub fn from_cents(cents: i64) -> Self {
        Amount(cents)
    }

    #[cfg(test)]
    pub fn cents(self) -> i64 {
        self.0
    }

    /// Accepts `12`, `12.5`, `12.50`, `-3`; rejects more than two fractional
    /// digits and anything that is not plain decimal notation.
    pub fn parse(raw: &str) -> Result<Amount, String> {
        let t = raw.trim();
        let (negative, digits) = match t.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, t.strip_prefix('+').unwrap_or(t)),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(format!("{:?} is not a number", raw));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(format!("{:?} is not a number", raw));
        }
        if frac.len() > 2 {
            return Err("at most two decimal places are allowed".to_string());
        }
        if whole.len() > 12 {
            return Err("amount is too large".to_string());
        }
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| format!("{:?} is not a number", raw))?
        };
        let frac_cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().unwrap_or(0) * 10,
            _ => frac.parse::<i64>().unwrap_or(0),
        };
        let cents = whole * 100 + frac_cents;
        Ok(Amount(if negative { -cents } else { cents }))
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Amount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Servers send the amount either as a JSON number or a string.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }
        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Number(n) => n.to_string(),
        };
        Amount::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    BankTransfer,
    OnlinePayment,
    CashDeposit,
    /// Listed payments created through channels this client cannot submit.
    #[serde(other)]
    Other,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::OnlinePayment => "ONLINE_PAYMENT",
            PaymentMethod::CashDeposit => "CASH_DEPOSIT",
            PaymentMethod::Other => "OTHER",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BANK_TRANSFER" => Ok(PaymentMethod::BankTransfer),
            "ONLINE_PAYMENT" => Ok(PaymentMethod::OnlinePayment),
            "CASH_DEPOSIT" => Ok(PaymentMethod::CashDeposit),
            _ => Err(format!(
                "{:?} is not one of BANK_TRANSFER, ONLINE_PAYMENT, CASH_DEPOSIT",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Verified,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Verified => "VERIFIED",
            PaymentStatus::Rejected => "REJECTED",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "VERIFIED" => Ok(PaymentStatus::Verified),
            "REJECTED" => Ok(PaymentStatus::Rejected),
            _ => Err(format!("{:?} is not a payment status", s)),
        }
    }
}

/// A payment as the server reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    #[serde(default, alias = "userId")]
    pub owner_id: Option<String>,
    #[serde(rename = "paymentAmount")]
    pub amount: Amount,
    #[serde(rename = "paymentMethod")]
    pub method: PaymentMethod,
    #[serde(rename = "paymentReference", default)]
    pub reference: Option<String>,
    #[serde(rename = "paymentDate")]
    pub date: String,
    #[serde(rename = "paymentMonth")]
    pub month: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, alias = "uploadedFile")]
    pub payment_slip_url: Option<String>,
    #[serde(default)]
    pub payment_slip_filename: Option<String>,
    pub status: PaymentStatus,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub verified_by: Option<String>,
    #[serde(default)]
    pub verified_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body of `GET /payment/my-payments`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPage {
    #[serde(alias = "payments")]
    pub data: Vec<Payment>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPaymentData {
    pub payment_id: String,
    pub status: PaymentStatus,
    #[serde(default)]
    pub uploaded_file: Option<String>,
}

/// Body of `POST /payment`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPayment {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: CreatedPaymentData,
}

/// Fields as the host supplies them, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDraft {
    pub amount: String,
    pub method: String,
    pub date: String,
    pub month: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub verified: usize,
    pub rejected: usize,
    pub total: usize,
}

impl StatusCounts {
    pub fn tally<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> Self {
        let mut counts = StatusCounts::default();
        for p in payments {
            counts.total += 1;
            match p.status {
                PaymentStatus::Pending => counts.pending += 1,
                PaymentStatus::Verified => counts.verified += 1,
                PaymentStatus::Rejected => counts.rejected += 1,
            }
        }
        counts
    }
}
