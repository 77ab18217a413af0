/// Turns sequence values into prefixed identifiers such as `PID7`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdFormat {
    prefix: String,
}

impl IdFormat {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn format(&self, value: u64) -> String {
        format!("{}{}", self.prefix, value)
    }

    /// Recovers the value from an identifier produced by `format`.
    /// Returns None for anything `format` could not have produced
    /// (wrong prefix, sign, leading zeros, non-digits).
    pub fn parse(&self, id: &str) -> Option<u64> {
        let digits = id.strip_prefix(self.prefix.as_str())?;
        if digits.is_empty()
            || !digits.bytes().all(|b| b.is_ascii_digit())
            || (digits.len() > 1 && digits.starts_with('0'))
        {
            return None;
        }
        digits.parse().ok()
    }
}
