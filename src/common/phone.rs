// src/common/phone.rs

/// Número mínimo de dígitos para um telefone ser aceito.
pub const MIN_PHONE_DIGITS: usize = 10;

/// Mantém apenas dígitos e um `+` inicial.
/// " 0300-1234567 " -> "03001234567", "+92 300 1234567" -> "+923001234567"
pub fn normalize_phone(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut normalized = String::with_capacity(trimmed.len());

    if trimmed.starts_with('+') {
        normalized.push('+');
    }
    normalized.extend(trimmed.chars().filter(|c| c.is_ascii_digit()));

    normalized
}

pub fn digit_count(phone: &str) -> usize {
    phone.chars().filter(|c| c.is_ascii_digit()).count()
}
