//! Input validation for API requests.
//!
//! Validation runs at the boundary, before any state is touched. Each
//! function returns `Result<(), String>` so handlers can wrap the message
//! into the response envelope.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Basic local@domain shape check
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();

    /// At least 6 characters, at least one letter and one digit
    static ref PASSWORD_REGEX: Regex =
        Regex::new(r"^[A-Za-z\d]{6,}$").unwrap();

    /// Indonesian mobile numbers: (+62|62|0)8[1-9] followed by 6-9 digits
    static ref PHONE_REGEX: Regex =
        Regex::new(r"^(\+62|62|0)8[1-9][0-9]{6,9}$").unwrap();
}

/// Validate a display name (registration and profile updates)
pub fn validate_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name is required".to_string());
    }
    if trimmed.len() < 3 || trimmed.len() > 50 {
        return Err("Name must be between 3 and 50 characters".to_string());
    }
    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.trim().is_empty() {
        return Err("Email is required".to_string());
    }
    if !EMAIL_REGEX.is_match(email.trim()) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), String> {
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !PASSWORD_REGEX.is_match(password) || !has_letter || !has_digit {
        return Err(
            "Password must be at least 6 characters and contain both letters and numbers"
                .to_string(),
        );
    }
    Ok(())
}

/// Validate an Indonesian mobile number
pub fn validate_phone(phone: &str) -> Result<(), String> {
    if !PHONE_REGEX.is_match(phone) {
        return Err(
            "Invalid phone number format. Use Indonesian format (e.g., 081234567890)".to_string(),
        );
    }
    Ok(())
}

/// Validate a user role value
pub fn validate_role(role: &str) -> Result<(), String> {
    match role {
        "user" | "admin" => Ok(()),
        _ => Err("Role must be either 'user' or 'admin'".to_string()),
    }
}

/// Validate a price supplied as a form field
pub fn validate_price(price: i64) -> Result<(), String> {
    if price <= 0 {
        return Err("Price must be a positive number".to_string());
    }
    Ok(())
}

/// Validate a stock level supplied as a form field
pub fn validate_stock(stock: i64) -> Result<(), String> {
    if stock < 0 {
        return Err("Stock must be a non-negative number".to_string());
    }
    Ok(())
}
