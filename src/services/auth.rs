use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{info, instrument, warn};

use crate::client::ApiClient;
use crate::errors::ClientError;
use crate::models::User;

/// Customer session on top of [`ApiClient`]'s token handling.
///
/// Holds the profile of the signed-in user and implements the tolerant
/// restore policy: a transient failure right after a payment redirect must
/// not log the user out.
pub struct AuthSession {
    client: Arc<ApiClient>,
    user: Option<User>,
}

impl AuthSession {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client, user: None }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Restores the session from a persisted token.
    ///
    /// Retries once after a short delay; only an explicit 401 ends the
    /// session (the client has already dropped the token at that point).
    /// Any other failure keeps the token for a later retry.
    #[instrument(skip(self))]
    pub async fn restore(&mut self) {
        if !self.client.is_authenticated() {
            return;
        }
        match self.client.current_user().await {
            Ok(user) => self.user = Some(user),
            Err(err) if err.is_unauthorized() => {
                info!("Stored token rejected, session cleared");
                self.user = None;
            }
            Err(err) => {
                warn!("Session restore failed, retrying once: {}", err);
                sleep(Duration::from_millis(
                    self.client.config().session_retry_delay_ms,
                ))
                .await;
                match self.client.current_user().await {
                    Ok(user) => self.user = Some(user),
                    Err(err) if err.is_unauthorized() => {
                        info!("Stored token rejected on retry, session cleared");
                        self.user = None;
                    }
                    Err(err) => {
                        warn!("Session restore still failing, keeping token: {}", err);
                    }
                }
            }
        }
    }

    pub async fn request_otp(&self, phone: &str) -> Result<(), ClientError> {
        self.client.request_otp(phone).await
    }

    /// Completes OTP verification and signs the user in.
    #[instrument(skip(self, otp))]
    pub async fn login(
        &mut self,
        phone: &str,
        otp: &str,
        name: Option<&str>,
    ) -> Result<(), ClientError> {
        let user = self.client.verify_otp(phone, otp, name).await?;
        info!("Signed in as {}", user.id);
        self.user = Some(user);
        Ok(())
    }

    pub async fn logout(&mut self) {
        self.client.set_token(None).await;
        self.user = None;
    }

    /// Updates the display name on the server and locally.
    pub async fn update_name(&mut self, name: &str) -> Result<(), ClientError> {
        if self.user.is_none() {
            return Ok(());
        }
        let user = self.client.update_name(name).await?;
        self.user = Some(user);
        Ok(())
    }

    /// Best-effort profile refresh; failures are logged and ignored.
    pub async fn refresh(&mut self) {
        if self.user.is_none() {
            return;
        }
        match self.client.current_user().await {
            Ok(user) => self.user = Some(user),
            Err(err) => warn!("Failed to refresh user profile: {}", err),
        }
    }

    /// Saves an address to the profile unless it is already on file.
    pub async fn add_address(&mut self, formatted: &str) -> Result<(), ClientError> {
        let Some(user) = &self.user else {
            return Ok(());
        };
        if user.addresses.iter().any(|a| a == formatted) {
            return Ok(());
        }
        self.client.add_address(formatted).await?;
        self.refresh().await;
        Ok(())
    }

    /// Saves a titled address, merging the detail line into the formatted
    /// string the backend persists. Returns the formatted address so the
    /// caller can select it.
    pub async fn add_address_detailed(
        &mut self,
        address: &str,
        details: Option<&str>,
    ) -> Result<String, ClientError> {
        let formatted = match details.filter(|d| !d.trim().is_empty()) {
            Some(details) => format!("{} - {}", address, details),
            None => address.to_string(),
        };
        if self.user.is_some() {
            self.client.add_address(&formatted).await?;
            self.refresh().await;
        }
        Ok(formatted)
    }
}

/// Normalizes a contact phone for validation and submission: Persian and
/// Arabic-Indic digits map to ASCII, and a bare 10-digit mobile number
/// starting with `9` gains the leading `0`.
pub fn normalize_phone(raw: &str) -> String {
    const PERSIAN: [char; 10] = ['۰', '۱', '۲', '۳', '۴', '۵', '۶', '۷', '۸', '۹'];
    const ARABIC: [char; 10] = ['٠', '١', '٢', '٣', '٤', '٥', '٦', '٧', '٨', '٩'];

    let converted: String = raw
        .chars()
        .map(|c| {
            if let Some(i) = PERSIAN.iter().position(|&p| p == c) {
                char::from(b'0' + i as u8)
            } else if let Some(i) = ARABIC.iter().position(|&a| a == c) {
                char::from(b'0' + i as u8)
            } else {
                c
            }
        })
        .collect();

    let digits: String = converted.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 10 && digits.starts_with('9') {
        format!("0{}", digits)
    } else {
        converted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persian_digits_are_mapped() {
        assert_eq!(normalize_phone("۰۹۱۲۳۴۵۶۷۸۹"), "09123456789");
        assert_eq!(normalize_phone("٠٩١٢٣٤٥٦٧٨٩"), "09123456789");
    }

    #[test]
    fn ten_digit_mobile_gains_leading_zero() {
        assert_eq!(normalize_phone("9123456789"), "09123456789");
        assert_eq!(normalize_phone("۹۱۲۳۴۵۶۷۸۹"), "09123456789");
    }

    #[test]
    fn already_normalized_numbers_pass_through() {
        assert_eq!(normalize_phone("09123456789"), "09123456789");
        // landline-like input is left alone rather than guessed at
        assert_eq!(normalize_phone("02112345678"), "02112345678");
    }
}
