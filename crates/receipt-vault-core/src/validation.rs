//! Payment event validation: structural checks before issuance.

use crate::error::ValidationError;
use crate::event::PaymentEvent;

/// Validate a normalized event.
///
/// This performs:
/// - Event id presence
/// - Currency shape (three ASCII letters)
/// - Line item sanity (non-empty description, non-zero quantity)
/// - Overflow check on the line item subtotal
/// - Recipient presence under `recipient_key`
pub fn validate_event(event: &PaymentEvent, recipient_key: &str) -> Result<(), ValidationError> {
    if event.event_id.is_empty() {
        return Err(ValidationError::EmptyEventId);
    }

    if event.currency.len() != 3 || !event.currency.bytes().all(|b| b.is_ascii_lowercase()) {
        return Err(ValidationError::InvalidCurrency(event.currency.clone()));
    }

    for (index, item) in event.line_items.iter().enumerate() {
        if item.description.trim().is_empty() {
            return Err(ValidationError::EmptyDescription { index });
        }
        if item.quantity == 0 {
            return Err(ValidationError::ZeroQuantity { index });
        }
    }

    if event.subtotal().is_none() {
        return Err(ValidationError::AmountOverflow);
    }

    if event.recipient(recipient_key).is_none() {
        return Err(ValidationError::MissingRecipient(recipient_key.to_owned()));
    }

    Ok(())
}
