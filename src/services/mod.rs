pub mod auth;
pub mod cart;
pub mod checkout;
pub mod confirmation;

pub use auth::AuthSession;
pub use cart::{AddonChange, CartLine, CartStore};
pub use checkout::{CheckoutForm, CheckoutService, DineInIntent, FieldErrors, PendingOrderSlot};
pub use confirmation::{ConfirmationService, PaymentCallback, PaymentOutcome, Resolution};
