pub mod hitpay;
pub mod omise;
pub mod stripe;

pub use hitpay::{HitPayConfig, HitPayProvider, HitPayQr, QrMethod};
pub use omise::{OmiseCharge, OmiseConfig, OmiseProvider, QrSource};
pub use stripe::{PromptPayQr, StripeConfig, StripeProvider};
