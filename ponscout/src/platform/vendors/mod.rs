//! Built-in vendor dialects.

pub mod hioso_epon;
pub mod zte_gpon;
