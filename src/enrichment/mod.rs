//! Post-classification lookups: treatment guidance and place names.

mod geocode;
mod treatment;

pub use geocode::{HttpReverseGeocoder, ReverseGeocoder};
pub use treatment::{HttpTreatmentAdvisor, TreatmentAdvisor};
