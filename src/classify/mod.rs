//! Document classification: identifier, language and country.

pub mod country;
pub mod identifier;
pub mod language;
pub mod pipeline;

pub use country::{unique_countries, CountryMatcher};
pub use identifier::Identifier;
pub use language::{Detection, LanguageDetector, LanguageTag, WhatlangDetector};
pub use pipeline::{Classification, Classifier};
