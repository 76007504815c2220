//! # Lunacast workspace
//!
//! Facade over the workspace crates.
//!
//! - [`lunacast`]: ingestion, caching and SARIMAX forecasting of outdoor conditions
//! - [`lunar_math`]: moon phase, great-circle and optimisation math
//!
//! ## Example
//!
//! ```
//! use lunacast_workspace::lunar_math::{label_for_date, MoonPhase};
//! use chrono::NaiveDate;
//!
//! let date = NaiveDate::from_ymd_opt(2000, 1, 6).unwrap();
//! assert_eq!(label_for_date(date), MoonPhase::NewMoon);
//! ```

pub use lunacast;
pub use lunar_math;
