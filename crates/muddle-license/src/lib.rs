//! License bookkeeping (C11, §4.8): per-checkout licenses, propagation
//! exceptions, and GPL-propagation / mixed-license clash detection.

mod license;
mod registry;

pub use license::{License, LicenseCategory, standard_licenses};
pub use registry::{LicenseClash, LicenseRegistry};
