mod activation;
mod audit_log;
mod brand;
mod license;
mod license_key;
mod product;

pub use activation::*;
pub use audit_log::*;
pub use brand::*;
pub use license::*;
pub use license_key::*;
pub use product::*;
