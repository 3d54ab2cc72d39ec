mod brand_auth;

pub use brand_auth::*;
