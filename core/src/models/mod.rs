// parfum/src/models/mod.rs

//! Data structures mirrored from the backend.

pub mod cart_item;
pub mod perfume;
pub mod session;

pub use cart_item::{CartItem, NewCartItem};
pub use perfume::Perfume;
pub use session::{AuthUser, Session};
