//! Domain types and models
//!
//! Catalog and document models mirror the JSON the remote API returns.
//! Fields this client does not interpret are kept in `extra` so callers can
//! round-trip them unchanged.

pub mod catalog;
pub mod documents;
pub mod page;
pub mod session;
pub mod user;

pub use catalog::{Company, NewCompany, NewMarking, NewProduct, Product, ProductMarking, Role};
pub use documents::{Income, Outcome};
pub use page::{ListPayload, Page};
pub use session::{Identity, Session};
pub use user::{NewUser, Registration, UserAccount};
