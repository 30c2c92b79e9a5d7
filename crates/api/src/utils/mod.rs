//! Cross-cutting helpers for the application root

pub mod logging;
