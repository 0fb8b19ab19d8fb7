//! Low-level readers for the binary and XML structures inside Excel containers.

pub(crate) mod biff8;
pub(crate) mod cfb;
pub(crate) mod string;
pub(crate) mod xml;
pub(crate) mod zip;
