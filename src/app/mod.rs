//! Application-layer boundaries: ports the harvest pipeline depends on.

pub mod ports;
