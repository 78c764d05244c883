//! Drivers for the external converter and clock chips, kept behind the
//! narrow `embedded-hal` bus traits so the tasks never touch registers
//! directly.
pub mod mcp3008;
pub mod mcp4812;
pub mod mcp7940n;
