//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//!
//! | Module  | Commands handled |
//! |---------|------------------|
//! | `serve` | `Serve`          |
//! | `check` | `Check`          |

pub mod check;
pub mod serve;

pub use check::cmd_check;
pub use serve::cmd_serve;
