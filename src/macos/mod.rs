//! macOS signing, packaging and notarization
//!
//! # Module Organization
//!
//! - `prompts` - Colored output macros
//! - `validation` - Gatekeeper assessment with `spctl`
//! - `signing` - Recursive `codesign` of bundles
//! - `archive` - `ditto` archives, distribution zips
//! - `notarization` - Submit, poll and staple workflow
//!
//! Every tool is driven through a [`CommandRunner`](crate::process::CommandRunner),
//! so nothing here is tied to the host it is compiled on; the tools
//! themselves only exist on macOS.
//!
//! # Error Handling Strategy
//!
//! **CRITICAL I/O** is propagated with `?`: file operations, external
//! commands, archive reads. **DECORATIVE I/O** (terminal colors, status
//! lines) ignores errors with `let _ =` so a closed or redirected stderr
//! never aborts a run.

#[macro_use]
pub mod prompts;

pub mod archive;
pub mod notarization;
pub mod signing;
pub mod validation;

// Re-export public API
pub use archive::{ZipOptions, compress_bundle, zip_bundle};
pub use notarization::{Credentials, NotarizationRequest, Notarizer, Ticket};
pub use signing::{SignOptions, sign_bundle};
pub use validation::verify_signature;
