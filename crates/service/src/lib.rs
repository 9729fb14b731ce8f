//! Draft persistence layer.
//! - `autosave`: the coordinator that decides when and where a form is saved.
//! - `storage` / `remote` / `notify`: the collaborators it talks to.
//! - `runtime`: builds those collaborators once per process.

pub mod errors;
pub mod autosave;
pub mod storage;
pub mod remote;
pub mod notify;
pub mod observability;
pub mod runtime;
#[cfg(test)]
pub mod test_support;
