pub mod catalog;
pub mod decision;
pub mod engine;
pub mod fingerprint;
pub mod index;
pub mod paths;
pub mod provision;
pub mod remote;
pub mod transfer;

#[cfg(test)]
pub(crate) mod test_support;
