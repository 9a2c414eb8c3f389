//! storewatch - store WAN liveness monitoring.
//!
//! A background cycle probes every configured store, reduces multi-sample
//! probe results to an online/offline verdict by quorum and keeps the
//! authoritative status map in a thread-safe repository. A small web
//! dashboard reads snapshots, edits the store list and shows the
//! observation log.

pub mod config;
pub mod lookup;
pub mod monitor;
pub mod notify;
pub mod probe;
pub mod repo;
pub mod storage;
pub mod web;
