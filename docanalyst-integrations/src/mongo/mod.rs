//! MongoDB shell dialect.
//!
//! Reads `mongosh`-style statements such as
//! `db.orders.find({status: 'open'}).sort({total: -1}).limit(5)` without
//! running them:
//!
//! - `literal`: JavaScript literal arguments into JSON values
//! - `shell`: the statement grammar and argument checks
//! - `references`: collections and field paths the statement reads
//! - `dialect`: candidate extraction and the [`QueryDialect`](docanalyst_core::QueryDialect) impl

mod dialect;
mod literal;
mod references;
mod shell;

pub use dialect::MongoShellDialect;
