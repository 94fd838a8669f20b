//!  Storage is organized through [record_storage::RecordStoreImpl].
//!  The basic idea is:
//!   - There is a directory with all the records.
//!   - Every local calendar day has its own file, named after the date.
//!   - Each line of a file is one finished interval. Files are only ever appended to.

pub mod entities;
pub mod record_storage;
