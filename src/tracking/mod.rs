//! Core of the tracker: the [stopwatch::Stopwatch] measuring a session, the
//! [interval::Interval] a session becomes, and [aggregate] functions summing intervals into
//! calendar buckets. Nothing in here touches the disk.

pub mod aggregate;
pub mod interval;
pub mod stopwatch;
pub mod ticker;
