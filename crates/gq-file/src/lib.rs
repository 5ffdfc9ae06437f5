//! gq-file
//!
//! Scheduler group-definition file: canonical text codec and the atomic
//! publish protocol (stage → verify → backup → commit).
//!
//! The live file is only ever replaced by a same-directory rename of a
//! fully written and re-read temporary file, so readers see either the old
//! content or the verified new content.

mod codec;
mod error;
mod publish;

pub use codec::{ctime_stamp, decode_file, decode_str, encode, encode_at, MissingFile};
pub use error::{DecodeError, PublishError, PublishStage};
pub use publish::{OsPublishIo, PublishIo, PublishReceipt, Publisher, STAGING_SUFFIX};
