//! Chapter XML parsing and format conversion.
//!
//! mkvextract writes XML and OGM chapters itself. CUE sheets and
//! PotPlayer bookmarks are produced from the extracted XML.

mod convert;
mod parser;
mod types;

pub use convert::{convert_file, to_cue, to_pbf, ConvertTarget};
pub use parser::{parse_chapter_file, parse_chapter_xml};
pub use types::{parse_timestamp_ns, ChapterEntry, ChapterError, ChapterList, ChapterResult};
