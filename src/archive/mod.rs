mod format;
mod layout;
mod writer;

pub use format::{
    pack_dos_datetime, Comment, EntryFlags, EntryName, EntryRecord, Header, Params,
    ATTRIB_ARCHIVE, ATTRIB_HIDDEN, ATTRIB_MASK, ATTRIB_READ_ONLY, ATTRIB_SYSTEM, COMMENT_FILL,
    COMMENT_SIZE, ENTRY_SIZE, HEADER_SIZE, NAME_FILL, NAME_SIZE, VERSION_SIZE, VERSION_TAG,
};
pub use layout::{hash_file, ContentHash, DedupIndex, LayoutPlan, LayoutPlanner, PayloadSlot};
pub use writer::ArchiveWriter;
