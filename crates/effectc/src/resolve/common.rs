use crate::error::{BlockError, BlockResult};
use crate::scanner::{Blanks, Cursor};
use crate::strip::META_MARKER;

use super::{expect_line_end, open_block};

/// Appends a COMMON block's body to the shared code every pass includes.
pub(crate) fn resolve_common(block: &str, common: &mut String) -> BlockResult<()> {
    let mut cursor = Cursor::new(block);
    open_block(&mut cursor, "COMMON")?;
    expect_line_end(&mut cursor, "//!COMMON")?;

    let mut body = cursor.clone();
    if body.eat(META_MARKER, Blanks::AcrossLines) {
        return Err(BlockError::syntax("COMMON blocks take no options"));
    }

    common.push_str(cursor.rest());
    if !common.ends_with('\n') {
        common.push('\n');
    }
    Ok(())
}
